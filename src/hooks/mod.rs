//! Global configuration of softcheck.
//!
//! # Quick Start
//!
//! ```rust
//! use softcheck::{CollectionMode, hooks::Hooks, trace::FrameFilter};
//!
//! // Collect failures by default and hide one more crate from traces
//! Hooks::new()
//!     .default_mode(CollectionMode::Deferred)
//!     .trace_cleaner(FrameFilter {
//!         skipped_initial_crates: &["softcheck", "my_matchers", "std", "core"],
//!         ..FrameFilter::DEFAULT
//!     })
//!     .install()
//!     .expect("failed to install hooks");
//! ```
//!
//! Without installed hooks, collectors start in
//! [`CollectionMode::Immediate`] and traces are cleaned with
//! [`FrameFilter::from_env`].

mod slot;

use core::fmt;

use triomphe::Arc;
use unsize::CoerceUnsize;

use self::slot::HookSlot;
use crate::{
    CollectionMode,
    trace::{FrameFilter, Trace, TraceCleaner},
};

static HOOKS: HookSlot<HookData> = HookSlot::empty();

/// Builder for configuring and installing hooks globally.
#[derive(Default)]
pub struct Hooks(HookData);

#[derive(Default)]
struct HookData {
    trace_cleaner: Option<Arc<dyn TraceCleaner>>,
    default_mode: CollectionMode,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("trace_cleaner", &self.0.trace_cleaner.is_some())
            .field("default_mode", &self.0.default_mode)
            .finish()
    }
}

/// Error returned when attempting to install hooks when they're already
/// installed.
///
/// Contains the hooks that were attempted to be installed, allowing you to
/// recover them if needed.
pub struct HooksAlreadyInstalledError(pub Hooks);

impl fmt::Debug for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HooksAlreadyInstalledError").finish()
    }
}

impl fmt::Display for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hooks are already installed globally")
    }
}

impl core::error::Error for HooksAlreadyInstalledError {}

impl Hooks {
    /// Creates a builder with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cleaner applied to the trace of every aggregate error.
    ///
    /// Collectors configured with
    /// [`ErrorCollector::with_cleaner`](crate::ErrorCollector::with_cleaner)
    /// use their own cleaner instead.
    pub fn trace_cleaner<C: TraceCleaner>(mut self, cleaner: C) -> Self {
        let cleaner = Arc::new(cleaner).unsize(unsize::Coercion!(to dyn TraceCleaner));
        self.0.trace_cleaner = Some(cleaner);
        self
    }

    /// Sets the mode newly created collectors start in.
    ///
    /// This includes the thread-local collector of a thread that has not used
    /// softcheck yet.
    pub fn default_mode(mut self, mode: CollectionMode) -> Self {
        self.0.default_mode = mode;
        self
    }

    /// Installs the hooks globally.
    ///
    /// If hooks are already installed, returns an error
    /// [`HooksAlreadyInstalledError`], containing the hooks that were attempted
    /// to be installed.
    ///
    /// See also [`replace`](Self::replace) which will replace any existing
    /// hooks without erroring.
    pub fn install(self) -> Result<(), HooksAlreadyInstalledError> {
        tracing::debug!(hooks = ?self, "installing softcheck hooks");
        HOOKS
            .fill(self.0)
            .map_err(|rejected| HooksAlreadyInstalledError(Hooks(rejected)))
    }

    /// Replaces the currently installed hooks with `self`.
    ///
    /// Returns the previously installed hooks, if any.
    pub fn replace(self) -> Option<Hooks> {
        tracing::debug!(hooks = ?self, "replacing softcheck hooks");
        HOOKS.swap(Some(self.0)).map(Hooks)
    }

    /// Removes the installed hooks, returning them.
    pub fn uninstall() -> Option<Hooks> {
        HOOKS.swap(None).map(Hooks)
    }
}

pub(crate) fn default_mode() -> CollectionMode {
    HOOKS.with(|hooks| hooks.map_or(CollectionMode::Immediate, |hooks| hooks.default_mode))
}

/// Cleans `trace` with the installed cleaner, or [`FrameFilter::from_env`].
///
/// The cleaner runs after the hooks are released, so it may replace them.
pub(crate) fn clean_trace(trace: &mut Trace) {
    let cleaner = HOOKS.with(|hooks| hooks.and_then(|hooks| hooks.trace_cleaner.clone()));
    match cleaner {
        Some(cleaner) => cleaner.clean(trace),
        None => FrameFilter::from_env().clean(trace),
    }
}
