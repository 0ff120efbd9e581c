use alloc::{string::String, vec::Vec};
use core::{
    fmt,
    ops::{Deref, DerefMut},
};

use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::{
    CollectionMode, ErrorAccumulator, Failure,
    clue::{Clue, ClueRef, ClueStack},
    error::EmptyClueStackError,
    hooks,
    trace::TraceCleaner,
};

/// The failure-collection state of one execution context.
///
/// A collector is either [`Stateful`](Self::Stateful), holding a mode, the
/// collected failures and a clue stack, or [`Noop`](Self::Noop), which stores
/// nothing and always behaves as if in [`CollectionMode::Immediate`]. The
/// variant is chosen when the collector is constructed.
///
/// Most code does not hold a collector directly but goes through the
/// thread-local one in [`context`](crate::context). Owning a collector is
/// useful when the execution context is managed explicitly.
///
/// # Examples
///
/// ```
/// use softcheck::{CollectionMode, ErrorCollector, Failure};
///
/// let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
/// collector.collect_or_throw(Failure::new("expected true")).unwrap();
/// collector.collect_or_throw(Failure::new("expected 5, got 6")).unwrap();
///
/// let error = collector.throw_aggregate().unwrap_err();
/// assert_eq!(error.failures().len(), 2);
/// assert!(collector.errors().is_empty());
/// ```
pub enum ErrorCollector {
    /// Stores nothing. Used where execution contexts cannot be isolated.
    Noop,
    /// Stores failures and clues.
    Stateful(StatefulCollector),
}

/// The state held by [`ErrorCollector::Stateful`].
pub struct StatefulCollector {
    accumulator: ErrorAccumulator,
    clues: ClueStack,
    cleaner: Option<Arc<dyn TraceCleaner>>,
}

impl Drop for StatefulCollector {
    fn drop(&mut self) {
        if !self.accumulator.is_empty() {
            tracing::warn!(
                pending = self.accumulator.len(),
                "error collector dropped with failures that were never aggregated"
            );
        }
    }
}

impl ErrorCollector {
    /// Creates a stateful collector in the globally configured default mode.
    ///
    /// See [`Hooks::default_mode`](crate::hooks::Hooks::default_mode).
    pub fn new() -> Self {
        Self::stateful(hooks::default_mode())
    }

    /// Creates a stateful collector in the given mode.
    pub fn stateful(mode: CollectionMode) -> Self {
        Self::Stateful(StatefulCollector {
            accumulator: ErrorAccumulator::new(mode),
            clues: ClueStack::new(),
            cleaner: None,
        })
    }

    /// Creates a collector that stores nothing.
    pub const fn noop() -> Self {
        Self::Noop
    }

    /// Uses `cleaner` for this collector's aggregate errors instead of the
    /// globally installed one.
    ///
    /// Has no effect on a [`Noop`](Self::Noop) collector.
    pub fn with_cleaner(mut self, cleaner: impl TraceCleaner) -> Self {
        if let Self::Stateful(state) = &mut self {
            let cleaner = Arc::new(cleaner).unsize(unsize::Coercion!(to dyn TraceCleaner));
            state.cleaner = Some(cleaner);
        }
        self
    }

    /// Returns `true` for the [`Noop`](Self::Noop) variant.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    /// The active collection mode. Always [`CollectionMode::Immediate`] for a
    /// [`Noop`](Self::Noop) collector.
    pub fn mode(&self) -> CollectionMode {
        match self {
            Self::Noop => CollectionMode::Immediate,
            Self::Stateful(state) => state.accumulator.mode(),
        }
    }

    /// Sets the collection mode for subsequent collection calls.
    pub fn set_mode(&mut self, mode: CollectionMode) {
        if let Self::Stateful(state) = self {
            state.accumulator.set_mode(mode);
        }
    }

    /// Appends a failure without consulting the mode.
    pub fn push_error(&mut self, failure: Failure) {
        if let Self::Stateful(state) = self {
            state.accumulator.push_error(failure);
        }
    }

    /// Returns a snapshot of the collected failures in insertion order.
    pub fn errors(&self) -> Vec<Failure> {
        match self {
            Self::Noop => Vec::new(),
            Self::Stateful(state) => state.accumulator.errors(),
        }
    }

    /// Discards the collected failures. Clues and mode are unchanged.
    pub fn clear(&mut self) {
        if let Self::Stateful(state) = self {
            state.accumulator.clear();
        }
    }

    /// Swaps the collected failures for `new_failures`, returning the previous
    /// ones.
    pub fn replace(&mut self, new_failures: impl IntoIterator<Item = Failure>) -> Vec<Failure> {
        match self {
            Self::Noop => Vec::new(),
            Self::Stateful(state) => state.accumulator.replace(new_failures),
        }
    }

    /// Number of collected failures.
    pub fn len(&self) -> usize {
        match self {
            Self::Noop => 0,
            Self::Stateful(state) => state.accumulator.len(),
        }
    }

    /// Returns `true` if no failures are collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes a clue onto the clue stack.
    ///
    /// Prefer [`clue_guard`](Self::clue_guard), which pops the clue again on
    /// every exit path.
    pub fn push_clue<C: Clue>(&mut self, clue: C) {
        self.push_clue_ref(ClueRef::new(clue));
    }

    pub(crate) fn push_clue_ref(&mut self, clue: ClueRef) {
        if let Self::Stateful(state) = self {
            state.clues.push_clue_ref(clue);
        }
    }

    /// Removes the topmost clue.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyClueStackError`] if a stateful collector has no clues.
    /// Popping a [`Noop`](Self::Noop) collector always succeeds.
    pub fn pop_clue(&mut self) -> Result<(), EmptyClueStackError> {
        match self {
            Self::Noop => Ok(()),
            Self::Stateful(state) => state.clues.pop_clue(),
        }
    }

    /// Pushes a clue and returns a guard that pops it when dropped.
    ///
    /// ```
    /// use softcheck::{CollectionMode, ErrorCollector};
    ///
    /// let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
    /// {
    ///     let guard = collector.clue_guard(|| "validating user 42");
    ///     assert_eq!(guard.render_clue_context(), "validating user 42\n");
    /// }
    /// assert_eq!(collector.render_clue_context(), "");
    /// ```
    pub fn clue_guard<C: Clue>(&mut self, clue: C) -> ClueGuard<'_> {
        self.push_clue(clue);
        ClueGuard { collector: self }
    }

    /// Returns a snapshot of the clue stack, innermost clue first.
    pub fn clue_context(&self) -> Vec<ClueRef> {
        match self {
            Self::Noop => Vec::new(),
            Self::Stateful(state) => state.clues.clue_context(),
        }
    }

    /// Renders the clue stack, outer clue first, one clue per line.
    pub fn render_clue_context(&self) -> String {
        match self {
            Self::Noop => String::new(),
            Self::Stateful(state) => state.clues.render_clue_context(),
        }
    }

    /// Number of pushed clues.
    pub fn clue_depth(&self) -> usize {
        match self {
            Self::Noop => 0,
            Self::Stateful(state) => state.clues.depth(),
        }
    }

    pub(crate) fn drain_failures(&mut self) -> Vec<Failure> {
        match self {
            Self::Noop => Vec::new(),
            Self::Stateful(state) => state.accumulator.drain(),
        }
    }

    /// The collector's own cleaner, if one was set.
    pub(crate) fn cleaner(&self) -> Option<Arc<dyn TraceCleaner>> {
        match self {
            Self::Noop => None,
            Self::Stateful(state) => state.cleaner.clone(),
        }
    }
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("Noop"),
            Self::Stateful(state) => f
                .debug_struct("Stateful")
                .field("mode", &state.accumulator.mode())
                .field("failures", &state.accumulator.len())
                .field("clues", &state.clues.depth())
                .field("custom_cleaner", &state.cleaner.is_some())
                .finish(),
        }
    }
}

/// Guard returned by [`ErrorCollector::clue_guard`].
///
/// Dereferences to the collector, so it can be used for collection while the
/// clue is in place. The clue is popped when the guard is dropped, including
/// during unwinding.
#[must_use = "the clue is popped as soon as the guard is dropped"]
pub struct ClueGuard<'a> {
    collector: &'a mut ErrorCollector,
}

impl Deref for ClueGuard<'_> {
    type Target = ErrorCollector;

    fn deref(&self) -> &Self::Target {
        self.collector
    }
}

impl DerefMut for ClueGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.collector
    }
}

impl Drop for ClueGuard<'_> {
    fn drop(&mut self) {
        // The guard pushed exactly one clue, so the stack cannot be empty here
        // unless the caller popped it by hand.
        let _ = self.collector.pop_clue();
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    static_assertions::assert_impl_all!(ErrorCollector: Send, Sync);

    #[test]
    fn noop_stores_nothing() {
        let mut collector = ErrorCollector::noop();
        collector.set_mode(CollectionMode::Deferred);
        collector.push_error(Failure::new("ignored"));
        collector.push_clue(|| "ignored");

        assert!(collector.is_noop());
        assert_eq!(collector.mode(), CollectionMode::Immediate);
        assert!(collector.errors().is_empty());
        assert!(collector.replace(vec![Failure::new("x")]).is_empty());
        assert!(collector.is_empty());
        assert_eq!(collector.render_clue_context(), "");
        assert_eq!(collector.pop_clue(), Ok(()));
    }

    #[test]
    fn stateful_delegates_to_accumulator_and_clues() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        collector.push_error(Failure::new("a"));
        collector.push_clue(|| "outer");
        collector.push_clue(|| "inner");

        assert_eq!(collector.len(), 1);
        assert_eq!(collector.clue_depth(), 2);
        assert_eq!(collector.render_clue_context(), "outer\ninner\n");
        assert_eq!(collector.clue_context()[0].render(), "inner");

        collector.clear();
        assert!(collector.is_empty());
        assert_eq!(collector.clue_depth(), 2);
        assert_eq!(collector.mode(), CollectionMode::Deferred);
    }

    #[test]
    fn pop_on_empty_stateful_fails() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Immediate);
        assert_eq!(collector.pop_clue(), Err(EmptyClueStackError));
    }

    #[test]
    fn clue_guard_pops_on_drop() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        {
            let mut guard = collector.clue_guard(|| "A");
            {
                let guard = guard.clue_guard(|| "B");
                assert_eq!(guard.render_clue_context(), "A\nB\n");
            }
            assert_eq!(guard.render_clue_context(), "A\n");
        }
        assert_eq!(collector.clue_depth(), 0);
    }

    #[test]
    fn debug_summarizes_state() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        collector.push_error(Failure::new("a"));
        let debug = alloc::format!("{collector:?}");
        assert_eq!(
            debug,
            "Stateful { mode: Deferred, failures: 1, clues: 0, custom_cleaner: false }"
        );
        collector.clear();
        assert_eq!(alloc::format!("{:?}", ErrorCollector::noop()), "Noop");
    }

    #[cfg(feature = "std")]
    mod drop_warning {
        use std::sync::{Arc, Mutex};

        use tracing::{
            Event, Level, Subscriber,
            field::{Field, Visit},
        };
        use tracing_subscriber::{
            Layer, Registry,
            layer::{Context, SubscriberExt},
        };

        use super::*;

        /// Records the `pending` field of every warning.
        #[derive(Clone, Default)]
        struct Warnings(Arc<Mutex<Vec<Option<u64>>>>);

        struct PendingField(Option<u64>);

        impl Visit for PendingField {
            fn record_u64(&mut self, field: &Field, value: u64) {
                if field.name() == "pending" {
                    self.0 = Some(value);
                }
            }

            fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
        }

        impl<S: Subscriber> Layer<S> for Warnings {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                if *event.metadata().level() != Level::WARN {
                    return;
                }
                let mut pending = PendingField(None);
                event.record(&mut pending);
                self.0.lock().unwrap().push(pending.0);
            }
        }

        fn warnings_during(f: impl FnOnce()) -> Vec<Option<u64>> {
            let warnings = Warnings::default();
            let subscriber = Registry::default().with(warnings.clone());
            tracing::subscriber::with_default(subscriber, f);
            warnings.0.lock().unwrap().clone()
        }

        #[test]
        fn dropping_pending_failures_warns() {
            let warnings = warnings_during(|| {
                let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
                collector.push_error(Failure::new("never aggregated"));
                drop(collector);
            });
            assert_eq!(warnings, [Some(1)]);
        }

        #[test]
        fn dropping_drained_collector_is_silent() {
            let warnings = warnings_during(|| {
                let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
                collector.push_error(Failure::new("aggregated"));
                assert!(collector.reduce_to_single_error().is_some());
                drop(collector);

                drop(ErrorCollector::noop());
            });
            assert!(warnings.is_empty());
        }
    }
}
