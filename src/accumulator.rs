use alloc::vec::Vec;

use crate::Failure;

/// Whether a failure handed to the collection protocol is raised right away
/// or stored for later aggregation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CollectionMode {
    /// Failures are returned to the caller as soon as they are reported.
    #[default]
    Immediate,
    /// Failures are stored and reported together when the context is
    /// finalized.
    Deferred,
}

/// The ordered failures collected in one execution context, together with
/// the active [`CollectionMode`].
///
/// The accumulator never deduplicates, validates or reorders failures.
///
/// # Examples
///
/// ```
/// use softcheck::{CollectionMode, ErrorAccumulator, Failure};
///
/// let mut accumulator = ErrorAccumulator::new(CollectionMode::Deferred);
/// accumulator.push_error(Failure::new("expected true"));
/// accumulator.push_error(Failure::new("expected 5, got 6"));
///
/// let saved = accumulator.replace(Vec::new());
/// assert_eq!(saved.len(), 2);
/// assert!(accumulator.is_empty());
///
/// accumulator.replace(saved);
/// assert_eq!(accumulator.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ErrorAccumulator {
    mode: CollectionMode,
    failures: Vec<Failure>,
}

impl ErrorAccumulator {
    /// Creates an empty accumulator in the given mode.
    pub const fn new(mode: CollectionMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
        }
    }

    /// The active collection mode.
    pub fn mode(&self) -> CollectionMode {
        self.mode
    }

    /// Sets the collection mode.
    ///
    /// Only later collection calls are affected; failures already stored stay
    /// stored.
    pub fn set_mode(&mut self, mode: CollectionMode) {
        self.mode = mode;
    }

    /// Appends a failure.
    pub fn push_error(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    /// Returns a snapshot of the stored failures in insertion order.
    pub fn errors(&self) -> Vec<Failure> {
        self.failures.clone()
    }

    /// Discards every stored failure. The mode is unchanged.
    pub fn clear(&mut self) {
        self.failures.clear();
    }

    /// Swaps the stored failures for `new_failures`, returning the previous
    /// ones.
    pub fn replace(&mut self, new_failures: impl IntoIterator<Item = Failure>) -> Vec<Failure> {
        let previous = core::mem::take(&mut self.failures);
        self.failures.extend(new_failures);
        previous
    }

    /// Removes and returns every stored failure.
    pub(crate) fn drain(&mut self) -> Vec<Failure> {
        core::mem::take(&mut self.failures)
    }

    /// Number of stored failures.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Returns `true` if no failures are stored.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}
