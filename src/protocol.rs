//! The collect-or-throw protocol and the aggregation of collected failures.
//!
//! Assertion code reports every failure through
//! [`collect_or_throw`](ErrorCollector::collect_or_throw) without knowing the
//! active mode. In [`CollectionMode::Immediate`] the failure comes straight
//! back as an error; in [`CollectionMode::Deferred`] it is stored and the call
//! succeeds. Whoever owns the execution context finalizes it with
//! [`throw_aggregate`](ErrorCollector::throw_aggregate) or
//! [`reduce_to_single_error`](ErrorCollector::reduce_to_single_error).

use alloc::{string::String, vec::Vec};
use core::panic::Location;

use triomphe::Arc;

use crate::{
    AssertionError, CollectionMode, ErrorCollector, Failure,
    error::MultipleFailures,
    hooks,
    trace::{Trace, TraceCleaner},
};

impl ErrorCollector {
    /// Reports a failure according to the active mode.
    ///
    /// # Errors
    ///
    /// In [`CollectionMode::Immediate`] the failure is returned unmodified as
    /// [`AssertionError::Single`] and nothing is stored. In
    /// [`CollectionMode::Deferred`] the failure is stored and `Ok(())` is
    /// returned.
    pub fn collect_or_throw(&mut self, failure: Failure) -> Result<(), AssertionError> {
        match self.mode() {
            CollectionMode::Immediate => {
                tracing::trace!(failure = %failure, "raising failure immediately");
                Err(AssertionError::Single(failure))
            }
            CollectionMode::Deferred => {
                tracing::trace!(failure = %failure, "deferring failure");
                self.push_error(failure);
                Ok(())
            }
        }
    }

    /// Reports several simultaneous failures.
    ///
    /// Every failure is stored first, regardless of mode. In
    /// [`CollectionMode::Immediate`] everything collected is then aggregated
    /// and returned, so several failures produce one
    /// [`AssertionError::Multiple`] rather than only the first.
    ///
    /// # Errors
    ///
    /// Returns the aggregate error in immediate mode if any failures were
    /// collected.
    ///
    /// ```
    /// use softcheck::{CollectionMode, ErrorCollector, Failure};
    ///
    /// let mut collector = ErrorCollector::stateful(CollectionMode::Immediate);
    /// let error = collector
    ///     .collect_or_throw_all([Failure::new("a"), Failure::new("b")])
    ///     .unwrap_err();
    ///
    /// assert!(error.is_multiple());
    /// assert!(collector.is_empty());
    /// ```
    #[track_caller]
    pub fn collect_or_throw_all(
        &mut self,
        failures: impl IntoIterator<Item = Failure>,
    ) -> Result<(), AssertionError> {
        self.collect_or_throw_all_at(failures, Location::caller())
    }

    pub(crate) fn collect_or_throw_all_at(
        &mut self,
        failures: impl IntoIterator<Item = Failure>,
        location: &'static Location<'static>,
    ) -> Result<(), AssertionError> {
        self.stage_all(failures)
            .and_then(|pending| pending.aggregate(location))
            .map_or(Ok(()), Err)
    }

    /// Stores `failures` and, in immediate mode, takes everything collected
    /// back out for aggregation.
    pub(crate) fn stage_all(
        &mut self,
        failures: impl IntoIterator<Item = Failure>,
    ) -> Option<Pending> {
        if self.is_noop() {
            // Nothing can be stored, so aggregate what was handed in instead of
            // losing it.
            return Some(self.pending(failures.into_iter().collect()));
        }

        self.push_errors(failures);
        match self.mode() {
            CollectionMode::Immediate => Some(self.take_pending()),
            CollectionMode::Deferred => None,
        }
    }

    /// Stores failures without consulting the mode.
    pub fn push_errors(&mut self, failures: impl IntoIterator<Item = Failure>) {
        for failure in failures {
            self.push_error(failure);
        }
    }

    /// Drains the collected failures into at most one error.
    ///
    /// - No failures: `None`.
    /// - One failure: a new [`AssertionError::Single`] carrying the same
    ///   message, located at the caller.
    /// - More: [`AssertionError::Multiple`] holding the original failures in
    ///   collection order.
    ///
    /// The collector is empty afterwards, so a second call without new
    /// failures returns `None`. The trace of the returned error has been
    /// passed through the active [`TraceCleaner`](crate::trace::TraceCleaner).
    #[track_caller]
    pub fn reduce_to_single_error(&mut self) -> Option<AssertionError> {
        self.reduce_at(Location::caller())
    }

    /// Drains the collected failures and returns them as an error, if there
    /// were any.
    ///
    /// # Errors
    ///
    /// Returns the error produced by
    /// [`reduce_to_single_error`](Self::reduce_to_single_error).
    #[track_caller]
    pub fn throw_aggregate(&mut self) -> Result<(), AssertionError> {
        self.reduce_at(Location::caller()).map_or(Ok(()), Err)
    }

    pub(crate) fn reduce_at(
        &mut self,
        location: &'static Location<'static>,
    ) -> Option<AssertionError> {
        self.take_pending().aggregate(location)
    }

    /// Drains the collected failures for aggregation.
    pub(crate) fn take_pending(&mut self) -> Pending {
        let failures = self.drain_failures();
        self.pending(failures)
    }

    /// Pairs `failures` with the cleaner this collector would apply to their
    /// aggregate.
    pub(crate) fn pending(&self, failures: Vec<Failure>) -> Pending {
        Pending {
            failures,
            cleaner: self.cleaner(),
        }
    }
}

/// Failures taken out of a collector, waiting to be aggregated.
///
/// Aggregation runs a [`TraceCleaner`], which may itself use the current
/// thread's collector or the global hooks. A `Pending` holds no borrow of
/// either, so it is aggregated only after both are released.
pub(crate) struct Pending {
    failures: Vec<Failure>,
    cleaner: Option<Arc<dyn TraceCleaner>>,
}

impl Pending {
    pub(crate) fn aggregate(
        mut self,
        location: &'static Location<'static>,
    ) -> Option<AssertionError> {
        if !self.failures.is_empty() {
            tracing::debug!(count = self.failures.len(), "aggregating collected failures");
        }

        match self.failures.len() {
            0 => None,
            1 => {
                let failure = self.failures.pop()?;
                let mut trace = Trace::capture(location);
                self.clean(&mut trace);
                Some(AssertionError::Single(Failure::from_parts(
                    String::from(failure.message()),
                    trace,
                    None,
                )))
            }
            _ => {
                let failures = core::mem::take(&mut self.failures);
                let mut multiple = MultipleFailures::new(failures, location);
                self.clean(multiple.trace_mut());
                Some(AssertionError::Multiple(multiple))
            }
        }
    }

    fn clean(&self, trace: &mut Trace) {
        match &self.cleaner {
            Some(cleaner) => cleaner.clean(trace),
            None => hooks::clean_trace(trace),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{
        string::{String, ToString},
        vec,
    };
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn messages(failures: &[Failure]) -> Vec<String> {
        failures.iter().map(|f| f.message().to_string()).collect()
    }

    #[test]
    fn immediate_mode_raises_unmodified() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Immediate);
        let failure = Failure::new("expected true");

        let error = collector.collect_or_throw(failure.clone()).unwrap_err();

        match error {
            AssertionError::Single(raised) => assert!(raised.ptr_eq(&failure)),
            AssertionError::Multiple(_) => panic!("expected a single failure"),
        }
        assert!(collector.is_empty());
    }

    #[test]
    fn deferred_mode_stores() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        let failure = Failure::new("expected true");

        collector.collect_or_throw(failure.clone()).unwrap();

        let stored = collector.errors();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].ptr_eq(&failure));
        collector.clear();
    }

    #[test]
    fn reduce_is_single_use() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        collector.push_error(Failure::new("expected true"));
        collector.push_error(Failure::new("expected 5, got 6"));

        let error = collector.reduce_to_single_error().unwrap();
        assert_eq!(
            messages(error.failures()),
            ["expected true", "expected 5, got 6"]
        );
        assert!(collector.errors().is_empty());
        assert!(collector.reduce_to_single_error().is_none());
    }

    #[test]
    fn single_failure_is_rewrapped_at_the_caller() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        let original = Failure::new("expected true");
        collector.push_error(original.clone());

        let line = line!() + 1;
        let error = collector.reduce_to_single_error().unwrap();

        let AssertionError::Single(single) = error else {
            panic!("expected a single failure");
        };
        assert_eq!(single.message(), "expected true");
        assert!(!single.ptr_eq(&original));
        assert_eq!(single.location().line(), line);
    }

    #[test]
    fn multiple_failures_keep_order() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        for message in ["F1", "F2", "F3"] {
            collector.collect_or_throw(Failure::new(message)).unwrap();
        }

        let error = collector.throw_aggregate().unwrap_err();
        let rendered = error.to_string();
        let first = rendered.find("1) F1").unwrap();
        let second = rendered.find("2) F2").unwrap();
        let third = rendered.find("3) F3").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn nothing_collected_is_a_pass() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        assert!(collector.reduce_to_single_error().is_none());
        assert!(collector.throw_aggregate().is_ok());
    }

    #[test]
    fn bulk_in_immediate_mode_aggregates() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Immediate);
        let error = collector
            .collect_or_throw_all(vec![Failure::new("F1"), Failure::new("F2")])
            .unwrap_err();

        assert!(error.is_multiple());
        assert_eq!(messages(error.failures()), ["F1", "F2"]);
        assert!(collector.is_empty());
    }

    #[test]
    fn bulk_in_deferred_mode_stores() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        collector
            .collect_or_throw_all(vec![Failure::new("F1"), Failure::new("F2")])
            .unwrap();
        assert_eq!(messages(&collector.errors()), ["F1", "F2"]);
        collector.clear();
    }

    #[test]
    fn bulk_with_single_failure_in_immediate_mode() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Immediate);
        let error = collector
            .collect_or_throw_all([Failure::new("only")])
            .unwrap_err();
        assert!(!error.is_multiple());
        assert_eq!(error.to_string(), "only");

        assert!(collector.collect_or_throw_all(Vec::<Failure>::new()).is_ok());
    }

    #[test]
    fn noop_never_swallows_bulk_failures() {
        let mut collector = ErrorCollector::noop();
        let error = collector
            .collect_or_throw_all([Failure::new("F1"), Failure::new("F2")])
            .unwrap_err();
        assert_eq!(messages(error.failures()), ["F1", "F2"]);

        let error = collector.collect_or_throw(Failure::new("F3")).unwrap_err();
        assert_eq!(error.to_string(), "F3");
    }

    #[test]
    fn mode_change_is_not_retroactive() {
        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred);
        collector.collect_or_throw(Failure::new("stored")).unwrap();
        collector.set_mode(CollectionMode::Immediate);

        assert!(collector.collect_or_throw(Failure::new("raised")).is_err());
        assert_eq!(messages(&collector.errors()), ["stored"]);
        collector.clear();
    }

    #[test]
    fn aggregates_are_cleaned_with_the_collector_cleaner() {
        static CLEANED: AtomicUsize = AtomicUsize::new(0);

        let mut collector = ErrorCollector::stateful(CollectionMode::Deferred).with_cleaner(
            |trace: &mut Trace| {
                CLEANED.fetch_add(1, Ordering::SeqCst);
                trace.omitted_frames = 99;
            },
        );

        collector.push_error(Failure::new("one"));
        let single = collector.reduce_to_single_error().unwrap();
        assert_eq!(single.trace().omitted_frames, 99);

        collector.push_errors([Failure::new("a"), Failure::new("b")]);
        let multiple = collector.reduce_to_single_error().unwrap();
        assert_eq!(multiple.trace().omitted_frames, 99);

        assert!(collector.reduce_to_single_error().is_none());
        assert_eq!(CLEANED.load(Ordering::SeqCst), 2);
    }
}
