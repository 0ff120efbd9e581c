//! Scoped helpers on top of the current thread's collector.

use alloc::vec::Vec;
use core::panic::Location;

use crate::{AssertionError, CollectionMode, Failure, clue::Clue, context};

/// Runs `f` with `clue` pushed onto the current collector's clue stack.
///
/// The clue is popped when `f` returns or unwinds.
///
/// ```
/// use softcheck::{context, with_clue};
///
/// let rendered = with_clue(
///     || "checking order 7",
///     || with_clue(|| "line item 2", context::render_clue_context),
/// );
/// assert_eq!(rendered, "checking order 7\nline item 2\n");
/// ```
pub fn with_clue<C: Clue, R>(clue: C, f: impl FnOnce() -> R) -> R {
    let _guard = context::clue_guard(clue);
    f()
}

struct RestoreMode(CollectionMode);

impl Drop for RestoreMode {
    fn drop(&mut self) {
        context::set_mode(self.0);
    }
}

/// Runs `f` with the current collector in `mode`, restoring the previous mode
/// afterwards.
///
/// Failures collected while `f` runs stay in the collector.
pub fn with_mode<R>(mode: CollectionMode, f: impl FnOnce() -> R) -> R {
    let _restore = RestoreMode(context::mode());
    context::set_mode(mode);
    f()
}

struct RestoreFailures(Option<Vec<Failure>>);

impl Drop for RestoreFailures {
    fn drop(&mut self) {
        if let Some(saved) = self.0.take() {
            context::replace(saved);
        }
    }
}

/// Runs `f` in [`CollectionMode::Deferred`] and reports everything it
/// collected as one error.
///
/// Failures collected before the call are set aside while `f` runs and put
/// back afterwards, so only the failures of `f` end up in the result. An error
/// returned by `f` itself is aggregated after the collected ones.
///
/// Inside a context that is already deferred, `f` simply runs and its
/// failures join the outer ones.
///
/// # Errors
///
/// Returns the aggregate of the failures collected or returned by `f`.
///
/// ```
/// use softcheck::{assert_softly, ensure};
///
/// let error = assert_softly(|| {
///     ensure!(1 + 1 == 3, "arithmetic is broken");
///     ensure!("abc".len() == 2, "length is off");
///     Ok(())
/// })
/// .unwrap_err();
///
/// assert_eq!(error.failures().len(), 2);
/// ```
#[track_caller]
pub fn assert_softly<T>(
    f: impl FnOnce() -> Result<T, AssertionError>,
) -> Result<T, AssertionError> {
    let location = Location::caller();
    if context::mode() == CollectionMode::Deferred {
        return f();
    }

    let mut restore = RestoreFailures(Some(context::replace(Vec::new())));
    let outcome = with_mode(CollectionMode::Deferred, f);
    let mut failures = context::replace(restore.0.take().unwrap_or_default());
    drop(restore);

    if let Err(error) = &outcome {
        failures.extend(error.failures().iter().cloned());
    }
    let pending = context::with_current(|collector| collector.pending(failures));
    match pending.aggregate(location) {
        Some(error) => Err(error),
        None => outcome,
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use alloc::string::{String, ToString};

    use super::*;
    use crate::{ErrorCollector, ensure};

    fn isolated<R>(f: impl FnOnce() -> R) -> R {
        let (result, _) = context::scope(ErrorCollector::stateful(CollectionMode::Immediate), f);
        result
    }

    #[test]
    fn clue_is_popped_after_the_closure() {
        isolated(|| {
            with_clue(|| "outer", || {
                assert_eq!(context::render_clue_context(), "outer\n");
            });
            assert_eq!(context::render_clue_context(), "");
        });
    }

    #[test]
    fn mode_is_restored() {
        isolated(|| {
            let inner = with_mode(CollectionMode::Deferred, context::mode);
            assert_eq!(inner, CollectionMode::Deferred);
            assert_eq!(context::mode(), CollectionMode::Immediate);
        });
    }

    #[test]
    fn soft_assertions_are_aggregated() {
        isolated(|| {
            let error = assert_softly(|| {
                ensure!(false, "first");
                ensure!(true, "never reported");
                ensure!(false, "second");
                Ok(())
            })
            .unwrap_err();

            let messages: Vec<String> =
                error.failures().iter().map(|f| f.message().to_string()).collect();
            assert_eq!(messages, ["first", "second"]);
            assert_eq!(context::mode(), CollectionMode::Immediate);
            assert!(context::errors().is_empty());
        });
    }

    #[test]
    fn passing_block_returns_its_value() {
        isolated(|| {
            let value = assert_softly(|| {
                ensure!(2 > 1, "ordering");
                Ok(42)
            })
            .unwrap();
            assert_eq!(value, 42);
        });
    }

    #[test]
    fn outer_failures_are_restored() {
        let ((), mut collector) =
            context::scope(ErrorCollector::stateful(CollectionMode::Immediate), || {
                context::push_error(Failure::new("outer"));
                let error = assert_softly(|| -> Result<(), AssertionError> {
                    ensure!(false, "inner");
                    Ok(())
                })
                .unwrap_err();
                assert_eq!(error.to_string(), "inner");
            });

        let remaining = collector.errors();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message(), "outer");
        collector.clear();
    }

    #[test]
    fn returned_error_joins_the_aggregate() {
        isolated(|| {
            let error = assert_softly(|| -> Result<(), AssertionError> {
                ensure!(false, "collected");
                Err(Failure::new("returned").into())
            })
            .unwrap_err();

            assert!(error.is_multiple());
            assert_eq!(error.failures()[1].message(), "returned");
        });
    }

    #[test]
    fn nested_soft_block_joins_the_outer_one() {
        isolated(|| {
            let error = assert_softly(|| {
                ensure!(false, "outer");
                assert_softly(|| {
                    ensure!(false, "inner");
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap_err();

            assert_eq!(error.failures().len(), 2);
        });
    }
}
