//! The current thread's [`ErrorCollector`].
//!
//! Each thread owns one collector, created lazily in the globally configured
//! default mode (see [`Hooks::default_mode`](crate::hooks::Hooks::default_mode)).
//! Collectors of different threads never share state. The functions here
//! mirror the methods of [`ErrorCollector`] and operate on the current
//! thread's collector.
//!
//! Without the `std` feature there is no way to isolate execution contexts,
//! and every function in this module operates on a
//! [`Noop`](ErrorCollector::Noop) collector.
//!
//! # Examples
//!
//! ```
//! use softcheck::{CollectionMode, Failure, context};
//!
//! context::set_mode(CollectionMode::Deferred);
//! context::collect_or_throw(Failure::new("expected true")).unwrap();
//! context::collect_or_throw(Failure::new("expected 5, got 6")).unwrap();
//!
//! let error = context::throw_aggregate().unwrap_err();
//! assert_eq!(error.failures().len(), 2);
//! # context::set_mode(CollectionMode::Immediate);
//! ```

use alloc::{string::String, vec::Vec};
use core::{marker::PhantomData, panic::Location};

use crate::{
    AssertionError, CollectionMode, ErrorCollector, Failure,
    clue::{self, Clue, ClueRef},
    error::EmptyClueStackError,
    trace::Trace,
};

#[cfg(feature = "std")]
std::thread_local! {
    static CURRENT: core::cell::RefCell<Option<ErrorCollector>> =
        const { core::cell::RefCell::new(None) };
}

/// Runs `f` with exclusive access to the current thread's collector.
///
/// # Panics
///
/// Panics if called from inside another `with_current` call on the same
/// thread. The other functions in this module never hold the collector while
/// running a [`Clue`] or a [`TraceCleaner`](crate::trace::TraceCleaner), so
/// both may use this module freely.
#[cfg(feature = "std")]
pub fn with_current<R>(f: impl FnOnce(&mut ErrorCollector) -> R) -> R {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        f(current.get_or_insert_with(ErrorCollector::new))
    })
}

/// Runs `f` with exclusive access to the current collector.
#[cfg(not(feature = "std"))]
pub fn with_current<R>(f: impl FnOnce(&mut ErrorCollector) -> R) -> R {
    f(&mut ErrorCollector::Noop)
}

/// Installs `collector` as the current thread's collector for the duration of
/// `f`, then restores the previous one.
///
/// Returns the result of `f` together with the collector as `f` left it. This
/// is how a test driver gives each logical execution its own context.
///
/// ```
/// use softcheck::{CollectionMode, ErrorCollector, Failure, context};
///
/// let deferred = ErrorCollector::stateful(CollectionMode::Deferred);
/// let ((), mut collector) = context::scope(deferred, || {
///     context::collect_or_throw(Failure::new("inside the scope")).unwrap();
/// });
///
/// assert_eq!(collector.errors().len(), 1);
/// assert!(context::errors().is_empty());
/// # collector.clear();
/// ```
#[cfg(feature = "std")]
pub fn scope<R>(collector: ErrorCollector, f: impl FnOnce() -> R) -> (R, ErrorCollector) {
    struct Restore(Option<ErrorCollector>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            let _ = CURRENT.try_with(|current| *current.borrow_mut() = previous);
        }
    }

    let previous = CURRENT.with(|current| current.borrow_mut().replace(collector));
    let mut restore = Restore(previous);
    let result = f();
    let scoped = CURRENT.with(|current| {
        core::mem::replace(&mut *current.borrow_mut(), restore.0.take())
    });
    core::mem::forget(restore);
    (result, scoped.unwrap_or_else(ErrorCollector::new))
}

/// See [`ErrorCollector::mode`].
pub fn mode() -> CollectionMode {
    with_current(|collector| collector.mode())
}

/// See [`ErrorCollector::set_mode`].
pub fn set_mode(mode: CollectionMode) {
    with_current(|collector| collector.set_mode(mode))
}

/// See [`ErrorCollector::push_error`].
pub fn push_error(failure: Failure) {
    with_current(|collector| collector.push_error(failure))
}

/// See [`ErrorCollector::push_errors`].
pub fn push_errors(failures: impl IntoIterator<Item = Failure>) {
    with_current(|collector| collector.push_errors(failures))
}

/// See [`ErrorCollector::errors`].
pub fn errors() -> Vec<Failure> {
    with_current(|collector| collector.errors())
}

/// See [`ErrorCollector::clear`].
pub fn clear() {
    with_current(|collector| collector.clear())
}

/// See [`ErrorCollector::replace`].
pub fn replace(new_failures: impl IntoIterator<Item = Failure>) -> Vec<Failure> {
    with_current(|collector| collector.replace(new_failures))
}

/// See [`ErrorCollector::collect_or_throw`].
///
/// # Errors
///
/// Returns the failure in [`CollectionMode::Immediate`].
pub fn collect_or_throw(failure: Failure) -> Result<(), AssertionError> {
    with_current(|collector| collector.collect_or_throw(failure))
}

/// See [`ErrorCollector::collect_or_throw_all`].
///
/// # Errors
///
/// Returns the aggregate error in [`CollectionMode::Immediate`].
#[track_caller]
pub fn collect_or_throw_all(
    failures: impl IntoIterator<Item = Failure>,
) -> Result<(), AssertionError> {
    let location = Location::caller();
    with_current(|collector| collector.stage_all(failures))
        .and_then(|pending| pending.aggregate(location))
        .map_or(Ok(()), Err)
}

/// See [`ErrorCollector::reduce_to_single_error`].
#[track_caller]
pub fn reduce_to_single_error() -> Option<AssertionError> {
    let location = Location::caller();
    with_current(ErrorCollector::take_pending).aggregate(location)
}

/// See [`ErrorCollector::throw_aggregate`].
///
/// # Errors
///
/// Returns the aggregate of the collected failures, if any.
#[track_caller]
pub fn throw_aggregate() -> Result<(), AssertionError> {
    reduce_to_single_error().map_or(Ok(()), Err)
}

/// See [`ErrorCollector::push_clue`].
///
/// Prefer [`clue_guard`] or [`with_clue`](crate::with_clue), which pop the
/// clue again on every exit path.
pub fn push_clue<C: Clue>(clue: C) {
    let clue = ClueRef::new(clue);
    with_current(|collector| collector.push_clue_ref(clue))
}

/// See [`ErrorCollector::pop_clue`].
///
/// # Errors
///
/// Returns [`EmptyClueStackError`] if no clue is pushed.
pub fn pop_clue() -> Result<(), EmptyClueStackError> {
    with_current(|collector| collector.pop_clue())
}

/// Pushes a clue onto the current collector and returns a guard that pops it
/// when dropped.
pub fn clue_guard<C: Clue>(clue: C) -> CurrentClueGuard {
    push_clue(clue);
    CurrentClueGuard {
        _not_send: PhantomData,
    }
}

/// Guard returned by [`clue_guard`].
///
/// The guard is tied to the thread whose collector it pushed to.
#[must_use = "the clue is popped as soon as the guard is dropped"]
pub struct CurrentClueGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for CurrentClueGuard {
    fn drop(&mut self) {
        #[cfg(feature = "std")]
        let _ = CURRENT.try_with(|current| {
            if let Ok(mut current) = current.try_borrow_mut()
                && let Some(collector) = current.as_mut()
            {
                let _ = collector.pop_clue();
            }
        });
    }
}

/// See [`ErrorCollector::clue_context`].
pub fn clue_context() -> Vec<ClueRef> {
    with_current(|collector| collector.clue_context())
}

/// Renders the current clue stack, outer clue first.
///
/// The clues are evaluated after the collector is released, so a clue may
/// itself use this module.
pub fn render_clue_context() -> String {
    clue::render_clues(&clue_context())
}

/// Creates a [`Failure`] whose message is prefixed with the rendered clue
/// context of the current collector.
///
/// ```
/// use softcheck::{context, with_clue};
///
/// let failure = with_clue(|| "user 42", || context::failure("expected an email address"));
/// assert_eq!(failure.message(), "user 42\nexpected an email address");
/// ```
#[track_caller]
pub fn failure(message: impl Into<String>) -> Failure {
    let mut text = render_clue_context();
    text.push_str(&message.into());
    Failure::from_parts(text, Trace::capture(Location::caller()), None)
}
