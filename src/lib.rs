#![cfg_attr(not(feature = "std"), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Soft assertions: collect assertion failures instead of stopping at the
//! first one.
//!
//! ## Overview
//!
//! Assertion code reports every failure through one call,
//! [`collect_or_throw`](ErrorCollector::collect_or_throw), without knowing how
//! the failure will be handled. The [`ErrorCollector`] of the current
//! execution context decides:
//!
//! - In [`CollectionMode::Immediate`] the failure is returned straight away as
//!   an [`AssertionError`], and `?` stops the check at the first failure.
//! - In [`CollectionMode::Deferred`] the failure is stored and execution
//!   continues. Once the checks are done, the collected failures are
//!   aggregated into a single error that lists all of them.
//!
//! Alongside the failures, a collector keeps a stack of **clues**: lazily
//! evaluated pieces of context, such as "validating user 42", that prefix the
//! messages of failures created while they are pushed.
//!
//! ## Quick Example
//!
//! ```
//! use softcheck::prelude::*;
//!
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! fn check_user(user: &User) -> Result<(), AssertionError> {
//!     with_clue(
//!         {
//!             let name = user.name.clone();
//!             move || format!("user {name:?}")
//!         },
//!         || -> Result<(), AssertionError> {
//!             ensure!(user.age >= 18, "expected an adult, got age {}", user.age);
//!             ensure!(user.name.len() > 3, "expected a longer name");
//!             Ok(())
//!         },
//!     )
//! }
//!
//! let user = User { name: "Bob".into(), age: 12 };
//!
//! // Hard assertions stop at the first failure.
//! let error = check_user(&user).unwrap_err();
//! assert_eq!(error.to_string(), "user \"Bob\"\nexpected an adult, got age 12");
//!
//! // Soft assertions report every failure.
//! let error = assert_softly(|| check_user(&user)).unwrap_err();
//! assert_eq!(error.failures().len(), 2);
//! ```
//!
//! ## Execution contexts
//!
//! With the `std` feature, every thread has its own collector, reached through
//! the functions in [`context`]. A collector can also be owned and passed
//! around explicitly; [`context::scope`] installs one as the current
//! collector for the duration of a closure.
//!
//! ## Configuration
//!
//! Process-wide settings, such as the mode new collectors start in and the
//! [`TraceCleaner`](trace::TraceCleaner) applied to aggregate errors, are
//! installed through [`hooks::Hooks`].
//!
//! ## Features
//!
//! - `std` (default): thread-local collectors and environment-variable
//!   configuration. Without it, the current collector is always
//!   [`ErrorCollector::Noop`].
//! - `backtrace`: capture resolved stack frames in every [`Trace`](trace::Trace).
//!
//! ## Logging
//!
//! softcheck emits [`tracing`] events: `trace` when a failure is raised or
//! deferred, `debug` when failures are aggregated and when hooks are
//! installed, and `warn` when a collector holding failures is dropped.
//! The `softcheck-tracing` crate provides clues built from the active spans.

extern crate alloc;

#[macro_use]
mod macros;

pub mod clue;
pub mod context;
pub mod hooks;
pub mod prelude;
pub mod trace;

mod accumulator;
mod collector;
mod error;
mod failure;
mod protocol;
mod soft;

pub use self::{
    accumulator::{CollectionMode, ErrorAccumulator},
    collector::{ClueGuard, ErrorCollector, StatefulCollector},
    error::{AssertionError, EmptyClueStackError, MultipleFailures},
    failure::Failure,
    soft::{assert_softly, with_clue, with_mode},
};

/// A [`Result`](core::result::Result) type alias where the error is
/// [`AssertionError`].
///
/// # Examples
///
/// ```
/// use softcheck::{Failure, Result};
///
/// fn check_positive(value: i32) -> Result<i32> {
///     if value <= 0 {
///         return Err(Failure::new("expected a positive value").into());
///     }
///     Ok(value)
/// }
///
/// assert!(check_positive(-1).is_err());
/// ```
pub type Result<T = (), E = AssertionError> = core::result::Result<T, E>;

// Not public API. Referenced by macro-generated code.
#[doc(hidden)]
pub mod __private {
    use alloc::fmt;
    #[doc(hidden)]
    pub use core::{format_args, stringify};

    use crate::Failure;

    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    #[track_caller]
    pub fn format_failure(args: fmt::Arguments<'_>) -> Failure {
        match args.as_str() {
            Some(message) => crate::context::failure(message),
            None => crate::context::failure(fmt::format(args)),
        }
    }
}
