//! Errors produced by the collection protocol.

use alloc::vec::Vec;
use core::{fmt, panic::Location, slice};

use crate::{Failure, trace::Trace};

/// The error raised by the collection protocol.
///
/// A single failure keeps the same shape whether it was raised immediately or
/// collected and aggregated later. Only deferred collection of several
/// failures produces [`AssertionError::Multiple`].
#[derive(Clone, Debug)]
pub enum AssertionError {
    /// Exactly one failure.
    Single(Failure),
    /// Two or more failures, in the order they were collected.
    Multiple(MultipleFailures),
}

impl AssertionError {
    /// The failures this error stands for, in collection order.
    ///
    /// ```
    /// use softcheck::{AssertionError, Failure};
    ///
    /// let error = AssertionError::from(Failure::new("expected true"));
    /// assert_eq!(error.failures().len(), 1);
    /// ```
    pub fn failures(&self) -> &[Failure] {
        match self {
            Self::Single(failure) => slice::from_ref(failure),
            Self::Multiple(multiple) => multiple.failures(),
        }
    }

    /// Consumes the error, returning its failures in collection order.
    pub fn into_failures(self) -> Vec<Failure> {
        match self {
            Self::Single(failure) => alloc::vec![failure],
            Self::Multiple(multiple) => multiple.failures,
        }
    }

    /// The trace of the outermost error value.
    pub fn trace(&self) -> &Trace {
        match self {
            Self::Single(failure) => failure.trace(),
            Self::Multiple(multiple) => &multiple.trace,
        }
    }

    /// Returns `true` if this error holds more than one failure.
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }
}

impl From<Failure> for AssertionError {
    fn from(failure: Failure) -> Self {
        Self::Single(failure)
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(failure) => fmt::Display::fmt(failure, f),
            Self::Multiple(multiple) => fmt::Display::fmt(multiple, f),
        }
    }
}

impl core::error::Error for AssertionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Single(failure) => core::error::Error::source(failure),
            Self::Multiple(_) => None,
        }
    }
}

/// Several failures collected in deferred mode and reported together.
///
/// The message lists every failure, numbered in collection order, along with
/// the location it was created at:
///
/// ```text
/// The following 2 assertions failed:
/// 1) expected true
///    at tests/user.rs:10:5
/// 2) expected 5, got 6
///    at tests/user.rs:11:5
/// ```
#[derive(Clone)]
pub struct MultipleFailures {
    failures: Vec<Failure>,
    trace: Trace,
}

impl MultipleFailures {
    pub(crate) fn new(failures: Vec<Failure>, location: &'static Location<'static>) -> Self {
        Self {
            failures,
            trace: Trace::capture(location),
        }
    }

    pub(crate) fn trace_mut(&mut self) -> &mut Trace {
        &mut self.trace
    }

    /// The collected failures, in collection order.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// The trace of the aggregation point.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }
}

impl fmt::Display for MultipleFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The following {} assertions failed:",
            self.failures.len()
        )?;
        for (index, failure) in self.failures.iter().enumerate() {
            write!(f, "\n{}) {}", index + 1, failure.message())?;
            write!(f, "\n   at {}", failure.location())?;
        }
        Ok(())
    }
}

impl fmt::Debug for MultipleFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")?;
        write!(f, "{}", self.trace)
    }
}

impl core::error::Error for MultipleFailures {}

/// Error returned when popping a clue from an empty clue stack.
///
/// This indicates a push/pop pairing bug in the caller; scoped acquisition
/// through [`ClueGuard`](crate::ClueGuard) or
/// [`with_clue`](crate::with_clue) cannot produce it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EmptyClueStackError;

impl fmt::Display for EmptyClueStackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot pop a clue: the clue stack is empty")
    }
}

impl core::error::Error for EmptyClueStackError {}
