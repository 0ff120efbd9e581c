use alloc::{boxed::Box, string::String};
use core::{error::Error, fmt, panic::Location};

use triomphe::Arc;

use crate::trace::Trace;

type BoxedSource = Box<dyn Error + Send + Sync + 'static>;

/// A single failed check.
///
/// A failure is an opaque error value: a message, the location it was created
/// at, a [`Trace`], and optionally the error that caused it. Failures are
/// cheap to clone; clones share the same underlying data, so the identity of
/// a failure survives being copied in and out of an
/// [`ErrorCollector`](crate::ErrorCollector).
///
/// # Examples
///
/// ```
/// use softcheck::Failure;
///
/// let failure = Failure::new("expected 5, got 6");
/// assert_eq!(failure.message(), "expected 5, got 6");
/// assert_eq!(failure.to_string(), "expected 5, got 6");
/// ```
#[derive(Clone)]
pub struct Failure(Arc<FailureData>);

struct FailureData {
    message: String,
    trace: Trace,
    source: Option<BoxedSource>,
}

impl Failure {
    /// Creates a failure with the given message, recording the caller's
    /// location.
    ///
    /// This does not include any clue context; use
    /// [`context::failure`](crate::context::failure) or the
    /// [`failure!`](crate::failure!) macro to prefix the message with the
    /// current clues.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_parts(message.into(), Trace::capture(Location::caller()), None)
    }

    /// Creates a failure caused by another error.
    ///
    /// ```
    /// use softcheck::Failure;
    ///
    /// let parse_error = "x".parse::<u8>().unwrap_err();
    /// let failure = Failure::with_source("could not read the answer", parse_error);
    ///
    /// assert!(std::error::Error::source(&failure).is_some());
    /// ```
    #[track_caller]
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::from_parts(
            message.into(),
            Trace::capture(Location::caller()),
            Some(Box::new(source)),
        )
    }

    pub(crate) fn from_parts(message: String, trace: Trace, source: Option<BoxedSource>) -> Self {
        Self(Arc::new(FailureData {
            message,
            trace,
            source,
        }))
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// The location at which the failure was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.0.trace.location
    }

    /// The trace recorded for this failure.
    pub fn trace(&self) -> &Trace {
        &self.0.trace
    }

    /// Returns `true` if both values are handles to the same failure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.message)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.0.message)?;
        write!(f, "{}", self.0.trace)?;
        if let Some(source) = &self.0.source {
            write!(f, "\ncaused by: {source}")?;
        }
        Ok(())
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0
            .source
            .as_deref()
            .map(|source| source as &(dyn Error + 'static))
    }
}
