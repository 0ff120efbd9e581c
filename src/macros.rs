/// Creates a [`Failure`](crate::Failure) from a format string, prefixed with
/// the clue context of the current collector.
///
/// The arguments are interpreted the same way as by [`format!()`]. The
/// failure is located at the macro invocation.
///
/// [`format!()`]: std::format
///
/// # Examples
///
/// ```
/// use softcheck::{failure, with_clue};
///
/// let id = 42;
/// let failure = with_clue(move || format!("user {id}"), || failure!("expected {} roles", 2));
/// assert_eq!(failure.message(), "user 42\nexpected 2 roles");
/// ```
#[macro_export]
macro_rules! failure {
    ($($args:tt)+) => {
        $crate::__private::format_failure($crate::__private::format_args!($($args)+))
    };
}

/// Reports a failure through the current collector if a condition is false.
///
/// Expands to a [`context::collect_or_throw`](crate::context::collect_or_throw)
/// call followed by `?`, so the enclosing function must return a `Result`
/// whose error type can be created from an
/// [`AssertionError`](crate::AssertionError). In deferred mode the failure is
/// collected and execution continues.
///
/// Without a message, the failure names the condition.
///
/// # Examples
///
/// ```
/// use softcheck::{AssertionError, ensure};
///
/// fn check_port(port: u16) -> Result<(), AssertionError> {
///     ensure!(port != 0);
///     ensure!(port >= 1024, "port {port} is privileged");
///     Ok(())
/// }
///
/// assert!(check_port(8080).is_ok());
/// assert_eq!(check_port(80).unwrap_err().to_string(), "port 80 is privileged");
/// assert_eq!(
///     check_port(0).unwrap_err().to_string(),
///     "condition failed: `port != 0`"
/// );
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr $(,)?) => {
        $crate::ensure!($cond, "condition failed: `{}`", $crate::__private::stringify!($cond))
    };
    ($cond:expr, $($args:tt)+) => {
        if !$cond {
            $crate::context::collect_or_throw($crate::failure!($($args)+))?;
        }
    };
}
