//! Lazily evaluated diagnostic breadcrumbs.
//!
//! A [`Clue`] is a producer of a short piece of text describing what was
//! being checked when a failure happened ("while validating user 42",
//! "element at index 3"). Clues are pushed onto a [`ClueStack`] as evaluation
//! descends into nested checks and popped again on the way out. They are only
//! evaluated when the stack is rendered, so building an expensive message
//! costs nothing unless a failure actually needs it.
//!
//! # Ordering
//!
//! [`ClueStack::clue_context`] reads the stack back innermost first (most
//! recently pushed first), while [`ClueStack::render_clue_context`] produces
//! text outer context first, inner context last:
//!
//! ```
//! use softcheck::clue::ClueStack;
//!
//! let mut clues = ClueStack::new();
//! clues.push_clue(|| "outer");
//! clues.push_clue(|| "inner");
//!
//! assert_eq!(clues.render_clue_context(), "outer\ninner\n");
//! ```

use alloc::{string::String, vec::Vec};
use core::fmt::{self, Write};

use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::error::EmptyClueStackError;

/// A producer of diagnostic text, evaluated on demand.
///
/// Any closure returning a [`Display`](core::fmt::Display) value is a clue:
///
/// ```
/// use softcheck::clue::Clue;
///
/// let user_id = 42;
/// let clue = move || format!("user {user_id}");
/// assert_eq!(clue.render(), "user 42");
/// ```
pub trait Clue: 'static + Send + Sync {
    /// Writes the clue text to `f`.
    fn write_clue(&self, f: &mut dyn Write) -> fmt::Result;

    /// Evaluates the clue into an owned string.
    ///
    /// If [`write_clue`](Clue::write_clue) reports an error, the result is
    /// [`CLUE_RENDER_FAILED`] instead of whatever was written before it.
    fn render(&self) -> String {
        let mut out = String::new();
        render_into(self, &mut out);
        out
    }
}

/// Text written in place of a clue whose [`Clue::write_clue`] failed.
pub const CLUE_RENDER_FAILED: &str = "<clue failed to render>";

fn render_into<C: Clue + ?Sized>(clue: &C, out: &mut String) {
    let start = out.len();
    if clue.write_clue(&mut *out).is_err() {
        out.truncate(start);
        out.push_str(CLUE_RENDER_FAILED);
    }
}

impl<F, D> Clue for F
where
    F: Fn() -> D + 'static + Send + Sync,
    D: fmt::Display,
{
    fn write_clue(&self, f: &mut dyn Write) -> fmt::Result {
        write!(f, "{}", self())
    }
}

/// A shared handle to a pushed clue.
///
/// Handles are returned by [`ClueStack::clue_context`] so that a snapshot of
/// the stack can be rendered after the stack itself is no longer borrowed.
#[derive(Clone)]
pub struct ClueRef(Arc<dyn Clue>);

impl ClueRef {
    /// Wraps a clue in a shared handle.
    pub fn new<C: Clue>(clue: C) -> Self {
        Self(Arc::new(clue).unsize(unsize::Coercion!(to dyn Clue)))
    }

    /// Evaluates the clue.
    pub fn render(&self) -> String {
        self.0.render()
    }
}

impl fmt::Debug for ClueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClueRef").finish_non_exhaustive()
    }
}

/// Renders a snapshot of clues as produced by [`ClueStack::clue_context`].
///
/// The snapshot is innermost first; the output is outer first, one clue per
/// line, with a trailing newline unless there are no clues at all.
pub fn render_clues(innermost_first: &[ClueRef]) -> String {
    let mut out = String::new();
    for clue in innermost_first.iter().rev() {
        render_into(&*clue.0, &mut out);
        out.push('\n');
    }
    out
}

/// An ordered stack of [`Clue`]s.
///
/// The top of the stack is the innermost clue. Internally clues are stored
/// outer first, so pushing and popping are both amortized O(1).
#[derive(Clone, Default)]
pub struct ClueStack {
    outer_first: Vec<ClueRef>,
}

impl ClueStack {
    /// Creates an empty clue stack.
    pub const fn new() -> Self {
        Self {
            outer_first: Vec::new(),
        }
    }

    /// Pushes a clue onto the top of the stack.
    ///
    /// The clue is not evaluated here.
    pub fn push_clue<C: Clue>(&mut self, clue: C) {
        self.push_clue_ref(ClueRef::new(clue));
    }

    /// Pushes an already shared clue onto the top of the stack.
    pub fn push_clue_ref(&mut self, clue: ClueRef) {
        self.outer_first.push(clue);
    }

    /// Removes the topmost clue.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyClueStackError`] if no clue is on the stack.
    pub fn pop_clue(&mut self) -> Result<(), EmptyClueStackError> {
        self.outer_first.pop().map(drop).ok_or(EmptyClueStackError)
    }

    /// Returns a snapshot of the stack, most recently pushed clue first.
    pub fn clue_context(&self) -> Vec<ClueRef> {
        self.outer_first.iter().rev().cloned().collect()
    }

    /// Evaluates every clue and joins them outer first, newline terminated.
    ///
    /// Returns an empty string when the stack is empty.
    pub fn render_clue_context(&self) -> String {
        let mut out = String::new();
        for clue in &self.outer_first {
            render_into(&*clue.0, &mut out);
            out.push('\n');
        }
        out
    }

    /// Number of clues on the stack.
    pub fn depth(&self) -> usize {
        self.outer_first.len()
    }

    /// Returns `true` if no clues are pushed.
    pub fn is_empty(&self) -> bool {
        self.outer_first.is_empty()
    }
}

impl fmt::Debug for ClueStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClueStack")
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    static_assertions::assert_impl_all!(ClueStack: Send, Sync, Clone);
    static_assertions::assert_impl_all!(ClueRef: Send, Sync, Clone);

    #[test]
    fn empty_stack_renders_nothing() {
        let clues = ClueStack::new();
        assert_eq!(clues.render_clue_context(), "");
        assert!(clues.clue_context().is_empty());
    }

    #[test]
    fn render_is_outer_first() {
        let mut clues = ClueStack::new();
        clues.push_clue(|| "A");
        clues.push_clue(|| "B");
        assert_eq!(clues.render_clue_context(), "A\nB\n");

        clues.pop_clue().unwrap();
        assert_eq!(clues.render_clue_context(), "A\n");
    }

    #[test]
    fn clue_context_is_innermost_first() {
        let mut clues = ClueStack::new();
        clues.push_clue(|| "outer");
        clues.push_clue(|| "middle");
        clues.push_clue(|| "inner");

        let rendered: Vec<String> = clues.clue_context().iter().map(ClueRef::render).collect();
        assert_eq!(rendered, ["inner", "middle", "outer"]);
        assert_eq!(render_clues(&clues.clue_context()), clues.render_clue_context());
    }

    #[test]
    fn clues_are_evaluated_lazily() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut clues = ClueStack::new();
        clues.push_clue(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            "expensive"
        });
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        let _ = clues.clue_context();
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        assert_eq!(clues.render_clue_context(), "expensive\n");
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pop_on_empty_stack_fails() {
        let mut clues = ClueStack::new();
        assert_eq!(clues.pop_clue(), Err(EmptyClueStackError));

        clues.push_clue(|| 1);
        assert_eq!(clues.pop_clue(), Ok(()));
        assert_eq!(clues.pop_clue(), Err(EmptyClueStackError));
    }

    struct Broken;

    impl Clue for Broken {
        fn write_clue(&self, f: &mut dyn Write) -> fmt::Result {
            f.write_str("half of a")?;
            Err(fmt::Error)
        }
    }

    #[test]
    fn failing_clue_renders_marker() {
        assert_eq!(Broken.render(), CLUE_RENDER_FAILED);

        let mut clues = ClueStack::new();
        clues.push_clue(|| "outer");
        clues.push_clue(Broken);
        clues.push_clue(|| "inner");

        let expected = format!("outer\n{CLUE_RENDER_FAILED}\ninner\n");
        assert_eq!(clues.render_clue_context(), expected);
        assert_eq!(render_clues(&clues.clue_context()), expected);
    }

    #[test]
    fn closure_clues_capture_state() {
        let id = 7;
        let clue = move || format!("item #{id}");
        assert_eq!(clue.render(), "item #7");
    }
}
