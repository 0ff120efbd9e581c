#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Tracing span clues for softcheck.
//!
//! A [`SpanClue`] remembers the tracing span that was active when it was
//! created. When a failure message is built, it renders that span and its
//! parents, so failures show which operation they happened in without any
//! hand-written clue.
//!
//! # How It Works
//!
//! You add [`SoftcheckLayer`] to your tracing subscriber alongside your
//! existing layers. It records span field values so a [`SpanClue`] can render
//! them later.
//!
//! # Quick Start
//!
//! ```
//! use softcheck::{assert_softly, ensure};
//! use softcheck_tracing::{SoftcheckLayer, with_span_clue};
//! use tracing_subscriber::{Registry, layer::SubscriberExt};
//!
//! let subscriber = Registry::default().with(SoftcheckLayer);
//! let _default = tracing::subscriber::set_default(subscriber);
//!
//! #[tracing::instrument(fields(user_id = 42))]
//! fn check_user(age: u32) -> softcheck::Result {
//!     with_span_clue(|| -> softcheck::Result {
//!         ensure!(age >= 18, "expected an adult");
//!         Ok(())
//!     })
//! }
//!
//! let error = assert_softly(|| check_user(12)).unwrap_err();
//! let message = error.to_string();
//! assert!(message.starts_with("check_user{"));
//! assert!(message.contains("user_id=42"));
//! assert!(message.ends_with("}\nexpected an adult"));
//! ```
//!
//! # Environment Variables
//!
//! - `SOFTCHECK_TRACING` - Comma-separated options:
//!   - `leaf` - Only render the innermost span instead of the full scope

use std::{
    fmt::{self, Write},
    sync::OnceLock,
};

use softcheck::{clue::Clue, context};
use tracing::{
    Span,
    field::{Field, Visit},
};
use tracing_subscriber::registry::LookupSpan;

/// Captured field values for a span.
#[derive(Clone)]
struct CapturedFields(String);

/// A tracing layer that records span field values for [`SpanClue`].
///
/// **Required for softcheck-tracing.** Without it, span clues only show the
/// span names.
///
/// # Examples
///
/// ```
/// use softcheck_tracing::SoftcheckLayer;
/// use tracing_subscriber::{Registry, layer::SubscriberExt};
///
/// let subscriber = Registry::default()
///     .with(SoftcheckLayer)
///     .with(tracing_subscriber::fmt::layer());
///
/// tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct SoftcheckLayer;

struct FieldVisitor<'a> {
    output: &'a mut String,
}

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if !self.output.is_empty() {
            self.output.push(' ');
        }
        let _ = write!(self.output, "{}={:?}", field.name(), value);
    }
}

impl<S> tracing_subscriber::Layer<S> for SoftcheckLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut buf = String::new();
        attrs.record(&mut FieldVisitor { output: &mut buf });
        span.extensions_mut().insert(CapturedFields(buf));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<CapturedFields>() {
            Some(fields) => values.record(&mut FieldVisitor {
                output: &mut fields.0,
            }),
            None => {
                let mut buf = String::new();
                values.record(&mut FieldVisitor { output: &mut buf });
                extensions.insert(CapturedFields(buf));
            }
        }
    }
}

#[derive(Debug)]
struct SoftcheckTracingEnvOptions {
    leaf_only: bool,
}

impl SoftcheckTracingEnvOptions {
    fn get() -> &'static Self {
        static SOFTCHECK_TRACING_FLAGS: OnceLock<SoftcheckTracingEnvOptions> = OnceLock::new();

        SOFTCHECK_TRACING_FLAGS.get_or_init(|| {
            let mut leaf_only = false;

            if let Some(var) = std::env::var_os("SOFTCHECK_TRACING") {
                for v in var.to_string_lossy().split(',') {
                    if v.eq_ignore_ascii_case("leaf") {
                        leaf_only = true;
                    }
                }
            }

            SoftcheckTracingEnvOptions { leaf_only }
        })
    }
}

/// A [`Clue`] describing a tracing span and, optionally, its parents.
///
/// The span is captured when the clue is created and rendered only when a
/// failure message needs it. Spans are written root first, separated by
/// `" > "`, each followed by its recorded fields:
///
/// ```text
/// import{file="users.csv"} > check_user{age=12 user_id=42}
/// ```
///
/// A clue created outside of any span renders as an empty line, so
/// [`with_span_clue`] does not push one there.
#[derive(Clone, Debug)]
pub struct SpanClue {
    span: Span,
    /// Whether to render only the captured span rather than its full scope.
    pub leaf_only: bool,
}

impl SpanClue {
    /// Creates a clue for the current span.
    ///
    /// Configuration is controlled by environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SOFTCHECK_TRACING` - Comma-separated options:
    ///   - `leaf` - Only render the innermost span instead of the full scope
    pub fn current() -> Self {
        Self::new(Span::current())
    }

    /// Creates a clue for `span`.
    pub fn new(span: Span) -> Self {
        Self {
            span,
            leaf_only: SoftcheckTracingEnvOptions::get().leaf_only,
        }
    }

    /// The captured span.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

fn write_span_fields<R>(
    f: &mut dyn Write,
    span: &tracing_subscriber::registry::SpanRef<'_, R>,
) -> fmt::Result
where
    R: for<'a> LookupSpan<'a>,
{
    write!(f, "{}", span.name())?;
    let extensions = span.extensions();
    if let Some(fields) = extensions.get::<CapturedFields>()
        && !fields.0.is_empty()
    {
        write!(f, "{{{}}}", fields.0)?;
    }
    Ok(())
}

impl Clue for SpanClue {
    fn write_clue(&self, f: &mut dyn Write) -> fmt::Result {
        let result = self.span.with_subscriber(|(span_id, dispatch)| -> fmt::Result {
            let Some(subscriber) = dispatch.downcast_ref::<tracing_subscriber::Registry>() else {
                // Without a registry only the span's own metadata is known.
                if let Some(metadata) = self.span.metadata() {
                    write!(f, "{}", metadata.name())?;
                }
                return Ok(());
            };

            let Some(span_ref) = subscriber.span(span_id) else {
                return Ok(());
            };

            if self.leaf_only {
                return write_span_fields(f, &span_ref);
            }

            for (index, ancestor) in span_ref.scope().from_root().enumerate() {
                if index > 0 {
                    write!(f, " > ")?;
                }
                write_span_fields(f, &ancestor)?;
            }
            Ok(())
        });

        result.unwrap_or(Ok(()))
    }
}

/// Runs `f` with a [`SpanClue`] for the current span pushed onto the current
/// thread's collector.
///
/// Outside of any enabled span, `f` runs without a clue.
pub fn with_span_clue<R>(f: impl FnOnce() -> R) -> R {
    let span = Span::current();
    if span.is_none() || span.is_disabled() {
        return f();
    }

    let _guard = context::clue_guard(SpanClue::new(span));
    f()
}
