//! Traces recorded for failures, and the cleaning applied to them.
//!
//! Every [`Failure`](crate::Failure) and every aggregate
//! [`AssertionError`](crate::AssertionError) carries a [`Trace`]. A trace
//! always contains the source location the value was created at. With the
//! `backtrace` feature enabled it additionally contains the resolved stack
//! frames at that point.
//!
//! Before an aggregate error becomes visible to callers, its trace is passed
//! through a [`TraceCleaner`]. The default cleaner, [`FrameFilter`], removes
//! the frames belonging to softcheck itself so the trace starts at the code
//! that asked for the aggregation.
//!
//! # Environment Variables
//!
//! - `RUST_BACKTRACE=full` - Disables frame filtering
//! - `SOFTCHECK_BACKTRACE` - Comma-separated options:
//!   - `off` - Do not capture stack frames, only locations
//!   - `full` - Disables frame filtering

use alloc::{string::String, vec::Vec};
use core::{fmt, panic::Location};

/// The recorded origin of a failure or aggregate error.
#[derive(Clone, Debug)]
pub struct Trace {
    /// The location the value was created at.
    pub location: &'static Location<'static>,
    /// Resolved stack frames, most recent first. Empty unless frames were
    /// captured.
    pub frames: Vec<TraceFrame>,
    /// Number of frames removed by cleaning.
    pub omitted_frames: usize,
}

/// A single resolved stack frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFrame {
    /// The demangled symbol name.
    pub symbol: String,
    /// The source file, if known.
    pub path: Option<String>,
    /// The crate the source file belongs to, if it could be determined.
    pub crate_name: Option<String>,
    /// The line number in the source file, if known.
    pub lineno: Option<u32>,
}

impl Trace {
    /// Creates a trace holding only a location.
    pub const fn new(location: &'static Location<'static>) -> Self {
        Self {
            location,
            frames: Vec::new(),
            omitted_frames: 0,
        }
    }

    /// Records a trace at `location`, capturing stack frames when the
    /// `backtrace` feature is enabled and capture is not switched off through
    /// `SOFTCHECK_BACKTRACE=off`.
    pub fn capture(location: &'static Location<'static>) -> Self {
        #[cfg(feature = "backtrace")]
        {
            if SoftcheckEnvOptions::get().capture_frames {
                return Self {
                    location,
                    frames: frames::capture(),
                    omitted_frames: 0,
                };
            }
        }

        Self::new(location)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}", self.location)?;
        for frame in &self.frames {
            write!(f, "\n  {frame}")?;
        }
        if self.omitted_frames > 0 {
            write!(
                f,
                "\nnote: {} frame(s) omitted. For a complete trace, set RUST_BACKTRACE=full.",
                self.omitted_frames
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)?;
        if let Some(path) = &self.path {
            write!(f, " - {path}")?;
            if let Some(lineno) = self.lineno {
                write!(f, ":{lineno}")?;
            }
        }
        Ok(())
    }
}

/// Removes internal frames from a [`Trace`].
///
/// Cleaners run on every aggregate error constructed by
/// [`ErrorCollector::reduce_to_single_error`](crate::ErrorCollector::reduce_to_single_error)
/// before it is returned. Install one globally with
/// [`Hooks::trace_cleaner`](crate::hooks::Hooks::trace_cleaner) or per
/// collector with
/// [`ErrorCollector::with_cleaner`](crate::ErrorCollector::with_cleaner).
///
/// Closures taking `&mut Trace` are cleaners:
///
/// ```
/// use softcheck::trace::{Trace, TraceCleaner};
///
/// let keep_three = |trace: &mut Trace| trace.frames.truncate(3);
///
/// let mut trace = Trace::new(std::panic::Location::caller());
/// keep_three.clean(&mut trace);
/// ```
pub trait TraceCleaner: 'static + Send + Sync {
    /// Cleans `trace` in place.
    fn clean(&self, trace: &mut Trace);
}

impl<F> TraceCleaner for F
where
    F: Fn(&mut Trace) + 'static + Send + Sync,
{
    fn clean(&self, trace: &mut Trace) {
        self(trace)
    }
}

/// The default [`TraceCleaner`]: drops frames from given crates at the start
/// and end of a trace and caps its length.
///
/// ```
/// use softcheck::trace::FrameFilter;
///
/// let filter = FrameFilter {
///     // Hide the assertion library's own frames as well
///     skipped_initial_crates: &["softcheck", "my_assertions", "std", "core"],
///     max_frame_count: 10,
///     ..FrameFilter::DEFAULT
/// };
/// ```
#[derive(Copy, Clone, Debug)]
pub struct FrameFilter {
    /// Crates whose frames are hidden when they appear at the start of a
    /// trace.
    pub skipped_initial_crates: &'static [&'static str],
    /// Crates whose frames are hidden when they appear at the end of a trace.
    pub skipped_final_crates: &'static [&'static str],
    /// Maximum number of frames kept.
    pub max_frame_count: usize,
}

impl FrameFilter {
    /// Default filter settings.
    pub const DEFAULT: Self = Self {
        skipped_initial_crates: &["backtrace", "softcheck", "core", "std", "alloc"],
        skipped_final_crates: &["std", "core", "alloc", "test"],
        max_frame_count: 20,
    };

    /// A filter that keeps every frame.
    pub const FULL: Self = Self {
        skipped_initial_crates: &[],
        skipped_final_crates: &[],
        max_frame_count: usize::MAX,
    };

    /// Returns [`FULL`](Self::FULL) if full traces were requested through the
    /// environment, [`DEFAULT`](Self::DEFAULT) otherwise.
    pub fn from_env() -> Self {
        #[cfg(feature = "std")]
        {
            if SoftcheckEnvOptions::get().full_traces {
                return Self::FULL;
            }
        }

        Self::DEFAULT
    }

    fn is_skipped(crates: &[&str], frame: &TraceFrame) -> bool {
        frame
            .crate_name
            .as_deref()
            .is_some_and(|name| crates.iter().any(|skipped| *skipped == name))
    }
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TraceCleaner for FrameFilter {
    fn clean(&self, trace: &mut Trace) {
        let leading = trace
            .frames
            .iter()
            .take_while(|frame| Self::is_skipped(self.skipped_initial_crates, frame))
            .count();
        trace.frames.drain(..leading);
        trace.omitted_frames += leading;

        while let Some(last) = trace.frames.last() {
            let runtime_entry = matches!(
                last.symbol.as_str(),
                "__libc_start_call_main" | "__libc_start_main_impl" | "_start"
            );
            if runtime_entry || Self::is_skipped(self.skipped_final_crates, last) {
                trace.frames.pop();
                trace.omitted_frames += 1;
            } else {
                break;
            }
        }

        if trace.frames.len() > self.max_frame_count {
            trace.omitted_frames += trace.frames.len() - self.max_frame_count;
            trace.frames.truncate(self.max_frame_count);
        }
    }
}

#[cfg(feature = "std")]
#[derive(Debug)]
struct SoftcheckEnvOptions {
    full_traces: bool,
    #[cfg_attr(not(feature = "backtrace"), allow(dead_code))]
    capture_frames: bool,
}

#[cfg(feature = "std")]
impl SoftcheckEnvOptions {
    fn get() -> &'static Self {
        static SOFTCHECK_FLAGS: std::sync::OnceLock<SoftcheckEnvOptions> =
            std::sync::OnceLock::new();

        SOFTCHECK_FLAGS.get_or_init(|| {
            let mut full_traces =
                std::env::var_os("RUST_BACKTRACE").is_some_and(|var| var == "full");
            let mut capture_frames = true;
            if let Some(var) = std::env::var_os("SOFTCHECK_BACKTRACE") {
                for v in var.to_string_lossy().split(',') {
                    if v.eq_ignore_ascii_case("off") {
                        capture_frames = false;
                    } else if v.eq_ignore_ascii_case("full") {
                        full_traces = true;
                    }
                }
            }
            SoftcheckEnvOptions {
                full_traces,
                capture_frames,
            }
        })
    }
}

#[cfg(feature = "backtrace")]
mod frames {
    use alloc::{format, string::String, vec::Vec};
    use std::sync::OnceLock;

    use super::TraceFrame;

    const OWN_SOURCE_PREFIX: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/");

    pub(super) fn capture() -> Vec<TraceFrame> {
        let mut frames = Vec::new();

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                // Frames without a symbol name or file carry no useful information.
                let (Some(sym), Some(filename)) = (symbol.name(), symbol.filename_raw()) else {
                    return;
                };
                let path = filename.to_str_lossy().into_owned();
                frames.push(TraceFrame {
                    symbol: format!("{sym:#}"),
                    crate_name: crate_name(&path),
                    path: Some(path),
                    lineno: symbol.lineno(),
                });
            });

            true
        });

        frames
    }

    fn crate_name(path: &str) -> Option<String> {
        static REGEXES: OnceLock<[regex::Regex; 2]> = OnceLock::new();
        let [std_regex, registry_regex] = REGEXES.get_or_init(|| {
            [
                // - /lib/rustlib/src/rust/library/{std|core|alloc}/src/...
                // - /rustc/{40-char-hash}/library/{std|core|alloc}/src/...
                regex::Regex::new(
                    r"(?:/lib/rustlib/src/rust|^/rustc/[0-9a-f]{40})/library/(std|core|alloc|test)/src/.*$",
                )
                .expect("built-in regex pattern for std library paths should be valid"),
                // - /.cargo/registry/src/{index}-{16-char-hash}/{crate}-{version}/src/...
                regex::Regex::new(
                    r"/\.cargo/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/.*$",
                )
                .expect("built-in regex pattern for cargo registry paths should be valid"),
            ]
        });

        if let Some(captures) = std_regex
            .captures(path)
            .or_else(|| registry_regex.captures(path))
        {
            captures.get(1).map(|name| String::from(name.as_str()))
        } else if path.starts_with(OWN_SOURCE_PREFIX) {
            Some(String::from("softcheck"))
        } else {
            None
        }
    }

}
