//! # Crash Reporter
//!
//! Captures the current stack, resolves it with the fast tier and renders
//! one line per frame:
//!
//! ```text
//! #0 0x000055d0c8a4b1f0 demo::crash+0x20
//! #1 0x000055d0c8a4b2a4 demo::main+0x14
//! #2 0x00007f3b1c829d90 ??
//! ```
//!
//! Frames are innermost first. An unresolved frame prints `??`. When capture
//! is unsupported the report is the single line `backtrace unavailable`.
//!
//! ## Restricted contexts
//!
//! [`Reporter::print`] and [`Reporter::log`] keep their frames and the line
//! being rendered on the stack and resolve one frame at a time through
//! [`with_symbol`], so they do not allocate. Pair them with a stream or sink
//! that does not allocate either, e.g. [`RawFdWriter`], and they may run
//! inside a signal handler.
//!
//! [`Reporter::log_detailed`] runs the precise tier and is for ordinary code.

mod sink;
mod writer;

use std::fmt::{self, Write as _};
use std::io;

pub use sink::{LineSink, TracingSink, BACKTRACE_TARGET};
#[cfg(any(unix, windows))]
pub use writer::RawFdWriter;
use writer::LineBuffer;

use crate::capture::{self, FaultContext};
use crate::config::{BacktraceConfig, MAX_BACKTRACE_FRAMES};
use crate::symbols::{symbolize_fast, with_symbol, PreciseSymbolizer};
use crate::types::{Address, SymbolTable};

/// Line written when no frame could be captured.
pub const UNAVAILABLE_LINE: &str = "backtrace unavailable";

/// What a report ended up containing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome
{
    /// `frames` frame lines were produced.
    Rendered
    {
        frames: usize
    },
    /// Stack capture is unsupported; only [`UNAVAILABLE_LINE`] was produced.
    Unsupported,
    /// The stream refused a write; the report is incomplete.
    StreamFailed,
}

impl ReportOutcome
{
    pub fn frames(self) -> usize
    {
        match self {
            ReportOutcome::Rendered { frames } => frames,
            _ => 0,
        }
    }
}

/// Renders backtraces to streams and line sinks.
///
/// ```rust
/// use stackscope_core::report::{ReportOutcome, Reporter};
///
/// let mut out = Vec::new();
/// let outcome = Reporter::new().with_max_frames(16).print(&mut out, None);
/// let text = String::from_utf8(out).unwrap();
/// match outcome {
///     ReportOutcome::Rendered { frames } => assert_eq!(text.lines().count(), frames),
///     ReportOutcome::Unsupported => assert_eq!(text, "backtrace unavailable\n"),
///     ReportOutcome::StreamFailed => unreachable!("Vec<u8> never fails"),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reporter
{
    max_frames: usize,
}

impl Default for Reporter
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Reporter
{
    pub const fn new() -> Self
    {
        Self {
            max_frames: MAX_BACKTRACE_FRAMES,
        }
    }

    pub fn from_config(config: &BacktraceConfig) -> Self
    {
        Self::new().with_max_frames(config.max_frames)
    }

    /// Capture depth, at most [`MAX_BACKTRACE_FRAMES`].
    #[must_use]
    pub fn with_max_frames(mut self, frames: usize) -> Self
    {
        self.max_frames = frames.min(MAX_BACKTRACE_FRAMES);
        self
    }

    pub fn max_frames(&self) -> usize
    {
        self.max_frames
    }

    /// Write a backtrace of the calling thread to `out`.
    ///
    /// With a fault context the report starts with the signal or exception
    /// that was received and the walk starts at the faulting instruction.
    /// Lines end in `\n`; `out` is flushed at the end.
    #[inline(never)]
    pub fn print(&self, out: &mut dyn io::Write, fault: Option<&FaultContext<'_>>) -> ReportOutcome
    {
        let mut frames = [Address::ZERO; MAX_BACKTRACE_FRAMES];
        let frames = &mut frames[..self.max_frames];
        let depth = match fault {
            Some(fault) => capture::capture_from(fault, frames),
            None => capture::capture_below(Self::print as usize, frames),
        };

        let mut failed = false;
        let mut emit = |line: &str| {
            if !failed && (out.write_all(line.as_bytes()).is_err() || out.write_all(b"\n").is_err()) {
                failed = true;
            }
        };

        let mut line = LineBuffer::new();
        if let Some(fault) = fault {
            render_fault_header(fault, &mut line, &mut emit);
        }
        let outcome = render_frames(&frames[..depth], &mut line, &mut emit);

        if out.flush().is_err() {
            failed = true;
        }
        if failed {
            ReportOutcome::StreamFailed
        } else {
            outcome
        }
    }

    /// Send a backtrace of the calling thread to `sink`, one line per frame.
    #[inline(never)]
    pub fn log(&self, sink: &dyn LineSink) -> ReportOutcome
    {
        let mut frames = [Address::ZERO; MAX_BACKTRACE_FRAMES];
        let frames = &mut frames[..self.max_frames];
        let depth = capture::capture_below(Self::log as usize, frames);

        let mut line = LineBuffer::new();
        render_frames(&frames[..depth], &mut line, &mut |text: &str| sink.log_line(text))
    }

    /// Like [`log`](Self::log), with file and line numbers when the precise
    /// tier is available.
    ///
    /// Falls back to the fast tier and then to bare addresses. Allocates and
    /// may spawn a process; never call from a signal handler.
    #[inline(never)]
    pub fn log_detailed(&self, sink: &dyn LineSink) -> ReportOutcome
    {
        let mut frames = vec![Address::ZERO; self.max_frames];
        let depth = capture::capture_below(Self::log_detailed as usize, &mut frames);
        frames.truncate(depth);

        if frames.is_empty() {
            sink.log_line(UNAVAILABLE_LINE);
            return ReportOutcome::Unsupported;
        }

        let table = PreciseSymbolizer::from_env()
            .symbolize(&frames)
            .or_else(|| symbolize_fast(&frames))
            .unwrap_or_else(|| SymbolTable::unresolved(frames.len()));
        tracing::debug!(
            frames = frames.len(),
            resolved = table.resolved_count(),
            "rendering detailed backtrace"
        );

        for (index, (address, entry)) in frames.iter().zip(&table).enumerate() {
            let line = match entry {
                Some(frame) => format!("#{index} {address} {frame}"),
                None => format!("#{index} {address} ??"),
            };
            sink.log_line(&line);
        }
        ReportOutcome::Rendered { frames: frames.len() }
    }
}

/// Render one line per frame, or [`UNAVAILABLE_LINE`] for an empty capture.
pub(crate) fn render_frames(frames: &[Address], line: &mut LineBuffer, emit: &mut dyn FnMut(&str)) -> ReportOutcome
{
    if frames.is_empty() {
        emit(UNAVAILABLE_LINE);
        return ReportOutcome::Unsupported;
    }

    for (index, &address) in frames.iter().enumerate() {
        line.clear();
        let _ = write_frame_line(line, index, address);
        emit(line.as_str());
    }
    ReportOutcome::Rendered { frames: frames.len() }
}

fn write_frame_line(line: &mut LineBuffer, index: usize, address: Address) -> fmt::Result
{
    write!(line, "#{index} {address} ")?;
    with_symbol(address, |symbol| match symbol {
        Some(symbol) => write!(line, "{symbol}"),
        None => line.write_str("??"),
    })
}

#[cfg(unix)]
fn render_fault_header(fault: &FaultContext<'_>, line: &mut LineBuffer, emit: &mut dyn FnMut(&str))
{
    let Some(signo) = fault.signal_number() else {
        return;
    };

    line.clear();
    let _ = write!(line, "Signal received: {signo}, errno: {}", fault.errno().unwrap_or(0));
    emit(line.as_str());

    if let (Some(name), Some(address)) = (fault.signal_name(), fault.fault_address()) {
        line.clear();
        let _ = write!(line, "  {name} @ {address}");
        emit(line.as_str());
    }
}

#[cfg(windows)]
fn render_fault_header(fault: &FaultContext<'_>, line: &mut LineBuffer, emit: &mut dyn FnMut(&str))
{
    let Some(code) = fault.exception_code() else {
        return;
    };

    line.clear();
    let _ = match fault.instruction_pointer() {
        Some(ip) => write!(line, "Exception 0x{code:08x} @ {ip}"),
        None => write!(line, "Exception 0x{code:08x}"),
    };
    emit(line.as_str());

    if let Some(address) = fault.fault_address() {
        line.clear();
        let _ = write!(line, "  access violation @ {address}");
        emit(line.as_str());
    }
}

#[cfg(not(any(unix, windows)))]
fn render_fault_header(_fault: &FaultContext<'_>, _line: &mut LineBuffer, _emit: &mut dyn FnMut(&str)) {}
