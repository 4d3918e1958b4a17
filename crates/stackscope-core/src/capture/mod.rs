//! # Frame Capture
//!
//! Walks the current call stack into caller-provided storage.
//!
//! The walk is driven by the platform unwinder through
//! [`backtrace::trace_unsynchronized`]: `_Unwind_Backtrace` over `.eh_frame`
//! (or compact unwind on Apple targets) and `RtlVirtualUnwind` on Windows.
//! Each step hands us one frame. We copy its instruction pointer into the
//! output slice and stop at the end of the slice or at the first frame whose
//! instruction pointer is null or inside the never-mapped low page.
//!
//! ## Restricted contexts
//!
//! Nothing here allocates, recurses per frame, or takes a lock of ours, so
//! [`capture`] and [`capture_from`] can run inside a signal handler. The
//! system unwinder consults the loader's module list while walking; on glibc
//! that list is only write-locked during `dlopen`/`dlclose`.
//!
//! ## Where the walk starts
//!
//! The unwinder starts inside itself. Frames are skipped until an anchor is
//! seen:
//!
//! - for [`capture`], the frame of `capture` itself (matched by function start
//!   address), so the first recorded frame is its caller;
//! - for [`capture_from`], the frame whose instruction pointer equals the one
//!   saved in the fault context.
//!
//! If the anchor never shows up (inlining, a signal trampoline the unwinder
//! cannot cross) the walk is repeated without skipping: a longer trace is
//! more useful than none.

mod fault;

pub use fault::FaultContext;

use crate::types::Address;

/// Instruction pointers below this are never mapped code; reaching one means
/// the unwind data is corrupt or the stack has ended.
const MIN_CODE_ADDRESS: usize = 0x1000;

/// Where recording starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Anchor
{
    /// Skip through the frame of the function starting at this address.
    Below(usize),
    /// Start at the frame executing this instruction pointer.
    At(usize),
}

/// Capture the caller's stack, innermost frame first.
///
/// Fills a prefix of `out` and returns its length. `0` means stack capture is
/// not available in this build or environment; treat it as a soft failure.
/// An empty `out` returns `0` without walking.
///
/// Safe to call from a signal handler.
///
/// ```rust
/// use stackscope_core::types::Address;
///
/// let mut frames = [Address::ZERO; 32];
/// let depth = stackscope_core::capture(&mut frames);
/// assert!(depth <= frames.len());
/// ```
#[inline(never)]
pub fn capture(out: &mut [Address]) -> usize
{
    capture_below(capture as usize, out)
}

/// Capture the stack of a faulting thread, starting at the fault site.
///
/// Must be called on the thread that received the signal or exception
/// described by `fault`. When the context carries no instruction pointer the
/// capture starts at the caller instead.
///
/// Safe to call from a signal handler.
#[inline(never)]
pub fn capture_from(fault: &FaultContext<'_>, out: &mut [Address]) -> usize
{
    match fault.instruction_pointer() {
        Some(ip) => walk(out, Anchor::At(ip.as_usize())),
        None => capture_below(capture_from as usize, out),
    }
}

/// Capture up to `max_frames` frames into a new vector.
///
/// Allocates; not for restricted contexts.
#[inline(never)]
pub fn capture_vec(max_frames: usize) -> Vec<Address>
{
    let mut frames = vec![Address::ZERO; max_frames];
    let depth = capture_below(capture_vec as usize, &mut frames);
    frames.truncate(depth);
    frames
}

/// Capture starting at the caller of the function that begins at `function`.
///
/// `function` must be the address of a non-inlined function on the current
/// stack, normally the public entry point that is calling this.
pub(crate) fn capture_below(function: usize, out: &mut [Address]) -> usize
{
    walk(out, Anchor::Below(function))
}

pub(crate) fn walk(out: &mut [Address], anchor: Anchor) -> usize
{
    if out.is_empty() {
        return 0;
    }

    let filled = trace_into(out, Some(anchor));
    if filled > 0 {
        return filled;
    }
    trace_into(out, None)
}

fn trace_into(out: &mut [Address], anchor: Option<Anchor>) -> usize
{
    let mut filled = 0;
    let mut recording = anchor.is_none();

    // SAFETY: the unsynchronized variant only skips the crate-wide lock that
    // serialises Windows dbghelp access. Stack walking itself does not go
    // through dbghelp, and the callback never re-enters the unwinder.
    unsafe {
        backtrace::trace_unsynchronized(|frame| {
            let ip = frame.ip() as usize;
            if ip < MIN_CODE_ADDRESS {
                return false;
            }

            if !recording {
                match anchor {
                    Some(Anchor::Below(function)) => {
                        if frame.symbol_address() as usize == function {
                            recording = true;
                        }
                        return true;
                    }
                    Some(Anchor::At(fault_ip)) => {
                        if ip != fault_ip {
                            return true;
                        }
                        recording = true;
                    }
                    None => {}
                }
            }

            out[filled] = Address::from_usize(ip);
            filled += 1;
            filled < out.len()
        });
    }

    filled
}
