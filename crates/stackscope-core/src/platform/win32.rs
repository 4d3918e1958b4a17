//! Win32 system queries.

use ::windows::Win32::System::Diagnostics::Debug::{DebugBreak, IsDebuggerPresent};
use ::windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

pub(super) fn processor_count() -> usize
{
    let mut info = SYSTEM_INFO::default();
    // SAFETY: GetSystemInfo fills the provided structure and cannot fail.
    unsafe { GetSystemInfo(&mut info) };
    usize::try_from(info.dwNumberOfProcessors).unwrap_or(1)
}

pub(super) fn is_debugger_present() -> bool
{
    // SAFETY: IsDebuggerPresent only reads the PEB of the calling process.
    unsafe { IsDebuggerPresent() }.as_bool()
}

pub(super) fn trap()
{
    // SAFETY: callers only trap with a debugger attached to handle it.
    unsafe { DebugBreak() };
}
