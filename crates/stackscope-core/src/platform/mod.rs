//! # Platform Probe
//!
//! Questions about the environment the process runs in:
//!
//! - [`platform_build_os`]: the OS family this binary was compiled for
//! - [`processor_count`]: processors currently online
//! - [`is_debugger_present`]: whether a debugger or tracer is attached right now
//! - [`debug_break`]: trap into the attached debugger, if any
//!
//! Each platform has its own submodule with the native query:
//!
//! - **Linux / Android**: `TracerPid` from `/proc/self/status`
//!   - See: [proc(5) man page](https://man7.org/linux/man-pages/man5/proc.5.html)
//! - **macOS / iOS**: `sysctl(KERN_PROC_PID)` and the `P_TRACED` flag
//! - **Windows**: `IsDebuggerPresent`, `DebugBreak`, `GetSystemInfo`
//!   - See: [Debugging Functions](https://learn.microsoft.com/en-us/windows/win32/debug/debugging-functions)
//!
//! Anything else falls back to "one processor, no debugger, no trap".

#[cfg(unix)]
mod unix;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod macos;

#[cfg(windows)]
mod win32;

#[cfg(any(target_os = "linux", target_os = "android"))]
use self::linux as debugger_imp;
#[cfg(any(target_os = "macos", target_os = "ios"))]
use self::macos as debugger_imp;
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android", target_os = "macos", target_os = "ios"))))]
use self::unix as debugger_imp;
#[cfg(windows)]
use self::win32 as debugger_imp;

#[cfg(unix)]
use self::unix as system_imp;
#[cfg(windows)]
use self::win32 as system_imp;

/// Operating system family the binary was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOs
{
    Windows,
    /// macOS and the other Apple targets.
    Mac,
    /// Every other target, including Linux, the BSDs and Android.
    Unix,
}

impl std::fmt::Display for PlatformOs
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        let label = match self {
            PlatformOs::Windows => "windows",
            PlatformOs::Mac => "mac",
            PlatformOs::Unix => "unix",
        };
        write!(f, "{label}")
    }
}

/// OS family this binary was compiled for.
///
/// Fixed at compile time; it says nothing about the version of the OS the
/// process is actually running on.
pub const fn platform_build_os() -> PlatformOs
{
    if cfg!(windows) {
        PlatformOs::Windows
    } else if cfg!(any(target_os = "macos", target_os = "ios")) {
        PlatformOs::Mac
    } else {
        PlatformOs::Unix
    }
}

/// Number of processors currently online.
///
/// This is a sizing hint: if the OS query fails the answer is `1`, never an
/// error, and never `0`.
pub fn processor_count() -> usize
{
    #[cfg(any(unix, windows))]
    let count = system_imp::processor_count();
    #[cfg(not(any(unix, windows)))]
    let count = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);

    count.max(1)
}

/// Whether a debugger (or `ptrace` tracer) is attached to this process.
///
/// Queried on every call since debuggers attach and detach at will. The
/// query is read-only and cheap enough to call frequently.
pub fn is_debugger_present() -> bool
{
    #[cfg(any(unix, windows))]
    return debugger_imp::is_debugger_present();
    #[cfg(not(any(unix, windows)))]
    return false;
}

/// Stop in the attached debugger.
///
/// Without a debugger this does nothing: a bare `SIGTRAP` would otherwise
/// terminate the process.
pub fn debug_break()
{
    if !is_debugger_present() {
        return;
    }

    #[cfg(any(unix, windows))]
    system_imp::trap();
}

/// Which backtrace capabilities this build provides.
///
/// The precise tier is reported as supported whenever a line-mapping tool can
/// be used on the platform; whether the tool is actually installed is only
/// known once [`crate::symbolize_precise`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities
{
    pub capture: bool,
    pub fast_symbolize: bool,
    pub precise_symbolize: bool,
}

impl Capabilities
{
    pub const fn detect() -> Self
    {
        let native = cfg!(any(unix, windows));
        Self {
            capture: native,
            fast_symbolize: native,
            precise_symbolize: native,
        }
    }
}
