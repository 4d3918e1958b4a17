//! POSIX queries shared by every Unix target.

/// Online processors from `sysconf`, or 1 when the query fails.
pub(super) fn processor_count() -> usize
{
    // SAFETY: sysconf has no preconditions.
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    usize::try_from(online).ok().filter(|&n| n > 0).unwrap_or(1)
}

/// Deliver `SIGTRAP` to the calling thread.
pub(super) fn trap()
{
    // SAFETY: raise has no memory-safety preconditions. Callers only trap
    // with a debugger attached, which intercepts the signal.
    unsafe {
        libc::raise(libc::SIGTRAP);
    }
}

/// No portable tracer query exists on the remaining Unix targets.
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos", target_os = "ios")))]
pub(super) fn is_debugger_present() -> bool
{
    false
}
