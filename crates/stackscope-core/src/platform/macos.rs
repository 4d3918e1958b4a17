//! # Apple Debugger Detection
//!
//! The kernel sets `P_TRACED` in a process's `p_flag` while a debugger is
//! attached through `ptrace(PT_ATTACHEXC)` (LLDB, Xcode). It is read back with
//! `sysctl(CTL_KERN, KERN_PROC, KERN_PROC_PID, pid)`.
//!
//! See: [Detecting the Debugger (Apple QA1361)](https://developer.apple.com/library/archive/qa/qa1361/_index.html)

use std::ffi::c_void;
use std::{mem, ptr};

/// `P_TRACED` from `<sys/proc.h>`.
const P_TRACED: libc::c_int = 0x0000_0800;

pub(super) fn is_debugger_present() -> bool
{
    // SAFETY: kinfo_proc is plain old data; all-zero is a valid value.
    let mut info: libc::kinfo_proc = unsafe { mem::zeroed() };
    let mut size = mem::size_of::<libc::kinfo_proc>();
    // SAFETY: getpid has no preconditions.
    let pid = unsafe { libc::getpid() };
    let mut mib = [libc::CTL_KERN, libc::KERN_PROC, libc::KERN_PROC_PID, pid];

    // SAFETY: `info` and `size` describe a writable buffer of the right size.
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            ptr::addr_of_mut!(info).cast::<c_void>(),
            &mut size,
            ptr::null_mut(),
            0,
        )
    };

    if rc != 0 || size == 0 {
        return false;
    }

    info.kp_proc.p_flag & P_TRACED != 0
}
