//! Fault context handed to a crash handler by the OS.
//!
//! On Unix this is the `siginfo_t` and `ucontext_t` pair an `SA_SIGINFO`
//! handler receives. On Windows it is the `EXCEPTION_POINTERS` of a vectored
//! or unhandled-exception filter. Reading either is a handful of loads, so
//! every accessor is safe in a signal handler.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;

use crate::types::Address;

#[cfg(windows)]
use ::windows::Win32::System::Diagnostics::Debug::EXCEPTION_POINTERS;

/// `EXCEPTION_ACCESS_VIOLATION`
#[cfg(windows)]
const ACCESS_VIOLATION: u32 = 0xC000_0005;

/// Borrowed view of the machine state at a fault.
#[derive(Clone, Copy)]
pub struct FaultContext<'a>
{
    #[cfg(unix)]
    info: *const libc::siginfo_t,
    #[cfg(windows)]
    pointers: *const EXCEPTION_POINTERS,
    ucontext: *const c_void,
    _borrow: PhantomData<&'a c_void>,
}

impl<'a> FaultContext<'a>
{
    /// Wrap the arguments of an `SA_SIGINFO` signal handler.
    ///
    /// Returns `None` when both pointers are null.
    ///
    /// # Safety
    ///
    /// Each non-null pointer must point at the live structure the kernel
    /// passed to the handler, and stay valid for `'a`.
    #[cfg(unix)]
    pub unsafe fn from_signal(info: *const libc::siginfo_t, ucontext: *const c_void) -> Option<Self>
    {
        if info.is_null() && ucontext.is_null() {
            return None;
        }
        Some(Self {
            info,
            ucontext,
            _borrow: PhantomData,
        })
    }

    /// Wrap the argument of a structured exception filter.
    ///
    /// # Safety
    ///
    /// `pointers` must be null or point at the exception record pair the
    /// system passed to the filter, valid for `'a`.
    #[cfg(windows)]
    pub unsafe fn from_exception(pointers: *const EXCEPTION_POINTERS) -> Option<Self>
    {
        if pointers.is_null() {
            return None;
        }
        // SAFETY: non-null and valid per the caller's contract.
        let ucontext = unsafe { (*pointers).ContextRecord }.cast_const().cast::<c_void>();
        Some(Self {
            pointers,
            ucontext,
            _borrow: PhantomData,
        })
    }

    /// Raw machine context (`ucontext_t *` or `CONTEXT *`), possibly null.
    pub fn raw_context(&self) -> *const c_void
    {
        self.ucontext
    }

    /// Signal number (`si_signo`).
    #[cfg(unix)]
    pub fn signal_number(&self) -> Option<i32>
    {
        // SAFETY: non-null pointers are valid for 'a.
        unsafe { self.info.as_ref() }.map(|info| info.si_signo)
    }

    /// Error number attached to the signal (`si_errno`).
    #[cfg(unix)]
    pub fn errno(&self) -> Option<i32>
    {
        // SAFETY: as above.
        unsafe { self.info.as_ref() }.map(|info| info.si_errno)
    }

    /// Structured exception code, e.g. `0xC0000005`.
    #[cfg(windows)]
    pub fn exception_code(&self) -> Option<u32>
    {
        // SAFETY: `pointers` is non-null and valid for 'a; the record may be null.
        let record = unsafe { (*self.pointers).ExceptionRecord.as_ref() }?;
        Some(record.ExceptionCode.0 as u32)
    }

    /// Memory address whose access caused the fault.
    ///
    /// Only meaningful for `SIGSEGV`/`SIGBUS` and access violations.
    pub fn fault_address(&self) -> Option<Address>
    {
        #[cfg(unix)]
        {
            let signo = self.signal_number()?;
            if signo != libc::SIGSEGV && signo != libc::SIGBUS {
                return None;
            }
            // SAFETY: info is non-null (signal_number succeeded) and valid for 'a.
            let info = unsafe { &*self.info };
            Some(Address::from_ptr(si_addr(info)))
        }

        #[cfg(windows)]
        {
            if self.exception_code()? != ACCESS_VIOLATION {
                return None;
            }
            // SAFETY: exception_code succeeded, so the record is non-null.
            let record = unsafe { &*(*self.pointers).ExceptionRecord };
            if record.NumberParameters < 2 {
                return None;
            }
            Some(Address::from_usize(record.ExceptionInformation[1]))
        }

        #[cfg(not(any(unix, windows)))]
        {
            None
        }
    }

    /// Instruction pointer of the interrupted thread.
    pub fn instruction_pointer(&self) -> Option<Address>
    {
        #[cfg(windows)]
        {
            // SAFETY: `pointers` is non-null and valid for 'a.
            let record = unsafe { (*self.pointers).ExceptionRecord.as_ref() }?;
            return Some(Address::from_ptr(record.ExceptionAddress.cast_const()));
        }

        #[cfg(not(windows))]
        {
            if self.ucontext.is_null() {
                return None;
            }
            // SAFETY: non-null and valid per the constructor's contract.
            let ip = unsafe { context_ip(self.ucontext) }?;
            (ip != 0).then(|| Address::from_usize(ip))
        }
    }

    /// Conventional signal name, e.g. `SIGSEGV`.
    #[cfg(unix)]
    pub fn signal_name(&self) -> Option<&'static str>
    {
        signal_name(self.signal_number()?)
    }
}

impl fmt::Debug for FaultContext<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let mut s = f.debug_struct("FaultContext");
        #[cfg(unix)]
        s.field("signal", &self.signal_number()).field("errno", &self.errno());
        #[cfg(windows)]
        s.field("exception_code", &self.exception_code());
        s.field("fault_address", &self.fault_address())
            .field("instruction_pointer", &self.instruction_pointer())
            .finish()
    }
}

/// Name of the fatal signals a crash handler is usually installed for.
#[cfg(unix)]
pub(crate) fn signal_name(signo: i32) -> Option<&'static str>
{
    let name = match signo {
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGBUS => "SIGBUS",
        libc::SIGILL => "SIGILL",
        libc::SIGFPE => "SIGFPE",
        libc::SIGABRT => "SIGABRT",
        libc::SIGTRAP => "SIGTRAP",
        libc::SIGSYS => "SIGSYS",
        _ => return None,
    };
    Some(name)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn si_addr(info: &libc::siginfo_t) -> *const c_void
{
    // SAFETY: reads the sigfault union member, valid for SIGSEGV/SIGBUS.
    unsafe { info.si_addr() }.cast_const()
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
fn si_addr(info: &libc::siginfo_t) -> *const c_void
{
    info.si_addr.cast_const()
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
unsafe fn context_ip(ucontext: *const c_void) -> Option<usize>
{
    let uc = ucontext.cast::<libc::ucontext_t>();
    // SAFETY: caller guarantees a valid ucontext_t.
    let rip = unsafe { (*uc).uc_mcontext.gregs[libc::REG_RIP as usize] };
    Some(rip as usize)
}

#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
unsafe fn context_ip(ucontext: *const c_void) -> Option<usize>
{
    let uc = ucontext.cast::<libc::ucontext_t>();
    // SAFETY: caller guarantees a valid ucontext_t.
    let pc = unsafe { (*uc).uc_mcontext.pc };
    Some(pc as usize)
}

#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
unsafe fn context_ip(ucontext: *const c_void) -> Option<usize>
{
    let uc = ucontext.cast::<libc::ucontext_t>();
    // SAFETY: caller guarantees a valid ucontext_t; the kernel always fills
    // uc_mcontext for a signal handler.
    let mcontext = unsafe { (*uc).uc_mcontext.as_ref() }?;
    Some(mcontext.__ss.__rip as usize)
}

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
unsafe fn context_ip(ucontext: *const c_void) -> Option<usize>
{
    let uc = ucontext.cast::<libc::ucontext_t>();
    // SAFETY: as above.
    let mcontext = unsafe { (*uc).uc_mcontext.as_ref() }?;
    Some(mcontext.__ss.__pc as usize)
}

#[cfg(not(any(
    windows,
    all(target_os = "linux", any(target_arch = "x86_64", target_arch = "aarch64")),
    all(target_os = "macos", any(target_arch = "x86_64", target_arch = "aarch64")),
)))]
unsafe fn context_ip(_ucontext: *const c_void) -> Option<usize>
{
    None
}

#[cfg(all(test, unix))]
mod tests
{
    use super::*;

    #[test]
    fn test_from_signal_rejects_two_nulls()
    {
        // SAFETY: null pointers are never dereferenced.
        let context = unsafe { FaultContext::from_signal(std::ptr::null(), std::ptr::null()) };
        assert!(context.is_none());
    }

    #[test]
    fn test_siginfo_accessors()
    {
        // SAFETY: siginfo_t is plain old data.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        info.si_signo = libc::SIGABRT;
        info.si_errno = 7;

        // SAFETY: `info` outlives the context.
        let context = unsafe { FaultContext::from_signal(&info, std::ptr::null()) }.unwrap();
        assert_eq!(context.signal_number(), Some(libc::SIGABRT));
        assert_eq!(context.errno(), Some(7));
        assert_eq!(context.signal_name(), Some("SIGABRT"));
        assert_eq!(context.fault_address(), None);
        assert_eq!(context.instruction_pointer(), None);
    }

    #[test]
    fn test_signal_names()
    {
        assert_eq!(signal_name(libc::SIGSEGV), Some("SIGSEGV"));
        assert_eq!(signal_name(libc::SIGBUS), Some("SIGBUS"));
        assert_eq!(signal_name(libc::SIGUSR1), None);
    }
}
