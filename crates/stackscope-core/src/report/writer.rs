//! Allocation-free output helpers for crash-time rendering.

use std::fmt;
use std::io;

/// Longest rendered line; longer lines are cut at a character boundary.
pub(crate) const LINE_CAPACITY: usize = 512;

/// Fixed-size line assembled on the stack.
pub(crate) struct LineBuffer
{
    bytes: [u8; LINE_CAPACITY],
    len: usize,
}

impl LineBuffer
{
    pub(crate) const fn new() -> Self
    {
        Self {
            bytes: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    pub(crate) fn clear(&mut self)
    {
        self.len = 0;
    }

    pub(crate) fn as_str(&self) -> &str
    {
        // Only whole characters are ever copied in.
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }
}

impl fmt::Write for LineBuffer
{
    fn write_str(&mut self, s: &str) -> fmt::Result
    {
        let room = LINE_CAPACITY - self.len;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.bytes[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Unbuffered writer over a raw file descriptor.
///
/// Every `write` is a single `write(2)` system call, which is
/// async-signal-safe. Use it for [`Reporter::print`](super::Reporter::print)
/// from a signal handler, where `std::io::Stderr` would take its lock.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFdWriter
{
    fd: libc::c_int,
}

#[cfg(unix)]
impl RawFdWriter
{
    /// Wrap `fd`. The descriptor is borrowed and never closed.
    pub const fn new(fd: libc::c_int) -> Self
    {
        Self { fd }
    }

    pub const fn stderr() -> Self
    {
        Self::new(libc::STDERR_FILENO)
    }

    pub const fn stdout() -> Self
    {
        Self::new(libc::STDOUT_FILENO)
    }
}

#[cfg(unix)]
impl io::Write for RawFdWriter
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        loop {
            // SAFETY: `buf` is a valid readable slice for its length.
            let written = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
            if written >= 0 {
                return Ok(written.unsigned_abs());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()>
    {
        Ok(())
    }
}

/// Unbuffered writer over the process's standard error handle.
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFdWriter;

#[cfg(windows)]
impl RawFdWriter
{
    pub const fn stderr() -> Self
    {
        Self
    }
}

#[cfg(windows)]
impl io::Write for RawFdWriter
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        use ::windows::Win32::Storage::FileSystem::WriteFile;
        use ::windows::Win32::System::Console::{GetStdHandle, STD_ERROR_HANDLE};

        // SAFETY: GetStdHandle has no preconditions.
        let handle = unsafe { GetStdHandle(STD_ERROR_HANDLE) }.map_err(io::Error::other)?;
        let mut written = 0u32;
        // SAFETY: `buf` is valid for reads and `written` for the count.
        unsafe { WriteFile(handle, Some(buf), Some(std::ptr::addr_of_mut!(written)), None) }.map_err(io::Error::other)?;
        Ok(written as usize)
    }

    fn flush(&mut self) -> io::Result<()>
    {
        Ok(())
    }
}
