//! Debugger detection through `/proc/self/status`.
//!
//! The kernel reports the PID of the process tracing us (debugger, `strace`,
//! `rr`, ...) in the `TracerPid:` line, or `0` when untraced.

use std::fs::File;
use std::io::Read;

const STATUS_PATH: &str = "/proc/self/status";

/// `/proc/self/status` is a few KiB; `TracerPid` sits in the first dozen lines.
const STATUS_BUFFER_LEN: usize = 4096;

pub(super) fn is_debugger_present() -> bool
{
    let Ok(mut file) = File::open(STATUS_PATH) else {
        return false;
    };

    let mut buffer = [0u8; STATUS_BUFFER_LEN];
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(_) => return false,
        }
    }

    parse_tracer_pid(&buffer[..filled]).is_some_and(|pid| pid != 0)
}

/// Extract the `TracerPid` value from the contents of a status file.
pub(super) fn parse_tracer_pid(status: &[u8]) -> Option<u32>
{
    const KEY: &[u8] = b"TracerPid:";

    status.split(|&b| b == b'\n').find_map(|line| {
        let value = line.strip_prefix(KEY)?;
        let value = std::str::from_utf8(value).ok()?;
        value.trim().parse().ok()
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_tracer_pid_untraced()
    {
        let status = b"Name:\tcargo\nState:\tR (running)\nTracerPid:\t0\nUid:\t1000\n";
        assert_eq!(parse_tracer_pid(status), Some(0));
    }

    #[test]
    fn test_parse_tracer_pid_traced()
    {
        let status = b"Name:\ttarget\nPPid:\t41\nTracerPid:\t4242\n";
        assert_eq!(parse_tracer_pid(status), Some(4242));
    }

    #[test]
    fn test_parse_tracer_pid_missing_or_garbled()
    {
        assert_eq!(parse_tracer_pid(b"Name:\tx\nState:\tS\n"), None);
        assert_eq!(parse_tracer_pid(b"TracerPid:\tnope\n"), None);
        assert_eq!(parse_tracer_pid(b""), None);
    }
}
