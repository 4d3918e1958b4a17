//! External line-mapping tools: running them and reading what they print.
//!
//! ## `addr2line -a -f -C -p`
//!
//! One record per address, on one line:
//!
//! ```text
//! 0x0000000000001139: main at /src/demo.c:3
//! 0x0000000000001150: helper at /src/demo.c:9 (discriminator 2)
//! 0x0000000000009999: ?? ??:0
//! ```
//!
//! ## `atos -o <module> -l <load address>`
//!
//! One line per address. Unresolved addresses are echoed back:
//!
//! ```text
//! main (in demo) (main.c:3)
//! _platform_memmove (in libsystem_platform.dylib) + 96
//! 0x100003f50
//! ```

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use super::demangle::make_tool_symbol_name;
use crate::error::{Result, StackscopeError};
use crate::types::{Address, ResolvedFrame, SourceLocation, SymbolEntry};

/// Run `tool` with `args` and return its standard output.
///
/// The child is killed once `timeout` elapses. Standard error is discarded.
pub(crate) fn run(tool: &Path, args: &[OsString], timeout: Duration) -> Result<String>
{
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| StackscopeError::ToolUnavailable {
            tool: tool.to_path_buf(),
            source,
        })?;

    // Drain stdout concurrently so a chatty tool cannot fill the pipe and stall.
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| StackscopeError::MalformedOutput("tool stdout was not captured".to_string()))?;
    let reader = thread::spawn(move || {
        let mut output = String::new();
        stdout.read_to_string(&mut output).map(|_| output)
    });

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(StackscopeError::ToolTimedOut {
                tool: tool.to_path_buf(),
                millis: timeout.as_millis(),
            });
        }
    };

    if !status.success() {
        return Err(StackscopeError::ToolFailed {
            tool: tool.to_path_buf(),
            status: status.to_string(),
        });
    }

    let output = reader
        .join()
        .map_err(|_| StackscopeError::MalformedOutput("tool output reader panicked".to_string()))??;
    Ok(output)
}

/// Check that `tool` can be started at all, without asking it anything.
///
/// The child is killed straight away; only a failed spawn is an error.
pub(crate) fn ensure_launchable(tool: &Path) -> Result<()>
{
    let mut child = Command::new(tool)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| StackscopeError::ToolUnavailable {
            tool: tool.to_path_buf(),
            source,
        })?;
    let _ = child.kill();
    let _ = child.wait();
    Ok(())
}

/// Match `addr2line` records to the file addresses they were requested for.
///
/// Returns one entry per requested address. A record whose function is `??`
/// or whose line cannot be read leaves its entry unresolved. Fails when no
/// line of the output is a record at all.
#[cfg_attr(target_vendor = "apple", allow(dead_code))]
pub(crate) fn parse_addr2line(output: &str, requested: &[u64]) -> Result<Vec<SymbolEntry>>
{
    let records: Vec<(u64, Option<ParsedRecord<'_>>)> = output
        .lines()
        .filter_map(|line| {
            let (address, rest) = line.trim().split_once(": ")?;
            let address = u64::from_str_radix(address.strip_prefix("0x")?, 16).ok()?;
            Some((address, parse_addr2line_body(rest)))
        })
        .collect();

    if records.is_empty() && !requested.is_empty() {
        return Err(StackscopeError::MalformedOutput(format!(
            "no addr2line records in {} bytes of output",
            output.len()
        )));
    }

    // Records come back in request order. A requested address with no
    // record of its own stays unresolved without consuming later records.
    let mut next = 0;
    let entries = requested
        .iter()
        .map(|&wanted| {
            let found = records[next..].iter().position(|(address, _)| *address == wanted)?;
            let (_, parsed) = &records[next + found];
            next += found + 1;
            parsed.clone().map(ParsedRecord::into_frame)
        })
        .collect();
    Ok(entries)
}

/// Pair `atos` output lines with requested runtime addresses, in order.
#[cfg_attr(not(target_vendor = "apple"), allow(dead_code))]
pub(crate) fn parse_atos(output: &str, requested: &[Address]) -> Result<Vec<SymbolEntry>>
{
    let lines: Vec<&str> = output.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    if lines.len() != requested.len() {
        return Err(StackscopeError::MalformedOutput(format!(
            "atos printed {} lines for {} addresses",
            lines.len(),
            requested.len()
        )));
    }

    let entries = lines
        .into_iter()
        .zip(requested)
        .map(|(line, &address)| {
            let mut frame = parse_atos_line(line)?.into_frame();
            frame.address = address;
            Some(frame)
        })
        .collect();
    Ok(entries)
}

/// One successfully read tool record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedRecord<'a>
{
    function: &'a str,
    location: Option<SourceLocation>,
    offset: Option<u64>,
}

impl ParsedRecord<'_>
{
    fn into_frame(self) -> ResolvedFrame
    {
        let mut frame = ResolvedFrame::new(Address::ZERO, make_tool_symbol_name(self.function));
        frame.location = self.location;
        frame.offset = self.offset;
        frame
    }
}

#[cfg_attr(target_vendor = "apple", allow(dead_code))]
fn parse_addr2line_body(body: &str) -> Option<ParsedRecord<'_>>
{
    let body = strip_discriminator(body.trim());
    let (function, location) = match body.rsplit_once(" at ") {
        Some((function, location)) => (function.trim(), Some(location.trim())),
        None => {
            // `?? ??:0`: neither function nor location.
            let (function, _) = body.split_once(' ').unwrap_or((body, ""));
            (function.trim(), None)
        }
    };

    if function.is_empty() || function == "??" {
        return None;
    }

    Some(ParsedRecord {
        function,
        location: location.and_then(parse_file_line),
        offset: None,
    })
}

#[cfg_attr(target_vendor = "apple", allow(dead_code))]
fn strip_discriminator(body: &str) -> &str
{
    match body.rfind(" (discriminator ") {
        Some(index) if body.ends_with(')') => &body[..index],
        _ => body,
    }
}

/// `file:line`, with `??` for an unknown file and `?` or `0` for an unknown line.
fn parse_file_line(text: &str) -> Option<SourceLocation>
{
    let (file, line) = text.rsplit_once(':')?;
    if file.is_empty() || file == "??" {
        return None;
    }

    let location = SourceLocation::from_file(file);
    match line.parse::<u32>() {
        Ok(0) | Err(_) => Some(location),
        Ok(line) => Some(location.with_line(line)),
    }
}

#[cfg_attr(not(target_vendor = "apple"), allow(dead_code))]
fn parse_atos_line(line: &str) -> Option<ParsedRecord<'_>>
{
    if line.starts_with("0x") {
        return None;
    }

    let (function, rest) = line.split_once(" (in ")?;
    let (_module, tail) = rest.split_once(')')?;
    let tail = tail.trim();

    let (location, offset) = if let Some(inner) = tail.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        (parse_file_line(inner), None)
    } else if let Some(offset) = tail.strip_prefix("+ ") {
        (None, offset.trim().parse::<u64>().ok())
    } else {
        (None, None)
    };

    Some(ParsedRecord {
        function: function.trim(),
        location,
        offset,
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_addr2line_records()
    {
        let output = "0x0000000000001139: main at /src/demo.c:3\n\
                      0x0000000000001150: helper at /src/demo.c:9 (discriminator 2)\n\
                      0x0000000000009999: ?? ??:0\n";
        let entries = parse_addr2line(output, &[0x1139, 0x1150, 0x9999]).unwrap();
        assert_eq!(entries.len(), 3);

        let main = entries[0].as_ref().unwrap();
        assert_eq!(main.name(), "main");
        assert_eq!(main.location.as_ref().unwrap().to_string(), "/src/demo.c:3");

        let helper = entries[1].as_ref().unwrap();
        assert_eq!(helper.location.as_ref().unwrap().line, Some(9));
        assert_eq!(helper.to_string(), "helper at /src/demo.c:9");

        assert!(entries[2].is_none());
    }

    #[test]
    fn test_addr2line_function_without_line_info()
    {
        let output = "0x00000000000011a0: demo::run::h0123456789abcdef at ??:?\n";
        let entries = parse_addr2line(output, &[0x11a0]).unwrap();
        let frame = entries[0].as_ref().unwrap();
        assert_eq!(frame.name(), "demo::run");
        assert!(frame.location.is_none());
    }

    #[test]
    fn test_addr2line_garbled_line_only_affects_its_entry()
    {
        let output = "0x0000000000001000: first at a.c:1\n\
                      this line is not a record\n\
                      0x0000000000002000: second at b.c:2\n";
        let entries = parse_addr2line(output, &[0x1000, 0x1500, 0x2000]).unwrap();
        assert!(entries[0].is_some());
        assert!(entries[1].is_none());
        assert_eq!(entries[2].as_ref().unwrap().name(), "second");
    }

    #[test]
    fn test_addr2line_unparsable_output_fails()
    {
        let err = parse_addr2line("addr2line: 'x': No such file\n", &[0x1000]).unwrap_err();
        assert!(matches!(err, StackscopeError::MalformedOutput(_)));
        assert!(parse_addr2line("", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_atos_lines()
    {
        let output = "main (in demo) (main.c:3)\n\
                      _platform_memmove (in libsystem_platform.dylib) + 96\n\
                      0x100003f50\n";
        let requested = [Address::new(0x1000), Address::new(0x2000), Address::new(0x3000)];
        let entries = parse_atos(output, &requested).unwrap();

        let main = entries[0].as_ref().unwrap();
        assert_eq!(main.address, Address::new(0x1000));
        assert_eq!(main.to_string(), "main at main.c:3");

        let memmove = entries[1].as_ref().unwrap();
        assert_eq!(memmove.offset, Some(96));
        assert_eq!(memmove.to_string(), "_platform_memmove+0x60");

        assert!(entries[2].is_none());
    }

    #[test]
    fn test_atos_line_count_mismatch_fails()
    {
        let err = parse_atos("main (in demo) (main.c:3)\n", &[Address::new(1), Address::new(2)]).unwrap_err();
        assert!(err.to_string().contains("atos printed 1 lines for 2 addresses"));
    }

    #[test]
    fn test_missing_tool_is_unavailable()
    {
        let err = run(Path::new("/nonexistent/stackscope/addr2line"), &[], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, StackscopeError::ToolUnavailable { .. }));
    }

    #[test]
    fn test_launch_check()
    {
        let err = ensure_launchable(Path::new("/nonexistent/stackscope/addr2line")).unwrap_err();
        assert!(matches!(err, StackscopeError::ToolUnavailable { .. }));

        // Exit status does not matter, only that it started.
        assert!(ensure_launchable(Path::new("false")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_exit_status_and_timeout()
    {
        let err = run(Path::new("false"), &[], Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, StackscopeError::ToolFailed { .. }));

        let err = run(Path::new("sleep"), &["5".into()], Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, StackscopeError::ToolTimedOut { millis: 50, .. }));

        let output = run(Path::new("echo"), &["0x1: main at a.c:1".into()], Duration::from_secs(5)).unwrap();
        assert_eq!(output.trim(), "0x1: main at a.c:1");
    }
}
