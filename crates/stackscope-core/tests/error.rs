//! Tests for error types

use std::error::Error as _;
use std::io;
use std::path::PathBuf;

use stackscope_core::error::{Result, StackscopeError};

#[test]
fn test_error_messages()
{
    let err = StackscopeError::InvalidConfig("STACKSCOPE_MAX_FRAMES=lots".to_string());
    assert_eq!(err.to_string(), "Invalid configuration: STACKSCOPE_MAX_FRAMES=lots");

    let err = StackscopeError::ToolFailed {
        tool: PathBuf::from("addr2line"),
        status: "exit status: 1".to_string(),
    };
    assert_eq!(err.to_string(), "Symbolizer tool `addr2line` failed: exit status: 1");

    let err = StackscopeError::ToolTimedOut {
        tool: PathBuf::from("atos"),
        millis: 250,
    };
    assert_eq!(err.to_string(), "Symbolizer tool `atos` timed out after 250 ms");

    let err = StackscopeError::ImageParse {
        path: PathBuf::from("/usr/lib/libdemo.so"),
        details: "no loadable segments".to_string(),
    };
    assert!(err.to_string().contains("/usr/lib/libdemo.so"));
    assert!(err.to_string().contains("no loadable segments"));
}

#[test]
fn test_tool_unavailable_keeps_spawn_error()
{
    let err = StackscopeError::ToolUnavailable {
        tool: PathBuf::from("/missing/addr2line"),
        source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
    };

    assert!(err.to_string().starts_with("Symbolizer tool `/missing/addr2line` unavailable"));
    let source = err.source().expect("spawn error is the source");
    assert_eq!(source.to_string(), "no such file");
}

#[test]
fn test_io_error_conversion()
{
    fn read_image() -> Result<Vec<u8>>
    {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))?
    }

    let err = read_image().unwrap_err();
    assert!(matches!(err, StackscopeError::Io(_)));
    assert_eq!(err.to_string(), "IO error: denied");
}

#[test]
fn test_result_alias()
{
    fn parse_depth(raw: &str) -> Result<usize>
    {
        raw.parse()
            .map_err(|_| StackscopeError::InvalidConfig(format!("bad depth {raw}")))
    }

    assert_eq!(parse_depth("32").unwrap(), 32);
    assert!(parse_depth("deep").is_err());
}
