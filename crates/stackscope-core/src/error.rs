//! # Error Types
//!
//! Internal error handling for symbolication and configuration.
//!
//! Public capture and symbolication entry points never return these errors:
//! they are produced by the fallible steps underneath (spawning the line-mapping
//! tool, parsing its output, reading module images) and converted into a
//! "capability absent" `None` at the boundary. Configuration loading is the
//! exception and reports [`StackscopeError::InvalidConfig`] to its caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the non-restricted parts of the crate.
///
/// ## Error Categories
///
/// 1. **Configuration errors**: InvalidConfig
/// 2. **Tool errors**: ToolUnavailable, ToolFailed, ToolTimedOut, MalformedOutput
/// 3. **Image errors**: ImageParse
/// 4. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum StackscopeError
{
    /// A configuration value (usually from the environment) could not be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external line-mapping tool could not be started
    ///
    /// This covers a missing executable as well as a sandbox refusing to
    /// execute it (`EACCES`, `EPERM`).
    #[error("Symbolizer tool `{tool}` unavailable: {source}")]
    ToolUnavailable
    {
        /// Program that was spawned
        tool: PathBuf,
        /// Spawn error reported by the OS
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully
    #[error("Symbolizer tool `{tool}` failed: {status}")]
    ToolFailed
    {
        /// Program that was spawned
        tool: PathBuf,
        /// Exit status description
        status: String,
    },

    /// The tool did not finish within the configured timeout and was killed
    #[error("Symbolizer tool `{tool}` timed out after {millis} ms")]
    ToolTimedOut
    {
        /// Program that was spawned
        tool: PathBuf,
        /// Timeout that elapsed
        millis: u128,
    },

    /// Nothing in the tool output could be matched to a requested address
    #[error("Malformed symbolizer output: {0}")]
    MalformedOutput(String),

    /// A module image on disk could not be parsed
    #[error("Failed to parse module image {path}: {details}")]
    ImageParse
    {
        /// Path of the module image
        path: PathBuf,
        /// Parser error
        details: String,
    },

    /// I/O error while reading a module image or tool output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, StackscopeError>`
///
/// ```rust
/// use stackscope_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, StackscopeError>;
