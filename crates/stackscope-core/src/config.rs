//! # Configuration
//!
//! Tunables for capture depth and the precise symbolizer.
//!
//! Defaults are usable as-is; [`BacktraceConfig::from_env`] layers environment
//! overrides on top of them:
//!
//! - `STACKSCOPE_MAX_FRAMES`: frames captured by the reporter (1..=128)
//! - `STACKSCOPE_SYMBOLIZER`: path or name of the line-mapping tool
//! - `STACKSCOPE_SYMBOLIZER_TIMEOUT_MS`: how long one tool run may take
//!
//! ```rust,no_run
//! use stackscope_core::{BacktraceConfig, Reporter};
//!
//! let config = BacktraceConfig::from_env()?;
//! let reporter = Reporter::from_config(&config);
//! # Ok::<(), stackscope_core::StackscopeError>(())
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StackscopeError};

/// Hard upper bound on frames captured by the reporter.
///
/// The reporter keeps its frame buffer on the stack, so this is also the size
/// of that buffer.
pub const MAX_BACKTRACE_FRAMES: usize = 128;

/// Default timeout for a single run of the line-mapping tool.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_MAX_FRAMES: &str = "STACKSCOPE_MAX_FRAMES";
pub const ENV_SYMBOLIZER: &str = "STACKSCOPE_SYMBOLIZER";
pub const ENV_SYMBOLIZER_TIMEOUT_MS: &str = "STACKSCOPE_SYMBOLIZER_TIMEOUT_MS";

/// Runtime configuration shared by the reporter and the precise symbolizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceConfig
{
    /// Frames captured per report, clamped to `1..=MAX_BACKTRACE_FRAMES`.
    pub max_frames: usize,
    /// Line-mapping tool override. `None` selects the platform default.
    pub symbolizer_tool: Option<PathBuf>,
    /// Upper bound on one tool run; the child is killed afterwards.
    pub tool_timeout: Duration,
}

impl Default for BacktraceConfig
{
    fn default() -> Self
    {
        Self {
            max_frames: MAX_BACKTRACE_FRAMES,
            symbolizer_tool: None,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl BacktraceConfig
{
    /// Defaults overridden by any `STACKSCOPE_*` variables that are set.
    ///
    /// ## Errors
    ///
    /// Returns [`StackscopeError::InvalidConfig`] if a numeric variable does
    /// not parse or the tool path is empty.
    pub fn from_env() -> Result<Self>
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_FRAMES) {
            let frames = raw
                .trim()
                .parse::<usize>()
                .map_err(|err| StackscopeError::InvalidConfig(format!("{ENV_MAX_FRAMES}={raw}: {err}")))?;
            config = config.with_max_frames(frames);
        }

        if let Some(raw) = lookup(ENV_SYMBOLIZER) {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(StackscopeError::InvalidConfig(format!("{ENV_SYMBOLIZER} is empty")));
            }
            config.symbolizer_tool = Some(PathBuf::from(trimmed));
        }

        if let Some(raw) = lookup(ENV_SYMBOLIZER_TIMEOUT_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|err| StackscopeError::InvalidConfig(format!("{ENV_SYMBOLIZER_TIMEOUT_MS}={raw}: {err}")))?;
            config.tool_timeout = Duration::from_millis(millis);
        }

        tracing::debug!(
            max_frames = config.max_frames,
            tool = ?config.symbolizer_tool,
            timeout_ms = config.tool_timeout.as_millis() as u64,
            "loaded backtrace configuration"
        );
        Ok(config)
    }

    /// Set the capture depth, clamped to `1..=MAX_BACKTRACE_FRAMES`.
    #[must_use]
    pub fn with_max_frames(mut self, frames: usize) -> Self
    {
        self.max_frames = frames.clamp(1, MAX_BACKTRACE_FRAMES);
        self
    }

    #[must_use]
    pub fn with_symbolizer_tool(mut self, tool: impl Into<PathBuf>) -> Self
    {
        self.symbolizer_tool = Some(tool.into());
        self
    }

    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self
    {
        self.tool_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String>
    {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment()
    {
        let config = BacktraceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, BacktraceConfig::default());
        assert_eq!(config.max_frames, MAX_BACKTRACE_FRAMES);
        assert_eq!(config.tool_timeout, DEFAULT_TOOL_TIMEOUT);
    }

    #[test]
    fn test_overrides_are_applied()
    {
        let config = BacktraceConfig::from_lookup(lookup_from(&[
            (ENV_MAX_FRAMES, "32"),
            (ENV_SYMBOLIZER, "/opt/llvm/bin/llvm-addr2line"),
            (ENV_SYMBOLIZER_TIMEOUT_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(config.max_frames, 32);
        assert_eq!(config.symbolizer_tool, Some(PathBuf::from("/opt/llvm/bin/llvm-addr2line")));
        assert_eq!(config.tool_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_max_frames_is_clamped()
    {
        let config = BacktraceConfig::from_lookup(lookup_from(&[(ENV_MAX_FRAMES, "100000")])).unwrap();
        assert_eq!(config.max_frames, MAX_BACKTRACE_FRAMES);

        let config = BacktraceConfig::default().with_max_frames(0);
        assert_eq!(config.max_frames, 1);
    }

    #[test]
    fn test_invalid_values_are_rejected()
    {
        let err = BacktraceConfig::from_lookup(lookup_from(&[(ENV_MAX_FRAMES, "lots")])).unwrap_err();
        assert!(matches!(err, StackscopeError::InvalidConfig(_)));

        let err = BacktraceConfig::from_lookup(lookup_from(&[(ENV_SYMBOLIZER, "  ")])).unwrap_err();
        assert!(err.to_string().contains(ENV_SYMBOLIZER));

        let err = BacktraceConfig::from_lookup(lookup_from(&[(ENV_SYMBOLIZER_TIMEOUT_MS, "-1")])).unwrap_err();
        assert!(matches!(err, StackscopeError::InvalidConfig(_)));
    }
}
