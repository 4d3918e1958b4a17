//! Line-oriented log destinations for backtraces.

use tracing::Level;

/// Target used for backtrace lines logged through `tracing`.
pub const BACKTRACE_TARGET: &str = "stackscope::backtrace";

/// Receives a report one line at a time.
///
/// Lines carry no trailing newline. For [`Reporter::log`](super::Reporter::log)
/// to stay signal safe, the implementation must not allocate or lock.
pub trait LineSink
{
    fn log_line(&self, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(&str),
{
    fn log_line(&self, line: &str)
    {
        self(line);
    }
}

/// Forwards lines to `tracing` under [`BACKTRACE_TARGET`].
///
/// Subscribers allocate and lock, so this sink is for ordinary contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingSink
{
    level: Level,
}

impl Default for TracingSink
{
    fn default() -> Self
    {
        Self { level: Level::TRACE }
    }
}

impl TracingSink
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn with_level(level: Level) -> Self
    {
        Self { level }
    }

    pub fn level(&self) -> Level
    {
        self.level
    }
}

impl LineSink for TracingSink
{
    fn log_line(&self, line: &str)
    {
        if self.level == Level::ERROR {
            tracing::error!(target: "stackscope::backtrace", "{line}");
        } else if self.level == Level::WARN {
            tracing::warn!(target: "stackscope::backtrace", "{line}");
        } else if self.level == Level::INFO {
            tracing::info!(target: "stackscope::backtrace", "{line}");
        } else if self.level == Level::DEBUG {
            tracing::debug!(target: "stackscope::backtrace", "{line}");
        } else {
            tracing::trace!(target: "stackscope::backtrace", "{line}");
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn test_closures_are_sinks()
    {
        let lines = RefCell::new(Vec::new());
        let sink = |line: &str| lines.borrow_mut().push(line.to_string());
        sink.log_line("#0 0x0000000000001000 main");
        assert_eq!(lines.borrow().as_slice(), ["#0 0x0000000000001000 main"]);
    }

    #[test]
    fn test_tracing_sink_defaults_to_trace()
    {
        assert_eq!(TracingSink::new().level(), Level::TRACE);
        assert_eq!(TracingSink::with_level(Level::ERROR).level(), Level::ERROR);

        // No subscriber installed: logging is a no-op and must not panic.
        TracingSink::with_level(Level::WARN).log_line("backtrace unavailable");
    }
}
