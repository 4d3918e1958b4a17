//! # stackscope-utils
//!
//! Logging bootstrap shared by stackscope binaries, built on
//! `tracing-subscriber` and `tracing-appender`.

pub mod logging;

pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
