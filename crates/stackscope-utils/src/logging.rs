//! # Logging Utilities
//!
//! Logging bootstrap for stackscope binaries using `tracing`.
//!
//! Output goes to stderr, so a backtrace printed to stdout stays clean.
//! Optionally every event is also written to a daily-rolling file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stackscope_utils::init_logging;
//!
//! // Reads RUST_LOG, STACKSCOPE_LOG_FORMAT and STACKSCOPE_LOG_FILE.
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! Keep the returned [`LoggingGuard`] alive for as long as the program logs:
//! dropping it flushes and stops the file writer.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: filter directives (e.g. `debug`, `stackscope::backtrace=trace`)
//! - `STACKSCOPE_LOG_FORMAT`: `pretty` (default) or `json`
//! - `STACKSCOPE_LOG_FILE`: also log to this file, rolled daily
//!
//! Backtrace lines from `stackscope_core::report::TracingSink` are logged at
//! `TRACE` under the `stackscope::backtrace` target, so they are only visible
//! with a filter such as `RUST_LOG=info,stackscope::backtrace=trace`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const ENV_LOG_FORMAT: &str = "STACKSCOPE_LOG_FORMAT";
/// Environment variable naming an additional log file.
pub const ENV_LOG_FILE: &str = "STACKSCOPE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat
{
    /// Human-readable, with ANSI colours on the console
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the background file writer running.
///
/// Returned by every initializer; holds nothing when no log file is in use.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard
{
    _file_writer: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingGuard
{
    /// Base path of the log file, when file logging is active.
    pub fn log_file(&self) -> Option<&Path>
    {
        self.log_file.as_deref()
    }
}

/// Initialize logging from the environment
///
/// Without `RUST_LOG` the filter defaults to `info`.
///
/// ## Errors
///
/// Returns an error if:
/// - `STACKSCOPE_LOG_FORMAT` is not `pretty` or `json`
/// - `STACKSCOPE_LOG_FILE` names a path without a file name
/// - a global subscriber is already installed
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(ENV_LOG_FORMAT) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    install(filter, format, log_file_from_env())
}

/// Initialize logging with an explicit level and format
///
/// `RUST_LOG` is ignored; `STACKSCOPE_LOG_FILE` is still honoured.
///
/// ```rust,no_run
/// use stackscope_utils::{init_logging_with_level, LogFormat, LogLevel};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed or the log
/// file path is unusable.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    install(EnvFilter::new(Level::from(level).to_string()), format, log_file_from_env())
}

fn log_file_from_env() -> Option<PathBuf>
{
    env::var_os(ENV_LOG_FILE).filter(|value| !value.is_empty()).map(PathBuf::from)
}

fn install(filter: EnvFilter, format: LogFormat, log_file: Option<PathBuf>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers: Vec<BoxedLayer> = vec![console_layer(format)];
    let mut file_writer = None;

    if let Some(path) = &log_file {
        let (layer, guard) = file_layer(path, format)?;
        layers.push(layer);
        file_writer = Some(guard);
    }

    Registry::default()
        .with(layers.with_filter(filter))
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard {
        _file_writer: file_writer,
        log_file,
    })
}

fn console_layer(format: LogFormat) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(true).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

fn file_layer(path: &Path, format: LogFormat) -> Result<(BoxedLayer, WorkerGuard), LoggingError>
{
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::FileError(io::Error::new(io::ErrorKind::InvalidInput, format!("{} has no file name", path.display()))))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&directory)?;

    let appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false);

    let layer = match format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
    };
    Ok((layer, guard))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0} (use 'pretty' or 'json')")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0} (use 'error', 'warn', 'info', 'debug' or 'trace')")]
    InvalidLevel(String),

    /// A global subscriber was already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// The log file or its directory could not be prepared
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
