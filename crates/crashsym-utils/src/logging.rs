//! # Logging Utilities
//!
//! Logging infrastructure for crashsym using `tracing`.
//!
//! Console output goes to stderr so it never mixes with symbolication
//! results printed on stdout. An optional file sink mirrors every event.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crashsym_utils::init_logging;
//!
//! // Keep the guard alive for as long as file output should be flushed
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Symbolication started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=crashsym_core=trace`)
//! - `CRASHSYM_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `CRASHSYM_LOG_FILE`: Optional log file. If it names a directory, a dated
//!   `YYYY-MM-DD-crashsym.log` file is created inside it.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::Utc;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_VAR: &str = "CRASHSYM_LOG_FORMAT";
/// Environment variable naming the optional log file.
pub const LOG_FILE_VAR: &str = "CRASHSYM_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(format!("{s}. Use 'pretty' or 'json'"))),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    /// Default when nothing else is configured
    Info,
    Debug,
    /// Most verbose; includes every lookup miss
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
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(format!(
                "{s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            ))),
        }
    }
}

/// Keeps the background file writer alive.
///
/// Dropping the guard flushes pending file output. Console-only setups hold
/// no writer.
#[must_use = "file output stops being flushed once the guard is dropped"]
#[derive(Debug)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// `RUST_LOG` filters (default `info`), `CRASHSYM_LOG_FORMAT` picks the
/// format, and `CRASHSYM_LOG_FILE` adds a file sink.
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `CRASHSYM_LOG_FORMAT` holds an unknown format
/// - The log file cannot be created
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(LOG_FORMAT_VAR) {
        Ok(raw) => raw.parse()?,
        Err(_) => LogFormat::Pretty,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    install(format, filter)
}

/// Initialize logging with an explicit level, ignoring `RUST_LOG`
///
/// Used when the level comes from a command-line flag. `CRASHSYM_LOG_FILE`
/// is still honored.
///
/// ```rust,no_run
/// use crashsym_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file cannot
/// be created.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    install(format, EnvFilter::new(Level::from(level).to_string()))
}

fn install(format: LogFormat, filter: EnvFilter) -> Result<LoggingGuard, LoggingError>
{
    let (file_layer, file_guard) = match env::var_os(LOG_FILE_VAR) {
        Some(raw) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(&log_file_path(Path::new(&raw)))?);
            (Some(format_layer(format, writer, false)), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(format_layer(format, io::stderr, true))
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

/// One output layer. File layers pass `ansi = false`.
fn format_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);

    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

/// Resolve `CRASHSYM_LOG_FILE`: a directory gets a dated file inside it.
fn log_file_path(raw: &Path) -> PathBuf
{
    if raw.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        raw.join(format!("{today}-crashsym.log"))
    } else {
        raw.to_path_buf()
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, LoggingError>
{
    let Some(file_name) = path.file_name() else {
        return Err(LoggingError::FileError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} does not name a file", path.display()),
        )));
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory)?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("dev").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("PROD").unwrap(), LogFormat::Json);
        assert!(matches!(LogFormat::from_str("invalid"), Err(LoggingError::InvalidFormat(_))));
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(matches!(LogLevel::from_str("invalid"), Err(LoggingError::InvalidLevel(_))));

        let message = LogLevel::from_str("loud").unwrap_err().to_string();
        assert!(message.starts_with("Invalid log level: loud"), "{message}");
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_log_file_path_in_directory_is_dated()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = log_file_path(dir.path());

        assert_eq!(path.parent(), Some(dir.path()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&Utc::now().format("%Y-%m-%d").to_string()));
        assert!(name.ends_with("-crashsym.log"));
    }

    #[test]
    fn test_log_file_path_keeps_explicit_file()
    {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("run.log");
        assert_eq!(log_file_path(&file), file);
    }

    #[test]
    fn test_file_appender_creates_missing_directories()
    {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("run.log");

        file_appender(&file).unwrap();
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_file_appender_rejects_paths_without_a_file_name()
    {
        let err = file_appender(Path::new("/")).unwrap_err();
        assert!(matches!(err, LoggingError::FileError(_)));
    }
}
