//! Optional tracing setup for host processes.
//!
//! The engine only emits `tracing` events; hosts that already install a
//! subscriber can ignore this module. For standalone tools and tests,
//! [`init_logging`] wires an env-filtered stderr layer plus an optional
//! JSON rolling file.

use std::path::Path;

use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log files to retain when file logging is enabled.
const MAX_LOG_FILES: usize = 3;

/// Keeps the non-blocking writers alive; hold it for the process lifetime.
pub struct LogGuard {
    _stderr_guard: tracing_appender::non_blocking::WorkerGuard,
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Errors related to logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to create log file appender: {0}")]
    AppenderCreationFailed(String),

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Initialize tracing with a human-readable stderr layer and, when
/// `log_dir` is given, a daily-rotated JSON file in that directory.
///
/// The level defaults to `info` and follows `RUST_LOG` when set.
pub fn init_logging(log_dir: Option<&Path>) -> Result<LogGuard, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = fmt::layer().with_writer(stderr_writer);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(MAX_LOG_FILES)
                .filename_prefix("refresh-arbiter")
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| LoggingError::AppenderCreationFailed(e.to_string()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LogGuard {
        _stderr_guard: stderr_guard,
        _file_guard: file_guard,
    })
}
