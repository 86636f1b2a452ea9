//! Logging helpers.
//!
//! Conversion code reports progress through the `log_*` helpers below; each
//! emits a `tracing` event carrying a `status` field so the console output
//! keeps the info / success / warning / error distinction.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Status attached to a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// Emit a message at the given status.
pub fn log(level: LogLevel, message: impl AsRef<str>) {
    let message = message.as_ref();
    match level {
        LogLevel::Info | LogLevel::Success => {
            tracing::info!(status = level.as_str(), "{}", message)
        }
        LogLevel::Warning => tracing::warn!(status = level.as_str(), "{}", message),
        LogLevel::Error => tracing::error!(status = level.as_str(), "{}", message),
    }
}

pub fn log_info(msg: impl AsRef<str>) {
    log(LogLevel::Info, msg);
}

pub fn log_success(msg: impl AsRef<str>) {
    log(LogLevel::Success, msg);
}

pub fn log_warning(msg: impl AsRef<str>) {
    log(LogLevel::Warning, msg);
}

pub fn log_error(msg: impl AsRef<str>) {
    log(LogLevel::Error, msg);
}

/// Install the stderr subscriber used by the binary.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second install (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
