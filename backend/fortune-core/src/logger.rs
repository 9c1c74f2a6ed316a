//! Dual-output logging: colored stderr plus a plain log file.
//!
//! Stderr keeps stdout free for command output.

use crate::error::CoreError;

use common::ErrorLocation;

use std::io::stderr;
use std::panic::Location;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "fortune.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";
const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Initialize logging into `{log_dir}/fortune.log` and stderr.
///
/// Safe to call more than once: later calls log a warning and return `Ok`.
///
/// # Errors
///
/// Returns [`CoreError::Logger`] if the log directory or file cannot be
/// created, or another logger is already installed.
pub fn initialize(log_dir: &Path, level: LevelFilter) -> Result<(), CoreError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir, level);
        if result.is_ok() {
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{level:?}");
        }
    });

    result
}

#[track_caller]
fn initialize_internal(log_dir: &Path, level: LevelFilter) -> Result<(), CoreError> {
    std::fs::create_dir_all(log_dir).map_err(|e| CoreError::Logger {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let base_dispatch = Dispatch::new()
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn);

    let console_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = color_configuration.color(record.level()),
                message = message,
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(stderr());

    let file_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = record.level(),
                message = message,
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0)
            ))
        })
        .chain(
            fern::log_file(&log_file_path).map_err(|e| CoreError::Logger {
                message: format!("Failed to create log file: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?,
        );

    base_dispatch
        .chain(console_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| CoreError::Logger {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
