//! Logging for the terminal client.
//!
//! Two outputs: warnings and errors go to stderr with colors, everything at
//! the build's level goes to `assist.log`. Stdout stays reserved for the
//! conversation.

use crate::error::AssistAppError;

use common::ErrorLocation;

use std::fs::File;
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

/// Thread-safe initialization guard.
static INIT_LOGGER_ONCE: Once = Once::new();

/// Tracks if logger initialization was already attempted.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

/// Set once the dispatch is installed.
static LOGGER_INSTALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "assist.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";

const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Only these reach the terminal; the rest would interleave with the chat.
const CONSOLE_LEVEL: LevelFilter = LevelFilter::Warn;

/// Initialize the logger with dual output (stderr + file).
///
/// Safe to call more than once: later calls log a warning and return Ok.
/// The log file is opened first, so an unusable directory is always reported.
///
/// # Errors
///
/// Returns [`AssistAppError::Assist`] if the log file cannot be created or the
/// dispatch cannot be installed.
pub fn initialize(log_dir: &Path) -> Result<(), AssistAppError> {
    let log_file = open_log_file(log_dir)?;

    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_file);
        if result.is_ok() {
            LOGGER_INSTALLED.store(true, Ordering::SeqCst);
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{LOG_LEVEL:?}");
        }
    });

    result
}

/// Whether warnings and errors already reach stderr through the logger.
pub fn is_installed() -> bool {
    LOGGER_INSTALLED.load(Ordering::SeqCst)
}

#[track_caller]
fn open_log_file(log_dir: &Path) -> Result<File, AssistAppError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    fern::log_file(&log_file_path).map_err(|e| AssistAppError::Assist {
        message: format!(
            "Failed to create log file {}: {e}",
            log_file_path.display()
        ),
        location: ErrorLocation::from(Location::caller()),
    })
}

#[track_caller]
fn initialize_internal(log_file: File) -> Result<(), AssistAppError> {
    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let base_dispatch = Dispatch::new().level(LOG_LEVEL);

    let console_dispatch = Dispatch::new()
        .level(CONSOLE_LEVEL)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message}",
                date = format_rfc3339(SystemTime::now()),
                level = color_configuration.color(record.level()),
                message = message,
            ))
        })
        .chain(stderr());

    // Plain text, no colors
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
        .chain(log_file);

    base_dispatch
        .chain(console_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| AssistAppError::Assist {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
