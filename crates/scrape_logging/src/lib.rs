#![deny(missing_docs)]
//! Shared logging utilities for the scrape dashboard workspace.
//!
//! This crate provides the `scrape_*` logging macros used across the codebase,
//! the logger setup used by the binaries, and a minimal test initializer for
//! the global logger.

use std::fs::File;
use std::path::{Path, PathBuf};

pub use log;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Environment variable holding the log level for the binaries.
pub const LOG_LEVEL_ENV: &str = "SCRAPE_LOG";

/// Log file written when a file destination is selected.
pub const DEFAULT_LOG_FILE: &str = "./scrape.log";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_info {
    ($($arg:tt)*) => {{
        $crate::log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_error {
    ($($arg:tt)*) => {{
        $crate::log::error!($($arg)*);
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to [`DEFAULT_LOG_FILE`].
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initialize the global logger with the specified destination and level.
///
/// Returns `false` when a logger was already installed or no sink could be
/// created; logging then stays as it was.
pub fn initialize(destination: LogDestination, level: LevelFilter) -> bool {
    let config = build_config();
    let log_path = PathBuf::from(DEFAULT_LOG_FILE);

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(destination, LogDestination::Terminal | LogDestination::Both) {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    if matches!(destination, LogDestination::File | LogDestination::Both) {
        if let Some(file_logger) = create_file_logger(&log_path, level, config) {
            loggers.push(file_logger);
        }
    }
    if loggers.is_empty() {
        return false;
    }

    CombinedLogger::init(loggers).is_ok()
}

/// Parses a level name such as `debug` or `WARN`.
pub fn parse_level(raw: &str) -> Option<LevelFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Reads [`LOG_LEVEL_ENV`], falling back to `Info` when unset or unparsable.
pub fn level_from_env() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .as_deref()
        .and_then(parse_level)
        .unwrap_or(LevelFilter::Info)
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    path: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<Box<WriteLogger<File>>> {
    match File::create(path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            None
        }
    }
}
