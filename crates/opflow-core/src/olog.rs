//! Leveled stderr logging
//!
//! Thread-safe, allocation-light diagnostics for the runtime crates.
//! Output goes to stderr with a level prefix and the current thread's
//! name, so reactor and pool activity can be told apart:
//!
//! `[INFO ] [opflow-pool-2] accepted connection fd=9`
//!
//! # Environment Variables
//!
//! - `OPFLOW_LOG` - level: off, error, warn, info (default), debug
//! - `OPFLOW_LOG_FLUSH=1` - flush stderr after each line

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::env::env_get_bool;

/// Log levels, most severe first
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN ]",
            LogLevel::Info => "[INFO ]",
            LogLevel::Debug => "[DEBUG]",
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize from environment variables
///
/// Called automatically on first log; explicit calls are idempotent.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    FLUSH_ENABLED.store(env_get_bool("OPFLOW_LOG_FLUSH", false), Ordering::Relaxed);

    if let Ok(val) = std::env::var("OPFLOW_LOG") {
        let level = match val.to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            _ => LogLevel::Info,
        };
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

/// Set log level programmatically
pub fn set_log_level(level: LogLevel) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Check if a log level is enabled
#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    level as u8 <= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Emit one log line; prefer the `oerror!`/`owarn!`/`oinfo!`/`odebug!` macros
pub fn log(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("-").to_string();
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    let _ = writeln!(out, "{} [{}] {}", level.prefix(), name, args);
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = out.flush();
    }
}

#[macro_export]
macro_rules! oerror {
    ($($arg:tt)*) => {
        $crate::olog::log($crate::olog::LogLevel::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! owarn {
    ($($arg:tt)*) => {
        $crate::olog::log($crate::olog::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! oinfo {
    ($($arg:tt)*) => {
        $crate::olog::log($crate::olog::LogLevel::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! odebug {
    ($($arg:tt)*) => {
        $crate::olog::log($crate::olog::LogLevel::Debug, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Debug);
        assert!(LogLevel::Off < LogLevel::Error);
    }

    #[test]
    fn test_set_level() {
        set_log_level(LogLevel::Error);
        assert!(level_enabled(LogLevel::Error));
        assert!(!level_enabled(LogLevel::Debug));
        set_log_level(LogLevel::Info);
    }
}
