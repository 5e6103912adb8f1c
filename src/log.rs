use std::sync::atomic::{AtomicU8, Ordering};

use clap::ValueEnum;

/// Process-wide verbosity, stored as the discriminant of the installed level.
static VERBOSITY: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Verbosity of CLI narration on stderr.
///
/// Validation findings are values inside results; these levels only gate
/// the operator-facing narration around them. A message is emitted when its
/// level's discriminant does not exceed the installed verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Install this level as the process-wide verbosity.
    pub fn install(self) {
        VERBOSITY.store(self as u8, Ordering::Relaxed);
    }

    /// True when messages at this level should be emitted under the
    /// currently installed verbosity.
    pub fn enabled(self) -> bool {
        self as u8 <= VERBOSITY.load(Ordering::Relaxed)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(format!(
                "Invalid log level '{}': expected error, warn, info, or debug",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if $crate::log::LogLevel::Error.enabled() {
            eprintln!($($arg)*)
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if $crate::log::LogLevel::Warn.enabled() {
            eprintln!($($arg)*)
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::log::LogLevel::Info.enabled() {
            eprintln!($($arg)*)
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::log::LogLevel::Debug.enabled() {
            eprintln!($($arg)*)
        }
    };
}
