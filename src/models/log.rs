use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity assigned to a log line by content classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    #[default]
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// Where log text is fetched from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// The daemon's own log file
    #[default]
    Daemon,
    /// Kernel ring buffer filtered by the daemon's tag
    Kernel,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Daemon => "daemon",
            LogSource::Kernel => "kernel",
        }
    }

    pub fn from_preference(value: &str) -> Option<Self> {
        match value {
            "daemon" => Some(LogSource::Daemon),
            "kernel" => Some(LogSource::Kernel),
            _ => None,
        }
    }
}

/// Text shown when there is nothing to display
pub const EMPTY_LOG_TEXT: &str = "No logs available";

/// One classified log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub text: String,
    pub level: LogLevel,
    /// Set only on the placeholder row produced for empty input
    pub placeholder: bool,
}

impl LogRecord {
    pub fn new(text: impl Into<String>, level: LogLevel) -> Self {
        Self {
            text: text.into(),
            level,
            placeholder: false,
        }
    }

    /// Placeholder row for empty log output
    pub fn empty() -> Self {
        Self {
            text: EMPTY_LOG_TEXT.to_string(),
            level: LogLevel::Debug,
            placeholder: true,
        }
    }
}
