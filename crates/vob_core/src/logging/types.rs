//! Shared types for the logging layer.

use serde::{Deserialize, Serialize};

/// Severity threshold for log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// How a job log behaves: threshold, compaction, and tail size.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Compact mode drops intermediate progress lines and replays the
    /// tail buffer when an encode fails.
    pub compact: bool,
    /// Progress lines are written only at multiples of this percentage.
    pub progress_step: u32,
    /// Lines retained in the tail buffer.
    pub error_tail: usize,
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: 20,
            error_tail: 20,
            show_timestamps: true,
        }
    }
}

impl LogConfig {
    /// Verbose preset for troubleshooting: everything logged, nothing
    /// compacted, a longer tail.
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
            compact: false,
            progress_step: 10,
            error_tail: 50,
            show_timestamps: true,
        }
    }
}

/// Callback receiving each formatted log line, for mirroring a job log
/// into a frontend.
pub type UiLogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Marker prepended to a log line to signal its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// `$ command`
    Command,
    /// `=== Phase ===`
    Phase,
    /// `[Validation]`
    Validation,
    /// `[SUCCESS]`
    Success,
    /// `[WARNING]`
    Warning,
    /// `[ERROR]`
    Error,
    None,
}

impl MessagePrefix {
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Command => format!("$ {message}"),
            MessagePrefix::Phase => format!("=== {message} ==="),
            MessagePrefix::Validation => format!("[Validation] {message}"),
            MessagePrefix::Success => format!("[SUCCESS] {message}"),
            MessagePrefix::Warning => format!("[WARNING] {message}"),
            MessagePrefix::Error => format!("[ERROR] {message}"),
            MessagePrefix::None => message.to_string(),
        }
    }
}
