//! Supervisor command, configuration, and outcome types.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::models::FailureCategory;

/// Default number of attempts for one supervised command.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default hard timeout when none is derived from media duration.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Per-job timeout is this many seconds per second of base media.
pub const TIMEOUT_SCALE: f64 = 10.0;
/// Upper bound on any derived timeout.
pub const TIMEOUT_CAP: Duration = Duration::from_secs(600);
/// Longest failure message kept from unclassified encoder output.
pub const MAX_FAILURE_MESSAGE_CHARS: usize = 200;

/// Progress sink for one supervised run.
///
/// Arguments: (percent 0-100, status message). Invoked from monitor
/// threads, so the callback must be thread-safe.
pub type ProgressFn = Arc<dyn Fn(u32, &str) + Send + Sync>;

/// One external encode invocation, ready to spawn.
#[derive(Debug, Clone)]
pub struct EncodeCommand {
    /// Program name or path.
    pub program: String,
    /// Arguments, not including the program itself.
    pub args: Vec<String>,
    /// Output file the command writes, when known. Drives the stall
    /// monitor's size sampling and the status diagnostics.
    pub output_path: Option<PathBuf>,
}

impl EncodeCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            output_path: None,
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Bare tool name, for instance discovery and log lines.
    pub fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.clone())
    }

    /// Single-line rendering for logs.
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Retry and timeout bounds for one supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Total attempts (first try included).
    pub max_retries: u32,
    /// Hard wall-clock limit per attempt.
    pub timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SupervisorConfig {
    /// Derive a timeout from the base media duration: ten seconds of
    /// encode budget per media second, capped.
    pub fn for_media_duration(duration_secs: f64) -> Self {
        let derived = Duration::from_secs((duration_secs * TIMEOUT_SCALE) as u64);
        Self {
            timeout: derived.min(TIMEOUT_CAP),
            ..Self::default()
        }
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Final result of a supervised run.
///
/// Cancellation is its own variant so callers can tell "the user stopped
/// this" apart from "this failed".
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success,
    Failed {
        category: FailureCategory,
        message: String,
    },
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

/// Map captured encoder output to a failure category and message.
///
/// Substring inspection only. Unmatched output falls back to the raw text
/// truncated to a bounded length.
pub fn classify_failure(error_output: &str) -> (FailureCategory, String) {
    if error_output.contains("No such file or directory") {
        return (
            FailureCategory::MissingFile,
            "An input file was missing at execution time".to_string(),
        );
    }
    if error_output.contains("Invalid data found") {
        return (
            FailureCategory::CorruptInput,
            "Input data is corrupt or unsupported".to_string(),
        );
    }
    if error_output.contains("Permission denied") {
        return (
            FailureCategory::PermissionDenied,
            "Permission denied while accessing a file".to_string(),
        );
    }
    if error_output.contains("Disk full") || error_output.contains("No space left") {
        return (
            FailureCategory::DiskFull,
            "No space left on the target disk".to_string(),
        );
    }

    let trimmed = error_output.trim();
    let message = if trimmed.is_empty() {
        "Encoder exited with an error".to_string()
    } else {
        trimmed.chars().take(MAX_FAILURE_MESSAGE_CHARS).collect()
    };
    (FailureCategory::Unknown, message)
}
