//! Request and report types for batch runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{EncodeSettings, Settings};
use crate::logging::LogConfig;
use crate::models::{ClipTrim, OverlayLayer};
use crate::timing::TimingPolicy;

/// What one overlay layer contributes to every job in a batch.
#[derive(Debug, Clone)]
pub struct LayerRequest {
    /// Directory scanned for candidate template clips.
    pub directory: PathBuf,

    /// Substring forcing a specific candidate by file name; random pick
    /// when absent or unmatched.
    pub forced: Option<String>,

    /// Sub-clip trim applied to whichever candidate is chosen.
    pub trim: Option<ClipTrim>,
}

impl LayerRequest {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            forced: None,
            trim: None,
        }
    }

    pub fn with_forced(mut self, pattern: impl Into<String>) -> Self {
        self.forced = Some(pattern.into());
        self
    }

    pub fn with_trim(mut self, trim: ClipTrim) -> Self {
        self.trim = Some(trim);
        self
    }
}

/// Everything a batch run needs, resolved before dispatch.
///
/// The request is immutable once handed to the coordinator; per-run state
/// lives in [`BatchContext`](crate::batch::BatchContext).
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Base media files, one job each.
    pub items: Vec<PathBuf>,

    /// Requested overlay layers keyed by stacking position.
    pub layers: HashMap<OverlayLayer, LayerRequest>,

    /// Timing policy applied to every placement in the batch.
    pub policy: TimingPolicy,

    /// Encode parameters forwarded to the options builder.
    pub encode: EncodeSettings,

    /// Directory receiving the composited files.
    pub output_dir: PathBuf,

    /// Directory receiving one log file per job.
    pub logs_dir: PathBuf,

    /// Configuration for the per-job log files.
    pub log_config: LogConfig,

    /// Upper bound on concurrently running jobs.
    pub max_workers: usize,

    /// Retry budget handed to each job's supervisor.
    pub job_retries: u32,
}

impl BatchRequest {
    /// Build a request from persisted settings plus the per-run inputs.
    pub fn from_settings(
        settings: &Settings,
        items: Vec<PathBuf>,
        layers: HashMap<OverlayLayer, LayerRequest>,
    ) -> Self {
        Self {
            items,
            layers,
            policy: settings.timing.to_policy(),
            encode: settings.encode.clone(),
            output_dir: PathBuf::from(&settings.paths.output_folder),
            logs_dir: PathBuf::from(&settings.paths.logs_folder),
            log_config: settings.logging.to_log_config(),
            max_workers: settings.batch.max_workers.max(1) as usize,
            job_retries: settings.batch.job_retries,
        }
    }
}

/// Outcome of one job, in the order jobs finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    /// Base file name the job worked on.
    pub item: String,

    pub success: bool,

    /// Set when the job was stopped by a batch-level cancel rather than
    /// failing on its own.
    pub cancelled: bool,

    /// Human-readable outcome line.
    pub message: String,

    /// Composited file, present only on success.
    pub output_path: Option<PathBuf>,
}

impl JobReport {
    pub fn success(item: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            item: item.into(),
            success: true,
            cancelled: false,
            message: "Completed".to_string(),
            output_path: Some(output_path.into()),
        }
    }

    pub fn failure(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            success: false,
            cancelled: false,
            message: message.into(),
            output_path: None,
        }
    }

    pub fn cancelled(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            success: false,
            cancelled: true,
            message: "Cancelled".to_string(),
            output_path: None,
        }
    }

    /// One line for the end-of-batch summary.
    pub fn render_line(&self) -> String {
        if self.success {
            let output = self
                .output_path
                .as_deref()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
                .unwrap_or("?");
            format!("\u{2705} {} -> {}", self.item, output)
        } else if self.cancelled {
            format!("\u{23f9} {}: {}", self.item, self.message)
        } else {
            format!("\u{274c} {}: {}", self.item, self.message)
        }
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-job outcomes in completion order.
    pub jobs: Vec<JobReport>,

    /// Local wall-clock timestamps, RFC 3339.
    pub started_at: String,
    pub finished_at: String,

    pub elapsed_secs: f64,

    pub output_dir: PathBuf,

    /// True when the run was stopped early by a cancel request.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.jobs.iter().filter(|j| !j.success && !j.cancelled).count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.cancelled).count()
    }

    /// Multi-line summary shown when the batch ends.
    pub fn render_text(&self) -> String {
        let heading = if self.cancelled { "Batch cancelled" } else { "Batch finished" };
        let mut counts = format!(
            "{}: {} succeeded, {} failed",
            heading,
            self.success_count(),
            self.failure_count()
        );
        let skipped = self.cancelled_count();
        if skipped > 0 {
            counts.push_str(&format!(", {skipped} cancelled"));
        }

        let mut text = format!(
            "{counts}\nElapsed: {}\nOutput directory: {}\n",
            format_elapsed(self.elapsed_secs),
            self.output_dir.display()
        );

        if !self.jobs.is_empty() {
            text.push_str("\nResults:\n");
            for job in &self.jobs {
                text.push_str(&job.render_line());
                text.push('\n');
            }
        }

        text
    }
}

/// Render a duration in seconds as `57s` or `3m 21s`.
pub fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let minutes = total / 60;
    let seconds = total % 60;
    if minutes == 0 {
        format!("{seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}
