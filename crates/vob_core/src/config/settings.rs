//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::models::RangeMode;
use crate::timing::TimingPolicy;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Encode parameter settings.
    #[serde(default)]
    pub encode: EncodeSettings,

    /// Overlay timing settings.
    #[serde(default)]
    pub timing: TimingSettings,

    /// Batch execution settings.
    #[serde(default)]
    pub batch: BatchSettings,

    /// Process supervision settings.
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathSettings::default(),
            encode: EncodeSettings::default(),
            timing: TimingSettings::default(),
            batch: BatchSettings::default(),
            supervisor: SupervisorSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Path configuration for source material, templates, output, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder holding the base videos to composite onto.
    #[serde(default = "default_material_folder")]
    pub material_folder: String,

    /// Root folder for overlay templates; each layer has a subdirectory.
    #[serde(default = "default_templates_folder")]
    pub templates_folder: String,

    /// Output folder for composited files.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_material_folder() -> String {
    "material_videos".to_string()
}

fn default_templates_folder() -> String {
    "alpha_templates".to_string()
}

fn default_output_folder() -> String {
    "output_processed_videos".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            material_folder: default_material_folder(),
            templates_folder: default_templates_folder(),
            output_folder: default_output_folder(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Encode parameters forwarded to the composition planner.
///
/// Frame rate (24 fps), sample rate (44.1 kHz), and channel layout (stereo)
/// are fixed at the planner level and not configurable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// x264 preset name.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor (lower is higher quality).
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// Audio bitrate in kbps.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u32 {
    23
}

fn default_audio_bitrate() -> u32 {
    192
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            crf: default_crf(),
            audio_bitrate_kbps: default_audio_bitrate(),
        }
    }
}

/// Overlay timing flags and numbers as they arrive from the caller.
///
/// These are raw knobs; [`TimingSettings::to_policy`] resolves them into a
/// single [`TimingPolicy`] once at batch start. Precedence: exact placement
/// beats random placement beats standard (start at zero).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Place overlays at an exact second instead of randomly.
    #[serde(default)]
    pub exact_enabled: bool,

    /// Second at which to place overlays when `exact_enabled` is set.
    #[serde(default = "default_exact_at")]
    pub exact_at: f64,

    /// Place overlays at a random point instead of at zero.
    #[serde(default)]
    pub random_enabled: bool,

    /// Leading window in seconds for random placement.
    #[serde(default = "default_window")]
    pub window: f64,

    /// Use the advanced random controls (range mode) instead of the window.
    #[serde(default)]
    pub advanced_enabled: bool,

    /// How the advanced mode interprets its bounds.
    #[serde(default)]
    pub range_mode: RangeMode,

    /// Range start in seconds for advanced random placement.
    #[serde(default = "default_range_start")]
    pub range_start: f64,

    /// Range end in seconds for advanced random placement.
    #[serde(default = "default_range_end")]
    pub range_end: f64,
}

fn default_exact_at() -> f64 {
    30.0
}

fn default_window() -> f64 {
    40.0
}

fn default_range_start() -> f64 {
    10.0
}

fn default_range_end() -> f64 {
    60.0
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            exact_enabled: false,
            exact_at: default_exact_at(),
            random_enabled: false,
            window: default_window(),
            advanced_enabled: false,
            range_mode: RangeMode::default(),
            range_start: default_range_start(),
            range_end: default_range_end(),
        }
    }
}

impl TimingSettings {
    /// Resolve the raw flags into one timing policy.
    ///
    /// Exact placement wins over everything. Random with the advanced flag
    /// uses the range bounds (or falls back to the window per `range_mode`);
    /// random without it uses the window. Nothing enabled means standard
    /// placement at zero.
    pub fn to_policy(&self) -> TimingPolicy {
        if self.exact_enabled {
            TimingPolicy::Exact(self.exact_at)
        } else if self.random_enabled && self.advanced_enabled {
            match self.range_mode {
                RangeMode::Range => TimingPolicy::RandomRange(self.range_start, self.range_end),
                RangeMode::Window => TimingPolicy::RandomWindow(self.window),
            }
        } else if self.random_enabled {
            TimingPolicy::RandomWindow(self.window)
        } else {
            TimingPolicy::Standard
        }
    }
}

/// Batch execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Maximum number of concurrent encode jobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,

    /// Retry budget handed to each job's supervisor.
    #[serde(default = "default_job_retries")]
    pub job_retries: u32,
}

fn default_max_workers() -> u32 {
    2
}

fn default_job_retries() -> u32 {
    2
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            job_retries: default_job_retries(),
        }
    }
}

/// Process supervision configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// Maximum attempts per command.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Hard timeout per attempt in seconds.
    ///
    /// Batch jobs override this per item with `min(10 x duration, 600)`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of error lines to show in tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
        }
    }
}

impl LoggingSettings {
    /// Build the per-job logger configuration from this section.
    pub fn to_log_config(&self) -> crate::logging::LogConfig {
        crate::logging::LogConfig {
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail as usize,
            ..crate::logging::LogConfig::default()
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Encode,
    Timing,
    Batch,
    Supervisor,
    Logging,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Encode => "encode",
            ConfigSection::Timing => "timing",
            ConfigSection::Batch => "batch",
            ConfigSection::Supervisor => "supervisor",
            ConfigSection::Logging => "logging",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[encode]"));
        assert!(toml.contains("material_folder"));
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.paths.output_folder, settings.paths.output_folder);
        assert_eq!(parsed.encode.crf, settings.encode.crf);
        assert_eq!(parsed.batch.max_workers, settings.batch.max_workers);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[encode]\ncrf = 18";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        // Custom value preserved
        assert_eq!(parsed.encode.crf, 18);
        // Defaults applied for missing
        assert_eq!(parsed.encode.preset, "medium");
        assert_eq!(parsed.timing.window, 40.0);
        assert_eq!(parsed.supervisor.timeout_secs, 300);
    }

    #[test]
    fn policy_precedence_exact_wins() {
        let mut timing = TimingSettings::default();
        timing.exact_enabled = true;
        timing.exact_at = 45.0;
        timing.random_enabled = true;
        timing.advanced_enabled = true;

        assert_eq!(timing.to_policy(), TimingPolicy::Exact(45.0));
    }

    #[test]
    fn policy_precedence_advanced_range() {
        let mut timing = TimingSettings::default();
        timing.random_enabled = true;
        timing.advanced_enabled = true;
        timing.range_start = 5.0;
        timing.range_end = 25.0;

        assert_eq!(timing.to_policy(), TimingPolicy::RandomRange(5.0, 25.0));
    }

    #[test]
    fn policy_precedence_advanced_window_mode() {
        let mut timing = TimingSettings::default();
        timing.random_enabled = true;
        timing.advanced_enabled = true;
        timing.range_mode = RangeMode::Window;
        timing.window = 30.0;

        assert_eq!(timing.to_policy(), TimingPolicy::RandomWindow(30.0));
    }

    #[test]
    fn policy_precedence_basic_random() {
        let mut timing = TimingSettings::default();
        timing.random_enabled = true;

        assert_eq!(timing.to_policy(), TimingPolicy::RandomWindow(40.0));
    }

    #[test]
    fn policy_precedence_standard_fallback() {
        let timing = TimingSettings::default();
        assert_eq!(timing.to_policy(), TimingPolicy::Standard);

        // Advanced alone without the random flag does nothing
        let mut advanced_only = TimingSettings::default();
        advanced_only.advanced_enabled = true;
        assert_eq!(advanced_only.to_policy(), TimingPolicy::Standard);
    }
}
