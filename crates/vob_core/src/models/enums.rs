//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Stacking position of an overlay layer.
///
/// Composition stacks layers bottom, then middle, then top, each overlay
/// consuming the previous stage's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayLayer {
    Bottom,
    Middle,
    Top,
}

impl OverlayLayer {
    /// All layers in stacking order (bottom first).
    pub const STACKING_ORDER: [OverlayLayer; 3] =
        [OverlayLayer::Bottom, OverlayLayer::Middle, OverlayLayer::Top];

    /// Subdirectory name for this layer under the templates root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            OverlayLayer::Bottom => "bottom_layer",
            OverlayLayer::Middle => "middle_layer",
            OverlayLayer::Top => "top_layer",
        }
    }
}

impl std::fmt::Display for OverlayLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayLayer::Bottom => write!(f, "bottom"),
            OverlayLayer::Middle => write!(f, "middle"),
            OverlayLayer::Top => write!(f, "top"),
        }
    }
}

/// How the advanced random timing mode interprets its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    /// Uniform pick between an explicit start and end second.
    #[default]
    Range,
    /// Uniform pick within the leading window, same as basic random.
    Window,
}

/// Observable state of a process supervisor.
///
/// `Stalled` is a diagnostic classification only: the process is alive but
/// has run for a long time with almost no output written. The stall monitor
/// acts on its own thresholds independently of this status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorStatus {
    #[default]
    Idle,
    Running,
    Stalled,
    Completed,
}

impl std::fmt::Display for SupervisorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorStatus::Idle => write!(f, "idle"),
            SupervisorStatus::Running => write!(f, "running"),
            SupervisorStatus::Stalled => write!(f, "stalled"),
            SupervisorStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Category of an encode failure, derived from the tool's error output.
///
/// Classification is by substring inspection and exists to give the user a
/// readable message; every category consumes retry attempts the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// An input path did not exist at execution time.
    MissingFile,
    /// The tool reported corrupt or unsupported input data.
    CorruptInput,
    /// Filesystem permission error.
    PermissionDenied,
    /// The target filesystem ran out of space.
    DiskFull,
    /// Non-zero exit that matched no known pattern.
    Unknown,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::MissingFile => write!(f, "missing file"),
            FailureCategory::CorruptInput => write!(f, "corrupt input"),
            FailureCategory::PermissionDenied => write!(f, "permission denied"),
            FailureCategory::DiskFull => write!(f, "disk full"),
            FailureCategory::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacking_order_is_bottom_first() {
        assert_eq!(
            OverlayLayer::STACKING_ORDER,
            [OverlayLayer::Bottom, OverlayLayer::Middle, OverlayLayer::Top]
        );
        assert!(OverlayLayer::Bottom < OverlayLayer::Top);
    }

    #[test]
    fn display_forms() {
        assert_eq!(OverlayLayer::Middle.to_string(), "middle");
        assert_eq!(SupervisorStatus::Stalled.to_string(), "stalled");
        assert_eq!(FailureCategory::DiskFull.to_string(), "disk full");
    }

    #[test]
    fn layer_dir_names() {
        assert_eq!(OverlayLayer::Bottom.dir_name(), "bottom_layer");
        assert_eq!(OverlayLayer::Top.dir_name(), "top_layer");
    }
}
