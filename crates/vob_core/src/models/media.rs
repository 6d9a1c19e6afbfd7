//! Media-related data structures (base items, overlay clips, trims).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A base video to composite onto.
///
/// The duration is probed once before planning and never mutated afterwards;
/// a failed probe is a terminal error for the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Path to the base video file.
    pub path: PathBuf,
    /// Duration in seconds, from ffprobe.
    pub duration: f64,
}

impl MediaItem {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    /// File stem used in output naming and reports.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// A validated overlay template clip bound to one layer for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayClip {
    /// Path to the template video file.
    pub path: PathBuf,
    /// Duration in seconds. When the probe fails for an otherwise valid
    /// clip, callers substitute the base media duration.
    pub duration: f64,
}

impl OverlayClip {
    pub fn new(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// Optional sub-clip extraction applied to an overlay before placement.
///
/// The clip is reduced to `[start, start + duration)` of its own timeline
/// first; timing offsets then place that window on the base timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipTrim {
    /// Start of the sub-clip within the overlay, in seconds.
    pub start: f64,
    /// Length of the sub-clip, in seconds.
    pub duration: f64,
}

impl ClipTrim {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// A trim is usable only with a non-negative start and positive length.
    pub fn is_valid(&self) -> bool {
        self.start >= 0.0 && self.duration > 0.0
    }
}

/// File stem of a path, lossily converted.
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
