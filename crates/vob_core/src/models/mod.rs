//! Data models for Video Overlay Batch.
//!
//! This module contains the core data structures shared across the crate:
//! - Enums for layers, supervisor status, and failure categories
//! - Media structures (base items, overlay clips, trims)

mod enums;
mod media;

pub use enums::{FailureCategory, OverlayLayer, RangeMode, SupervisorStatus};
pub use media::{ClipTrim, MediaItem, OverlayClip};
