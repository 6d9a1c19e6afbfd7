//! Media probing via ffprobe.
//!
//! This module provides:
//! - Duration queries (float seconds)
//! - Container validation (format + duration present)
//! - Pixel format queries and alpha-channel detection

mod ffprobe;
mod types;

pub use ffprobe::{
    has_alpha_channel, is_valid_media, media_duration, pixel_format, validate_media,
    ALPHA_PIXEL_FORMATS,
};
pub use types::{ProbeError, ProbeResult};
