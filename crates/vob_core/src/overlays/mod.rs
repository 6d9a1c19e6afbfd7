//! Overlay template discovery and selection.
//!
//! Each layer draws its clip from a directory of candidate templates.
//! Discovery filters by extension and ffprobe validation; selection is
//! forced-substring or uniform random, decided per job.

mod library;
mod selection;

pub use library::{collect_candidates, scan_layer_dir, validated_candidates, OVERLAY_EXTENSIONS};
pub use selection::select_clip;
