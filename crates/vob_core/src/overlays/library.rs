//! Overlay template discovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::OverlayLayer;
use crate::probe;

/// File extensions accepted as overlay templates (compared lowercase).
pub const OVERLAY_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// List template files in a layer directory.
///
/// Non-directories yield an empty list. Results are sorted by file name so
/// forced-match resolution is stable across runs.
pub fn scan_layer_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_overlay_extension(p))
        .collect();

    files.sort();
    files
}

/// List template files in a layer directory that pass media validation.
pub fn validated_candidates(dir: &Path) -> Vec<PathBuf> {
    scan_layer_dir(dir)
        .into_iter()
        .filter(|p| {
            let ok = probe::is_valid_media(p);
            if !ok {
                tracing::warn!("Skipping invalid template: {}", p.display());
            }
            ok
        })
        .collect()
}

/// Build the validated candidate set for each requested layer.
///
/// Layers whose directory is missing or yields no valid candidates are
/// dropped from the map.
pub fn collect_candidates(
    layer_dirs: &HashMap<OverlayLayer, PathBuf>,
) -> HashMap<OverlayLayer, Vec<PathBuf>> {
    let mut candidates = HashMap::new();

    for (layer, dir) in layer_dirs {
        let found = validated_candidates(dir);
        if found.is_empty() {
            tracing::warn!("No valid templates for {} layer in {}", layer, dir.display());
            continue;
        }
        tracing::debug!("{} layer: {} candidate template(s)", layer, found.len());
        candidates.insert(*layer, found);
    }

    candidates
}

fn has_overlay_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            OVERLAY_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}
