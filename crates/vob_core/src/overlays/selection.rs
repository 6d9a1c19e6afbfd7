//! Clip selection from a candidate set.

use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;
use rand::Rng;

/// Pick one clip from a layer's candidate set.
///
/// When `forced` is given, the first candidate whose file name contains the
/// substring wins; if nothing matches, the pick falls back to a uniform
/// random choice rather than failing. Returns `None` only for an empty set.
pub fn select_clip<'a>(
    candidates: &'a [PathBuf],
    forced: Option<&str>,
    rng: &mut impl Rng,
) -> Option<&'a PathBuf> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(pattern) = forced {
        if let Some(hit) = candidates.iter().find(|p| name_contains(p, pattern)) {
            return Some(hit);
        }
        tracing::debug!("Forced pattern '{}' matched nothing, picking randomly", pattern);
    }

    candidates.choose(rng)
}

fn name_contains(path: &Path, pattern: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains(pattern))
        .unwrap_or(false)
}
