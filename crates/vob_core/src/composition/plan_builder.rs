//! Composition plan builder.
//!
//! Assembles one encode-job description from the base media, the chosen
//! overlay clip per layer, the timing policy, and per-layer trims. The plan
//! is built fresh per job and not mutated afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::models::{ClipTrim, MediaItem, OverlayClip, OverlayLayer};
use crate::timing::{plan_layer, TimingPolicy, TimingResult};

/// Error types for composition planning.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    /// Trim with a non-positive duration or negative start.
    #[error("Invalid trim for {layer} layer: start {start}, duration {duration}")]
    InvalidTrim {
        layer: OverlayLayer,
        start: f64,
        duration: f64,
    },
}

/// One chosen overlay clip bound to its layer.
#[derive(Debug, Clone)]
pub struct LayerSelection {
    pub layer: OverlayLayer,
    pub clip: OverlayClip,
}

/// How a placement's video stage is expressed in the filter graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageKind {
    /// Trim then shift timestamps to the start offset; the clip can appear
    /// anywhere in the timeline and plays its full window.
    Shift,
    /// Overlay at zero with the trim capped to the base duration (overlay
    /// at least as long as the base).
    CapToBase { duration: f64 },
    /// Overlay at zero with an explicit trim, visibility gated to the
    /// leading window.
    GateWithTrim,
    /// Overlay at zero untouched, visibility gated to the leading window.
    Gate,
}

/// One overlay layer's slot in the plan.
#[derive(Debug, Clone)]
pub struct Placement {
    pub layer: OverlayLayer,
    pub clip: OverlayClip,
    pub timing: TimingResult,
    /// ffmpeg input index (base is 0; overlays count up from 1).
    pub input_index: usize,
    pub stage: StageKind,
}

/// The full description of one encode job.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    pub base_path: PathBuf,
    pub base_duration: f64,
    /// Placements in stacking order (bottom first).
    pub placements: Vec<Placement>,
    pub output_path: PathBuf,
}

impl CompositionPlan {
    /// True when no overlays are placed and the plan passes the base through.
    pub fn is_identity(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Input data for building a composition plan.
pub struct CompositionInput<'a> {
    /// Base media with its probed duration.
    pub base: &'a MediaItem,
    /// Chosen clip per layer; order does not matter, the builder stacks.
    pub selections: Vec<LayerSelection>,
    /// Placement policy applied to every layer.
    pub policy: TimingPolicy,
    /// Optional sub-clip trim per layer.
    pub trims: &'a HashMap<OverlayLayer, ClipTrim>,
    /// Directory the output file lands in.
    pub output_dir: &'a Path,
}

/// Build a composition plan.
///
/// Layers stack bottom, middle, top regardless of selection order; each
/// gets the next ffmpeg input index. Randomized policies draw offsets from
/// the caller's generator.
pub fn build_composition_plan(
    input: CompositionInput,
    rng: &mut impl Rng,
) -> Result<CompositionPlan, CompositionError> {
    let mut selections = input.selections;
    selections.sort_by_key(|s| s.layer);

    let base_duration = input.base.duration;
    let mut placements = Vec::with_capacity(selections.len());

    for (slot, selection) in selections.into_iter().enumerate() {
        let trim = input.trims.get(&selection.layer).copied();

        if let Some(t) = trim {
            if !t.is_valid() {
                return Err(CompositionError::InvalidTrim {
                    layer: selection.layer,
                    start: t.start,
                    duration: t.duration,
                });
            }
        }

        let timing = plan_layer(
            input.policy,
            base_duration,
            selection.clip.duration,
            trim,
            rng,
        );

        let stage = stage_kind(input.policy, &timing, trim.is_some(), base_duration);

        tracing::debug!(
            "{} layer: {} at {:.2}s for {:.2}s ({:?})",
            selection.layer,
            selection.clip.stem(),
            timing.start_offset,
            timing.trim_duration,
            stage
        );

        placements.push(Placement {
            layer: selection.layer,
            clip: selection.clip,
            timing,
            input_index: slot + 1,
            stage,
        });
    }

    let output_path = input
        .output_dir
        .join(output_file_name(input.base, &placements));

    Ok(CompositionPlan {
        base_path: input.base.path.clone(),
        base_duration,
        placements,
        output_path,
    })
}

/// Decide how one placement's video stage is expressed.
///
/// Shifted policies always trim and move timestamps. Standard placement
/// splits three ways on the overlay's effective length: at least as long as
/// the base trims down to the base; shorter with an explicit trim keeps the
/// trim and gates visibility; shorter without one only gates.
fn stage_kind(
    policy: TimingPolicy,
    timing: &TimingResult,
    trimmed: bool,
    base_duration: f64,
) -> StageKind {
    match policy {
        TimingPolicy::Standard => {
            if timing.trim_duration >= base_duration {
                StageKind::CapToBase {
                    duration: timing.trim_duration.min(base_duration),
                }
            } else if trimmed {
                StageKind::GateWithTrim
            } else {
                StageKind::Gate
            }
        }
        _ => StageKind::Shift,
    }
}

/// Deterministic output name: base stem plus each overlay stem in stacking
/// order. Collisions overwrite (the encode runs with `-y`).
fn output_file_name(base: &MediaItem, placements: &[Placement]) -> String {
    if placements.is_empty() {
        return format!("layered_{}.mp4", base.stem());
    }

    let overlay_stems: Vec<String> = placements.iter().map(|p| p.clip.stem()).collect();
    format!("layered_{}_{}.mp4", base.stem(), overlay_stems.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn base() -> MediaItem {
        MediaItem::new("/material/beach.mp4", 60.0)
    }

    fn clip(path: &str, duration: f64) -> OverlayClip {
        OverlayClip::new(path, duration)
    }

    fn build(input: CompositionInput) -> CompositionPlan {
        let mut rng = StdRng::seed_from_u64(1);
        build_composition_plan(input, &mut rng).unwrap()
    }

    #[test]
    fn layers_stack_bottom_first_with_input_indices() {
        let base = base();
        let trims = HashMap::new();
        let plan = build(CompositionInput {
            base: &base,
            selections: vec![
                LayerSelection {
                    layer: OverlayLayer::Top,
                    clip: clip("/tpl/top.mp4", 10.0),
                },
                LayerSelection {
                    layer: OverlayLayer::Bottom,
                    clip: clip("/tpl/bottom.mp4", 12.0),
                },
            ],
            policy: TimingPolicy::Standard,
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        assert_eq!(plan.placements[0].layer, OverlayLayer::Bottom);
        assert_eq!(plan.placements[0].input_index, 1);
        assert_eq!(plan.placements[1].layer, OverlayLayer::Top);
        assert_eq!(plan.placements[1].input_index, 2);
    }

    #[test]
    fn output_name_joins_stems_in_stacking_order() {
        let base = base();
        let trims = HashMap::new();
        let plan = build(CompositionInput {
            base: &base,
            selections: vec![
                LayerSelection {
                    layer: OverlayLayer::Top,
                    clip: clip("/tpl/sparkle.mp4", 10.0),
                },
                LayerSelection {
                    layer: OverlayLayer::Bottom,
                    clip: clip("/tpl/fire_loop.mov", 12.0),
                },
            ],
            policy: TimingPolicy::Standard,
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        assert_eq!(
            plan.output_path,
            PathBuf::from("/out/layered_beach_fire_loop_sparkle.mp4")
        );
    }

    #[test]
    fn no_selections_yield_identity_plan() {
        let base = base();
        let trims = HashMap::new();
        let plan = build(CompositionInput {
            base: &base,
            selections: vec![],
            policy: TimingPolicy::Standard,
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        assert!(plan.is_identity());
        assert_eq!(plan.output_path, PathBuf::from("/out/layered_beach.mp4"));
    }

    #[test]
    fn exact_policy_produces_shift_stage_with_clamp() {
        let base = base();
        let trims = HashMap::new();
        let plan = build(CompositionInput {
            base: &base,
            selections: vec![LayerSelection {
                layer: OverlayLayer::Top,
                clip: clip("/tpl/top.mp4", 18.0),
            }],
            policy: TimingPolicy::Exact(45.0),
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        let p = &plan.placements[0];
        assert_eq!(p.stage, StageKind::Shift);
        assert_eq!(p.timing.start_offset, 42.0);
    }

    #[test]
    fn standard_long_overlay_caps_to_base() {
        let base = base();
        let trims = HashMap::new();
        let plan = build(CompositionInput {
            base: &base,
            selections: vec![LayerSelection {
                layer: OverlayLayer::Bottom,
                clip: clip("/tpl/long.mp4", 90.0),
            }],
            policy: TimingPolicy::Standard,
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        assert_eq!(
            plan.placements[0].stage,
            StageKind::CapToBase { duration: 60.0 }
        );
    }

    #[test]
    fn standard_short_overlay_gates() {
        let base = base();
        let trims = HashMap::new();
        let plan = build(CompositionInput {
            base: &base,
            selections: vec![LayerSelection {
                layer: OverlayLayer::Bottom,
                clip: clip("/tpl/short.mp4", 18.0),
            }],
            policy: TimingPolicy::Standard,
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        let p = &plan.placements[0];
        assert_eq!(p.stage, StageKind::Gate);
        assert_eq!(p.timing.start_offset, 0.0);
        assert_eq!(p.timing.trim_duration, 18.0);
    }

    #[test]
    fn standard_short_with_trim_keeps_trim_stage() {
        let base = base();
        let mut trims = HashMap::new();
        trims.insert(OverlayLayer::Top, ClipTrim::new(2.0, 5.0));

        let plan = build(CompositionInput {
            base: &base,
            selections: vec![LayerSelection {
                layer: OverlayLayer::Top,
                clip: clip("/tpl/top.mp4", 18.0),
            }],
            policy: TimingPolicy::Standard,
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        let p = &plan.placements[0];
        assert_eq!(p.stage, StageKind::GateWithTrim);
        assert_eq!(p.timing.trim_start, 2.0);
        assert_eq!(p.timing.trim_duration, 5.0);
    }

    #[test]
    fn trim_shrinks_effective_duration_for_stage_choice() {
        // 90s overlay trimmed to 5s is shorter than the base, so it gates
        // instead of capping.
        let base = base();
        let mut trims = HashMap::new();
        trims.insert(OverlayLayer::Bottom, ClipTrim::new(0.0, 5.0));

        let plan = build(CompositionInput {
            base: &base,
            selections: vec![LayerSelection {
                layer: OverlayLayer::Bottom,
                clip: clip("/tpl/long.mp4", 90.0),
            }],
            policy: TimingPolicy::Standard,
            trims: &trims,
            output_dir: Path::new("/out"),
        });

        assert_eq!(plan.placements[0].stage, StageKind::GateWithTrim);
    }

    #[test]
    fn invalid_trim_is_rejected() {
        let base = base();
        let mut trims = HashMap::new();
        trims.insert(OverlayLayer::Top, ClipTrim::new(2.0, 0.0));

        let mut rng = StdRng::seed_from_u64(1);
        let result = build_composition_plan(
            CompositionInput {
                base: &base,
                selections: vec![LayerSelection {
                    layer: OverlayLayer::Top,
                    clip: clip("/tpl/top.mp4", 18.0),
                }],
                policy: TimingPolicy::Standard,
                trims: &trims,
                output_dir: Path::new("/out"),
            },
            &mut rng,
        );

        assert!(matches!(
            result,
            Err(CompositionError::InvalidTrim { .. })
        ));
    }
}
