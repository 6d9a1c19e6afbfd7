//! Composition planning and ffmpeg command construction.
//!
//! # Architecture
//!
//! Two stages, both pure:
//!
//! - `plan_builder`: turns the base media, chosen overlay clips, timing
//!   policy, and trims into a [`CompositionPlan`] with one [`Placement`]
//!   per layer in stacking order.
//! - `options_builder`: turns a plan into the ffmpeg argument list,
//!   including the filter graph and the fixed encode tail.
//!
//! Probing, clip selection, and process execution live elsewhere; nothing
//! in this module spawns a process.

mod options_builder;
mod plan_builder;

pub use options_builder::{format_tokens_pretty, FfmpegOptionsBuilder};
pub use plan_builder::{
    build_composition_plan, CompositionError, CompositionInput, CompositionPlan, LayerSelection,
    Placement, StageKind,
};
