//! Overlay placement timing.
//!
//! Pure computation of where each overlay layer starts and which window of
//! the clip plays. Policy precedence is resolved upstream (see
//! `config::TimingSettings::to_policy`); this module only applies the
//! already-chosen policy.

mod planner;

pub use planner::{plan_layer, TimingPolicy, TimingResult};
