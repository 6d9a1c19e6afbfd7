//! Pure placement computation for overlay layers.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::ClipTrim;

/// How a layer's start offset is computed.
///
/// One policy is active per batch invocation and applies to every layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimingPolicy {
    /// Place the overlay at an exact second, clamped so it fits the base.
    Exact(f64),
    /// Uniform random start within the leading window of the base.
    RandomWindow(f64),
    /// Uniform random start between two seconds.
    RandomRange(f64, f64),
    /// Overlay from time zero with no offset.
    Standard,
}

/// Per-layer placement computed by the planner.
///
/// `start_offset + trim_duration` may exceed the base duration. Overshoot
/// is truncated by the encoder-level duration cap, never here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    /// Seconds into the base at which the overlay appears.
    pub start_offset: f64,
    /// Seconds into the overlay clip where playback starts.
    pub trim_start: f64,
    /// Seconds of the overlay clip that play.
    pub trim_duration: f64,
}

/// Compute the placement for one layer.
///
/// A trim, when present, overrides the overlay's natural `[0, duration)`
/// window before the offset is placed; the trimmed duration then counts as
/// the overlay's effective duration for clamping.
///
/// Randomized policies draw from the caller's generator, so the same inputs
/// yield different offsets across calls unless the generator is seeded.
pub fn plan_layer(
    policy: TimingPolicy,
    base_duration: f64,
    overlay_duration: f64,
    trim: Option<ClipTrim>,
    rng: &mut impl Rng,
) -> TimingResult {
    let (trim_start, trim_duration) = match trim {
        Some(t) => (t.start, t.duration),
        None => (0.0, overlay_duration),
    };

    let start_offset = match policy {
        TimingPolicy::Exact(t) => t.min(base_duration - trim_duration).max(0.0),
        TimingPolicy::RandomWindow(window) => {
            // Not bounded by the overlay duration: the full overlay plays
            // even when the pick puts its end past the base.
            let max_start = window.min(base_duration).max(0.0);
            if max_start > 0.0 {
                rng.random_range(0.0..=max_start)
            } else {
                0.0
            }
        }
        TimingPolicy::RandomRange(a, b) => {
            let lo = a.min(b).max(0.0);
            let hi = a.max(b).min(base_duration);
            if hi > lo {
                rng.random_range(lo..=hi)
            } else {
                lo
            }
        }
        TimingPolicy::Standard => 0.0,
    };

    TimingResult {
        start_offset,
        trim_start,
        trim_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn exact_within_bounds_is_verbatim() {
        let r = plan_layer(TimingPolicy::Exact(12.0), 60.0, 18.0, None, &mut rng());
        assert_eq!(r.start_offset, 12.0);
        assert_eq!(r.trim_start, 0.0);
        assert_eq!(r.trim_duration, 18.0);
    }

    #[test]
    fn exact_clamps_to_fit_base() {
        // 60s base, 18s overlay: latest start that still fits is 42s
        let r = plan_layer(TimingPolicy::Exact(45.0), 60.0, 18.0, None, &mut rng());
        assert_eq!(r.start_offset, 42.0);
    }

    #[test]
    fn exact_floors_at_zero_when_overlay_exceeds_base() {
        let r = plan_layer(TimingPolicy::Exact(10.0), 20.0, 30.0, None, &mut rng());
        assert_eq!(r.start_offset, 0.0);
    }

    #[test]
    fn window_pick_stays_within_window_and_base() {
        let mut rng = rng();
        for _ in 0..50 {
            let r = plan_layer(TimingPolicy::RandomWindow(40.0), 60.0, 18.0, None, &mut rng);
            assert!(r.start_offset >= 0.0 && r.start_offset <= 40.0);
        }
        for _ in 0..50 {
            // Window wider than the base clamps to the base
            let r = plan_layer(TimingPolicy::RandomWindow(100.0), 30.0, 18.0, None, &mut rng);
            assert!(r.start_offset <= 30.0);
        }
    }

    #[test]
    fn window_zero_or_negative_yields_zero() {
        let r = plan_layer(TimingPolicy::RandomWindow(0.0), 60.0, 18.0, None, &mut rng());
        assert_eq!(r.start_offset, 0.0);

        let r = plan_layer(TimingPolicy::RandomWindow(-5.0), 60.0, 18.0, None, &mut rng());
        assert_eq!(r.start_offset, 0.0);
    }

    #[test]
    fn range_normalizes_reversed_bounds() {
        let mut rng = rng();
        for _ in 0..50 {
            let r = plan_layer(
                TimingPolicy::RandomRange(50.0, 30.0),
                60.0,
                18.0,
                None,
                &mut rng,
            );
            assert!(r.start_offset >= 30.0 && r.start_offset <= 50.0);
        }
    }

    #[test]
    fn range_end_clamps_to_base() {
        let mut rng = rng();
        for _ in 0..50 {
            let r = plan_layer(
                TimingPolicy::RandomRange(10.0, 200.0),
                60.0,
                18.0,
                None,
                &mut rng,
            );
            assert!(r.start_offset >= 10.0 && r.start_offset <= 60.0);
        }
    }

    #[test]
    fn range_collapsed_falls_back_to_start() {
        let r = plan_layer(
            TimingPolicy::RandomRange(45.0, 45.0),
            60.0,
            18.0,
            None,
            &mut rng(),
        );
        assert_eq!(r.start_offset, 45.0);
    }

    #[test]
    fn standard_always_starts_at_zero() {
        let a = plan_layer(TimingPolicy::Standard, 60.0, 18.0, None, &mut rng());
        let b = plan_layer(TimingPolicy::Standard, 60.0, 18.0, None, &mut rng());
        assert_eq!(a.start_offset, 0.0);
        assert_eq!(b.start_offset, 0.0);
        assert_eq!(a.trim_duration, 18.0);
    }

    #[test]
    fn trim_overrides_natural_window() {
        let trim = ClipTrim::new(3.0, 5.0);
        let r = plan_layer(TimingPolicy::Exact(45.0), 60.0, 18.0, Some(trim), &mut rng());
        assert_eq!(r.trim_start, 3.0);
        assert_eq!(r.trim_duration, 5.0);
        // Clamping uses the trimmed duration, so 45s still fits (60 - 5)
        assert_eq!(r.start_offset, 45.0);
    }

    #[test]
    fn seeded_runs_reproduce() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);

        for _ in 0..10 {
            let ra = plan_layer(TimingPolicy::RandomWindow(40.0), 60.0, 18.0, None, &mut a);
            let rb = plan_layer(TimingPolicy::RandomWindow(40.0), 60.0, 18.0, None, &mut b);
            assert_eq!(ra.start_offset, rb.start_offset);
        }
    }

    #[test]
    fn offset_plus_duration_may_overshoot_base() {
        let mut rng = StdRng::seed_from_u64(3);
        let r = plan_layer(
            TimingPolicy::RandomRange(50.0, 55.0),
            60.0,
            18.0,
            None,
            &mut rng,
        );
        // Placement is allowed past the point where the overlay still fits
        assert!(r.start_offset >= 50.0);
        assert!(r.start_offset + r.trim_duration > 60.0);
    }
}
