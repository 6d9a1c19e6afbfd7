//! Synthetic progress schedule for supervised encodes.
//!
//! The encoder's own progress stream is not parsed; instead the supervisor
//! emits percentages on a fixed cadence: fast to 90, slow to 98, then a
//! bounded hold near completion. The final 100 (or failure marker) comes
//! from the run loop when the process exits.

use std::time::Duration;

/// Step size during the fast phase.
pub const FAST_STEP_PCT: u32 = 5;
/// Pause between fast-phase ticks.
pub const FAST_TICK: Duration = Duration::from_millis(800);
/// Percentage where the fast phase hands over.
pub const FAST_CEILING_PCT: u32 = 90;
/// Step size during the slow phase.
pub const SLOW_STEP_PCT: u32 = 1;
/// Pause between slow-phase ticks.
pub const SLOW_TICK: Duration = Duration::from_secs(3);
/// Percentage where the slow phase hands over.
pub const SLOW_CEILING_PCT: u32 = 98;
/// Pause between hold-phase re-emissions.
pub const HOLD_TICK: Duration = Duration::from_secs(10);
/// Longest the hold phase lasts before forcing ahead.
pub const HOLD_LIMIT: Duration = Duration::from_secs(60);
/// Percentage emitted once when the hold limit is exhausted.
pub const HOLD_BREAK_PCT: u32 = 99;

/// Stepper producing the synthetic progress sequence.
///
/// Each [`tick`](Self::tick) yields the percentage to emit now and the
/// pause before the next tick; `None` once the schedule is exhausted.
/// Percentages are monotonic non-decreasing.
pub struct ProgressSchedule {
    percent: u32,
    held: Duration,
    exhausted: bool,
}

impl ProgressSchedule {
    pub fn new() -> Self {
        Self {
            percent: 0,
            held: Duration::ZERO,
            exhausted: false,
        }
    }

    pub fn current(&self) -> u32 {
        self.percent
    }

    pub fn tick(&mut self) -> Option<(u32, Duration)> {
        if self.exhausted {
            return None;
        }

        if self.percent < FAST_CEILING_PCT {
            self.percent += FAST_STEP_PCT;
            return Some((self.percent, FAST_TICK));
        }

        if self.percent < SLOW_CEILING_PCT {
            self.percent += SLOW_STEP_PCT;
            return Some((self.percent, SLOW_TICK));
        }

        if self.held < HOLD_LIMIT {
            self.held += HOLD_TICK;
            return Some((SLOW_CEILING_PCT, HOLD_TICK));
        }

        self.exhausted = true;
        self.percent = HOLD_BREAK_PCT;
        Some((HOLD_BREAK_PCT, Duration::ZERO))
    }
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Status text for a given synthetic percentage.
pub fn phase_message(percent: u32) -> &'static str {
    match percent {
        0..=90 => "Encoding",
        91..=97 => "Finishing up",
        98 => "Almost done",
        99 => "Forcing completion",
        _ => "Completed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_phase_steps_by_five_to_ninety() {
        let mut schedule = ProgressSchedule::new();

        for expected in (5..=90).step_by(5) {
            let (percent, pause) = schedule.tick().unwrap();
            assert_eq!(percent, expected);
            assert_eq!(pause, FAST_TICK);
        }
        assert_eq!(schedule.current(), 90);
    }

    #[test]
    fn slow_phase_steps_by_one_to_ninety_eight() {
        let mut schedule = ProgressSchedule::new();
        while schedule.current() < FAST_CEILING_PCT {
            schedule.tick();
        }

        for expected in 91..=98 {
            let (percent, pause) = schedule.tick().unwrap();
            assert_eq!(percent, expected);
            assert_eq!(pause, SLOW_TICK);
        }
    }

    #[test]
    fn hold_phase_reemits_then_forces_ahead() {
        let mut schedule = ProgressSchedule::new();
        while schedule.current() < SLOW_CEILING_PCT {
            schedule.tick();
        }

        let hold_ticks = (HOLD_LIMIT.as_secs() / HOLD_TICK.as_secs()) as usize;
        for _ in 0..hold_ticks {
            let (percent, pause) = schedule.tick().unwrap();
            assert_eq!(percent, 98);
            assert_eq!(pause, HOLD_TICK);
        }

        let (percent, _) = schedule.tick().unwrap();
        assert_eq!(percent, 99);
        assert!(schedule.tick().is_none());
    }

    #[test]
    fn sequence_is_monotonic() {
        let mut schedule = ProgressSchedule::new();
        let mut last = 0;

        while let Some((percent, _)) = schedule.tick() {
            assert!(percent >= last);
            last = percent;
        }
        assert_eq!(last, 99);
    }

    #[test]
    fn messages_track_phases() {
        assert_eq!(phase_message(45), "Encoding");
        assert_eq!(phase_message(90), "Encoding");
        assert_eq!(phase_message(95), "Finishing up");
        assert_eq!(phase_message(98), "Almost done");
        assert_eq!(phase_message(99), "Forcing completion");
        assert_eq!(phase_message(100), "Completed");
    }
}
