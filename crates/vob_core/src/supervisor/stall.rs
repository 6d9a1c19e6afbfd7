//! Heuristic stall detection for supervised encodes.
//!
//! A state machine fed one sample per poll tick. Two strike-based
//! heuristics share one counter (low CPU after a grace period, frozen
//! output size) and three hard conditions fire directly (timeout, tiny
//! output past an early deadline, slow growth past a late deadline). All
//! thresholds are safety nets against a hung encoder, not correctness
//! checks.

use std::collections::VecDeque;
use std::time::Duration;

/// Interval between monitor ticks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Average CPU below this is a stall strike.
pub const LOW_CPU_THRESHOLD_PCT: f64 = 1.0;
/// CPU readings averaged per check.
pub const CPU_SAMPLE_WINDOW: usize = 3;
/// Runtime before CPU readings count toward strikes.
pub const CPU_GRACE_PERIOD: Duration = Duration::from_secs(30);
/// Consecutive strikes that trigger termination.
pub const STALL_STRIKE_LIMIT: u32 = 3;
/// Output smaller than this past the early deadline is a stall.
pub const MIN_EARLY_OUTPUT_BYTES: u64 = 1024 * 1024;
/// Runtime after which the output must have reached the minimum size.
pub const EARLY_OUTPUT_DEADLINE: Duration = Duration::from_secs(120);
/// Growth below this rate past the late deadline is a stall.
pub const MIN_GROWTH_RATE_BPS: f64 = 10.0 * 1024.0;
/// Runtime after which the growth rate is enforced.
pub const GROWTH_RATE_DEADLINE: Duration = Duration::from_secs(300);
/// Runtime threshold for the diagnostic `Stalled` status.
pub const STALL_DIAGNOSIS_RUNTIME: Duration = Duration::from_secs(300);

/// Observable state of the stall monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Forward progress on the last check.
    Running,
    /// One or more strikes accumulated, below the limit.
    SuspectedStall,
    /// A kill condition fired; the process is being terminated.
    Terminating,
    /// Termination confirmed by the monitor.
    Terminated,
}

/// Why the monitor decided to terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    /// Elapsed time exceeded the hard timeout.
    Timeout,
    /// Strike limit reached (low CPU or frozen output size).
    NoProgress,
    /// Output still tiny after the early deadline.
    TinyOutput,
    /// Output growth rate below the minimum after the late deadline.
    SlowGrowth,
}

impl std::fmt::Display for StallReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StallReason::Timeout => write!(f, "hard timeout exceeded"),
            StallReason::NoProgress => {
                write!(f, "no forward progress across consecutive checks")
            }
            StallReason::TinyOutput => {
                write!(f, "output file still tiny after the early deadline")
            }
            StallReason::SlowGrowth => {
                write!(f, "output growth rate below the minimum")
            }
        }
    }
}

/// One monitor tick's observations.
#[derive(Debug, Clone, Copy)]
pub struct StallSample {
    /// Time since the process was spawned.
    pub elapsed: Duration,
    /// CPU percentage since the previous tick, when available.
    pub cpu_percent: Option<f64>,
    /// Output file size, when the file exists.
    pub output_size: Option<u64>,
}

/// Strike-counting stall detector.
///
/// Pure with respect to time: every input arrives through
/// [`StallSample`], so tests can drive it with synthetic ticks.
pub struct StallDetector {
    timeout: Duration,
    state: MonitorState,
    strikes: u32,
    cpu_ring: VecDeque<f64>,
    last_size: Option<u64>,
    last_size_elapsed: Duration,
    growth_rate_bps: f64,
    reason: Option<StallReason>,
}

impl StallDetector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: MonitorState::Running,
            strikes: 0,
            cpu_ring: VecDeque::with_capacity(CPU_SAMPLE_WINDOW),
            last_size: None,
            last_size_elapsed: Duration::ZERO,
            growth_rate_bps: 0.0,
            reason: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn reason(&self) -> Option<StallReason> {
        self.reason
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    /// Feed one tick of observations and advance the state machine.
    ///
    /// Once `Terminating` is reached the state is sticky; the caller kills
    /// the process and calls [`mark_terminated`](Self::mark_terminated).
    pub fn observe(&mut self, sample: StallSample) -> MonitorState {
        if matches!(
            self.state,
            MonitorState::Terminating | MonitorState::Terminated
        ) {
            return self.state;
        }

        if sample.elapsed > self.timeout {
            return self.terminate(StallReason::Timeout);
        }

        self.update_cpu_strikes(&sample);

        if let Some(size) = sample.output_size {
            self.update_size_strikes(size, sample.elapsed);

            if sample.elapsed > EARLY_OUTPUT_DEADLINE && size < MIN_EARLY_OUTPUT_BYTES {
                return self.terminate(StallReason::TinyOutput);
            }
            if sample.elapsed > GROWTH_RATE_DEADLINE && self.growth_rate_bps < MIN_GROWTH_RATE_BPS
            {
                return self.terminate(StallReason::SlowGrowth);
            }
        }

        if self.strikes >= STALL_STRIKE_LIMIT {
            return self.terminate(StallReason::NoProgress);
        }

        self.state = if self.strikes == 0 {
            MonitorState::Running
        } else {
            MonitorState::SuspectedStall
        };
        self.state
    }

    /// Confirm the kill issued after `Terminating`.
    pub fn mark_terminated(&mut self) {
        self.state = MonitorState::Terminated;
    }

    fn update_cpu_strikes(&mut self, sample: &StallSample) {
        let Some(cpu) = sample.cpu_percent else {
            return;
        };

        if self.cpu_ring.len() == CPU_SAMPLE_WINDOW {
            self.cpu_ring.pop_front();
        }
        self.cpu_ring.push_back(cpu);

        if self.cpu_ring.len() < CPU_SAMPLE_WINDOW || sample.elapsed <= CPU_GRACE_PERIOD {
            return;
        }

        let avg: f64 = self.cpu_ring.iter().sum::<f64>() / self.cpu_ring.len() as f64;
        if avg < LOW_CPU_THRESHOLD_PCT {
            self.strikes += 1;
        } else {
            self.strikes = 0;
        }
    }

    fn update_size_strikes(&mut self, size: u64, elapsed: Duration) {
        let previous = self.last_size.unwrap_or(0);

        if size == previous {
            self.strikes += 1;
            self.growth_rate_bps = 0.0;
        } else {
            self.strikes = 0;
            let delta_secs = elapsed
                .saturating_sub(self.last_size_elapsed)
                .as_secs_f64();
            if delta_secs > 0.0 {
                self.growth_rate_bps = size.saturating_sub(previous) as f64 / delta_secs;
            }
        }

        self.last_size = Some(size);
        self.last_size_elapsed = elapsed;
    }

    fn terminate(&mut self, reason: StallReason) -> MonitorState {
        self.state = MonitorState::Terminating;
        self.reason = Some(reason);
        self.state
    }
}
