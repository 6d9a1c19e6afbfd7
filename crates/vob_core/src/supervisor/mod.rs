//! Supervised external-process execution.
//!
//! # Architecture
//!
//! - `types`: command description, retry/timeout configuration, run
//!   outcomes, failure classification.
//! - `sampling`: CPU usage via `/proc`, output size, encoder instance
//!   discovery.
//! - `stall`: strike-counting stall state machine
//!   (`Running -> SuspectedStall -> Terminating -> Terminated`) with all
//!   thresholds as named constants.
//! - `progress`: synthetic progress schedule and phase messages.
//! - `process`: `ProcessSupervisor` tying it together: spawn, monitor
//!   threads, polling wait, retries with backoff, cancellation.
//!
//! One supervisor instance drives one job; batch workers each own their
//! supervisor and share nothing but the cancel signal.

mod process;
mod progress;
mod sampling;
mod stall;
mod types;

pub use process::ProcessSupervisor;
pub use progress::{phase_message, ProgressSchedule};
pub use sampling::{find_tool_instances, output_size, CpuSampler};
pub use stall::{
    MonitorState, StallDetector, StallReason, StallSample, CPU_GRACE_PERIOD, CPU_SAMPLE_WINDOW,
    EARLY_OUTPUT_DEADLINE, GROWTH_RATE_DEADLINE, LOW_CPU_THRESHOLD_PCT, MIN_EARLY_OUTPUT_BYTES,
    MIN_GROWTH_RATE_BPS, POLL_INTERVAL, STALL_DIAGNOSIS_RUNTIME, STALL_STRIKE_LIMIT,
};
pub use types::{
    classify_failure, EncodeCommand, ProgressFn, RunOutcome, SupervisorConfig,
    DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, MAX_FAILURE_MESSAGE_CHARS, TIMEOUT_CAP, TIMEOUT_SCALE,
};
