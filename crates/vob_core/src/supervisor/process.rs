//! Supervised execution of one external encode command.
//!
//! `run` owns the subprocess lifecycle: spawn with stderr drained, two
//! detached monitor threads (stall detection, synthetic progress), a
//! polling wait that observes cancellation, retry with exponential
//! backoff, and error classification from captured output.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::{FailureCategory, SupervisorStatus};

use super::progress::{phase_message, ProgressSchedule};
use super::sampling::{self, CpuSampler};
use super::stall::{
    MonitorState, StallDetector, StallSample, MIN_EARLY_OUTPUT_BYTES, POLL_INTERVAL,
    STALL_DIAGNOSIS_RUNTIME,
};
use super::types::{classify_failure, EncodeCommand, ProgressFn, RunOutcome, SupervisorConfig};

/// Grace between SIGTERM and SIGKILL for monitor-initiated kills.
const STALL_KILL_GRACE: Duration = Duration::from_secs(5);
/// Grace between SIGTERM and SIGKILL when cancelling.
const CANCEL_GRACE: Duration = Duration::from_secs(2);
/// Slice length for the polling wait and interruptible sleeps.
const WAIT_POLL: Duration = Duration::from_millis(200);
/// Lines of encoder output retained for classification.
const STDERR_TAIL_LINES: usize = 200;

/// State shared between `run`, `cancel`, and the monitor threads.
///
/// The child slot is emptied only by the wait loop; monitors treat an
/// empty slot as "nothing to monitor" and exit.
struct SharedState {
    child: Mutex<Option<Child>>,
    cancelled: AtomicBool,
    completed: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    output_path: Mutex<Option<PathBuf>>,
    last_percent: AtomicU32,
    kill_reason: Mutex<Option<String>>,
}

impl SharedState {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

enum AttemptOutcome {
    Success,
    Cancelled,
    Failed {
        exit_code: i32,
        category: FailureCategory,
        message: String,
    },
}

/// Runs one external command at a time with retries, timeout and stall
/// enforcement, synthetic progress, and cooperative cancellation.
///
/// `cancel` and `status` may be called from other threads while `run`
/// blocks; a cancelled supervisor stays cancelled for later runs.
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    state: Arc<SharedState>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: Arc::new(SharedState {
                child: Mutex::new(None),
                cancelled: AtomicBool::new(false),
                completed: AtomicBool::new(false),
                started_at: Mutex::new(None),
                output_path: Mutex::new(None),
                last_percent: AtomicU32::new(0),
                kill_reason: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run the command to completion.
    ///
    /// Attempts up to `max_retries` times with `2^attempt` seconds of
    /// backoff between attempts. Before each retry, other running
    /// instances of the tool are discovered and logged. The progress
    /// callback receives synthetic percentages during execution and a
    /// final marker (100, failure, or cancelled) from this method.
    pub fn run(&self, command: &EncodeCommand, on_progress: ProgressFn) -> RunOutcome {
        *self.state.output_path.lock() = command.output_path.clone();
        self.state.completed.store(false, Ordering::SeqCst);
        self.state.last_percent.store(0, Ordering::SeqCst);

        let mut last_failure: Option<(FailureCategory, String, i32)> = None;

        for attempt in 0..self.config.max_retries {
            if self.state.is_cancelled() {
                return self.finish_cancelled(&on_progress);
            }

            if attempt > 0 {
                self.log_other_instances(command);
                let backoff = Duration::from_secs(1u64 << attempt);
                tracing::warn!(
                    "Retrying {} (attempt {}/{}) after {}s backoff",
                    command.tool_name(),
                    attempt + 1,
                    self.config.max_retries,
                    backoff.as_secs()
                );
                if !sleep_unless_cancelled(&self.state, backoff) {
                    return self.finish_cancelled(&on_progress);
                }
            }

            match self.execute_attempt(command, &on_progress) {
                AttemptOutcome::Success => {
                    self.state.completed.store(true, Ordering::SeqCst);
                    self.state.last_percent.store(100, Ordering::SeqCst);
                    on_progress(100, phase_message(100));
                    return RunOutcome::Success;
                }
                AttemptOutcome::Cancelled => {
                    return self.finish_cancelled(&on_progress);
                }
                AttemptOutcome::Failed {
                    exit_code,
                    category,
                    message,
                } => {
                    tracing::warn!(
                        "{} attempt {}/{} failed (exit code {}): {}",
                        command.tool_name(),
                        attempt + 1,
                        self.config.max_retries,
                        exit_code,
                        message
                    );
                    last_failure = Some((category, message, exit_code));
                }
            }
        }

        self.state.completed.store(true, Ordering::SeqCst);
        let (category, message, exit_code) = last_failure.unwrap_or((
            FailureCategory::Unknown,
            "No attempts were executed".to_string(),
            -1,
        ));
        let percent = self.state.last_percent.load(Ordering::SeqCst);
        on_progress(percent, &format!("Encode failed (exit code: {exit_code})"));
        RunOutcome::Failed { category, message }
    }

    /// Request cancellation and terminate any live process.
    ///
    /// Returns true when a live process was signalled. Safe to call from
    /// another thread; `run` observes the flag before each attempt and
    /// inside its wait loop and returns `Cancelled`.
    pub fn cancel(&self) -> bool {
        self.state.cancelled.store(true, Ordering::SeqCst);
        tracing::debug!("Cancellation requested");
        terminate_with_grace(&self.state, CANCEL_GRACE)
    }

    /// Diagnostic status snapshot.
    ///
    /// `Stalled` means the process is alive but has run past the
    /// diagnosis threshold with a still-tiny output file. No action is
    /// taken here; the stall monitor enforces its own thresholds.
    pub fn status(&self) -> SupervisorStatus {
        if self.state.child.lock().is_none() {
            return if self.state.completed.load(Ordering::SeqCst) {
                SupervisorStatus::Completed
            } else {
                SupervisorStatus::Idle
            };
        }

        let elapsed = match *self.state.started_at.lock() {
            Some(at) => at.elapsed(),
            None => Duration::ZERO,
        };
        if elapsed > STALL_DIAGNOSIS_RUNTIME {
            let output = self.state.output_path.lock().clone();
            if let Some(size) = output.as_deref().and_then(sampling::output_size) {
                if size < MIN_EARLY_OUTPUT_BYTES {
                    return SupervisorStatus::Stalled;
                }
            }
        }
        SupervisorStatus::Running
    }

    fn execute_attempt(
        &self,
        command: &EncodeCommand,
        on_progress: &ProgressFn,
    ) -> AttemptOutcome {
        *self.state.kill_reason.lock() = None;

        tracing::debug!("Spawning: {}", command.display_line());

        let mut child = match Command::new(&command.program)
            .args(&command.args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let (category, message) = if e.kind() == std::io::ErrorKind::NotFound {
                    (
                        FailureCategory::MissingFile,
                        format!("{} not found on this system", command.program),
                    )
                } else {
                    (
                        FailureCategory::Unknown,
                        format!("Failed to spawn {}: {}", command.program, e),
                    )
                };
                return AttemptOutcome::Failed {
                    exit_code: -1,
                    category,
                    message,
                };
            }
        };

        let drain = child.stderr.take().map(|pipe| {
            std::thread::spawn(move || {
                let mut tail: VecDeque<String> = VecDeque::new();
                for line in BufReader::new(pipe).lines().map_while(Result::ok) {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });

        *self.state.started_at.lock() = Some(Instant::now());
        *self.state.child.lock() = Some(child);

        self.spawn_stall_monitor(command);
        self.spawn_progress_monitor(Arc::clone(on_progress));

        let status = loop {
            if self.state.is_cancelled() {
                terminate_with_grace(&self.state, CANCEL_GRACE);
                *self.state.child.lock() = None;
                if let Some(handle) = drain {
                    let _ = handle.join();
                }
                return AttemptOutcome::Cancelled;
            }

            let polled = {
                let mut guard = self.state.child.lock();
                guard.as_mut().map(|child| child.try_wait())
            };
            match polled {
                Some(Ok(Some(status))) => {
                    *self.state.child.lock() = None;
                    break status;
                }
                Some(Ok(None)) => std::thread::sleep(WAIT_POLL),
                Some(Err(e)) => {
                    *self.state.child.lock() = None;
                    if let Some(handle) = drain {
                        let _ = handle.join();
                    }
                    return AttemptOutcome::Failed {
                        exit_code: -1,
                        category: FailureCategory::Unknown,
                        message: format!("Failed waiting on {}: {}", command.tool_name(), e),
                    };
                }
                None => {
                    return if self.state.is_cancelled() {
                        AttemptOutcome::Cancelled
                    } else {
                        AttemptOutcome::Failed {
                            exit_code: -1,
                            category: FailureCategory::Unknown,
                            message: "Process slot emptied unexpectedly".to_string(),
                        }
                    };
                }
            }
        };

        let error_output = drain
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        if self.state.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        if status.success() {
            return AttemptOutcome::Success;
        }

        let exit_code = status.code().unwrap_or(-1);
        let (category, message) = match self.state.kill_reason.lock().take() {
            Some(reason) => (
                FailureCategory::Unknown,
                format!("Terminated by the stall monitor: {reason}"),
            ),
            None => classify_failure(&error_output),
        };
        AttemptOutcome::Failed {
            exit_code,
            category,
            message,
        }
    }

    fn finish_cancelled(&self, on_progress: &ProgressFn) -> RunOutcome {
        self.state.completed.store(true, Ordering::SeqCst);
        self.state.last_percent.store(0, Ordering::SeqCst);
        on_progress(0, "Cancelled");
        RunOutcome::Cancelled
    }

    /// Diagnostic discovery before a retry. Log only; found instances are
    /// never killed.
    fn log_other_instances(&self, command: &EncodeCommand) {
        let tool = command.tool_name();
        let instances = sampling::find_tool_instances(&tool);
        if !instances.is_empty() {
            tracing::warn!(
                "{} other {} instance(s) running: {:?}",
                instances.len(),
                tool,
                instances
            );
        }
    }

    fn spawn_stall_monitor(&self, command: &EncodeCommand) {
        let pid = match self.state.child.lock().as_ref().map(|c| c.id()) {
            Some(pid) => pid,
            None => return,
        };
        let state = Arc::clone(&self.state);
        let timeout = self.config.timeout;
        let output_path = command.output_path.clone();

        std::thread::spawn(move || {
            let mut detector = StallDetector::new(timeout);
            let mut sampler = CpuSampler::new(pid);

            loop {
                std::thread::sleep(POLL_INTERVAL);

                if state.is_cancelled() || state.child.lock().is_none() {
                    return;
                }
                let elapsed = match *state.started_at.lock() {
                    Some(at) => at.elapsed(),
                    None => return,
                };

                let sample = StallSample {
                    elapsed,
                    cpu_percent: sampler.sample(),
                    output_size: output_path.as_deref().and_then(sampling::output_size),
                };

                match detector.observe(sample) {
                    MonitorState::Terminating => {
                        if let Some(reason) = detector.reason() {
                            tracing::warn!("Terminating pid {pid}: {reason}");
                            *state.kill_reason.lock() = Some(reason.to_string());
                        }
                        terminate_with_grace(&state, STALL_KILL_GRACE);
                        detector.mark_terminated();
                        return;
                    }
                    MonitorState::SuspectedStall => {
                        tracing::debug!(
                            "Suspected stall for pid {pid} ({} strikes)",
                            detector.strikes()
                        );
                    }
                    _ => {}
                }
            }
        });
    }

    fn spawn_progress_monitor(&self, on_progress: ProgressFn) {
        let state = Arc::clone(&self.state);

        std::thread::spawn(move || {
            let mut schedule = ProgressSchedule::new();

            loop {
                if state.is_cancelled() || state.child.lock().is_none() {
                    return;
                }
                match schedule.tick() {
                    Some((percent, pause)) => {
                        state.last_percent.store(percent, Ordering::SeqCst);
                        on_progress(percent, phase_message(percent));
                        if !pause_while_running(&state, pause) {
                            return;
                        }
                    }
                    None => return,
                }
            }
        });
    }
}

/// SIGTERM the live process, wait out the grace period, then SIGKILL.
///
/// Returns true when a live process was signalled. The child stays in its
/// slot (reaped); the wait loop observes the exit status. A child that
/// already exited is never re-signalled, so a recycled pid cannot be hit.
fn terminate_with_grace(state: &SharedState, grace: Duration) -> bool {
    let pid = {
        let mut guard = state.child.lock();
        match guard.as_mut() {
            None => return false,
            Some(child) => {
                if let Ok(Some(_)) = child.try_wait() {
                    return false;
                }
                child.id()
            }
        }
    };

    send_sigterm(pid);

    let deadline = Instant::now() + grace;
    loop {
        {
            let mut guard = state.child.lock();
            match guard.as_mut() {
                None => return true,
                Some(child) => {
                    if let Ok(Some(_)) = child.try_wait() {
                        return true;
                    }
                }
            }
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(WAIT_POLL);
    }

    let mut guard = state.child.lock();
    if let Some(child) = guard.as_mut() {
        tracing::warn!("Escalating to SIGKILL for pid {pid}");
        let _ = child.kill();
        let _ = child.wait();
    }
    true
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

/// Sleep in short slices; false when cancellation arrives first.
fn sleep_unless_cancelled(state: &SharedState, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if state.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(WAIT_POLL));
    }
}

/// Sleep in short slices; false when the run ended or was cancelled.
fn pause_while_running(state: &SharedState, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if state.is_cancelled() || state.child.lock().is_none() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(WAIT_POLL));
    }
}
