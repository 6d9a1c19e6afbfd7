//! Shared per-run state: cancellation, progress fan-out, result collection.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use crate::batch::types::{BatchReport, JobReport};
use crate::supervisor::ProcessSupervisor;

/// Callback for per-job progress updates: job name, percent, message.
///
/// Invoked from worker threads, so implementations must marshal to their
/// own context if they touch anything thread-bound.
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

type SharedProgress = Arc<dyn Fn(&str, u32, &str) + Send + Sync>;

struct CancelState {
    flag: AtomicBool,
    active: Mutex<Vec<Weak<ProcessSupervisor>>>,
}

/// Clonable handle that stops a running batch from any thread.
///
/// Cancelling sets the shared flag, which is checked before each remaining
/// job is dispatched, and forwards the request to every registered
/// supervisor so in-flight encodes stop too.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                flag: AtomicBool::new(false),
                active: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Request cancellation of the whole batch.
    pub fn cancel(&self) {
        self.state.flag.store(true, Ordering::SeqCst);
        for entry in self.state.active.lock().iter() {
            if let Some(supervisor) = entry.upgrade() {
                supervisor.cancel();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.flag.load(Ordering::SeqCst)
    }

    /// Track a supervisor for the lifetime of its job.
    ///
    /// A cancel that lands between the flag check and this call still
    /// reaches the job through the post-registration check.
    pub(crate) fn register(&self, supervisor: &Arc<ProcessSupervisor>) {
        {
            let mut active = self.state.active.lock();
            active.retain(|entry| entry.strong_count() > 0);
            active.push(Arc::downgrade(supervisor));
        }
        if self.is_cancelled() {
            supervisor.cancel();
        }
    }
}

/// Per-run state handed to the coordinator alongside the request.
///
/// One context drives one batch run; nothing here is process-global, so
/// independent runs never share cancellation or results.
pub struct BatchContext {
    cancel: CancelHandle,
    progress: Option<SharedProgress>,
    jobs: Mutex<Vec<JobReport>>,
    started: Instant,
    started_at: String,
}

impl BatchContext {
    pub fn new() -> Self {
        Self {
            cancel: CancelHandle::new(),
            progress: None,
            jobs: Mutex::new(Vec::new()),
            started: Instant::now(),
            started_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Attach a progress callback for job updates.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(Arc::from(callback));
        self
    }

    /// Handle for stopping the run from outside the coordinator.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Forward one job's progress to the attached callback, if any.
    pub fn report_progress(&self, job: &str, percent: u32, message: &str) {
        if let Some(callback) = &self.progress {
            callback(job, percent, message);
        }
    }

    /// Clone of the progress sink for closures that outlive a borrow of
    /// the context.
    pub(crate) fn progress_sink(&self) -> Option<SharedProgress> {
        self.progress.clone()
    }

    pub(crate) fn register_supervisor(&self, supervisor: &Arc<ProcessSupervisor>) {
        self.cancel.register(supervisor);
    }

    /// Record one finished job; call order is completion order.
    pub(crate) fn record(&self, job: JobReport) {
        self.jobs.lock().push(job);
    }

    /// Seal the run into its report.
    pub(crate) fn into_report(self, output_dir: PathBuf) -> BatchReport {
        let cancelled = self.is_cancelled();
        BatchReport {
            jobs: self.jobs.into_inner(),
            started_at: self.started_at,
            finished_at: chrono::Local::now().to_rfc3339(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            output_dir,
            cancelled,
        }
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new()
    }
}
