//! Batch coordination across a bounded worker pool.
//!
//! # Architecture
//!
//! - `types`: the immutable [`BatchRequest`] going in and the
//!   [`BatchReport`] coming out.
//! - `context`: [`BatchContext`], the one object shared across workers:
//!   cancellation, progress fan-out, and result collection.
//! - `coordinator`: [`BatchCoordinator`], which validates the request up
//!   front and drives one job per item through probe, selection, planning,
//!   and a supervised encode.
//! - `errors`: batch-level rejections and per-job aborts.
//!
//! A request is rejected before anything is dispatched when it names no
//! items or no requested layer has a usable template. Once dispatched,
//! jobs fail independently; only an explicit cancel stops the run early.

mod context;
mod coordinator;
mod errors;
mod types;

pub use context::{BatchContext, CancelHandle, ProgressCallback};
pub use coordinator::BatchCoordinator;
pub use errors::{BatchError, BatchResult, JobError, JobResult};
pub use types::{format_elapsed, BatchReport, BatchRequest, JobReport, LayerRequest};
