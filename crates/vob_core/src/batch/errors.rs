//! Error types for batch coordination.
//!
//! `BatchError` aborts the whole run before any job is dispatched;
//! `JobError` ends one job and becomes its failure line in the report.

use std::path::PathBuf;

use thiserror::Error;

use crate::composition::CompositionError;
use crate::probe::ProbeError;

/// Errors that reject a batch up front.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The request named no base media items.
    #[error("No media files were selected")]
    NoItems,

    /// No requested layer produced a usable candidate set.
    #[error("No valid overlay templates were found for any requested layer")]
    NoValidOverlays,

    /// A working directory could not be prepared.
    #[error("Failed to prepare {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BatchError {
    pub fn setup(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Setup { path: path.into(), source }
    }
}

/// Failures that end a single job before its encode starts.
///
/// A failed job never aborts the batch; the remaining items keep going.
#[derive(Error, Debug)]
pub enum JobError {
    /// The per-job log file could not be created.
    #[error("Could not open a job log: {0}")]
    Logging(#[from] std::io::Error),

    /// The base item's duration could not be read.
    #[error("Could not read the base duration: {0}")]
    Probe(#[from] ProbeError),

    /// Every requested layer came up empty for this item.
    #[error("No overlay clip was available for any requested layer")]
    NoOverlays,

    /// The composition plan was rejected.
    #[error(transparent)]
    Plan(#[from] CompositionError),
}

/// Result type for batch-level operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Result type for per-job preparation steps.
pub type JobResult<T> = Result<T, JobError>;
