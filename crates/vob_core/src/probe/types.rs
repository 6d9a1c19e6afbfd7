//! Probe error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while probing media files.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to run {tool}: {message}")]
    SpawnFailed { tool: String, message: String },

    #[error("{tool} exited with code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("Could not read {field} from probe output: {raw}")]
    InvalidOutput { field: String, raw: String },
}

/// Result type for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;
