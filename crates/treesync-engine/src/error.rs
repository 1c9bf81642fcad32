//! Engine error types.

use std::path::PathBuf;

use thiserror::Error;

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cron expression could not be parsed.
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidSchedule { expr: String, reason: String },

    /// The preview probe exited with an unexpected status.
    #[error("Change detection failed: {0}")]
    Detection(String),

    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// A run for this job is already in flight.
    #[error("Job already running: {0}")]
    AlreadyRunning(String),

    /// Job is disabled and cannot be triggered.
    #[error("Job disabled: {0}")]
    Disabled(String),

    /// Another live process owns the data directory.
    #[error("Data directory locked by process {pid} ({})", .path.display())]
    InstanceLocked { path: PathBuf, pid: u32 },

    /// Job definition rejected.
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Engine settings rejected.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The job table could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
