use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Errors returned by tracker and dispatcher operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// The referenced job does not exist.
    #[error("job not found: {job_id}")]
    NotFound { job_id: JobId },

    /// The artifact was requested before the job completed.
    #[error("video not ready (status: {status})")]
    NotReady { job_id: JobId, status: JobStatus },

    /// The job failed; carries the stored render error.
    #[error("video generation failed: {error}")]
    Failed { job_id: JobId, error: String },

    /// The job completed but its output file is gone from disk.
    #[error("video file not found for job {job_id}")]
    ArtifactMissing { job_id: JobId },

    /// The render queue is at capacity.
    #[error("render queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The dispatch loop has stopped and accepts no more work.
    #[error("render dispatcher is not running")]
    DispatcherClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while rendering a single job.
///
/// These never reach a caller directly: the worker stores their message in
/// the job record.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The scene source was refused before rendering.
    #[error("{0}")]
    Rejected(String),

    /// The renderer process could not be started.
    #[error("failed to launch renderer '{program}': {message}")]
    Spawn { program: String, message: String },

    /// The renderer exited unsuccessfully.
    #[error("Manim render failed ({status}): {stderr}")]
    Exit { status: String, stderr: String },

    #[error("rendering timed out after {secs} seconds")]
    Timeout { secs: u64 },

    /// The renderer succeeded but left no video behind.
    #[error("no video file generated")]
    NoOutput,

    #[error("io error: {0}")]
    Io(String),

    /// The render task panicked or was aborted.
    #[error("render task aborted: {0}")]
    Panicked(String),
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Io(e.to_string())
    }
}
