//! Error types returned by the queue and by engine invocations.

use thiserror::Error;

use crate::job::JobId;

/// Errors returned synchronously by scheduler / registry commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Submission rejected before any job was created.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("job {0} not found")]
    NotFound(JobId),

    /// Malformed argument, e.g. a concurrency limit outside 1..=32.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Terminal failure of one engine invocation. Contained inside the worker and
/// turned into a job event; never propagated into the scheduler's control flow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The cooperative cancellation path was taken.
    #[error("cancelled")]
    Cancelled,

    /// Network, format, codec or disk error reported by the engine.
    #[error("{0}")]
    Failure(String),
}

impl EngineError {
    pub fn failure(msg: impl Into<String>) -> Self {
        EngineError::Failure(msg.into())
    }
}
