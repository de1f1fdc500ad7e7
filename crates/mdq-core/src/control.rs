//! Cooperative cancellation: per-job abort tokens and the control socket path.
//!
//! When the scheduler admits a job it registers an abort token here and hands
//! it to the worker. `cancel` sets the token; the worker checks it at every
//! engine progress callback and stops there.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::job::JobId;

/// Error returned from a progress callback to make the engine stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job aborted by user")
    }
}

impl std::error::Error for JobAborted {}

/// Shared cancellation flag for one job.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(JobAborted)` once abort was requested; used at callback boundaries.
    pub fn check(&self) -> Result<(), JobAborted> {
        if self.is_aborted() {
            Err(JobAborted)
        } else {
            Ok(())
        }
    }
}

/// Registry of job id -> abort token for running jobs.
#[derive(Debug, Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<JobId, AbortToken>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job being admitted; returns the token to pass to its worker.
    pub fn register(&self, job_id: JobId) -> AbortToken {
        let token = AbortToken::new();
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job_id, token.clone());
        token
    }

    /// Unregister a job (call on its terminal transition).
    pub fn unregister(&self, job_id: JobId) {
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&job_id);
    }

    /// Request abort for a running job. Returns false if the job is not registered.
    pub fn request_abort(&self, job_id: JobId) -> bool {
        match self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&job_id)
        {
            Some(token) => {
                token.abort();
                true
            }
            None => false,
        }
    }

    pub fn running(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Default path for the control socket, `~/.local/state/mdq/control.sock`.
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    xdg::BaseDirectories::with_prefix("mdq")?.place_state_file("control.sock")
}
