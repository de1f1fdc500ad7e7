//! Single-consumer apply step and FIFO admission.
//!
//! Every registry mutation happens here or in a scheduler command, always
//! under the state lock, and emits its observer events before the lock is
//! released so observers see mutations in the order they were applied.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::{EngineOptions, EngineRequest};
use crate::error::EngineError;
use crate::job::{JobId, JobResult, JobStatus, Progress};

use super::events::{EventKind, WorkerEvent, WorkerMessage};
use super::worker::{spawn_worker, WorkerJob};
use super::{Shared, State};

pub(super) const CANCELLED_BEFORE_START: &str = "cancelled before start";
pub(super) const CANCELLED_BY_USER: &str = "cancelled by user";

/// Receives worker messages until the scheduler is dropped.
pub(super) async fn run_dispatch_loop(shared: Arc<Shared>, mut rx: mpsc::Receiver<WorkerMessage>) {
    while let Some(msg) = rx.recv().await {
        shared.apply(msg);
    }
    tracing::debug!("dispatch loop finished");
}

impl Shared {
    pub(super) fn apply(&self, msg: WorkerMessage) {
        let mut state = self.lock();
        match msg.event {
            WorkerEvent::Progress(p) => apply_progress(&mut state, msg.job_id, p),
            WorkerEvent::Finished(result) => {
                if self.apply_finished(&mut state, msg.job_id, result) {
                    self.control.unregister(msg.job_id);
                    self.admit_waiting(&mut state);
                }
            }
        }
    }

    /// Terminal transition for an active job. Returns false for stale messages.
    fn apply_finished(
        &self,
        state: &mut State,
        id: JobId,
        result: Result<JobResult, EngineError>,
    ) -> bool {
        let Some(status) = state.registry.get_ref(id).map(|j| j.status) else {
            return false;
        };
        if !status.is_active() {
            tracing::debug!(job_id = %id, status = status.as_str(), "ignoring stale outcome");
            return false;
        }

        // Once cancel was requested the job ends Cancelled whatever the engine said.
        let cancelled = status == JobStatus::Cancelling
            || matches!(result, Err(EngineError::Cancelled));
        if cancelled {
            if status != JobStatus::Cancelling {
                state.registry.transition(id, JobStatus::Cancelling);
                state.observers.emit(id, EventKind::Status(JobStatus::Cancelling));
            }
            state.registry.transition(id, JobStatus::Cancelled);
            if let Some(job) = state.registry.get_mut(id) {
                job.message = Some(CANCELLED_BY_USER.to_string());
            }
            state.observers.emit(id, EventKind::Status(JobStatus::Cancelled));
            return true;
        }

        match result {
            Ok(res) => {
                state.registry.transition(id, JobStatus::Completed);
                let progress = state.registry.get_mut(id).map(|job| {
                    job.progress = Progress {
                        percent: 100,
                        eta_seconds: Some(0),
                        ..job.progress
                    };
                    job.result = Some(res.clone());
                    job.progress
                });
                if let Some(p) = progress {
                    state.observers.emit(id, EventKind::Progress(p));
                }
                state.observers.emit(id, EventKind::Status(JobStatus::Completed));
                state.observers.emit(id, EventKind::Finished(res));
            }
            Err(e) => {
                let msg = e.to_string();
                state.registry.transition(id, JobStatus::Error);
                if let Some(job) = state.registry.get_mut(id) {
                    job.message = Some(msg.clone());
                }
                state.observers.emit(id, EventKind::Status(JobStatus::Error));
                state.observers.emit(id, EventKind::Failed(msg));
            }
        }
        true
    }

    /// Admits Queued jobs in creation order while capacity is free. Returns how many were admitted.
    pub(super) fn admit_waiting(&self, state: &mut State) -> usize {
        let mut admitted = 0;
        while self.limit.available(state.registry.active_count()) > 0 {
            let Some(id) = state.registry.next_queued() else {
                break;
            };
            self.start_job(state, id);
            admitted += 1;
        }
        admitted
    }

    fn start_job(&self, state: &mut State, id: JobId) {
        if !state.registry.transition(id, JobStatus::Starting) {
            return;
        }
        state.observers.emit(id, EventKind::Status(JobStatus::Starting));

        let Some(job) = state.registry.get_ref(id) else {
            return;
        };
        let request = EngineRequest {
            url: job.url.clone(),
            options: EngineOptions::build(&job.params, self.has_processor),
        };
        let token = self.control.register(id);
        tracing::info!(job_id = %id, url = %job.url, "admitting job");
        spawn_worker(
            &self.runtime,
            WorkerJob {
                job_id: id,
                request,
                token,
            },
            Arc::clone(&self.engine),
            self.worker_tx.clone(),
        );
    }
}

fn apply_progress(state: &mut State, id: JobId, progress: Progress) {
    let Some(status) = state.registry.get_ref(id).map(|j| j.status) else {
        return;
    };
    match status {
        JobStatus::Starting => {
            state.registry.transition(id, JobStatus::Downloading);
            state.observers.emit(id, EventKind::Status(JobStatus::Downloading));
        }
        JobStatus::Downloading | JobStatus::Cancelling => {}
        _ => return,
    }
    let Some(job) = state.registry.get_mut(id) else {
        return;
    };
    job.progress = Progress {
        percent: progress.percent.max(job.progress.percent),
        ..progress
    };
    let p = job.progress;
    state.observers.emit(id, EventKind::Progress(p));
}
