//! Event bus: worker -> scheduler messages and scheduler -> observer events.
//!
//! Workers send [`WorkerMessage`]s over a bounded channel and block when it is
//! full, so nothing is dropped. The scheduler applies them one at a time and
//! fans the resulting [`JobEvent`]s out to every subscriber over unbounded
//! channels, in application order.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::job::{JobId, JobResult, JobStatus, Progress};

/// What happened to a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum EventKind {
    Progress(Progress),
    Status(JobStatus),
    Finished(JobResult),
    /// Error message for a job that ended in Error.
    Failed(String),
}

/// Event delivered to observers, keyed by job id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub kind: EventKind,
}

/// Message from a worker to the scheduler's apply step.
#[derive(Debug)]
pub(crate) struct WorkerMessage {
    pub job_id: JobId,
    pub event: WorkerEvent,
}

#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Progress(Progress),
    Finished(Result<JobResult, EngineError>),
}

/// Subscription handle returned by `Scheduler::subscribe`.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl EventReceiver {
    /// Next event; `None` once the scheduler is gone.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }

    /// Drains every event delivered so far.
    pub fn drain(&mut self) -> Vec<JobEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Registered observers. Closed subscriptions are pruned on the next emit.
#[derive(Debug, Default)]
pub(crate) struct Observers {
    senders: Vec<mpsc::UnboundedSender<JobEvent>>,
}

impl Observers {
    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        EventReceiver { rx }
    }

    pub fn emit(&mut self, job_id: JobId, kind: EventKind) {
        let event = JobEvent { job_id, kind };
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.senders.len()
    }
}
