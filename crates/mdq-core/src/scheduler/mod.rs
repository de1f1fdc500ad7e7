//! Job scheduler.
//!
//! Owns the job registry, the concurrency limit and the worker pool. Commands
//! (`submit`, `cancel`, ...) are synchronous and take effect immediately;
//! worker output arrives over the event bus and is applied by a single
//! dispatch task. Admission is FIFO by creation order.

mod dispatch;
mod events;
mod limit;
mod worker;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{MdqConfig, DEFAULT_EVENT_BUFFER, DEFAULT_MAX_CONCURRENCY};
use crate::control::JobControl;
use crate::engine::DownloadEngine;
use crate::error::QueueError;
use crate::formats;
use crate::job::{Job, JobId, JobParams, JobStatus};
use crate::registry::{JobCounts, JobRegistry};

pub use events::{EventKind, EventReceiver, JobEvent};
pub use limit::ConcurrencyLimit;

use events::{Observers, WorkerMessage};

/// State guarded by one lock: the registry and the observers that must see its changes in order.
#[derive(Debug, Default)]
pub(crate) struct State {
    registry: JobRegistry,
    observers: Observers,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    limit: ConcurrencyLimit,
    control: JobControl,
    engine: Arc<dyn DownloadEngine>,
    has_processor: bool,
    worker_tx: mpsc::Sender<WorkerMessage>,
    runtime: tokio::runtime::Handle,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel_locked(&self, state: &mut State, id: JobId) -> Result<JobStatus, QueueError> {
        let status = state
            .registry
            .get_ref(id)
            .map(|j| j.status)
            .ok_or(QueueError::NotFound(id))?;
        match status {
            JobStatus::Queued => {
                state.registry.transition(id, JobStatus::Cancelled);
                if let Some(job) = state.registry.get_mut(id) {
                    job.message = Some(dispatch::CANCELLED_BEFORE_START.to_string());
                }
                state.observers.emit(id, EventKind::Status(JobStatus::Cancelled));
                tracing::info!(job_id = %id, "queued job cancelled");
                Ok(JobStatus::Cancelled)
            }
            JobStatus::Starting | JobStatus::Downloading => {
                state.registry.transition(id, JobStatus::Cancelling);
                state.observers.emit(id, EventKind::Status(JobStatus::Cancelling));
                self.control.request_abort(id);
                tracing::info!(job_id = %id, "cancellation requested");
                Ok(JobStatus::Cancelling)
            }
            other => Ok(other),
        }
    }
}

/// Builder for [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerBuilder {
    max_concurrency: usize,
    event_buffer: usize,
    has_processor: Option<bool>,
    ffmpeg: String,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            event_buffer: DEFAULT_EVENT_BUFFER,
            has_processor: None,
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &MdqConfig) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency,
            event_buffer: cfg.event_buffer,
            has_processor: None,
            ffmpeg: cfg.engine.ffmpeg.clone(),
        }
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    /// Capacity of the worker -> scheduler channel (at least 1).
    pub fn event_buffer(mut self, n: usize) -> Self {
        self.event_buffer = n;
        self
    }

    /// Overrides detection of the external media processor.
    pub fn processor_available(mut self, available: bool) -> Self {
        self.has_processor = Some(available);
        self
    }

    /// Builds the scheduler on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, like `tokio::spawn`.
    pub fn build(self, engine: Arc<dyn DownloadEngine>) -> Result<Scheduler, QueueError> {
        self.build_on(tokio::runtime::Handle::current(), engine)
    }

    /// Builds the scheduler on the given runtime.
    pub fn build_on(
        self,
        runtime: tokio::runtime::Handle,
        engine: Arc<dyn DownloadEngine>,
    ) -> Result<Scheduler, QueueError> {
        let limit = ConcurrencyLimit::new(self.max_concurrency)?;
        if self.event_buffer == 0 {
            return Err(QueueError::InvalidArgument(
                "event buffer must be at least 1".to_string(),
            ));
        }
        let has_processor = self
            .has_processor
            .unwrap_or_else(|| formats::detect_external_processor(&self.ffmpeg));
        tracing::debug!(
            max_concurrency = limit.get(),
            has_processor,
            "scheduler starting"
        );

        let (worker_tx, worker_rx) = mpsc::channel(self.event_buffer);
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            limit,
            control: JobControl::new(),
            engine,
            has_processor,
            worker_tx,
            runtime: runtime.clone(),
        });
        let dispatcher = runtime.spawn(dispatch::run_dispatch_loop(Arc::clone(&shared), worker_rx));
        Ok(Scheduler { shared, dispatcher })
    }
}

/// Bounded-concurrency download queue.
///
/// Dropping the scheduler stops the dispatch task and asks every running
/// worker to abort at its next progress callback.
pub struct Scheduler {
    shared: Arc<Shared>,
    dispatcher: JoinHandle<()>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Creates a Queued job and immediately tries to admit waiting jobs.
    pub fn submit(&self, url: &str, params: JobParams) -> Result<JobId, QueueError> {
        let mut state = self.shared.lock();
        let id = state.registry.create(url, params)?;
        tracing::debug!(job_id = %id, url = url.trim(), "job queued");
        state.observers.emit(id, EventKind::Status(JobStatus::Queued));
        self.shared.admit_waiting(&mut state);
        Ok(id)
    }

    /// Admits every Queued job capacity allows. Returns the number admitted.
    pub fn start_all(&self) -> usize {
        let mut state = self.shared.lock();
        self.shared.admit_waiting(&mut state)
    }

    /// Cancels one job and returns its status afterwards.
    ///
    /// Queued jobs become Cancelled at once. Active jobs become Cancelling and
    /// reach Cancelled when their worker observes the request. Jobs already
    /// cancelling or terminal are left alone.
    pub fn cancel(&self, id: JobId) -> Result<JobStatus, QueueError> {
        let mut state = self.shared.lock();
        self.shared.cancel_locked(&mut state, id)
    }

    /// Cancels every non-terminal job. Returns how many were affected.
    ///
    /// Holds the state lock throughout: no job is admitted between two cancellations.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.shared.lock();
        let ids = state.registry.non_terminal_ids();
        ids.into_iter()
            .filter(|&id| {
                let before = state.registry.get_ref(id).map(|j| j.status);
                let after = self.shared.cancel_locked(&mut state, id).ok();
                after.is_some() && before != after
            })
            .count()
    }

    /// Changes the concurrency limit (1..=32). Never preempts running jobs;
    /// a raised limit admits waiting jobs right away.
    pub fn set_max_concurrency(&self, n: usize) -> Result<(), QueueError> {
        let mut state = self.shared.lock();
        let previous = self.shared.limit.set(n)?;
        tracing::info!(previous, current = n, "max concurrency changed");
        self.shared.admit_waiting(&mut state);
        Ok(())
    }

    pub fn max_concurrency(&self) -> usize {
        self.shared.limit.get()
    }

    /// Whether post-processing steps are enabled for new admissions.
    pub fn processor_available(&self) -> bool {
        self.shared.has_processor
    }

    pub fn get(&self, id: JobId) -> Result<Job, QueueError> {
        self.shared.lock().registry.get(id)
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.shared.lock().registry.list()
    }

    pub fn counts(&self) -> JobCounts {
        self.shared.lock().registry.counts()
    }

    /// Subscribes to every event emitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.lock().observers.subscribe()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispatcher.abort();
        let running = self.shared.control.running();
        if running > 0 {
            tracing::debug!(running, "scheduler dropped; aborting running workers");
        }
        for id in self.shared.lock().registry.non_terminal_ids() {
            self.shared.control.request_abort(id);
        }
    }
}
