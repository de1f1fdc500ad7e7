//! Authoritative job registry: append-only, creation-ordered.
//!
//! Owned by the scheduler behind a single lock. Counts are always derived
//! from job statuses, never stored.

use serde::Serialize;

use crate::error::QueueError;
use crate::job::{Job, JobId, JobParams, JobStatus};
use crate::url_model;

/// Derived status counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobCounts {
    pub queued: usize,
    /// Starting, Downloading or Cancelling.
    pub active: usize,
    pub completed: usize,
    pub errors: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl JobCounts {
    /// True when no job can make further progress.
    pub fn all_terminal(&self) -> bool {
        self.queued == 0 && self.active == 0
    }
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
    last_id: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `url` and appends a Queued job. No id is consumed on failure.
    pub fn create(&mut self, url: &str, params: JobParams) -> Result<JobId, QueueError> {
        if !url_model::is_valid_url(url) {
            return Err(QueueError::InvalidUrl(url.to_string()));
        }
        self.last_id += 1;
        let id = JobId(self.last_id);
        self.jobs.push(Job::new(id, url.trim().to_string(), params));
        Ok(id)
    }

    fn index_of(&self, id: JobId) -> Option<usize> {
        // Ids are assigned in increasing order and never removed.
        self.jobs.binary_search_by_key(&id, |j| j.id).ok()
    }

    pub fn get(&self, id: JobId) -> Result<Job, QueueError> {
        self.index_of(id)
            .map(|i| self.jobs[i].clone())
            .ok_or(QueueError::NotFound(id))
    }

    pub(crate) fn get_ref(&self, id: JobId) -> Option<&Job> {
        self.index_of(id).map(|i| &self.jobs[i])
    }

    pub(crate) fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.index_of(id).map(move |i| &mut self.jobs[i])
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.jobs.clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn counts(&self) -> JobCounts {
        let mut c = JobCounts {
            total: self.jobs.len(),
            ..JobCounts::default()
        };
        for job in &self.jobs {
            match job.status {
                JobStatus::Queued => c.queued += 1,
                JobStatus::Starting | JobStatus::Downloading | JobStatus::Cancelling => {
                    c.active += 1
                }
                JobStatus::Completed => c.completed += 1,
                JobStatus::Error => c.errors += 1,
                JobStatus::Cancelled => c.cancelled += 1,
            }
        }
        c
    }

    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_active()).count()
    }

    /// Earliest-created job still Queued (FIFO admission order).
    pub fn next_queued(&self) -> Option<JobId> {
        self.jobs
            .iter()
            .find(|j| j.status == JobStatus::Queued)
            .map(|j| j.id)
    }

    /// Ids of jobs that are not yet terminal, in creation order.
    pub fn non_terminal_ids(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|j| !j.status.is_terminal())
            .map(|j| j.id)
            .collect()
    }

    /// Moves a job to `next` if that is a legal edge. Returns whether the status changed.
    pub(crate) fn transition(&mut self, id: JobId, next: JobStatus) -> bool {
        let Some(job) = self.get_mut(id) else {
            return false;
        };
        if !job.status.can_transition_to(next) {
            tracing::debug!(
                job_id = %id,
                from = job.status.as_str(),
                to = next.as_str(),
                "ignoring illegal status transition"
            );
            return false;
        }
        job.status = next;
        true
    }
}
