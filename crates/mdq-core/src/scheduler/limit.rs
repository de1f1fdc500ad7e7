//! Concurrency limit shared by the admission step and callers.
//!
//! A single atomic scalar: callers may change it at any time, admission reads
//! it each time a slot could be filled. Lowering it never preempts running jobs.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::validate_max_concurrency;
use crate::error::QueueError;

#[derive(Debug)]
pub struct ConcurrencyLimit {
    max: AtomicUsize,
}

impl ConcurrencyLimit {
    /// Create a limit; `max` must be within 1..=32.
    pub fn new(max: usize) -> Result<Self, QueueError> {
        Ok(Self {
            max: AtomicUsize::new(validate_max_concurrency(max)?),
        })
    }

    pub fn get(&self) -> usize {
        self.max.load(Ordering::Acquire)
    }

    /// Replace the limit. Returns the previous value.
    pub fn set(&self, max: usize) -> Result<usize, QueueError> {
        let max = validate_max_concurrency(max)?;
        Ok(self.max.swap(max, Ordering::AcqRel))
    }

    /// Free slots given the current number of active jobs (0 when over the limit).
    pub fn available(&self, active: usize) -> usize {
        self.get().saturating_sub(active)
    }
}
