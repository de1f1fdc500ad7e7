#![allow(dead_code)]

pub mod scripted_engine;
pub mod spinning_engine;

use std::time::Duration;

use mdq_core::job::{JobId, JobStatus};
use mdq_core::scheduler::Scheduler;

pub const WAIT: Duration = Duration::from_secs(10);

/// Polls `cond` until it holds or `WAIT` elapses.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_status(scheduler: &Scheduler, id: JobId, status: JobStatus) {
    wait_until(&format!("job {} to be {}", id, status.as_str()), || {
        scheduler.get(id).map(|j| j.status) == Ok(status)
    })
    .await;
}

pub async fn wait_all_terminal(scheduler: &Scheduler) {
    wait_until("all jobs terminal", || scheduler.counts().all_terminal()).await;
}
