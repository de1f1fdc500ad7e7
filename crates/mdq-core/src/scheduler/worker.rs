//! Worker: runs one admitted job through the engine on the blocking pool.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::control::{AbortToken, JobAborted};
use crate::engine::{DownloadEngine, EngineProgress, EngineRequest};
use crate::error::EngineError;
use crate::job::{JobId, JobResult, Progress};

use super::events::{WorkerEvent, WorkerMessage};

/// Snapshot handed to a worker at admission. The worker never sees the registry.
pub(crate) struct WorkerJob {
    pub job_id: JobId,
    pub request: EngineRequest,
    pub token: AbortToken,
}

/// Spawns the worker for `job` on `runtime`'s blocking pool. If the worker
/// dies without reporting (panic in the engine), a failure is reported in its place.
pub(crate) fn spawn_worker(
    runtime: &tokio::runtime::Handle,
    job: WorkerJob,
    engine: Arc<dyn DownloadEngine>,
    tx: mpsc::Sender<WorkerMessage>,
) {
    let job_id = job.job_id;
    let blocking_tx = tx.clone();
    let handle = runtime.spawn_blocking(move || run_job(job, engine.as_ref(), &blocking_tx));
    runtime.spawn(async move {
        if let Err(e) = handle.await {
            tracing::error!(job_id = %job_id, "worker task failed: {}", e);
            let _ = tx
                .send(WorkerMessage {
                    job_id,
                    event: WorkerEvent::Finished(Err(EngineError::Failure(format!(
                        "worker task failed: {}",
                        e
                    )))),
                })
                .await;
        }
    });
}

/// Runs the engine for one job and reports progress and exactly one outcome.
pub(crate) fn run_job(
    job: WorkerJob,
    engine: &dyn DownloadEngine,
    tx: &mpsc::Sender<WorkerMessage>,
) {
    let WorkerJob {
        job_id,
        request,
        token,
    } = job;

    let outcome = if token.is_aborted() {
        Err(EngineError::Cancelled)
    } else {
        tracing::debug!(job_id = %job_id, url = %request.url, "worker starting engine");
        let mut last_percent = 0u8;
        let mut on_progress = |p: EngineProgress| -> Result<(), JobAborted> {
            token.check()?;
            let progress = to_progress(&p, last_percent);
            last_percent = progress.percent;
            tx.blocking_send(WorkerMessage {
                job_id,
                event: WorkerEvent::Progress(progress),
            })
            // Scheduler is gone; nobody can observe this job any more.
            .map_err(|_| JobAborted)
        };
        engine.download(&request, &mut on_progress)
    };

    let result = match outcome {
        Ok(done) => {
            tracing::info!(job_id = %job_id, "job completed");
            Ok(JobResult {
                url: request.url.clone(),
                output_file: done.output_file,
            })
        }
        Err(EngineError::Cancelled) => {
            tracing::info!(job_id = %job_id, "job cancelled");
            Err(EngineError::Cancelled)
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, "job failed: {}", e);
            Err(e)
        }
    };

    let _ = tx.blocking_send(WorkerMessage {
        job_id,
        event: WorkerEvent::Finished(result),
    });
}

/// Converts an engine sample into a job progress record. Percent never goes
/// below `floor` so it stays monotonic for the job.
fn to_progress(p: &EngineProgress, floor: u8) -> Progress {
    let total = p.best_total();
    Progress {
        percent: Progress::percent_of(p.downloaded_bytes, total).max(floor),
        speed_bytes_per_sec: p.speed,
        eta_seconds: p.eta,
        total_bytes: total,
        downloaded_bytes: p.downloaded_bytes,
    }
}
