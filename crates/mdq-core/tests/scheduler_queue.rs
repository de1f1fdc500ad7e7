//! Integration tests: scheduler admission, cancellation and event ordering
//! against a scripted engine.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::scripted_engine::{ScriptedEngine, FAILURE_MESSAGE};
use common::spinning_engine::SpinningEngine;
use common::{wait_all_terminal, wait_for_status, wait_until};
use mdq_core::engine::DownloadEngine;
use mdq_core::error::QueueError;
use mdq_core::formats::{ContainerFormat, AUDIO_ONLY_SELECTOR};
use mdq_core::job::{JobId, JobParams, JobStatus};
use mdq_core::scheduler::{EventKind, Scheduler};

fn scheduler(engine: &Arc<ScriptedEngine>, max: usize) -> Scheduler {
    Scheduler::builder()
        .max_concurrency(max)
        .processor_available(false)
        .build(Arc::clone(engine) as Arc<dyn DownloadEngine>)
        .unwrap()
}

fn params() -> JobParams {
    JobParams::new("/downloads")
}

fn url(name: &str) -> String {
    format!("https://example.com/{}", name)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_slot_admits_in_creation_order() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 1);
    let a = s.submit(&url("a"), params()).unwrap();
    let b = s.submit(&url("b"), params()).unwrap();
    let c = s.submit(&url("c"), params()).unwrap();

    wait_for_status(&s, a, JobStatus::Downloading).await;
    assert_eq!(s.get(b).unwrap().status, JobStatus::Queued);
    assert_eq!(s.get(c).unwrap().status, JobStatus::Queued);
    assert_eq!(engine.calls(), 1);

    engine.release(&url("a"));
    wait_for_status(&s, b, JobStatus::Downloading).await;
    assert_eq!(s.get(a).unwrap().status, JobStatus::Completed);
    assert_eq!(s.get(c).unwrap().status, JobStatus::Queued);

    engine.release_all();
    wait_all_terminal(&s).await;
    assert_eq!(engine.started_urls(), vec![url("a"), url("b"), url("c")]);
    assert_eq!(engine.max_in_flight(), 1);
    assert_eq!(s.counts().completed, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_queued_job_never_reaches_engine() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 1);
    let a = s.submit(&url("a"), params()).unwrap();
    let b = s.submit(&url("b"), params()).unwrap();

    assert_eq!(s.cancel(b).unwrap(), JobStatus::Cancelled);
    let job = s.get(b).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.message.as_deref(), Some("cancelled before start"));

    engine.release_all();
    wait_for_status(&s, a, JobStatus::Completed).await;
    assert_eq!(engine.calls(), 1);
    assert_eq!(engine.started_urls(), vec![url("a")]);
    // Cancelling again is a no-op.
    assert_eq!(s.cancel(b).unwrap(), JobStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_running_job_passes_through_cancelling() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 2);
    let mut events = s.subscribe();
    let a = s.submit(&url("a"), params()).unwrap();
    wait_for_status(&s, a, JobStatus::Downloading).await;

    assert_eq!(s.cancel(a).unwrap(), JobStatus::Cancelling);
    wait_for_status(&s, a, JobStatus::Cancelled).await;

    let statuses: Vec<JobStatus> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::Status(st) => Some(st),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            JobStatus::Queued,
            JobStatus::Starting,
            JobStatus::Downloading,
            JobStatus::Cancelling,
            JobStatus::Cancelled,
        ]
    );
    let counts = s.counts();
    assert_eq!(counts.cancelled, 1);
    assert_eq!(counts.errors, 0);
    assert_eq!(engine.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outcome_after_cancel_request_is_cancelled() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 1);
    let f = s.submit(&url("fail"), params()).unwrap();
    wait_for_status(&s, f, JobStatus::Downloading).await;
    s.cancel(f).unwrap();
    engine.release_all();
    wait_all_terminal(&s).await;
    assert_eq!(s.get(f).unwrap().status, JobStatus::Cancelled);
    assert_eq!(s.counts().errors, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mp3_without_processor_completes_with_plain_audio() {
    let engine = Arc::new(ScriptedEngine::instant(Duration::ZERO));
    let s = scheduler(&engine, 1);
    let mut p = params();
    p.container = ContainerFormat::Mp3;
    p.embed_thumbnail = true;
    p.add_metadata = true;
    let id = s.submit(&url("song"), p).unwrap();
    wait_for_status(&s, id, JobStatus::Completed).await;

    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    let options = &requests[0].options;
    assert_eq!(options.format, AUDIO_ONLY_SELECTOR);
    assert!(options.postprocessors.is_empty());
    assert!(options.merge_output_format.is_none());
    assert!(!s.processor_available());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lowering_limit_never_preempts() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 3);
    let ids: Vec<JobId> = (0..4)
        .map(|i| s.submit(&url(&format!("v{}", i)), params()).unwrap())
        .collect();
    wait_until("three workers running", || engine.in_flight() == 3).await;

    s.set_max_concurrency(2).unwrap();
    assert_eq!(s.max_concurrency(), 2);
    assert_eq!(s.counts().active, 3);
    assert_eq!(s.get(ids[3]).unwrap().status, JobStatus::Queued);

    // One slot frees, but 2 are still active: nothing new is admitted.
    engine.release(&url("v0"));
    wait_for_status(&s, ids[0], JobStatus::Completed).await;
    assert_eq!(s.counts().active, 2);
    assert_eq!(s.get(ids[3]).unwrap().status, JobStatus::Queued);

    engine.release(&url("v1"));
    wait_for_status(&s, ids[3], JobStatus::Downloading).await;
    engine.release_all();
    wait_all_terminal(&s).await;
    assert_eq!(s.counts().completed, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raising_limit_admits_waiting_jobs_immediately() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 1);
    for i in 0..3 {
        s.submit(&url(&format!("v{}", i)), params()).unwrap();
    }
    assert_eq!(s.counts().queued, 2);
    s.set_max_concurrency(3).unwrap();
    assert_eq!(s.counts().queued, 0);
    assert_eq!(s.counts().active, 3);
    engine.release_all();
    wait_all_terminal(&s).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn out_of_range_limit_is_rejected() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 4);
    assert!(matches!(
        s.set_max_concurrency(0),
        Err(QueueError::InvalidArgument(_))
    ));
    assert!(s.set_max_concurrency(33).is_err());
    assert_eq!(s.max_concurrency(), 4);
    assert!(Scheduler::builder()
        .max_concurrency(0)
        .build(Arc::clone(&engine) as Arc<dyn DownloadEngine>)
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_url_creates_no_job() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 1);
    let mut events = s.subscribe();
    assert!(matches!(
        s.submit("notaurl", params()),
        Err(QueueError::InvalidUrl(_))
    ));
    assert!(s.submit("ftp://example.com/x", params()).is_err());
    assert!(s.list().is_empty());
    assert!(events.drain().is_empty());

    let id = s.submit(&format!("  {}  ", url("a")), params()).unwrap();
    assert_eq!(id, JobId(1));
    assert_eq!(s.get(id).unwrap().url, url("a"));
    engine.release_all();
    wait_all_terminal(&s).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_all_without_queued_jobs_does_nothing() {
    let engine = Arc::new(ScriptedEngine::instant(Duration::ZERO));
    let s = scheduler(&engine, 2);
    let mut events = s.subscribe();
    assert_eq!(s.start_all(), 0);
    assert!(events.drain().is_empty());

    let id = s.submit(&url("a"), params()).unwrap();
    wait_for_status(&s, id, JobStatus::Completed).await;
    events.drain();
    assert_eq!(s.start_all(), 0);
    assert!(events.drain().is_empty());
    assert_eq!(engine.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_is_monotonic_and_ends_at_100() {
    let engine = Arc::new(ScriptedEngine::instant(Duration::from_millis(5)));
    let s = scheduler(&engine, 2);
    let mut events = s.subscribe();
    let id = s.submit(&url("a"), params()).unwrap();

    let mut percents = Vec::new();
    let mut kinds = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(common::WAIT, events.recv()).await {
        assert_eq!(event.job_id, id);
        if let EventKind::Progress(p) = &event.kind {
            percents.push(p.percent);
        }
        let done = matches!(event.kind, EventKind::Finished(_));
        kinds.push(event.kind);
        if done {
            break;
        }
    }
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    assert_eq!(percents.last(), Some(&100));
    let n = kinds.len();
    assert!(n >= 3);
    assert!(matches!(kinds[n - 3], EventKind::Progress(_)));
    assert_eq!(kinds[n - 2], EventKind::Status(JobStatus::Completed));
    match &kinds[n - 1] {
        EventKind::Finished(result) => {
            assert_eq!(result.url, url("a"));
            assert!(result.output_file.is_some());
        }
        other => panic!("unexpected event {:?}", other),
    }
    let job = s.get(id).unwrap();
    assert_eq!(job.progress.percent, 100);
    assert!(job.result.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_failure_is_isolated_to_its_job() {
    let engine = Arc::new(ScriptedEngine::instant(Duration::ZERO));
    let s = scheduler(&engine, 2);
    let mut events = s.subscribe();
    let bad = s.submit(&url("fail"), params()).unwrap();
    let good = s.submit(&url("good"), params()).unwrap();
    wait_all_terminal(&s).await;

    let failed = s.get(bad).unwrap();
    assert_eq!(failed.status, JobStatus::Error);
    assert_eq!(failed.message.as_deref(), Some(FAILURE_MESSAGE));
    assert_eq!(s.get(good).unwrap().status, JobStatus::Completed);

    let failures: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::Failed(_)))
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].job_id, bad);

    let counts = s.counts();
    assert_eq!((counts.errors, counts.completed, counts.total), (1, 1, 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn running_jobs_never_exceed_limit() {
    let engine = Arc::new(ScriptedEngine::instant(Duration::from_millis(15)));
    let s = scheduler(&engine, 2);
    let mut events = s.subscribe();
    for i in 0..8 {
        s.submit(&url(&format!("v{}", i)), params()).unwrap();
        assert!(s.counts().active <= 2);
    }
    wait_all_terminal(&s).await;
    assert!(engine.max_in_flight() <= 2);
    assert_eq!(engine.calls(), 8);
    assert_eq!(s.counts().completed, 8);

    // Replay the event stream: Starting/terminal transitions never exceed the limit.
    let mut active = 0i32;
    for event in events.drain() {
        match event.kind {
            EventKind::Status(JobStatus::Starting) => active += 1,
            EventKind::Status(st) if st.is_terminal() => active -= 1,
            _ => {}
        }
        assert!((0..=2).contains(&active));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_all_covers_queued_and_running_jobs() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 1);
    let a = s.submit(&url("a"), params()).unwrap();
    s.submit(&url("b"), params()).unwrap();
    s.submit(&url("c"), params()).unwrap();
    wait_for_status(&s, a, JobStatus::Downloading).await;

    assert_eq!(s.cancel_all(), 3);
    wait_all_terminal(&s).await;
    let counts = s.counts();
    assert_eq!(counts.cancelled, 3);
    assert_eq!(engine.calls(), 1);
    // Nothing was left to admit.
    assert_eq!(s.cancel_all(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_all_never_admits_jobs_it_cancels() {
    for _ in 0..50 {
        let engine = Arc::new(SpinningEngine::default());
        let s = Scheduler::builder()
            .max_concurrency(1)
            .processor_available(false)
            .build(Arc::clone(&engine) as Arc<dyn DownloadEngine>)
            .unwrap();
        let mut events = s.subscribe();
        let a = s.submit(&url("a"), params()).unwrap();
        for i in 0..5 {
            s.submit(&url(&format!("q{}", i)), params()).unwrap();
        }
        wait_for_status(&s, a, JobStatus::Downloading).await;

        assert_eq!(s.cancel_all(), 6);
        wait_all_terminal(&s).await;

        let started: Vec<JobId> = events
            .drain()
            .into_iter()
            .filter(|e| e.kind == EventKind::Status(JobStatus::Starting))
            .map(|e| e.job_id)
            .collect();
        assert_eq!(started, vec![a]);
        assert_eq!(engine.calls(), 1);
        assert_eq!(s.counts().cancelled, 6);
        for job in s.list().into_iter().filter(|j| j.id != a) {
            assert_eq!(job.message.as_deref(), Some("cancelled before start"));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_job_is_not_found() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 1);
    assert_eq!(s.cancel(JobId(9)), Err(QueueError::NotFound(JobId(9))));
    assert_eq!(s.get(JobId(9)), Err(QueueError::NotFound(JobId(9))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_scheduler_aborts_running_workers() {
    let engine = Arc::new(ScriptedEngine::gated());
    let s = scheduler(&engine, 2);
    let a = s.submit(&url("a"), params()).unwrap();
    wait_for_status(&s, a, JobStatus::Downloading).await;
    drop(s);
    wait_until("worker to stop", || engine.in_flight() == 0).await;
}
