//! Download engine driven by the test instead of the network.
//!
//! Each call reports 25% and 50%, then parks until the test releases its URL
//! (or the worker is aborted), then reports 100% and succeeds. URLs whose path
//! contains `fail` end with an engine failure instead.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use mdq_core::engine::{
    DownloadEngine, EngineOutcome, EngineProgress, EngineRequest, ProgressCallback,
};
use mdq_core::error::EngineError;

pub const FAILURE_MESSAGE: &str = "ERROR: [generic] Unable to download webpage: HTTP Error 404";

#[derive(Default)]
struct Gates {
    open_all: bool,
    released: HashSet<String>,
}

#[derive(Default)]
pub struct ScriptedEngine {
    gates: Mutex<Gates>,
    cond: Condvar,
    requests: Mutex<Vec<EngineRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    work: Duration,
}

impl ScriptedEngine {
    /// Every call parks until released.
    pub fn gated() -> Self {
        Self::default()
    }

    /// Every call runs straight through, taking roughly `work`.
    pub fn instant(work: Duration) -> Self {
        Self {
            gates: Mutex::new(Gates {
                open_all: true,
                released: HashSet::new(),
            }),
            work,
            ..Self::default()
        }
    }

    pub fn release(&self, url: &str) {
        self.gates.lock().unwrap().released.insert(url.to_string());
        self.cond.notify_all();
    }

    pub fn release_all(&self) {
        self.gates.lock().unwrap().open_all = true;
        self.cond.notify_all();
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn started_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn is_released(&self, url: &str) -> bool {
        let gates = self.gates.lock().unwrap();
        gates.open_all || gates.released.contains(url)
    }

    fn run(
        &self,
        request: &EngineRequest,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<EngineOutcome, EngineError> {
        let sample = |done: u64| EngineProgress {
            downloaded_bytes: done,
            total_bytes: Some(100),
            speed: Some(1_500_000.0),
            eta: Some((100 - done) / 10),
            ..Default::default()
        };
        for done in [25, 50] {
            on_progress(sample(done)).map_err(|_| EngineError::Cancelled)?;
        }

        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
        // Park, re-reporting progress so an abort request is noticed.
        while !self.is_released(&request.url) {
            let gates = self.gates.lock().unwrap();
            let _ = self
                .cond
                .wait_timeout(gates, Duration::from_millis(10))
                .unwrap();
            on_progress(sample(50)).map_err(|_| EngineError::Cancelled)?;
        }

        if request.url.contains("fail") {
            return Err(EngineError::failure(FAILURE_MESSAGE));
        }
        on_progress(sample(100)).map_err(|_| EngineError::Cancelled)?;
        Ok(EngineOutcome {
            output_file: Some(PathBuf::from(format!(
                "/downloads/{}.mp4",
                request.url.rsplit('/').next().unwrap_or("video")
            ))),
        })
    }
}

impl DownloadEngine for ScriptedEngine {
    fn download(
        &self,
        request: &EngineRequest,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<EngineOutcome, EngineError> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.run(request, on_progress);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
