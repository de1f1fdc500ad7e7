//! Engine that reports progress in a tight loop until aborted, so an abort is
//! noticed (and the job finished) as early as possible.

use std::sync::atomic::{AtomicUsize, Ordering};

use mdq_core::engine::{
    DownloadEngine, EngineOutcome, EngineProgress, EngineRequest, ProgressCallback,
};
use mdq_core::error::EngineError;

#[derive(Default)]
pub struct SpinningEngine {
    calls: AtomicUsize,
}

impl SpinningEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DownloadEngine for SpinningEngine {
    fn download(
        &self,
        _request: &EngineRequest,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<EngineOutcome, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sample = EngineProgress {
            downloaded_bytes: 10,
            total_bytes: Some(100),
            ..Default::default()
        };
        loop {
            on_progress(sample).map_err(|_| EngineError::Cancelled)?;
            std::hint::spin_loop();
        }
    }
}
