//! External downloading engine boundary.
//!
//! The scheduler treats the engine as a blocking black box: it receives a
//! per-job [`EngineRequest`], reports byte-level progress through a callback,
//! and finishes with an outcome. The callback returning `Err(JobAborted)` is
//! the cooperative cancellation point; the engine must stop there and return
//! [`EngineError::Cancelled`].

mod options;
mod ytdlp;

use std::path::PathBuf;

use crate::control::JobAborted;
use crate::error::EngineError;

pub use options::{EngineOptions, Postprocessor, OUTPUT_TEMPLATE};
pub use ytdlp::{parse_progress_line, YtDlpEngine, PROGRESS_PREFIX};

/// Everything the engine needs for one job. Plain data; building it has no side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub url: String,
    pub options: EngineOptions,
}

/// One progress sample from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Used when `total_bytes` is unknown.
    pub total_bytes_estimate: Option<u64>,
    pub speed: Option<f64>,
    pub eta: Option<u64>,
}

impl EngineProgress {
    /// Exact total if known, else the estimate.
    pub fn best_total(&self) -> Option<u64> {
        self.total_bytes.or(self.total_bytes_estimate)
    }
}

/// Successful engine run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineOutcome {
    /// Final file written, when the engine reports it.
    pub output_file: Option<PathBuf>,
}

/// Progress callback handed to the engine.
pub type ProgressCallback<'a> = dyn FnMut(EngineProgress) -> Result<(), JobAborted> + 'a;

/// A blocking downloader invoked once per job, possibly from many threads at once.
pub trait DownloadEngine: Send + Sync {
    fn download(
        &self,
        request: &EngineRequest,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<EngineOutcome, EngineError>;
}
