//! Job entity: identity, immutable parameters and mutable status.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::formats::{ContainerFormat, DEFAULT_RESOLUTION};

/// Job identifier: a sequence number assigned at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Starting,
    Downloading,
    Completed,
    Error,
    Cancelling,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, Error or Cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Occupies a worker slot.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Starting | JobStatus::Downloading | JobStatus::Cancelling
        )
    }

    /// Whether `self -> next` is an edge of the job state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Starting)
                | (Queued, Cancelled)
                | (Starting, Downloading)
                | (Starting, Completed)
                | (Starting, Error)
                | (Starting, Cancelling)
                | (Downloading, Completed)
                | (Downloading, Error)
                | (Downloading, Cancelling)
                | (Cancelling, Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known progress sample. Replaced as a whole on every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// 0..=100.
    pub percent: u8,
    pub speed_bytes_per_sec: Option<f64>,
    pub eta_seconds: Option<u64>,
    /// Known or estimated total size.
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
}

impl Progress {
    /// `floor(downloaded * 100 / total)` when total is known and positive, else 0.
    pub fn percent_of(downloaded: u64, total: Option<u64>) -> u8 {
        match total {
            Some(t) if t > 0 => {
                let pct = (downloaded as u128 * 100) / t as u128;
                pct.min(100) as u8
            }
            _ => 0,
        }
    }
}

/// Immutable per-job parameters fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParams {
    /// Snapshot of the output directory at creation time.
    pub output_dir: PathBuf,
    pub resolution_label: String,
    pub container: ContainerFormat,
    /// Engine browser key (already mapped from the user label).
    pub cookies_browser: Option<String>,
    pub embed_thumbnail: bool,
    pub add_metadata: bool,
}

impl JobParams {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            resolution_label: DEFAULT_RESOLUTION.to_string(),
            container: ContainerFormat::Auto,
            cookies_browser: None,
            embed_thumbnail: false,
            add_metadata: false,
        }
    }
}

/// Payload attached to a Completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub url: String,
    /// Final file reported by the engine, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

/// Snapshot of one job as held by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub params: JobParams,
    pub status: JobStatus,
    pub progress: Progress,
    /// Human-readable explanation for Error and Cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl Job {
    pub(crate) fn new(id: JobId, url: String, params: JobParams) -> Self {
        Self {
            id,
            url,
            params,
            status: JobStatus::Queued,
            progress: Progress::default(),
            message: None,
            result: None,
        }
    }
}
