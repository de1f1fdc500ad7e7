use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::QueueError;
use crate::formats::{self, ContainerFormat, DEFAULT_RESOLUTION};
use crate::job::JobParams;

/// Default number of jobs running at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
/// Upper bound accepted for the concurrency limit.
pub const MAX_CONCURRENCY_LIMIT: usize = 32;
/// Default capacity of the worker -> scheduler event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Checks a concurrency limit is within 1..=32.
pub fn validate_max_concurrency(n: usize) -> Result<usize, QueueError> {
    if (1..=MAX_CONCURRENCY_LIMIT).contains(&n) {
        Ok(n)
    } else {
        Err(QueueError::InvalidArgument(format!(
            "max concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY_LIMIT, n
        )))
    }
}

/// External tools used by the engine binding (optional `[engine]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Downloader executable name or path.
    pub binary: String,
    /// Media processor used for post-processing; steps are skipped when missing.
    pub ffmpeg: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/mdq/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdqConfig {
    /// Maximum number of jobs in Starting/Downloading/Cancelling at once (1..=32).
    pub max_concurrency: usize,
    /// Output directory for new jobs (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Default resolution label ("2160p" .. "360p", "Audio only").
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default)]
    pub container: ContainerFormat,
    /// Browser label to read cookies from ("chrome", "firefox", ...).
    #[serde(default)]
    pub cookies_from: Option<String>,
    #[serde(default)]
    pub embed_thumbnail: bool,
    #[serde(default)]
    pub add_metadata: bool,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Worker -> scheduler channel capacity. Workers block when it is full.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_resolution() -> String {
    DEFAULT_RESOLUTION.to_string()
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for MdqConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            download_dir: None,
            resolution: default_resolution(),
            container: ContainerFormat::Auto,
            cookies_from: None,
            embed_thumbnail: false,
            add_metadata: false,
            engine: EngineConfig::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl MdqConfig {
    pub fn validate(&self) -> Result<(), QueueError> {
        validate_max_concurrency(self.max_concurrency)?;
        if self.event_buffer == 0 {
            return Err(QueueError::InvalidArgument(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Default job parameters, with `fallback_dir` used when no download_dir is configured.
    pub fn job_params(&self, fallback_dir: &Path) -> JobParams {
        JobParams {
            output_dir: self
                .download_dir
                .clone()
                .unwrap_or_else(|| fallback_dir.to_path_buf()),
            resolution_label: self.resolution.clone(),
            container: self.container,
            cookies_browser: self
                .cookies_from
                .as_deref()
                .and_then(formats::browser_key_from_label)
                .map(str::to_string),
            embed_thumbnail: self.embed_thumbnail,
            add_metadata: self.add_metadata,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from `path`, creating a default file if none exists.
pub fn load_or_init_at(path: &Path) -> Result<MdqConfig> {
    if !path.exists() {
        let default_cfg = MdqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: MdqConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdqConfig> {
    load_or_init_at(&config_path()?)
}
