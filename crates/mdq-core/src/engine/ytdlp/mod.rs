//! `yt-dlp` subprocess binding.
//!
//! Runs the downloader with a machine-readable progress template, parses its
//! stdout line by line on the calling (blocking) thread, drains stderr on a
//! helper thread, and kills the child when the progress callback aborts.

mod parse;

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::formats;

use super::{
    DownloadEngine, EngineOptions, EngineOutcome, EngineRequest, Postprocessor, ProgressCallback,
};

pub use parse::{parse_progress_line, PROGRESS_PREFIX};

const PROGRESS_TEMPLATE: &str = "download:mdq-progress %(progress.downloaded_bytes)s \
%(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.speed)s %(progress.eta)s";
const FILE_TEMPLATE: &str = "after_move:mdq-file %(filepath)s";

/// Engine binding that shells out to `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_location: None,
        }
    }

    /// Uses the configured binary; passes `--ffmpeg-location` when ffmpeg is configured as a path.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        let ffmpeg_location = if cfg.ffmpeg.contains(std::path::MAIN_SEPARATOR) {
            formats::find_program(&cfg.ffmpeg)
        } else {
            None
        };
        Self {
            binary: PathBuf::from(&cfg.binary),
            ffmpeg_location,
        }
    }

    /// Whether the binary can be executed (`--version` exits successfully).
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Version string reported by the binary, if it runs.
    pub fn version(&self) -> Option<String> {
        let out = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .ok()?;
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Command-line arguments for one request.
    pub fn args(&self, request: &EngineRequest) -> Vec<String> {
        let opts: &EngineOptions = &request.options;
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-colors".into(),
            "--quiet".into(),
            "--progress".into(),
            "--no-simulate".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "--print".into(),
            FILE_TEMPLATE.into(),
            "-o".into(),
            opts.output_template.clone(),
            "-f".into(),
            opts.format.clone(),
        ];
        if let Some(merge) = opts.merge_output_format {
            args.push("--merge-output-format".into());
            args.push(merge.into());
        }
        for pp in &opts.postprocessors {
            match pp {
                Postprocessor::ExtractAudio { codec, quality } => {
                    args.push("-x".into());
                    args.push("--audio-format".into());
                    args.push((*codec).into());
                    args.push("--audio-quality".into());
                    args.push(format!("{}K", quality));
                }
                Postprocessor::EmbedThumbnail => args.push("--embed-thumbnail".into()),
                Postprocessor::Metadata => args.push("--embed-metadata".into()),
            }
        }
        if let Some(browser) = &opts.cookies_from_browser {
            args.push("--cookies-from-browser".into());
            args.push(browser.clone());
        }
        if let Some(loc) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(loc.to_string_lossy().into_owned());
        }
        args.push("--".into());
        args.push(request.url.clone());
        args
    }

    fn spawn(&self, request: &EngineRequest) -> Result<Child, EngineError> {
        Command::new(&self.binary)
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::Failure(format!(
                        "downloader not found: {} (install yt-dlp or set [engine].binary)",
                        self.binary.display()
                    ))
                } else {
                    EngineError::Failure(format!("failed to start {}: {}", self.binary.display(), e))
                }
            })
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

fn kill_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl DownloadEngine for YtDlpEngine {
    fn download(
        &self,
        request: &EngineRequest,
        on_progress: &mut ProgressCallback<'_>,
    ) -> Result<EngineOutcome, EngineError> {
        let mut child = self.spawn(request)?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::failure("stderr pipe missing"))?;
        let stderr_handle = thread::spawn(move || {
            BufReader::new(stderr)
                .lines()
                .map_while(Result::ok)
                .collect::<Vec<String>>()
        });

        let stdout = match child.stdout.take() {
            Some(s) => s,
            None => {
                kill_child(&mut child);
                return Err(EngineError::failure("stdout pipe missing"));
            }
        };

        let mut outcome = EngineOutcome::default();
        for line in BufReader::new(stdout).lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    tracing::debug!("downloader stdout read: {}", e);
                    break;
                }
            };
            if let Some(progress) = parse_progress_line(&line) {
                if on_progress(progress).is_err() {
                    // Grandchildren may still hold stderr open; the drain thread is left detached.
                    kill_child(&mut child);
                    return Err(EngineError::Cancelled);
                }
            } else if let Some(path) = parse::parse_file_line(&line) {
                outcome.output_file = Some(path);
            } else if !line.trim().is_empty() {
                tracing::trace!(url = %request.url, "downloader: {}", line);
            }
        }

        let status = child
            .wait()
            .map_err(|e| EngineError::Failure(format!("waiting for downloader: {}", e)))?;
        let stderr_lines = stderr_handle.join().unwrap_or_default();

        if status.success() {
            Ok(outcome)
        } else {
            let msg = parse::error_summary(&stderr_lines)
                .unwrap_or_else(|| format!("downloader exited with {}", status));
            Err(EngineError::Failure(msg))
        }
    }
}
