//! `mdq get` – download URLs through the queue, printing progress until every job is done.

use anyhow::{anyhow, bail, Context, Result};
use mdq_core::config::MdqConfig;
use mdq_core::engine::YtDlpEngine;
use mdq_core::formats::{self, ContainerFormat};
use mdq_core::job::{JobId, JobParams, JobStatus};
use mdq_core::scheduler::{EventKind, JobEvent, Scheduler, SchedulerBuilder};
use mdq_core::url_model;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::control_socket;
use crate::cli::format::{human_bytes, human_eta, human_rate};
use crate::cli::GetArgs;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run_get(cfg: &MdqConfig, args: GetArgs) -> Result<()> {
    let mut candidates = args.urls.clone();
    if let Some(path) = &args.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read URL list {}", path.display()))?;
        candidates.extend(url_model::split_url_lines(&text));
    }
    let (urls, invalid) = url_model::partition_urls(candidates);
    for bad in &invalid {
        eprintln!("skipping invalid URL: {}", bad);
    }
    if urls.is_empty() {
        bail!("no valid URLs to download");
    }

    let params = job_params(cfg, &args, std::env::current_dir()?)?;
    std::fs::create_dir_all(&params.output_dir)
        .with_context(|| format!("create {}", params.output_dir.display()))?;

    let engine = YtDlpEngine::from_config(&cfg.engine);
    if !engine.is_available() {
        bail!(
            "downloader `{}` not found; install yt-dlp or set [engine].binary",
            cfg.engine.binary
        );
    }

    let mut builder = SchedulerBuilder::from_config(cfg);
    if let Some(n) = args.jobs {
        builder = builder.max_concurrency(n);
    }
    let scheduler = Arc::new(builder.build(Arc::new(engine))?);
    let wants_processing = params.container == ContainerFormat::Mp3
        || params.embed_thumbnail
        || params.add_metadata;
    if wants_processing && !scheduler.processor_available() {
        eprintln!(
            "note: {} not found; post-processing is skipped",
            cfg.engine.ffmpeg
        );
    }

    let mut events = scheduler.subscribe();
    let control = start_control_socket(&scheduler);

    for url in &urls {
        let id = scheduler.submit(url, params.clone())?;
        tracing::debug!(job_id = %id, url = %url, "submitted");
    }

    let mut printer = EventPrinter::new(args.json);
    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    let mut interrupted = false;
    while !scheduler.counts().all_terminal() {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => printer.print(&event),
                None => break,
            },
            _ = &mut ctrl_c => {
                if interrupted {
                    bail!("interrupted twice; exiting without waiting for workers");
                }
                interrupted = true;
                let n = scheduler.cancel_all();
                eprintln!("interrupted: cancelling {} job(s) (Ctrl-C again to exit now)", n);
                ctrl_c = Box::pin(tokio::signal::ctrl_c());
            }
        }
    }
    for event in events.drain() {
        printer.print(&event);
    }

    if let Some((path, handle)) = control {
        handle.abort();
        let _ = std::fs::remove_file(path);
    }

    let counts = scheduler.counts();
    if !args.json {
        println!(
            "{} completed, {} failed, {} cancelled ({} total)",
            counts.completed, counts.errors, counts.cancelled, counts.total
        );
    }
    if counts.errors > 0 {
        bail!("{} download(s) failed", counts.errors);
    }
    Ok(())
}

/// Config defaults overridden by command-line flags.
pub(crate) fn job_params(cfg: &MdqConfig, args: &GetArgs, cwd: PathBuf) -> Result<JobParams> {
    let mut params = cfg.job_params(&cwd);
    if let Some(dir) = &args.output {
        params.output_dir = dir.clone();
    }
    if let Some(label) = &args.resolution {
        if !formats::RESOLUTION_LABELS.contains(&label.as_str()) {
            eprintln!(
                "unknown resolution {:?}; using {}",
                label,
                formats::DEFAULT_RESOLUTION
            );
        }
        params.resolution_label = label.clone();
    }
    if let Some(container) = args.format {
        params.container = container;
    }
    if let Some(browser) = &args.cookies {
        let key = formats::browser_key_from_label(browser)
            .ok_or_else(|| anyhow!("unsupported cookies browser: {}", browser))?;
        params.cookies_browser = Some(key.to_string());
    }
    params.embed_thumbnail |= args.embed_thumbnail;
    params.add_metadata |= args.add_metadata;
    Ok(params)
}

fn start_control_socket(
    scheduler: &Arc<Scheduler>,
) -> Option<(PathBuf, tokio::task::JoinHandle<()>)> {
    let path = mdq_core::control::default_control_socket_path().ok()?;
    match control_socket::spawn_control_listener(Arc::clone(scheduler), &path) {
        Ok(handle) => {
            tracing::debug!(path = %path.display(), "control socket listening");
            Some((path, handle))
        }
        Err(e) => {
            tracing::warn!("control socket unavailable: {:#}", e);
            None
        }
    }
}

struct EventPrinter {
    json: bool,
    last_progress: HashMap<JobId, Instant>,
}

impl EventPrinter {
    fn new(json: bool) -> Self {
        Self {
            json,
            last_progress: HashMap::new(),
        }
    }

    fn print(&mut self, event: &JobEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("event not serializable: {}", e),
            }
            return;
        }
        if let EventKind::Progress(p) = &event.kind {
            let now = Instant::now();
            let due = p.percent >= 100
                || self
                    .last_progress
                    .get(&event.job_id)
                    .map_or(true, |t| now.duration_since(*t) >= PROGRESS_INTERVAL);
            if !due {
                return;
            }
            self.last_progress.insert(event.job_id, now);
        }
        if let Some(line) = render_event(event) {
            println!("{}", line);
        }
    }
}

/// One line of terminal output for an event, if it is worth showing.
pub(crate) fn render_event(event: &JobEvent) -> Option<String> {
    let id = event.job_id;
    let line = match &event.kind {
        EventKind::Status(JobStatus::Downloading) => return None,
        EventKind::Status(status) => format!("[{}] {}", id, status.as_str()),
        EventKind::Progress(p) => format!(
            "[{}] {:>3}%  {} / {}  {}  ETA {}",
            id,
            p.percent,
            human_bytes(Some(p.downloaded_bytes as f64)),
            human_bytes(p.total_bytes.map(|t| t as f64)),
            human_rate(p.speed_bytes_per_sec),
            human_eta(p.eta_seconds)
        ),
        EventKind::Finished(result) => match &result.output_file {
            Some(path) => format!("[{}] saved {}", id, path.display()),
            None => format!("[{}] done {}", id, result.url),
        },
        EventKind::Failed(msg) => format!("[{}] error: {}", id, msg),
    };
    Some(line)
}
