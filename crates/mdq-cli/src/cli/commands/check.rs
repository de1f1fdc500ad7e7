//! `mdq check` – report what the queue will be able to do on this machine.

use anyhow::{bail, Result};
use mdq_core::config::{self, MdqConfig};
use mdq_core::engine::YtDlpEngine;
use mdq_core::{formats, logging};

pub fn run_check(cfg: &MdqConfig) -> Result<()> {
    let engine = YtDlpEngine::from_config(&cfg.engine);
    let version = engine.version();
    match &version {
        Some(v) => println!("downloader:     {} {}", cfg.engine.binary, v),
        None => println!("downloader:     {} NOT FOUND", cfg.engine.binary),
    }
    match formats::find_program(&cfg.engine.ffmpeg) {
        Some(path) => println!("post-processor: {}", path.display()),
        None => println!(
            "post-processor: {} not found (mp3 conversion, thumbnails and metadata are skipped)",
            cfg.engine.ffmpeg
        ),
    }
    println!("concurrency:    {}", cfg.max_concurrency);
    if let Ok(path) = config::config_path() {
        println!("config:         {}", path.display());
    }
    if let Ok(path) = logging::log_file_path() {
        println!("log:            {}", path.display());
    }

    if version.is_none() {
        bail!("install yt-dlp or set [engine].binary in the config");
    }
    Ok(())
}
