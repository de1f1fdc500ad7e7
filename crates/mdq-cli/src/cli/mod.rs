//! CLI for the MDQ media download queue.

mod commands;
mod control_socket;
mod format;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mdq_core::config;
use mdq_core::formats::ContainerFormat;
use mdq_core::job::JobId;
use std::path::PathBuf;

use commands::{run_check, run_get, send_control};
use control_socket::ControlCommand;

/// Top-level CLI for the MDQ media download queue.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: bounded-concurrency media download queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more media URLs through the queue.
    Get(GetArgs),

    /// Cancel a job in a running `mdq get`.
    Cancel {
        /// Job identifier.
        id: u64,
    },

    /// Cancel every unfinished job in a running `mdq get`.
    CancelAll,

    /// Admit every queued job the concurrency limit allows.
    StartAll,

    /// Change the concurrency limit of a running `mdq get` (1-32).
    Concurrency {
        #[arg(value_name = "N")]
        limit: usize,
    },

    /// Report downloader and post-processor availability.
    Check,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Media page URLs. Invalid entries are reported and skipped.
    pub urls: Vec<String>,

    /// Read additional URLs from a file, one per line.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Run up to N downloads at once (default from config, 5).
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Resolution label: 2160p, 1440p, 1080p, 720p, 480p, 360p or "Audio only".
    #[arg(long, value_name = "LABEL")]
    pub resolution: Option<String>,

    /// Output container: auto, mp4, webm or mp3.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ContainerFormat>,

    /// Read cookies from this browser (safari, chrome, chromium, brave, edge, firefox).
    #[arg(long, value_name = "BROWSER")]
    pub cookies: Option<String>,

    #[arg(long)]
    pub embed_thumbnail: bool,

    #[arg(long)]
    pub add_metadata: bool,

    /// Download directory (default from config, else the current directory).
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print events as JSON lines instead of progress text.
    #[arg(long)]
    pub json: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_get(&cfg, args).await?;
            }
            CliCommand::Cancel { id } => send_control(ControlCommand::Cancel(JobId(id))).await?,
            CliCommand::CancelAll => send_control(ControlCommand::CancelAll).await?,
            CliCommand::StartAll => send_control(ControlCommand::StartAll).await?,
            CliCommand::Concurrency { limit } => {
                config::validate_max_concurrency(limit)?;
                send_control(ControlCommand::Concurrency(limit)).await?;
            }
            CliCommand::Check => {
                let cfg = config::load_or_init()?;
                run_check(&cfg)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
