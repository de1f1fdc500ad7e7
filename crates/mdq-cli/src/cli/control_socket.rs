//! Control socket: server (during `mdq get`) and client (for `mdq cancel` and friends).
//! Protocol: one command per line, one reply line per command.
//! Commands: "cancel <id>", "cancel-all", "start-all", "concurrency <n>".
//! Replies start with "ok" or "error".

use anyhow::{bail, Context, Result};
use mdq_core::job::JobId;
use mdq_core::scheduler::Scheduler;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Cancel(JobId),
    CancelAll,
    StartAll,
    Concurrency(usize),
}

impl ControlCommand {
    /// Parses one protocol line. Returns None for malformed lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let cmd = match (parts.next()?, parts.next()) {
            ("cancel", Some(id)) => ControlCommand::Cancel(id.parse().ok()?),
            ("cancel-all", None) => ControlCommand::CancelAll,
            ("start-all", None) => ControlCommand::StartAll,
            ("concurrency", Some(n)) => ControlCommand::Concurrency(n.parse().ok()?),
            _ => return None,
        };
        parts.next().is_none().then_some(cmd)
    }

    pub fn to_line(self) -> String {
        match self {
            ControlCommand::Cancel(id) => format!("cancel {}\n", id),
            ControlCommand::CancelAll => "cancel-all\n".to_string(),
            ControlCommand::StartAll => "start-all\n".to_string(),
            ControlCommand::Concurrency(n) => format!("concurrency {}\n", n),
        }
    }

    /// Applies the command and returns the reply line (without newline).
    pub fn apply(self, scheduler: &Scheduler) -> String {
        match self {
            ControlCommand::Cancel(id) => match scheduler.cancel(id) {
                Ok(status) => format!("ok job {} {}", id, status.as_str()),
                Err(e) => format!("error {}", e),
            },
            ControlCommand::CancelAll => format!("ok {} job(s) cancelled", scheduler.cancel_all()),
            ControlCommand::StartAll => format!("ok {} job(s) started", scheduler.start_all()),
            ControlCommand::Concurrency(n) => match scheduler.set_max_concurrency(n) {
                Ok(()) => format!("ok max concurrency {}", n),
                Err(e) => format!("error {}", e),
            },
        }
    }
}

/// Spawns a task that listens on `path` and applies each command line to `scheduler`.
pub fn spawn_control_listener(
    scheduler: Arc<Scheduler>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("control socket bind {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let scheduler = Arc::clone(&scheduler);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &scheduler).await {
                            tracing::debug!("control connection: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(stream: UnixStream, scheduler: &Scheduler) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match ControlCommand::parse(line.trim()) {
            Some(cmd) => {
                tracing::info!(command = ?cmd, "control command");
                cmd.apply(scheduler)
            }
            None => format!("error unknown command: {}", line.trim()),
        };
        write.write_all(format!("{}\n", reply).as_bytes()).await?;
    }
    Ok(())
}

/// Sends one command and returns the reply line.
pub async fn send(socket_path: &Path, cmd: ControlCommand) -> Result<String> {
    if !socket_path.exists() {
        bail!(
            "no running `mdq get` (control socket {} not found)",
            socket_path.display()
        );
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write.write_all(cmd.to_line().as_bytes()).await?;
    write.shutdown().await?;
    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .unwrap_or_default();
    Ok(reply)
}
