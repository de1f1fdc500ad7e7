//! `mdq cancel`, `cancel-all`, `start-all`, `concurrency` – forward one command to a running `mdq get`.

use anyhow::{bail, Result};

use crate::cli::control_socket::{self, ControlCommand};

pub async fn send_control(cmd: ControlCommand) -> Result<()> {
    let path = mdq_core::control::default_control_socket_path()?;
    let reply = control_socket::send(&path, cmd).await?;
    if let Some(msg) = reply.strip_prefix("error ") {
        bail!("{}", msg);
    }
    println!("{}", reply.strip_prefix("ok ").unwrap_or(&reply));
    Ok(())
}
