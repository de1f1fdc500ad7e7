//! CLI command handlers.

mod check;
mod control;
mod get;

pub use check::run_check;
pub use control::send_control;
pub use get::run_get;

#[cfg(test)]
pub(crate) use get::{job_params, render_event};
