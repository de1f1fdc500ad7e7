pub mod config;
pub mod logging;

pub mod control;
pub mod engine;
pub mod error;
pub mod formats;
pub mod job;
pub mod registry;
pub mod scheduler;
pub mod url_model;
