use mdq_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Fall back to stderr when the state directory is not writable.
    if let Err(file_err) = logging::init_logging() {
        if let Err(err) = logging::init_logging_stderr() {
            eprintln!("mdq: logging disabled: {:#} ({:#})", err, file_err);
        }
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("mdq error: {:#}", err);
        std::process::exit(1);
    }
}
