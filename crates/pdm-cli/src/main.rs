use pdm_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // File logging, falling back to stderr.
    logging::init();

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("pdm error: {:#}", err);
        std::process::exit(1);
    }
}
