use std::process::ExitCode;

use apicheck::cmd::{run, Cli};
use apicheck::log::{init_tracing, level_for};
use clap::Parser;
use tracing::error;

/// Configuration problems exit with this status; anything else unexpected exits with 1.
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(level_for(cli.verbose, cli.quiet));

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "apicheck failed");
            if e.is_configuration() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
