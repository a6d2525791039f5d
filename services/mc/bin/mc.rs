//! Main Entrypoint for the mc CLI
//!
//! This binary is responsible for:
//! 1. Parsing the command line.
//! 2. Loading configuration from the environment.
//! 3. Initializing logging on stderr.
//! 4. Running the command and mapping its result to an exit code.

use anyhow::Context;
use clap::Parser;
use misty_cli::{commands::Cli, commands::dispatch, config::Config};
use std::process::ExitCode;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env()
        .context("Failed to load configuration")?
        .with_address(cli.address.clone());

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    debug!(?config, "Configuration loaded.");

    // --- 3. Run Command ---
    let code = dispatch(cli, config).await?;
    Ok(ExitCode::from(code))
}
