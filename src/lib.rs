pub mod ai;
pub mod billing;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod quarantine;
pub mod rename;
pub mod security;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use commands::Cli;

/// Load `.env`, set up logging, and run the requested command
pub async fn run() -> ExitCode {
    // Current dir first, then the parent (running from a subdirectory)
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    commands::dispatch(cli).await
}

/// Logs go to stderr; stdout carries the run summary.
///
/// RUST_LOG wins when set. Default: warn for dependencies, info for this crate.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,sentinel_rename_lib=debug"
    } else {
        "warn,sentinel_rename_lib=info"
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
