//! Command-line interface for table-sync
//!
//! ```bash
//! # Copy two tables from db1 to the local server
//! table-sync -G db1 -D test -d test_copy -t "orders customers"
//!
//! # Same, from a config file, forcing full copies
//! table-sync -f table-sync.toml --force-full
//!
//! # One table at a time with debug output
//! table-sync -f table-sync.toml -g -v
//! ```

use clap::Parser;
use table_sync::{run_copy, Cli, RunSettings};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let settings = RunSettings::from_cli(&cli)?;

    tokio::select! {
        report = run_copy(&settings) => Ok(report?.status()),
        _ = tokio::signal::ctrl_c() => {
            error!("Cancelled by keyboard interrupt.");
            Ok(1)
        }
    }
}
