//! tunevfs entry point.
//!
//! ```bash
//! tunevfs --manifest catalog.json ls archive:/series
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tunevfs_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("tunevfs=info".parse()?))
        .init();

    let cli = Cli::parse();
    if let Err(e) = tunevfs_cli::run(cli).await {
        tracing::debug!(error = ?e, "command failed");
        return Err(e);
    }
    Ok(())
}
