//! Snap2Listing CLI: keyword research, listing drafts, and the HTTP API.
//!
//! `snap2listing serve` runs the API; the other commands work against the
//! same config and database from the terminal.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
