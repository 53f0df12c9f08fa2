//! Agenda CLI: regional event listing aggregation.
//!
//! Pulls listings from the configured sources, normalizes dates and
//! categories, and upserts them into a local event catalog.

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
