//! marketfeed CLI — batch item enrichment tool.
//!
//! Ingests a batch file of item identifiers, enriches each one against the
//! remote marketplace APIs, and persists the merged records locally.

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
