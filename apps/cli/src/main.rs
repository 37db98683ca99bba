//! Jobflow CLI: scheduled job-posting ingestion.
//!
//! Runs the hourly scheduler, triggers on-demand workflow runs, and browses
//! the postings they stored.

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
