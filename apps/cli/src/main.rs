//! chapterscrape CLI — chapter member directories to JSON.
//!
//! Loads a chapter list, layers config file, environment and flags, then
//! drives the orchestrator against a headless Chrome.

mod chapters;
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
