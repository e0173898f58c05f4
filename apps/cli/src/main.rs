//! catalogloader CLI: read catalog locations and report what they contain.
//!
//! Runs the ingestion pipeline over one location (a file, a URL on a
//! source-control host, a directory server, or the configured bootstrap set)
//! and prints the resulting entities and errors.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
