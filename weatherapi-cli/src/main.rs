//! Binary crate for the `weatherapi` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration with key validation
//! - Scheduling coordinator refreshes and printing snapshots

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cmd = cli::Cli::parse();
    cmd.run().await
}
