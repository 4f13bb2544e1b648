//! `recordbook` maintenance CLI.
//!
//! # Responsibility
//! - Expose ledger queries and offline maintenance (compaction, folder
//!   restore) against one SQLite file.
//! - Keep core wiring in one place: settings, logging, store.

use clap::Parser;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    commands::run(cli)
}
