//! merge-sentry - continuous duplicate-file scanner and merge daemon
//!
//! Main binary entry point for the command-line interface.

use clap::Parser;
use merge_sentry::cli::{Cli, Commands};
use merge_sentry::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => merge_sentry::cli::run::run(args).await,
        Commands::Scan(args) => merge_sentry::cli::scan::run(args).await,
        Commands::Backup(args) => merge_sentry::cli::backup::run(args).await,
        Commands::Reports(args) => merge_sentry::cli::reports::run(args).await,
    }
}
