//! One-shot scan command implementation.

use clap::Args;
use std::path::PathBuf;

use crate::scanner::{ScanKind, ScanOutcome, Scanner};
use crate::Result;

/// Arguments for the scan command
#[derive(Args)]
pub struct ScanArgs {
    /// Directories to scan for duplicates
    #[arg(short, long)]
    pub watch: Vec<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run one full scan and print a summary
pub async fn run(args: ScanArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), &args.watch)?;
    config.validate()?;

    let _guard = crate::logging::init(&config.log_dir)?;

    let scanner = Scanner::new(config);
    scanner.load_state().await;

    match scanner.run_scan(ScanKind::Full).await {
        ScanOutcome::Completed(stats) => {
            println!("Scan completed in {} ms", stats.duration_ms);
            println!("  Files scanned: {}", stats.files_scanned);
            println!("  Duplicate groups: {}", stats.groups_found);
            println!("  Files merged away: {}", stats.files_merged);
        }
        ScanOutcome::Skipped => println!("A scan is already in flight"),
    }

    Ok(())
}
