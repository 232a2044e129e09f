//! Report listing command implementation.

use clap::Args;
use std::path::PathBuf;

use crate::report::ReportGenerator;
use crate::Result;

/// Arguments for the reports command
#[derive(Args)]
pub struct ReportsArgs {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// List generated report files with size and modification time
pub async fn run(args: ReportsArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), &[])?;

    let generator = ReportGenerator::new(&config.report_dir);
    let entries = generator.list_reports().await?;

    if entries.is_empty() {
        println!("No reports generated yet");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{:>10}  {}  {}",
            entry.size,
            entry.modified.format("%Y-%m-%d %H:%M:%S"),
            entry.name
        );
    }

    Ok(())
}
