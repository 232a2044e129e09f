//! One-shot backup command implementation.

use clap::Args;
use std::path::PathBuf;

use crate::backup::BackupScheduler;
use crate::Result;

/// Arguments for the backup command
#[derive(Args)]
pub struct BackupArgs {
    /// Directories to snapshot
    #[arg(short, long)]
    pub watch: Vec<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Take one whole-tree snapshot of the watched paths
pub async fn run(args: BackupArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), &args.watch)?;
    config.validate()?;

    let _guard = crate::logging::init(&config.log_dir)?;

    let scheduler = BackupScheduler::new(config);
    let snapshot = scheduler.snapshot_all().await?;
    println!("Snapshot written to {}", snapshot.display());

    Ok(())
}
