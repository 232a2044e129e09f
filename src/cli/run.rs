//! Daemon command implementation.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::supervisor::Supervisor;
use crate::Result;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Directories to watch for duplicates
    #[arg(short, long)]
    pub watch: Vec<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the supervised daemon until Ctrl-C
pub async fn run(args: RunArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), &args.watch)?;
    config.validate()?;

    let _guard = crate::logging::init(&config.log_dir)?;

    let supervisor = Arc::new(Supervisor::new(config));
    Arc::clone(&supervisor).start().await?;
    info!("Daemon running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Orderly stop: timers cancelled, in-flight scan finished, state flushed
    supervisor.stop().await;
    Ok(())
}
