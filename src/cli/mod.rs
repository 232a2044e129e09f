//! Command-line interface for merge-sentry.
//!
//! Subcommands cover the daemon itself plus one-shot scan, backup, and
//! report-listing operations.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::SentryConfig;
use crate::Result;

pub mod backup;
pub mod reports;
pub mod run;
pub mod scan;

/// merge-sentry - continuous duplicate-file scanner and merge daemon
#[derive(Parser)]
#[command(name = "merge-sentry")]
#[command(about = "Continuous duplicate-file scanner and merge daemon with backup-first safety")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the supervised scanner daemon
    Run(run::RunArgs),
    /// Perform a one-shot full scan
    Scan(scan::ScanArgs),
    /// Take a one-shot whole-tree backup snapshot
    Backup(backup::BackupArgs),
    /// List generated report files
    Reports(reports::ReportsArgs),
}

/// Load config from an optional TOML file, with CLI watch paths taking
/// precedence over the file's.
pub(crate) fn load_config(path: Option<&Path>, watch: &[PathBuf]) -> Result<SentryConfig> {
    let mut config = match path {
        Some(path) => SentryConfig::load(path)?,
        None => SentryConfig::default(),
    };
    if !watch.is_empty() {
        config.watch_paths = watch.to_vec();
    }
    Ok(config)
}
