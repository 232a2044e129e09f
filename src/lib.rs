//! # merge-sentry
//!
//! Continuous duplicate-file scanner and merge daemon with backup-first safety.
//!
//! ## Features
//!
//! - **Duplicate Detection**: content-addressed exact duplicates plus same-name groups
//! - **Intelligent Merging**: section-level merges that keep every unique piece of content
//! - **Backup-First Safety**: every destructive operation is preceded by a local backup
//! - **Filesystem Watching**: debounced quick scans on change events, interval full scans
//! - **Supervision**: health checks, bounded auto-recovery, and an error circuit breaker
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use merge_sentry::{SentryConfig, Supervisor};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> merge_sentry::Result<()> {
//! let mut config = SentryConfig::default();
//! config.watch_paths.push("./data".into());
//!
//! let supervisor = Arc::new(Supervisor::new(config));
//! Arc::clone(&supervisor).start().await?;
//! // ... the daemon scans, merges, and backs up until stopped ...
//! supervisor.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod merge;
pub mod report;
pub mod safe_ops;
pub mod scanner;
pub mod sections;
pub mod supervisor;

// Re-export commonly used types
pub use config::SentryConfig;
pub use detector::{DuplicateDetector, DuplicateGroup, GroupKind};
pub use error::{Error, Result};
pub use merge::MergeEngine;
pub use safe_ops::SafeFileOps;
pub use scanner::{ScanResult, Scanner};
pub use supervisor::Supervisor;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
