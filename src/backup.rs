//! Periodic whole-tree backup snapshots.
//!
//! A coarser safety net than the per-file backups taken before destructive
//! operations: every watched root is copied recursively into a timestamped
//! snapshot directory together with the current scan state. Snapshots are
//! append-only; nothing here ever deletes one.

use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::SentryConfig;
use crate::Result;

/// Takes timestamped snapshots of all watched paths
#[derive(Debug, Clone)]
pub struct BackupScheduler {
    config: SentryConfig,
}

impl BackupScheduler {
    pub fn new(config: SentryConfig) -> Self {
        Self { config }
    }

    /// Copy every watched root into a new `snapshot-<epoch-ms>` directory
    /// and place a copy of the persisted scan state alongside.
    ///
    /// Individual file copy failures are logged and skipped; the snapshot
    /// tolerates a slightly stale or partial view of the tree.
    pub async fn snapshot_all(&self) -> Result<PathBuf> {
        let snapshot_dir = self
            .config
            .backup_dir
            .join(format!("snapshot-{}", Utc::now().timestamp_millis()));
        fs::create_dir_all(&snapshot_dir).await?;

        let mut copied = 0usize;
        let mut skipped = 0usize;
        let mut used_names: HashSet<String> = HashSet::new();

        for root in &self.config.watch_paths {
            if !root.exists() {
                warn!("Skipping missing watched path: {}", root.display());
                continue;
            }

            let base_name = root
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("root")
                .to_string();
            let mut name = base_name.clone();
            let mut counter = 1;
            while !used_names.insert(name.clone()) {
                name = format!("{}-{}", base_name, counter);
                counter += 1;
            }
            let target_root = snapshot_dir.join(&name);

            for entry in WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                let dest = target_root.join(relative);

                if let Some(parent) = dest.parent() {
                    if let Err(e) = fs::create_dir_all(parent).await {
                        warn!("Cannot create {}: {}", parent.display(), e);
                        skipped += 1;
                        continue;
                    }
                }
                match fs::copy(entry.path(), &dest).await {
                    Ok(_) => copied += 1,
                    Err(e) => {
                        warn!("Cannot copy {}: {}", entry.path().display(), e);
                        skipped += 1;
                    }
                }
            }
        }

        // Preserve the scan state as it was at snapshot time
        let state_path = self.config.scan_data_path();
        if state_path.exists() {
            if let Err(e) = fs::copy(&state_path, snapshot_dir.join("scan-data.json")).await {
                warn!("Cannot copy scan state into snapshot: {}", e);
            }
        }

        info!(
            "Snapshot {} complete ({} files copied, {} skipped)",
            snapshot_dir.display(),
            copied,
            skipped
        );
        Ok(snapshot_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_mirrors_watched_trees() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("top.js"), b"top").unwrap();
        std::fs::write(root.join("nested/deep.js"), b"deep").unwrap();

        let mut config = SentryConfig::default();
        config.watch_paths.push(root.clone());
        config.backup_dir = temp_dir.path().join("backups");
        config.data_dir = temp_dir.path().join("temp/scan");

        let scheduler = BackupScheduler::new(config);
        let snapshot = scheduler.snapshot_all().await?;

        assert_eq!(std::fs::read(snapshot.join("files/top.js"))?, b"top");
        assert_eq!(std::fs::read(snapshot.join("files/nested/deep.js"))?, b"deep");

        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_includes_scan_state() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(&root).unwrap();

        let mut config = SentryConfig::default();
        config.watch_paths.push(root);
        config.backup_dir = temp_dir.path().join("backups");
        config.data_dir = temp_dir.path().join("temp/scan");
        std::fs::create_dir_all(&config.data_dir).unwrap();
        std::fs::write(config.scan_data_path(), b"{}").unwrap();

        let scheduler = BackupScheduler::new(config);
        let snapshot = scheduler.snapshot_all().await?;

        assert!(snapshot.join("scan-data.json").exists());

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_root_is_skipped() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();

        let mut config = SentryConfig::default();
        config.watch_paths.push(temp_dir.path().join("absent"));
        config.backup_dir = temp_dir.path().join("backups");
        config.data_dir = temp_dir.path().join("temp/scan");

        let scheduler = BackupScheduler::new(config);
        let snapshot = scheduler.snapshot_all().await?;
        assert!(snapshot.exists());

        Ok(())
    }
}
