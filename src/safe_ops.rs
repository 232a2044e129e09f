//! Backup-first file operations.
//!
//! Every destructive operation in the system funnels through this module.
//! A file is deleted only after a byte-identical copy of its current content
//! has landed in the backup directory; overwrites go through a temp file and
//! an atomic rename.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::{Error, Result};

/// Marker appended to backup file names
const BACKUP_SUFFIX: &str = "backup";

/// File operations that back up before destroying
#[derive(Debug, Clone)]
pub struct SafeFileOps {
    backup_dir: PathBuf,
}

impl SafeFileOps {
    pub fn new(backup_dir: &Path) -> Self {
        Self {
            backup_dir: backup_dir.to_path_buf(),
        }
    }

    /// Copy `path` unchanged into the backup directory and return the backup
    /// path. Fails loudly; callers must not delete anything when this errors.
    pub async fn backup(&self, path: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|e| Error::Backup {
                path: path.display().to_string(),
                reason: format!("cannot create backup directory: {}", e),
            })?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Backup {
                path: path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;

        let backup_path = self.next_free_slot(name).await;
        fs::copy(path, &backup_path)
            .await
            .map_err(|e| Error::Backup {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!("Backed up {} -> {}", path.display(), backup_path.display());
        Ok(backup_path)
    }

    /// Delete `path` only after a successful backup of its content.
    ///
    /// Any failure aborts the whole operation and leaves the file untouched.
    pub async fn safe_delete(&self, path: &Path) -> Result<PathBuf> {
        let backup_path = self.backup(path).await?;

        fs::remove_file(path).await?;
        info!(
            "Removed {} (backup at {})",
            path.display(),
            backup_path.display()
        );
        Ok(backup_path)
    }

    /// Replace `path`'s content atomically: write to a temp file in the same
    /// directory, then rename over the target.
    pub async fn safe_overwrite(&self, path: &Path, content: &str) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Backup {
                path: path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;
        let temp_path = path.with_file_name(format!(".{}.tmp", name));

        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;

        debug!("Overwrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    /// First unused `<name>.backup[.n]` slot in the backup directory
    async fn next_free_slot(&self, name: &str) -> PathBuf {
        let base = self.backup_dir.join(format!("{}.{}", name, BACKUP_SUFFIX));
        if fs::metadata(&base).await.is_err() {
            return base;
        }

        let mut counter = 1u32;
        loop {
            let candidate = self
                .backup_dir
                .join(format!("{}.{}.{}", name, BACKUP_SUFFIX, counter));
            if fs::metadata(&candidate).await.is_err() {
                return candidate;
            }
            counter += 1;
        }
    }
}
