//! Content merging for duplicate groups.
//!
//! Exact groups keep their primary and drop the rest. Similar-name groups
//! keep the largest member as the base and append every section from the
//! other members that is not already present byte-for-byte, then remove the
//! merged-away files. All reads happen before any write or delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::MergeStrategy;
use crate::detector::{DuplicateGroup, GroupKind};
use crate::safe_ops::SafeFileOps;
use crate::sections::SectionSplitter;
use crate::{Error, Result};

/// Record of one completed merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeAction {
    pub kind: GroupKind,
    pub kept: PathBuf,
    pub removed: Vec<PathBuf>,
    pub sections_appended: usize,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of merging one group
#[derive(Debug)]
pub struct MergeOutcome {
    pub action: MergeAction,
    pub warnings: Vec<String>,
}

/// Merges duplicate groups through backup-first file operations
#[derive(Debug)]
pub struct MergeEngine {
    ops: SafeFileOps,
    splitter: SectionSplitter,
    strategy: MergeStrategy,
}

impl MergeEngine {
    pub fn new(ops: SafeFileOps, strategy: MergeStrategy) -> Self {
        Self {
            ops,
            splitter: SectionSplitter::new(),
            strategy,
        }
    }

    /// Merge one duplicate group. A failure abandons this group only;
    /// the caller proceeds with the remaining groups.
    pub async fn merge(&self, group: &DuplicateGroup) -> Result<MergeOutcome> {
        match self.strategy {
            MergeStrategy::Intelligent => match group.kind {
                GroupKind::Exact => self.merge_exact(group).await,
                GroupKind::SimilarName => self.merge_similar_name(group).await,
            },
        }
    }

    /// Exact-content group: the members are byte-identical, so the primary
    /// stays as-is and every other member is safely deleted.
    async fn merge_exact(&self, group: &DuplicateGroup) -> Result<MergeOutcome> {
        let primary = &group.files[0];
        let mut warnings = Vec::new();
        let mut removed = Vec::new();

        for path in &group.files[1..] {
            if !path.exists() {
                warnings.push(format!("{} vanished before merge", path.display()));
                continue;
            }
            self.ops
                .safe_delete(path)
                .await
                .map_err(|e| merge_error(group, e))?;
            removed.push(path.clone());
        }

        info!(
            "Deduplicated {} exact copies of {}",
            removed.len(),
            primary.display()
        );

        Ok(MergeOutcome {
            action: MergeAction {
                kind: GroupKind::Exact,
                kept: primary.clone(),
                removed,
                sections_appended: 0,
                timestamp: Utc::now(),
            },
            warnings,
        })
    }

    /// Similar-name group: keep the largest member and append unique
    /// sections from the others before removing them.
    async fn merge_similar_name(&self, group: &DuplicateGroup) -> Result<MergeOutcome> {
        let mut warnings = Vec::new();

        // Read everything up front; an unreadable member contributes nothing
        let mut contents = Vec::with_capacity(group.files.len());
        for path in &group.files {
            let content = match tokio::fs::read(path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warnings.push(format!("Unreadable member {}: {}", path.display(), e));
                    String::new()
                }
            };
            contents.push(content);
        }

        // Largest file wins; ties keep the earliest member
        let best_index = contents
            .iter()
            .enumerate()
            .fold(0, |best, (i, content)| {
                if content.len() > contents[best].len() {
                    i
                } else {
                    best
                }
            });
        let best_path = &group.files[best_index];

        let mut merged = contents[best_index].clone();
        let mut known: std::collections::HashSet<String> = self
            .splitter
            .split(&merged)
            .iter()
            .map(|s| s.content_hash())
            .collect();
        let mut appended = 0;

        for (i, content) in contents.iter().enumerate() {
            if i == best_index {
                continue;
            }
            for section in self.splitter.split(content) {
                let hash = section.content_hash();
                if known.contains(&hash) {
                    continue;
                }
                if !merged.is_empty() {
                    merged.push_str("\n\n");
                }
                merged.push_str(&section.text);
                known.insert(hash);
                appended += 1;
            }
        }

        // One atomic write, only when something was actually appended
        if appended > 0 {
            self.ops
                .safe_overwrite(best_path, &merged)
                .await
                .map_err(|e| merge_error(group, e))?;
        }

        let mut removed = Vec::new();
        for (i, path) in group.files.iter().enumerate() {
            if i == best_index {
                continue;
            }
            if !path.exists() {
                warnings.push(format!("{} vanished before merge", path.display()));
                continue;
            }
            self.ops
                .safe_delete(path)
                .await
                .map_err(|e| merge_error(group, e))?;
            removed.push(path.clone());
        }

        info!(
            "Merged {} into {} ({} sections appended)",
            removed.len(),
            best_path.display(),
            appended
        );
        for warning in &warnings {
            warn!("{}", warning);
        }

        Ok(MergeOutcome {
            action: MergeAction {
                kind: GroupKind::SimilarName,
                kept: best_path.clone(),
                removed,
                sections_appended: appended,
                timestamp: Utc::now(),
            },
            warnings,
        })
    }
}

fn merge_error(group: &DuplicateGroup, source: Error) -> Error {
    Error::Merge {
        group: group.key.clone(),
        reason: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    fn engine(root: &Path) -> MergeEngine {
        MergeEngine::new(
            SafeFileOps::new(&root.join("backups")),
            MergeStrategy::Intelligent,
        )
    }

    fn group_of(kind: GroupKind, key: &str, files: &[&Path]) -> DuplicateGroup {
        let mut files: Vec<PathBuf> = files.iter().map(|p| p.to_path_buf()).collect();
        files.sort();
        DuplicateGroup {
            kind,
            key: key.to_string(),
            files,
        }
    }

    #[tokio::test]
    async fn test_exact_group_keeps_primary_and_backs_up_the_rest() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        let first = root.join("a/shop-utils.js");
        let second = root.join("b/ShopUtils.js");
        std::fs::write(&first, b"shared body").unwrap();
        std::fs::write(&second, b"shared body").unwrap();

        let engine = engine(root);
        let group = group_of(GroupKind::Exact, "digest", &[&first, &second]);
        let outcome = engine.merge(&group).await?;

        assert_eq!(outcome.action.removed.len(), 1);
        assert_eq!(outcome.action.sections_appended, 0);
        // Primary survives, the duplicate is gone, a backup of it exists
        let survivor = &group.files[0];
        let deleted = &group.files[1];
        assert!(survivor.exists());
        assert!(!deleted.exists());
        let backup_name = format!(
            "{}.backup",
            deleted.file_name().unwrap().to_str().unwrap()
        );
        let backup = root.join("backups").join(backup_name);
        assert_eq!(std::fs::read(&backup)?, b"shared body");

        Ok(())
    }

    #[tokio::test]
    async fn test_similar_names_with_no_unique_content_leave_best_unchanged() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        let smaller = root.join("a/config.ts");
        let larger = root.join("b/config.ts");
        std::fs::write(&smaller, "export const X = 1;").unwrap();
        std::fs::write(&larger, "export const X = 1;\nexport const Y = 2;").unwrap();

        let engine = engine(root);
        let group = group_of(GroupKind::SimilarName, "config.ts", &[&smaller, &larger]);
        let outcome = engine.merge(&group).await?;

        assert_eq!(outcome.action.kept, larger);
        assert_eq!(outcome.action.sections_appended, 0);
        assert!(!smaller.exists());
        assert_eq!(
            std::fs::read_to_string(&larger)?,
            "export const X = 1;\nexport const Y = 2;"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_unique_sections_are_appended_after_existing_content() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        let smaller = root.join("a/config.ts");
        let larger = root.join("b/config.ts");
        std::fs::write(&smaller, "export const Z = 3;").unwrap();
        std::fs::write(&larger, "export const X = 1;\nexport const Y = 2;").unwrap();

        let engine = engine(root);
        let group = group_of(GroupKind::SimilarName, "config.ts", &[&smaller, &larger]);
        let outcome = engine.merge(&group).await?;

        assert_eq!(outcome.action.sections_appended, 1);
        assert!(!smaller.exists());
        assert_eq!(
            std::fs::read_to_string(&larger)?,
            "export const X = 1;\nexport const Y = 2;\n\nexport const Z = 3;"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_merge_preserves_all_unique_content_in_order() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        let a = root.join("a/mod.ts");
        let b = root.join("b/mod.ts");
        // No common sections at all; b is larger and becomes the base
        std::fs::write(&a, "const one = 1;").unwrap();
        std::fs::write(&b, "function two() {\n  return 2;\n}").unwrap();

        let engine = engine(root);
        let group = group_of(GroupKind::SimilarName, "mod.ts", &[&a, &b]);
        engine.merge(&group).await?;

        let merged = std::fs::read_to_string(&b)?;
        assert_eq!(merged, "function two() {\n  return 2;\n}\n\nconst one = 1;");

        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_member_contributes_nothing_but_merge_proceeds() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a")).unwrap();
        let real = root.join("a/lib.ts");
        let ghost = root.join("a/sub/lib.ts");
        std::fs::write(&real, "export const A = 1;").unwrap();

        let engine = engine(root);
        let group = group_of(GroupKind::SimilarName, "lib.ts", &[&real, &ghost]);
        let outcome = engine.merge(&group).await?;

        assert!(!outcome.warnings.is_empty());
        assert_eq!(outcome.action.kept, real);
        assert_eq!(std::fs::read_to_string(&real)?, "export const A = 1;");

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_backup_aborts_the_group() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let first = root.join("x.js");
        let second = root.join("y.js");
        std::fs::write(&first, b"same").unwrap();
        std::fs::write(&second, b"same").unwrap();

        // Backup directory path is blocked by a plain file
        let blocked = root.join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let engine = MergeEngine::new(
            SafeFileOps::new(&blocked.join("backups")),
            MergeStrategy::Intelligent,
        );

        let group = group_of(GroupKind::Exact, "digest", &[&first, &second]);
        assert!(engine.merge(&group).await.is_err());

        // Nothing was deleted
        assert!(first.exists());
        assert!(second.exists());

        Ok(())
    }
}
