//! Duplicate detection over watched directory trees.
//!
//! Files are grouped two independent ways: by exact content digest and by
//! base filename. A file may appear in a group of each kind at once.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::SentryConfig;
use crate::hasher::ContentHasher;

/// The two ways a duplicate group can form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// Full content digests match
    Exact,
    /// Base filenames match, regardless of content or directory
    SimilarName,
}

/// Two or more paths considered duplicates of each other.
///
/// Members are sorted lexicographically so detection is deterministic across
/// platforms; the first member of an exact group is its primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub kind: GroupKind,
    /// Content digest for exact groups, base filename for similar-name groups
    pub key: String,
    pub files: Vec<PathBuf>,
}

/// A file observed during a scan. Derived on demand, never stored per-file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub digest: String,
    pub size: u64,
}

/// Outcome of one detection pass
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    pub groups: Vec<DuplicateGroup>,
    pub total_files: usize,
    pub warnings: Vec<String>,
}

/// Finds exact and similar-name duplicate groups in a file set
#[derive(Debug)]
pub struct DuplicateDetector {
    config: SentryConfig,
    hasher: ContentHasher,
}

impl DuplicateDetector {
    pub fn new(config: SentryConfig) -> Self {
        Self {
            config,
            hasher: ContentHasher::new(),
        }
    }

    /// Walk every watched root and collect candidate files.
    ///
    /// `modified_within` restricts the result to files changed inside a
    /// trailing window (quick scans); `None` collects everything.
    pub fn collect_files(&self, modified_within: Option<std::time::Duration>) -> Vec<PathBuf> {
        let cutoff = modified_within.map(|window| SystemTime::now() - window);
        let mut files = Vec::new();

        for root in &self.config.watch_paths {
            if !root.exists() {
                warn!("Watched path does not exist: {}", root.display());
                continue;
            }

            for entry in WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if self.config.should_exclude(entry.path()) {
                    continue;
                }
                if let Some(cutoff) = cutoff {
                    match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                        Some(modified) if modified >= cutoff => {}
                        _ => continue,
                    }
                }
                files.push(entry.path().to_path_buf());
            }
        }

        debug!("Collected {} candidate files", files.len());
        files
    }

    /// Group the given files into exact and similar-name duplicate groups
    pub fn find(&self, files: &[PathBuf]) -> DetectionOutcome {
        info!("Detecting duplicates among {} files", files.len());

        // Hash in parallel; unreadable files are skipped with a warning
        let hashed: Vec<std::result::Result<FileRecord, String>> = files
            .par_iter()
            .map(|path| self.record_for(path))
            .collect();

        let mut records = Vec::new();
        let mut warnings = Vec::new();
        for result in hashed {
            match result {
                Ok(record) => records.push(record),
                Err(warning) => {
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        let mut groups = Vec::new();

        // Exact groups: bucket by content digest
        let mut by_digest: HashMap<&str, Vec<&FileRecord>> = HashMap::new();
        for record in &records {
            by_digest.entry(&record.digest).or_default().push(record);
        }
        for (digest, members) in by_digest {
            if members.len() > 1 {
                groups.push(Self::build_group(GroupKind::Exact, digest.to_string(), &members));
            }
        }

        // Similar-name groups: bucket by base filename, regardless of content
        let mut by_name: HashMap<String, Vec<&FileRecord>> = HashMap::new();
        for record in &records {
            if let Some(name) = record.path.file_name().and_then(|n| n.to_str()) {
                by_name.entry(name.to_string()).or_default().push(record);
            }
        }
        for (name, members) in by_name {
            if members.len() > 1 {
                groups.push(Self::build_group(GroupKind::SimilarName, name, &members));
            }
        }

        // Deterministic processing order: exact groups first, then by key
        groups.sort_by(|a, b| {
            let rank = |kind: GroupKind| match kind {
                GroupKind::Exact => 0,
                GroupKind::SimilarName => 1,
            };
            rank(a.kind).cmp(&rank(b.kind)).then_with(|| a.key.cmp(&b.key))
        });

        info!(
            "Found {} duplicate groups ({} files hashed, {} skipped)",
            groups.len(),
            records.len(),
            warnings.len()
        );

        DetectionOutcome {
            groups,
            total_files: records.len(),
            warnings,
        }
    }

    fn record_for(&self, path: &Path) -> std::result::Result<FileRecord, String> {
        let size = std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| format!("Skipping unreadable file {}: {}", path.display(), e))?;
        let digest = self
            .hasher
            .hash_file(path)
            .map_err(|e| format!("Skipping unreadable file {}: {}", path.display(), e))?;

        Ok(FileRecord {
            path: path.to_path_buf(),
            digest,
            size,
        })
    }

    fn build_group(kind: GroupKind, key: String, members: &[&FileRecord]) -> DuplicateGroup {
        let mut files: Vec<PathBuf> = members.iter().map(|r| r.path.clone()).collect();
        files.sort();
        DuplicateGroup { kind, key, files }
    }
}
