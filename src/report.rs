//! JSON report generation and listing.
//!
//! Two report surfaces: `scan-report.json`, overwritten after each full
//! scan, and on-demand `system-report-<epoch-ms>.json` snapshots combining
//! supervisor, scanner, and host process state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::scanner::{ScanResult, ScannerStatus};
use crate::supervisor::SupervisorStatus;
use crate::Result;

/// Serialize a value as pretty JSON and write it atomically
/// (temp file in the target directory, then rename).
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("report.json");
    let temp_path = path.with_file_name(format!(".{}.tmp", name));

    let json = serde_json::to_string_pretty(value)?;
    fs::write(&temp_path, json).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Metadata for one report file
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Host process information embedded in system reports
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub pid: u32,
    pub uptime_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SystemReport<'a> {
    generated_at: DateTime<Utc>,
    host: HostInfo,
    supervisor: &'a SupervisorStatus,
    scanner: &'a ScannerStatus,
}

#[derive(Debug, Serialize)]
struct ScanReportSummary {
    total_files: usize,
    duplicates_found: usize,
    files_merged: usize,
    errors: usize,
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    generated_at: DateTime<Utc>,
    summary: ScanReportSummary,
    #[serde(flatten)]
    result: &'a ScanResult,
}

/// Writes and lists JSON reports under a fixed directory
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    report_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(report_dir: &Path) -> Self {
        Self {
            report_dir: report_dir.to_path_buf(),
        }
    }

    /// Write the latest scan report, overwriting the previous one
    pub async fn write_scan_report(&self, result: &ScanResult) -> Result<PathBuf> {
        let path = self.report_dir.join("scan-report.json");
        let report = ScanReport {
            generated_at: Utc::now(),
            summary: ScanReportSummary {
                total_files: result.total_files,
                duplicates_found: result.duplicate_groups.len(),
                files_merged: result.merged.iter().map(|m| m.removed.len()).sum(),
                errors: result.errors.len(),
            },
            result,
        };

        write_json_atomic(&path, &report).await?;
        debug!("Wrote scan report to {}", path.display());
        Ok(path)
    }

    /// Write an on-demand system snapshot report
    pub async fn write_system_report(
        &self,
        supervisor: &SupervisorStatus,
        scanner: &ScannerStatus,
    ) -> Result<PathBuf> {
        let now = Utc::now();
        let path = self
            .report_dir
            .join(format!("system-report-{}.json", now.timestamp_millis()));

        let report = SystemReport {
            generated_at: now,
            host: HostInfo {
                version: crate::VERSION.to_string(),
                platform: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
                pid: std::process::id(),
                uptime_secs: supervisor
                    .start_time
                    .map(|started| (now - started).num_seconds()),
            },
            supervisor,
            scanner,
        };

        write_json_atomic(&path, &report).await?;
        debug!("Wrote system report to {}", path.display());
        Ok(path)
    }

    /// List report files with name, size, and modified time
    pub async fn list_reports(&self) -> Result<Vec<ReportEntry>> {
        if !self.report_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.report_dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            entries.push(ReportEntry {
                name: name.to_string(),
                size: metadata.len(),
                modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
