//! Runtime configuration for the scanner daemon.
//!
//! All options carry fixed defaults; a TOML file can override them and the
//! daemon never discovers settings dynamically at runtime.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Merge strategy selector. Only the intelligent section-level merge is
/// implemented; the selector exists so configs stay forward-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    #[default]
    Intelligent,
}

/// Configuration for the scanner, supervisor, and backup scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    /// Root directories under monitoring. Fixed at startup.
    pub watch_paths: Vec<PathBuf>,
    /// Glob patterns excluded from scanning and watching
    pub exclude: Vec<String>,
    /// Period between full scans, in seconds
    pub scan_interval_secs: u64,
    /// Debounce window for watcher-triggered quick scans, in milliseconds
    pub debounce_ms: u64,
    /// Quick scans only consider files modified within this trailing window
    pub quick_scan_window_secs: u64,
    /// Period between whole-tree backup snapshots, in seconds
    pub backup_interval_secs: u64,
    /// Period between supervisor health checks, in seconds
    pub health_check_interval_secs: u64,
    /// Period between supervisor circuit-breaker checks, in seconds
    pub auto_recovery_interval_secs: u64,
    /// Maximum automatic recovery attempts before giving up
    pub max_retries: u32,
    /// Accumulated scan errors beyond this count trigger a full restart
    pub error_threshold: usize,
    /// Delay between stop and re-start during restarts and recovery, in milliseconds
    pub restart_delay_ms: u64,
    /// Directory for the persisted scan state
    pub data_dir: PathBuf,
    /// Directory for JSON reports
    pub report_dir: PathBuf,
    /// Directory for single-file backups and periodic snapshots
    pub backup_dir: PathBuf,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Content merge strategy
    pub merge_strategy: MergeStrategy,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            exclude: vec![
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/*.backup".to_string(),
                "**/*.backup.*".to_string(),
                "**/.*.tmp".to_string(),
            ],
            scan_interval_secs: 30,
            debounce_ms: 1000,
            quick_scan_window_secs: 300,
            backup_interval_secs: 3600,
            health_check_interval_secs: 30,
            auto_recovery_interval_secs: 120,
            max_retries: 3,
            error_threshold: 10,
            restart_delay_ms: 2000,
            data_dir: PathBuf::from("./temp/scan"),
            report_dir: PathBuf::from("./reports"),
            backup_dir: PathBuf::from("./backups"),
            log_dir: PathBuf::from("./logs"),
            merge_strategy: MergeStrategy::Intelligent,
        }
    }
}

impl SentryConfig {
    /// Load config from a TOML file, or return defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            let config: SentryConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Check whether a path matches any exclusion pattern
    pub fn should_exclude(&self, path: &Path) -> bool {
        for pattern in &self.exclude {
            match Pattern::new(pattern) {
                Ok(p) => {
                    if p.matches_path(path) {
                        return true;
                    }
                }
                Err(e) => warn!("Invalid exclusion pattern '{}': {}", pattern, e),
            }
        }
        false
    }

    /// Validate config settings
    pub fn validate(&self) -> Result<()> {
        if self.watch_paths.is_empty() {
            return Err(Error::Configuration {
                reason: "At least one watch path must be configured".to_string(),
            });
        }

        if self.scan_interval_secs == 0 {
            return Err(Error::Configuration {
                reason: "Scan interval must be greater than 0".to_string(),
            });
        }

        if self.debounce_ms == 0 {
            return Err(Error::Configuration {
                reason: "Debounce window must be greater than 0".to_string(),
            });
        }

        for pattern in &self.exclude {
            if let Err(e) = Pattern::new(pattern) {
                return Err(Error::Configuration {
                    reason: format!("Invalid exclusion pattern '{}': {}", pattern, e),
                });
            }
        }

        if self.max_retries > 10 {
            warn!("High retry limit configured: {}", self.max_retries);
        }

        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn quick_scan_window(&self) -> Duration {
        Duration::from_secs(self.quick_scan_window_secs)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn auto_recovery_interval(&self) -> Duration {
        Duration::from_secs(self.auto_recovery_interval_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Path of the persisted scan state file
    pub fn scan_data_path(&self) -> PathBuf {
        self.data_dir.join("scan-data.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SentryConfig::default();
        assert!(config.watch_paths.is_empty());
        assert_eq!(config.scan_interval_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.error_threshold, 10);
        assert_eq!(config.merge_strategy, MergeStrategy::Intelligent);
    }

    #[test]
    fn test_exclusion_patterns() {
        let config = SentryConfig::default();

        assert!(config.should_exclude(Path::new("/repo/.git/objects/ab")));
        assert!(config.should_exclude(Path::new("/repo/node_modules/pkg/index.js")));
        assert!(config.should_exclude(Path::new("/data/shop-utils.js.backup")));
        assert!(config.should_exclude(Path::new("/data/shop-utils.js.backup.2")));
        assert!(!config.should_exclude(Path::new("/data/shop-utils.js")));
    }

    #[test]
    fn test_validation_requires_watch_paths() {
        let config = SentryConfig::default();
        assert!(config.validate().is_err());

        let mut config = SentryConfig::default();
        config.watch_paths.push(PathBuf::from("/tmp"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sentry.toml");

        let mut config = SentryConfig::default();
        config.watch_paths.push(PathBuf::from("/srv/files"));
        config.scan_interval_secs = 60;
        config.save(&path)?;

        let loaded = SentryConfig::load(&path)?;
        assert_eq!(loaded.watch_paths, vec![PathBuf::from("/srv/files")]);
        assert_eq!(loaded.scan_interval_secs, 60);

        Ok(())
    }

    #[test]
    fn test_load_missing_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let config = SentryConfig::load(&temp_dir.path().join("absent.toml"))?;
        assert_eq!(config.scan_interval_secs, 30);
        Ok(())
    }
}
