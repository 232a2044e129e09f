//! Scan orchestration: filesystem watching, debounced quick scans,
//! interval-driven full scans, and scan-state persistence.
//!
//! At most one scan runs at a time. Watcher events restart a debounce
//! window and expire into a quick scan over recently modified files; an
//! independent interval timer drives full scans over the whole watched set.

use chrono::{DateTime, Utc};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::SentryConfig;
use crate::detector::{DuplicateDetector, DuplicateGroup};
use crate::merge::{MergeAction, MergeEngine};
use crate::report::{write_json_atomic, ReportGenerator};
use crate::safe_ops::SafeFileOps;
use crate::{Error, Result};

/// Errors older than this many entries are dropped from the aggregate
const MAX_TRACKED_ERRORS: usize = 100;

/// Scan scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Entire watched file set
    Full,
    /// Files modified within the trailing quick-scan window
    Quick,
}

/// One recorded scan or merge failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanError {
    pub context: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Performance timings for the most recent operations, in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanTimings {
    pub scan_ms: u64,
    pub merge_ms: u64,
    pub backup_ms: u64,
}

/// Aggregate scan state, persisted as JSON after every scan and reloaded at
/// startup to resume the cumulative counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanResult {
    pub total_files: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub merged: Vec<MergeAction>,
    pub errors: Vec<ScanError>,
    pub timings: ScanTimings,
    pub last_scan: Option<DateTime<Utc>>,
    pub scans_completed: u64,
    pub files_merged: u64,
}

/// Summary of one completed scan
#[derive(Debug, Clone)]
pub struct ScanStats {
    pub kind: ScanKind,
    pub files_scanned: usize,
    pub groups_found: usize,
    pub files_merged: usize,
    pub duration_ms: u64,
}

/// Result of a scan trigger
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed(ScanStats),
    /// Another scan was already in flight; this trigger was dropped
    Skipped,
}

/// Point-in-time view of the scanner, safe to read while a scan runs
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScannerStatus {
    pub is_running: bool,
    pub scan_in_flight: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub total_files: usize,
    pub duplicate_groups: usize,
    pub scans_completed: u64,
    pub files_merged: u64,
    pub errors: usize,
}

/// The scanning daemon: watcher, timers, detection, and merging
pub struct Scanner {
    config: SentryConfig,
    detector: DuplicateDetector,
    merger: MergeEngine,
    reports: ReportGenerator,
    result: RwLock<ScanResult>,
    scan_in_flight: AtomicBool,
    running: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scanner {
    pub fn new(config: SentryConfig) -> Self {
        let detector = DuplicateDetector::new(config.clone());
        let merger = MergeEngine::new(
            SafeFileOps::new(&config.backup_dir),
            config.merge_strategy,
        );
        let reports = ReportGenerator::new(&config.report_dir);

        Self {
            config,
            detector,
            merger,
            reports,
            result: RwLock::new(ScanResult::default()),
            scan_in_flight: AtomicBool::new(false),
            running: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Load the persisted scan state, if any, to resume reporting continuity
    pub async fn load_state(&self) {
        let path = self.config.scan_data_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<ScanResult>(&content) {
                Ok(saved) => {
                    info!(
                        "Resuming scan state ({} scans completed so far)",
                        saved.scans_completed
                    );
                    *self.result.write().unwrap() = saved;
                }
                Err(e) => warn!("Discarding corrupt scan state {}: {}", path.display(), e),
            },
            Err(_) => debug!("No previous scan state at {}", path.display()),
        }
    }

    /// Start the watcher and scan timers. Idempotent.
    ///
    /// Fails if none of the configured watch paths can be registered with
    /// the filesystem watcher; partial registration is tolerated.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Scanner already running");
            return Ok(());
        }

        self.load_state().await;

        let (event_tx, event_rx) = mpsc::channel(256);
        let watcher = match self.build_watcher(event_tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock().unwrap() = Some(shutdown_tx);

        let scanner = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            scanner.event_loop(watcher, event_rx, shutdown_rx).await;
        });
        *self.worker.lock().unwrap() = Some(handle);

        info!(
            "Scanner started ({} watched paths)",
            self.config.watch_paths.len()
        );
        Ok(())
    }

    /// Stop timers and the watcher, waiting for any in-flight scan to reach
    /// idle, then flush the scan state. Idempotent.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        info!("Stopping scanner");

        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Scanner task ended abnormally: {}", e);
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Trigger a scan now. Returns [`ScanOutcome::Skipped`] when another
    /// scan is already in flight; triggers are never queued.
    pub async fn run_scan(&self, kind: ScanKind) -> ScanOutcome {
        if self
            .scan_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Scan already in flight, skipping {:?} trigger", kind);
            return ScanOutcome::Skipped;
        }

        let stats = self.scan_once(kind).await;
        self.scan_in_flight.store(false, Ordering::SeqCst);
        ScanOutcome::Completed(stats)
    }

    pub fn status(&self) -> ScannerStatus {
        let result = self.result.read().unwrap();
        ScannerStatus {
            is_running: self.is_running(),
            scan_in_flight: self.scan_in_flight.load(Ordering::SeqCst),
            last_scan: result.last_scan,
            total_files: result.total_files,
            duplicate_groups: result.duplicate_groups.len(),
            scans_completed: result.scans_completed,
            files_merged: result.files_merged,
            errors: result.errors.len(),
        }
    }

    /// Clone of the current aggregate state
    pub fn result_snapshot(&self) -> ScanResult {
        self.result.read().unwrap().clone()
    }

    pub fn error_count(&self) -> usize {
        self.result.read().unwrap().errors.len()
    }

    /// Drop accumulated errors, in memory and in the persisted state, so a
    /// circuit-breaker restart does not resurrect them on the next startup.
    pub async fn clear_errors(&self) -> Result<()> {
        self.result.write().unwrap().errors.clear();
        self.persist_state().await
    }

    /// Record the duration of the latest whole-tree backup
    pub fn note_backup_duration(&self, ms: u64) {
        self.result.write().unwrap().timings.backup_ms = ms;
    }

    fn build_watcher(
        &self,
        tx: mpsc::Sender<std::result::Result<Event, notify::Error>>,
    ) -> Result<RecommendedWatcher> {
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )?;

        let mut watched = 0;
        for root in &self.config.watch_paths {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => watched += 1,
                Err(e) => warn!("Cannot watch {}: {}", root.display(), e),
            }
        }
        if watched == 0 {
            return Err(Error::WatchSetup {
                reason: "none of the configured watch paths could be registered".to_string(),
            });
        }

        Ok(watcher)
    }

    async fn event_loop(
        self: Arc<Self>,
        watcher: RecommendedWatcher,
        mut events: mpsc::Receiver<std::result::Result<Event, notify::Error>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        // The watcher must stay alive for as long as events should flow
        let _watcher = watcher;

        let mut full_interval = tokio::time::interval(self.config.scan_interval());
        full_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let debounce = self.config.debounce_window();
        let mut deadline: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = full_interval.tick() => {
                    self.run_scan(ScanKind::Full).await;
                }
                maybe = events.recv() => {
                    match maybe {
                        Some(Ok(event)) => {
                            if self.is_relevant(&event) {
                                // Every new event restarts the debounce window
                                deadline = Some(tokio::time::Instant::now() + debounce);
                            }
                        }
                        Some(Err(e)) => warn!("Watcher error: {}", e),
                        None => {
                            warn!("Watcher event channel closed");
                            break;
                        }
                    }
                }
                _ = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    deadline = None;
                    self.run_scan(ScanKind::Quick).await;
                }
            }
        }

        if let Err(e) = self.persist_state().await {
            error!("Failed to flush scan state on shutdown: {}", e);
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Scanner stopped");
    }

    fn is_relevant(&self, event: &Event) -> bool {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return false;
        }
        event.paths.iter().any(|p| !self.config.should_exclude(p))
    }

    /// One complete scan: collect, detect, merge, persist, report.
    ///
    /// Failures are recorded into the aggregate and never propagate; a
    /// failed scan still returns the scanner to idle.
    async fn scan_once(&self, kind: ScanKind) -> ScanStats {
        let started = Instant::now();
        info!("Starting {:?} scan", kind);

        let window = match kind {
            ScanKind::Full => None,
            ScanKind::Quick => Some(self.config.quick_scan_window()),
        };
        let files = self.detector.collect_files(window);
        let detection = self.detector.find(&files);
        let scan_ms = started.elapsed().as_millis() as u64;

        let merge_started = Instant::now();
        let mut actions: Vec<MergeAction> = Vec::new();
        let mut errors: Vec<ScanError> = Vec::new();
        for group in &detection.groups {
            match self.merger.merge(group).await {
                Ok(outcome) => actions.push(outcome.action),
                Err(e) => {
                    error!("Merge failed: {}", e);
                    errors.push(ScanError {
                        context: format!("merge:{}", group.key),
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }
        let merge_ms = merge_started.elapsed().as_millis() as u64;

        let files_merged: usize = actions.iter().map(|a| a.removed.len()).sum();
        let snapshot = {
            let mut result = self.result.write().unwrap();
            result.total_files = detection.total_files;
            result.duplicate_groups = detection.groups;
            result.merged = actions;
            result.errors.extend(errors);
            if result.errors.len() > MAX_TRACKED_ERRORS {
                let excess = result.errors.len() - MAX_TRACKED_ERRORS;
                result.errors.drain(..excess);
            }
            result.timings.scan_ms = scan_ms;
            result.timings.merge_ms = merge_ms;
            result.last_scan = Some(Utc::now());
            result.scans_completed += 1;
            result.files_merged += files_merged as u64;
            result.clone()
        };

        if let Err(e) = self.persist_state().await {
            error!("Failed to persist scan state: {}", e);
            self.record_error("persist", &e.to_string());
        }
        if kind == ScanKind::Full {
            if let Err(e) = self.reports.write_scan_report(&snapshot).await {
                error!("Failed to write scan report: {}", e);
                self.record_error("report", &e.to_string());
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "{:?} scan complete: {} files, {} duplicate groups, {} files merged in {} ms",
            kind,
            snapshot.total_files,
            snapshot.duplicate_groups.len(),
            files_merged,
            duration_ms
        );

        ScanStats {
            kind,
            files_scanned: snapshot.total_files,
            groups_found: snapshot.duplicate_groups.len(),
            files_merged,
            duration_ms,
        }
    }

    async fn persist_state(&self) -> Result<()> {
        let snapshot = self.result.read().unwrap().clone();
        write_json_atomic(&self.config.scan_data_path(), &snapshot).await
    }

    pub(crate) fn record_error(&self, context: &str, message: &str) {
        let mut result = self.result.write().unwrap();
        result.errors.push(ScanError {
            context: context.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config_for(root: &Path, base: &Path) -> SentryConfig {
        let mut config = SentryConfig::default();
        config.watch_paths.push(root.to_path_buf());
        config.data_dir = base.join("temp/scan");
        config.report_dir = base.join("reports");
        config.backup_dir = base.join("backups");
        config.log_dir = base.join("logs");
        // Keep background timers out of the way unless a test wants them
        config.scan_interval_secs = 3600;
        config.debounce_ms = 100;
        config
    }

    #[tokio::test]
    async fn test_full_scan_merges_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        std::fs::write(root.join("a/util.js"), b"shared").unwrap();
        std::fs::write(root.join("b/util.js"), b"shared").unwrap();

        let config = config_for(&root, temp_dir.path());
        let scanner = Scanner::new(config.clone());

        let outcome = scanner.run_scan(ScanKind::Full).await;
        let stats = match outcome {
            ScanOutcome::Completed(stats) => stats,
            ScanOutcome::Skipped => panic!("scan unexpectedly skipped"),
        };

        assert_eq!(stats.files_scanned, 2);
        // One exact group and one similar-name group were detected
        assert_eq!(stats.groups_found, 2);
        assert_eq!(stats.files_merged, 1);

        // Exactly one copy survives, with a backup of the other
        let survivors: Vec<_> = walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();
        assert_eq!(survivors.len(), 1);
        assert!(config.backup_dir.join("util.js.backup").exists());

        // State and report files were written
        assert!(config.scan_data_path().exists());
        assert!(config.report_dir.join("scan-report.json").exists());
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(&root).unwrap();

        let scanner = Scanner::new(config_for(&root, temp_dir.path()));

        scanner.scan_in_flight.store(true, Ordering::SeqCst);
        assert!(matches!(
            scanner.run_scan(ScanKind::Quick).await,
            ScanOutcome::Skipped
        ));

        scanner.scan_in_flight.store(false, Ordering::SeqCst);
        assert!(matches!(
            scanner.run_scan(ScanKind::Quick).await,
            ScanOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_counters_resume_from_persisted_state() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(&root).unwrap();
        let config = config_for(&root, temp_dir.path());

        let first = Scanner::new(config.clone());
        first.run_scan(ScanKind::Full).await;
        first.run_scan(ScanKind::Full).await;
        assert_eq!(first.status().scans_completed, 2);

        let second = Scanner::new(config);
        second.load_state().await;
        assert_eq!(second.status().scans_completed, 2);
    }

    #[tokio::test]
    async fn test_start_fails_without_watchable_paths() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist");
        let scanner = Arc::new(Scanner::new(config_for(&missing, temp_dir.path())));

        assert!(Arc::clone(&scanner).start().await.is_err());
        assert!(!scanner.is_running());
    }

    #[tokio::test]
    async fn test_lifecycle_runs_initial_scan_and_stops_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("only.js"), b"content").unwrap();

        let config = config_for(&root, temp_dir.path());
        let scanner = Arc::new(Scanner::new(config.clone()));
        Arc::clone(&scanner).start().await.unwrap();
        assert!(scanner.is_running());

        // The interval timer fires immediately, producing an initial full scan
        let deadline = Instant::now() + Duration::from_secs(5);
        while scanner.status().scans_completed == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(scanner.status().scans_completed >= 1);

        scanner.stop().await;
        assert!(!scanner.is_running());
        assert!(config.scan_data_path().exists());
    }

    #[tokio::test]
    async fn test_watcher_event_triggers_debounced_quick_scan() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("files");
        std::fs::create_dir_all(&root).unwrap();

        let config = config_for(&root, temp_dir.path());
        let scanner = Arc::new(Scanner::new(config));
        Arc::clone(&scanner).start().await.unwrap();

        // Wait out the immediate initial full scan
        let deadline = Instant::now() + Duration::from_secs(5);
        while scanner.status().scans_completed < 1 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let after_initial = scanner.status().scans_completed;

        std::fs::write(root.join("fresh.js"), b"new file").unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while scanner.status().scans_completed == after_initial && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(scanner.status().scans_completed > after_initial);

        scanner.stop().await;
    }
}
