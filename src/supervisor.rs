//! Supervision of the scanner: lifecycle, health checks, bounded
//! auto-recovery, and the error-threshold circuit breaker.
//!
//! The supervisor owns the scanner handle and the periodic backup task and
//! exposes the control surface an external transport layer calls into.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backup::BackupScheduler;
use crate::config::SentryConfig;
use crate::report::{ReportEntry, ReportGenerator};
use crate::scanner::{ScanKind, ScanOutcome, Scanner, ScannerStatus};
use crate::Result;

/// Bounded log of recent supervisor-level errors
const MAX_RECENT_ERRORS: usize = 20;

/// Supervisor state, readable concurrently with the loops that update it
#[derive(Debug, Clone, Default, Serialize)]
pub struct SupervisorStatus {
    pub is_running: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub recent_errors: Vec<String>,
    pub scans_completed: u64,
    pub merges_completed: u64,
    pub backups_completed: u64,
}

/// Combined status snapshot for the external control surface
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub supervisor: SupervisorStatus,
    pub scanner: ScannerStatus,
}

/// Keeps the scanner alive and exposes the external control operations
pub struct Supervisor {
    config: SentryConfig,
    scanner: Arc<Scanner>,
    backups: BackupScheduler,
    reports: ReportGenerator,
    status: RwLock<SupervisorStatus>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(config: SentryConfig) -> Self {
        let scanner = Arc::new(Scanner::new(config.clone()));
        let backups = BackupScheduler::new(config.clone());
        let reports = ReportGenerator::new(&config.report_dir);

        Self {
            config,
            scanner,
            backups,
            reports,
            status: RwLock::new(SupervisorStatus::default()),
            shutdown: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start the scanner and the supervision loops. Idempotent.
    ///
    /// A scanner that fails to start does not fail the supervisor; the
    /// health-check loop will attempt recovery within its retry budget.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        if self.status.read().unwrap().is_running {
            debug!("Supervisor already running");
            return Ok(());
        }
        info!("Starting supervisor");

        if let Err(e) = Arc::clone(&self.scanner).start().await {
            error!("Scanner failed to start: {}", e);
            self.push_error(format!("scanner start: {}", e));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock().unwrap() = Some(shutdown_tx);

        let mut tasks = Vec::new();

        // Health-check loop
        {
            let supervisor = Arc::clone(&self);
            let mut shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                let period = supervisor.config.health_check_interval();
                let mut ticker =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = ticker.tick() => supervisor.check_health().await,
                    }
                }
            }));
        }

        // Circuit-breaker loop
        {
            let supervisor = Arc::clone(&self);
            let mut shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                let period = supervisor.config.auto_recovery_interval();
                let mut ticker =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        // Run detached: a tripped breaker restarts the
                        // supervisor, which waits for this very loop to exit
                        _ = ticker.tick() => {
                            tokio::spawn(Arc::clone(&supervisor).check_circuit_breaker());
                        }
                    }
                }
            }));
        }

        // Backup loop
        {
            let supervisor = Arc::clone(&self);
            let mut shutdown = shutdown_rx;
            tasks.push(tokio::spawn(async move {
                let period = supervisor.config.backup_interval();
                let mut ticker =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = supervisor.run_backup_cycle().await {
                                error!("Scheduled backup failed: {}", e);
                                supervisor.push_error(format!("backup: {}", e));
                            }
                        }
                    }
                }
            }));
        }

        *self.tasks.lock().unwrap() = tasks;
        {
            let mut status = self.status.write().unwrap();
            status.is_running = true;
            status.start_time = Some(Utc::now());
        }

        info!("Supervisor started");
        Ok(())
    }

    /// Stop the supervision loops and the scanner. Idempotent.
    pub async fn stop(&self) {
        if !self.status.read().unwrap().is_running {
            return;
        }
        info!("Stopping supervisor");

        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().unwrap().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        self.scanner.stop().await;
        self.status.write().unwrap().is_running = false;

        info!("Supervisor stopped");
    }

    /// Stop everything, pause briefly, reset counters, and start again
    pub async fn restart(self: Arc<Self>) -> Result<()> {
        info!("Restarting supervisor");
        self.stop().await;
        tokio::time::sleep(self.config.restart_delay()).await;

        *self.status.write().unwrap() = SupervisorStatus::default();
        if let Err(e) = self.scanner.clear_errors().await {
            warn!("Could not clear persisted scan errors: {}", e);
        }

        Arc::clone(&self).start().await
    }

    /// One health check: record the check time and recover the scanner if
    /// it is down, within the retry budget.
    pub async fn check_health(&self) {
        self.status.write().unwrap().last_health_check = Some(Utc::now());
        self.sync_counters();

        if self.scanner.is_running() {
            return;
        }
        warn!("Health check failed: scanner is not running");
        self.attempt_recovery().await;
    }

    /// Circuit breaker: a full restart once accumulated scan errors pass
    /// the configured threshold, to stop repeated failure loops.
    pub fn check_circuit_breaker(self: Arc<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        // Returned as a boxed `dyn Future + Send` to break the recursive-async
        // type cycle (start spawns this -> restart -> start); the erased,
        // declared-Send return type terminates auto-trait inference.
        Box::pin(async move {
            let errors = self.scanner.error_count();
            if errors <= self.config.error_threshold {
                return;
            }
            warn!(
                "Error count {} exceeds threshold {}, forcing restart",
                errors, self.config.error_threshold
            );
            if let Err(e) = Arc::clone(&self).restart().await {
                error!("Circuit-breaker restart failed: {}", e);
                self.push_error(format!("restart: {}", e));
            }
        })
    }

    /// Combined supervisor + scanner status snapshot
    pub fn status(&self) -> SystemStatus {
        self.sync_counters();
        SystemStatus {
            supervisor: self.status.read().unwrap().clone(),
            scanner: self.scanner.status(),
        }
    }

    /// Run a full scan now; returns once the scan completes or was skipped
    pub async fn trigger_scan(&self) -> ScanOutcome {
        let outcome = self.scanner.run_scan(ScanKind::Full).await;
        self.sync_counters();
        outcome
    }

    /// Take a whole-tree snapshot now
    pub async fn trigger_backup(&self) -> Result<PathBuf> {
        self.run_backup_cycle().await
    }

    /// Write an on-demand system report combining supervisor and scanner state
    pub async fn write_system_report(&self) -> Result<PathBuf> {
        let status = self.status();
        self.reports
            .write_system_report(&status.supervisor, &status.scanner)
            .await
    }

    /// List generated report files with metadata
    pub async fn list_reports(&self) -> Result<Vec<ReportEntry>> {
        self.reports.list_reports().await
    }

    async fn run_backup_cycle(&self) -> Result<PathBuf> {
        let started = Instant::now();
        let path = self.backups.snapshot_all().await?;
        self.scanner
            .note_backup_duration(started.elapsed().as_millis() as u64);
        self.status.write().unwrap().backups_completed += 1;
        Ok(path)
    }

    /// Recovery is bounded: after `max_retries` failed attempts the
    /// supervisor stops trying and only logs; a successful recovery resets
    /// the retry counter.
    async fn attempt_recovery(&self) {
        let retries = self.status.read().unwrap().retry_count;
        if retries >= self.config.max_retries {
            error!(
                "Recovery attempts exhausted ({}/{}); scanner stays down",
                retries, self.config.max_retries
            );
            return;
        }

        self.status.write().unwrap().retry_count = retries + 1;
        info!(
            "Attempting scanner recovery ({}/{})",
            retries + 1,
            self.config.max_retries
        );

        self.scanner.stop().await;
        tokio::time::sleep(self.config.restart_delay()).await;

        match Arc::clone(&self.scanner).start().await {
            Ok(()) => {
                info!("Scanner recovered");
                self.status.write().unwrap().retry_count = 0;
            }
            Err(e) => {
                error!("Recovery attempt failed: {}", e);
                self.push_error(format!("recovery: {}", e));
            }
        }
    }

    fn sync_counters(&self) {
        let scanner = self.scanner.status();
        let mut status = self.status.write().unwrap();
        status.scans_completed = scanner.scans_completed;
        status.merges_completed = scanner.files_merged;
    }

    fn push_error(&self, message: String) {
        let mut status = self.status.write().unwrap();
        status.recent_errors.push(message);
        if status.recent_errors.len() > MAX_RECENT_ERRORS {
            let excess = status.recent_errors.len() - MAX_RECENT_ERRORS;
            status.recent_errors.drain(..excess);
        }
    }
}
