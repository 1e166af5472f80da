//! High-level pipeline: scan → reconcile → summarise.
//!
//! This module provides the [`SyncOrchestrator`], which reconciles every
//! configuration file found under the config root against a [`RemoteStore`]:
//!   - Scans the config root into [`ConfigMetadata`] records (fresh on every call)
//!   - For each record decides skip / back up / publish
//!   - Aggregates per-record [`SyncOutcome`]s into a [`SyncSummary`]
//!
//! # Triggers
//! - [`SyncOrchestrator::startup_trigger`] and [`SyncOrchestrator::scheduled_trigger`]
//!   honour `sync_enabled` and the configured [`SyncMode`](crate::config::SyncMode).
//! - [`SyncOrchestrator::manual_sync`] and [`SyncOrchestrator::targeted_sync`] always run.
//!
//! # Exclusivity
//! Only one synchronisation runs at a time. A second attempt does not wait: it
//! returns immediately with [`SyncStatus::AlreadyRunning`] (or `false` for a
//! targeted sync).
//!
//! # Error Handling
//! Nothing here returns an error to the caller. A failing record is counted as
//! [`SyncOutcome::Failed`] and the loop carries on; a fault in the batch itself
//! is logged and the summary reflects whatever completed.

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backup::BackupManager;
use crate::config::SyncConfig;
use crate::contract::{BackupStore, RemoteStore, FETCH_TIMEOUT};
use crate::metadata::ConfigMetadata;
use crate::scanner::FileScanner;

/// Result of reconciling one record. Every attempt is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    Success,
    Skipped,
    Failed,
}

/// How a full synchronisation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Completed,
    /// Stopped early by a cancel signal or the batch deadline.
    Cancelled,
    /// Another synchronisation was already in progress; nothing was done.
    AlreadyRunning,
    /// The batch itself failed part-way; counts cover what completed.
    Aborted,
}

/// Aggregate result of one full synchronisation. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Number of records discovered by the scan.
    pub total: usize,
    pub elapsed: Duration,
    pub status: SyncStatus,
}

impl SyncSummary {
    fn from_outcomes(outcomes: &[SyncOutcome], total: usize, elapsed: Duration, status: SyncStatus) -> Self {
        let count = |o: SyncOutcome| outcomes.iter().filter(|x| **x == o).count();
        Self {
            success: count(SyncOutcome::Success),
            skipped: count(SyncOutcome::Skipped),
            failed: count(SyncOutcome::Failed),
            total,
            elapsed,
            status,
        }
    }

    fn already_running() -> Self {
        Self::from_outcomes(&[], 0, Duration::ZERO, SyncStatus::AlreadyRunning)
    }

    pub fn processed(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub sync_running: bool,
}

/// Releases the in-progress flag when the run ends, however it ends.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives reconciliation of local config files against a remote store.
pub struct SyncOrchestrator<R, B> {
    config: SyncConfig,
    scanner: FileScanner,
    remote: R,
    backup: B,
    running: AtomicBool,
    current: Mutex<CancellationToken>,
}

impl<R: RemoteStore> SyncOrchestrator<R, BackupManager> {
    /// Orchestrator writing backups to the filesystem under `config.backup_path`.
    pub fn with_backup_manager(config: SyncConfig, remote: R) -> Self {
        let backup = BackupManager::new(&config);
        Self::new(config, remote, backup)
    }
}

impl<R, B> SyncOrchestrator<R, B>
where
    R: RemoteStore,
    B: BackupStore,
{
    pub fn new(config: SyncConfig, remote: R, backup: B) -> Self {
        let scanner = FileScanner::new(config.config_root_path.clone(), &config.extensions);
        Self {
            config,
            scanner,
            remote,
            backup,
            running: AtomicBool::new(false),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn backup(&self) -> &B {
        &self.backup
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { flag: &self.running })
    }

    /// Acquire the guard and publish `token` as the current one under the same
    /// lock `cancel` takes, so a cancel seen after `is_running()` reaches this run.
    fn begin_run(&self, token: &CancellationToken) -> Option<RunGuard<'_>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = self.try_acquire()?;
        *current = token.clone();
        Some(guard)
    }

    /// Cancel the in-flight full synchronisation, if any. Records already being
    /// reconciled finish; no new record is started.
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Scan the config root into metadata records, applying the environment allow-list.
    pub fn scan(&self) -> Vec<ConfigMetadata> {
        self.scanner
            .scan()
            .iter()
            .map(ConfigMetadata::from_scanned)
            .filter(|m| {
                self.config.environments.is_empty()
                    || self.config.environments.contains(&m.environment)
            })
            .collect()
    }

    /// Scan and reconcile every record.
    pub async fn full_sync(&self) -> SyncSummary {
        self.full_sync_with(CancellationToken::new()).await
    }

    /// Like [`full_sync`](Self::full_sync), stopping between records once `token` is cancelled.
    pub async fn full_sync_with(&self, token: CancellationToken) -> SyncSummary {
        let Some(_guard) = self.begin_run(&token) else {
            warn!("[SYNC] Synchronisation already running, request ignored");
            return SyncSummary::already_running();
        };

        let started = Instant::now();
        let deadline = self.config.batch_timeout().map(|t| started + t);
        info!("==================== [SYNC] Starting config synchronisation ====================");

        let configs = self.scan();
        let total = configs.len();
        if configs.is_empty() {
            warn!("[SYNC] No config files found, synchronisation finished");
            return SyncSummary::from_outcomes(&[], 0, started.elapsed(), SyncStatus::Completed);
        }

        let mut outcomes = Vec::with_capacity(total);
        let batch = AssertUnwindSafe(self.reconcile_all(configs, &token, deadline, &mut outcomes))
            .catch_unwind()
            .await;
        if batch.is_err() {
            error!(completed = outcomes.len(), "[SYNC][ERROR] Synchronisation batch aborted unexpectedly");
        }

        let status = match (batch.is_ok(), outcomes.len() < total) {
            (false, _) => SyncStatus::Aborted,
            (true, true) => SyncStatus::Cancelled,
            (true, false) => SyncStatus::Completed,
        };
        let summary = SyncSummary::from_outcomes(&outcomes, total, started.elapsed(), status);

        info!("==================== [SYNC] Config synchronisation finished ====================");
        info!(
            success = summary.success,
            skipped = summary.skipped,
            failed = summary.failed,
            total = summary.total,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            status = ?summary.status,
            "[SYNC] Synchronisation result"
        );
        if let Ok(json) = serde_json::to_string(&summary) {
            debug!(json = %json, "[SYNC][DEBUG] Summary as JSON");
        }
        summary
    }

    async fn reconcile_all(
        &self,
        configs: Vec<ConfigMetadata>,
        token: &CancellationToken,
        deadline: Option<Instant>,
        outcomes: &mut Vec<SyncOutcome>,
    ) {
        let parallelism = self.config.parallelism.max(1);
        let results = stream::iter(configs)
            .map(|metadata| async move {
                let expired = deadline.map(|d| Instant::now() >= d).unwrap_or(false);
                if token.is_cancelled() || expired {
                    debug!(data_id = %metadata.data_id, expired, "[SYNC] Synchronisation cancelled, not starting config");
                    return None;
                }
                Some(self.reconcile_guarded(&metadata).await)
            })
            .buffer_unordered(parallelism);
        futures::pin_mut!(results);

        let mut not_started = 0;
        while let Some(result) = results.next().await {
            match result {
                Some(outcome) => outcomes.push(outcome),
                None => not_started += 1,
            }
        }
        if not_started > 0 {
            warn!(not_started, "[SYNC] Synchronisation cancelled, remaining configs not started");
        }
    }

    async fn reconcile_guarded(&self, metadata: &ConfigMetadata) -> SyncOutcome {
        match AssertUnwindSafe(self.reconcile(metadata)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(data_id = %metadata.data_id, group = %metadata.group, "[SYNC][ERROR] Reconciliation aborted unexpectedly");
                SyncOutcome::Failed
            }
        }
    }

    /// Reconcile one record: skip if overriding is forbidden, back up existing
    /// remote content, then publish.
    ///
    /// Existing content is backed up before every overwrite, even when it is
    /// identical to what is about to be published.
    pub async fn reconcile(&self, metadata: &ConfigMetadata) -> SyncOutcome {
        let data_id = metadata.data_id.as_str();
        let group = metadata.effective_group();
        debug!(data_id, group, namespace = %metadata.namespace, "[SYNC] Reconciling config");

        let exists = self.remote.exists(data_id, group).await;
        if exists && !self.config.override_existing {
            info!(data_id, group, "[SYNC] Config exists and overriding is disabled, skipping");
            return SyncOutcome::Skipped;
        }

        if exists && self.config.backup_enabled {
            match self.remote.get(data_id, group, FETCH_TIMEOUT).await {
                Some(existing) if !existing.is_empty() => {
                    self.backup.backup_config(metadata, &existing);
                }
                _ => debug!(data_id, group, "[SYNC] No remote content to back up"),
            }
        }

        if self.remote.publish(metadata).await {
            info!(data_id, group, "[SYNC] Config published");
            SyncOutcome::Success
        } else {
            warn!(data_id, group, "[SYNC] Config publish failed");
            SyncOutcome::Failed
        }
    }

    /// Reconcile only the first record in `environment`/`app_name` whose data id
    /// contains `config_name`. Returns whether it was published.
    pub async fn targeted_sync(&self, environment: &str, app_name: &str, config_name: &str) -> bool {
        info!(environment, app_name, config_name, "[SYNC] Targeted synchronisation requested");
        let Some(_guard) = self.try_acquire() else {
            warn!("[SYNC] Synchronisation already running, targeted request ignored");
            return false;
        };

        let found = self.scan().into_iter().find(|m| {
            m.environment == environment && m.app_name == app_name && m.data_id.contains(config_name)
        });
        let Some(metadata) = found else {
            warn!(environment, app_name, config_name, "[SYNC] No matching config file found");
            return false;
        };

        let outcome = self.reconcile_guarded(&metadata).await;
        let success = outcome == SyncOutcome::Success;
        info!(data_id = %metadata.data_id, group = %metadata.group, ?outcome, "[SYNC] Targeted synchronisation finished");
        success
    }

    /// Run a full synchronisation on demand and describe the result.
    pub async fn manual_sync(&self) -> String {
        info!("[SYNC] Manual synchronisation requested");
        let summary = self.full_sync().await;
        let message = match summary.status {
            SyncStatus::AlreadyRunning => {
                "Manual sync rejected: a synchronisation is already running".to_string()
            }
            status => format!(
                "Manual sync {} in {} ms (success: {}, skipped: {}, failed: {}, total: {})",
                match status {
                    SyncStatus::Cancelled => "cancelled",
                    SyncStatus::Aborted => "aborted",
                    _ => "finished",
                },
                summary.elapsed.as_millis(),
                summary.success,
                summary.skipped,
                summary.failed,
                summary.total
            ),
        };
        info!(message = %message, "[SYNC] Manual synchronisation done");
        message
    }

    /// Full synchronisation after process start, when enabled for this mode.
    pub async fn startup_trigger(&self) -> Option<SyncSummary> {
        if !self.config.sync_enabled {
            info!("[SYNC] Synchronisation disabled, skipping startup sync");
            return None;
        }
        if !self.config.sync_mode.runs_on_startup() {
            debug!(mode = ?self.config.sync_mode, "[SYNC] Startup sync not enabled for mode");
            return None;
        }
        info!("[SYNC] Startup complete, running config synchronisation");
        Some(self.full_sync().await)
    }

    /// Full synchronisation from the periodic timer, when enabled for this mode.
    pub async fn scheduled_trigger(&self) -> Option<SyncSummary> {
        if !self.config.sync_enabled || !self.config.sync_mode.runs_on_schedule() {
            return None;
        }
        info!("[SYNC] Running scheduled config synchronisation");
        Some(self.full_sync().await)
    }

    /// Remove backups older than `retention_days`; returns the number of deleted files.
    pub fn cleanup_backups(&self, retention_days: u32) -> usize {
        self.backup.cleanup_expired_backups(retention_days)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "UP",
            service: "config-sync",
            sync_running: self.is_running(),
        }
    }
}
