use std::fs;
use std::sync::Arc;
use std::time::Duration;

use config_sync::schedule::serve;
use config_sync_core::backup::BackupManager;
use config_sync_core::config::{SyncConfig, SyncMode};
use config_sync_core::memory::MemoryStore;
use config_sync_core::synchronise::SyncOrchestrator;
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

fn orchestrator(mode: SyncMode, enabled: bool) -> (TempDir, Arc<SyncOrchestrator<MemoryStore, BackupManager>>) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("configs");
    fs::create_dir_all(root.join("dev/user-service")).unwrap();
    fs::write(root.join("dev/user-service/application.yml"), "a: 1").unwrap();

    let config = SyncConfig {
        config_root_path: root,
        backup_path: dir.path().join("backup"),
        sync_mode: mode,
        sync_enabled: enabled,
        sync_interval_minutes: 1,
        ..SyncConfig::default()
    };
    let orchestrator = SyncOrchestrator::with_backup_manager(config, MemoryStore::new());
    (dir, Arc::new(orchestrator))
}

async fn run_for(
    orchestrator: Arc<SyncOrchestrator<MemoryStore, BackupManager>>,
    elapsed: Duration,
) -> usize {
    let shutdown = CancellationToken::new();
    let stop = async {
        tokio::time::sleep(elapsed).await;
        shutdown.cancel();
    };
    let (runs, _) = tokio::join!(serve(orchestrator, shutdown.clone()), stop);
    runs
}

#[tokio::test(start_paused = true)]
async fn test_both_mode_runs_startup_then_every_interval() {
    let (_dir, orchestrator) = orchestrator(SyncMode::Both, true);
    let runs = run_for(orchestrator.clone(), Duration::from_secs(125)).await;
    assert_eq!(runs, 3);
    assert_eq!(orchestrator.remote().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_startup_mode_runs_once() {
    let (_dir, orchestrator) = orchestrator(SyncMode::Startup, true);
    assert_eq!(run_for(orchestrator, Duration::from_secs(185)).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_mode_waits_for_first_tick() {
    let (_dir, orchestrator) = orchestrator(SyncMode::Schedule, true);
    assert_eq!(run_for(orchestrator.clone(), Duration::from_secs(30)).await, 0);
    assert!(orchestrator.remote().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_sync_never_runs() {
    let (_dir, orchestrator) = orchestrator(SyncMode::Both, false);
    assert_eq!(run_for(orchestrator.clone(), Duration::from_secs(185)).await, 0);
    assert!(orchestrator.remote().is_empty());
}

/// Holds every `exists` call until the gate is opened.
struct GatedStore {
    gate: Arc<tokio::sync::Notify>,
    inner: MemoryStore,
}

#[async_trait::async_trait]
impl config_sync_core::contract::RemoteStore for GatedStore {
    async fn get(&self, data_id: &str, group: &str, timeout: Duration) -> Option<String> {
        self.inner.get(data_id, group, timeout).await
    }
    async fn exists(&self, data_id: &str, group: &str) -> bool {
        self.gate.notified().await;
        self.inner.exists(data_id, group).await
    }
    async fn publish(&self, metadata: &config_sync_core::metadata::ConfigMetadata) -> bool {
        self.inner.publish(metadata).await
    }
    async fn remove(&self, data_id: &str, group: &str) -> bool {
        self.inner.remove(data_id, group).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_tick_rejected_by_running_sync_is_not_counted() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("configs");
    fs::create_dir_all(root.join("dev/user-service")).unwrap();
    fs::write(root.join("dev/user-service/application.yml"), "a: 1").unwrap();
    let config = SyncConfig {
        config_root_path: root,
        backup_path: dir.path().join("backup"),
        sync_mode: SyncMode::Schedule,
        sync_interval_minutes: 1,
        ..SyncConfig::default()
    };
    let gate = Arc::new(tokio::sync::Notify::new());
    let store = GatedStore {
        gate: gate.clone(),
        inner: MemoryStore::new(),
    };
    let orchestrator = Arc::new(SyncOrchestrator::with_backup_manager(config, store));
    let shutdown = CancellationToken::new();

    // Holds the run guard across the first scheduled tick.
    let manual = orchestrator.manual_sync();
    let stop = async {
        tokio::time::sleep(Duration::from_secs(65)).await;
        shutdown.cancel();
        gate.notify_one();
    };
    let (message, runs, _) = tokio::join!(manual, serve(orchestrator.clone(), shutdown.clone()), stop);

    assert_eq!(runs, 0);
    assert!(message.starts_with("Manual sync"), "unexpected: {message}");
    assert!(!orchestrator.is_running());
}
