//! Long-running trigger loop: one startup sync, then a scheduled sync every
//! `sync_interval_minutes` until shutdown.

use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use config_sync_core::contract::{BackupStore, RemoteStore};
use config_sync_core::synchronise::{SyncOrchestrator, SyncStatus, SyncSummary};

/// A trigger ran only if it produced a summary that was not rejected by the run guard.
fn ran(summary: Option<SyncSummary>) -> bool {
    summary.is_some_and(|s| s.status != SyncStatus::AlreadyRunning)
}

/// Drive the startup and scheduled triggers until `shutdown` is cancelled.
///
/// Cancelling `shutdown` also cancels a synchronisation that is in flight.
/// Returns how many synchronisations actually ran.
pub async fn serve<R, B>(orchestrator: Arc<SyncOrchestrator<R, B>>, shutdown: CancellationToken) -> usize
where
    R: RemoteStore + 'static,
    B: BackupStore + 'static,
{
    let watcher = {
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            orchestrator.cancel();
        })
    };

    let mut runs = 0;
    if ran(orchestrator.startup_trigger().await) {
        runs += 1;
    }

    let period = orchestrator.config().sync_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs(), mode = ?orchestrator.config().sync_mode, "[SCHEDULE] Trigger loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if ran(orchestrator.scheduled_trigger().await) {
                    runs += 1;
                }
            }
        }
    }

    watcher.abort();
    info!(runs, "[SCHEDULE] Trigger loop stopped");
    runs
}
