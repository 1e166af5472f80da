//! Snapshots of remote content taken before it is overwritten, plus retention cleanup.
//!
//! Layout: `<backup_path>/<environment>/<app>/<environment>_<app>_<data_id>_<yyyyMMdd_HHmmss>.bak`.
//! There is no index file; cleanup relies only on the `.bak` suffix and the
//! file modification time.

use chrono::Local;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::contract::BackupStore;
use crate::metadata::ConfigMetadata;

pub const BACKUP_EXTENSION: &str = ".bak";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Filesystem-backed [`BackupStore`].
#[derive(Debug, Clone)]
pub struct BackupManager {
    enabled: bool,
    root: PathBuf,
}

impl BackupManager {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            enabled: config.backup_enabled,
            root: config.backup_path.clone(),
        }
    }

    /// Where a snapshot of `metadata` taken at `timestamp` is written.
    pub fn backup_file_path(&self, metadata: &ConfigMetadata, timestamp: &str) -> PathBuf {
        let file_name = format!(
            "{}_{}_{}_{}{}",
            metadata.environment, metadata.app_name, metadata.data_id, timestamp, BACKUP_EXTENSION
        );
        self.root
            .join(&metadata.environment)
            .join(&metadata.app_name)
            .join(file_name)
    }

    fn write_backup(&self, metadata: &ConfigMetadata, existing_content: &str) -> std::io::Result<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = self.backup_file_path(metadata, &timestamp);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, existing_content.as_bytes())?;
        Ok(path)
    }

    /// Delete expired `.bak` files below the root and prune directories left empty.
    ///
    /// Traversal is iterative and post-order, so a directory is examined only
    /// after everything inside it has been processed.
    fn cleanup_tree(&self, cutoff: SystemTime) -> usize {
        if !self.root.is_dir() {
            return 0;
        }

        let mut deleted = 0;
        for entry in WalkDir::new(&self.root).min_depth(1).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "[BACKUP] Cannot list backup entry, skipping");
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                let is_empty = std::fs::read_dir(path)
                    .map(|mut entries| entries.next().is_none())
                    .unwrap_or(false);
                if is_empty {
                    match std::fs::remove_dir(path) {
                        Ok(()) => debug!(dir = %path.display(), "[BACKUP] Removed empty backup directory"),
                        Err(e) => warn!(dir = %path.display(), error = %e, "[BACKUP] Failed to remove empty directory"),
                    }
                }
                continue;
            }

            let is_backup = entry
                .file_name()
                .to_str()
                .map(|n| n.ends_with(BACKUP_EXTENSION))
                .unwrap_or(false);
            if !entry.file_type().is_file() || !is_backup {
                continue;
            }

            let expired = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|modified| modified < cutoff)
                .unwrap_or(false);
            if !expired {
                continue;
            }

            match std::fs::remove_file(path) {
                Ok(()) => {
                    deleted += 1;
                    debug!(file = %path.display(), "[BACKUP] Deleted expired backup");
                }
                Err(e) => warn!(file = %path.display(), error = %e, "[BACKUP] Failed to delete expired backup"),
            }
        }
        deleted
    }
}

impl BackupStore for BackupManager {
    fn backup_config(&self, metadata: &ConfigMetadata, existing_content: &str) {
        if !self.enabled {
            return;
        }
        match self.write_backup(metadata, existing_content) {
            Ok(path) => {
                info!(data_id = %metadata.data_id, path = %path.display(), "[BACKUP] Backed up remote config");
            }
            Err(e) => {
                error!(data_id = %metadata.data_id, error = ?e, "[BACKUP][ERROR] Failed to back up remote config");
            }
        }
    }

    fn cleanup_expired_backups(&self, retention_days: u32) -> usize {
        if !self.enabled {
            return 0;
        }
        let cutoff = SystemTime::now()
            .checked_sub(DAY * retention_days)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let deleted = self.cleanup_tree(cutoff);
        info!(deleted, retention_days, root = %self.root.display(), "[BACKUP] Expired backup cleanup complete");
        deleted
    }
}
