use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Which triggers are allowed to start a full synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMode {
    /// Only once, right after process initialisation.
    #[default]
    Startup,
    /// Only on the periodic timer.
    Schedule,
    /// On startup and on the periodic timer.
    Both,
}

impl SyncMode {
    pub fn runs_on_startup(self) -> bool {
        matches!(self, SyncMode::Startup | SyncMode::Both)
    }

    pub fn runs_on_schedule(self) -> bool {
        matches!(self, SyncMode::Schedule | SyncMode::Both)
    }
}

/// Settings shared by the scanner, backup manager and orchestrator.
///
/// Passed explicitly into every component at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub config_root_path: PathBuf,
    pub sync_enabled: bool,
    pub sync_mode: SyncMode,
    pub sync_interval_minutes: u64,
    pub override_existing: bool,
    pub backup_enabled: bool,
    pub backup_path: PathBuf,
    /// File extensions (without the dot) picked up by the scanner.
    pub extensions: Vec<String>,
    /// When non-empty, only files under these environments are synchronised.
    pub environments: Vec<String>,
    /// Maximum number of entries reconciled concurrently.
    pub parallelism: usize,
    /// Optional deadline for one full synchronisation, in seconds.
    pub batch_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            config_root_path: PathBuf::from("configs"),
            sync_enabled: true,
            sync_mode: SyncMode::Startup,
            sync_interval_minutes: 30,
            override_existing: true,
            backup_enabled: true,
            backup_path: PathBuf::from("backup"),
            extensions: ["yml", "yaml", "properties", "json", "xml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            environments: Vec::new(),
            parallelism: 1,
            batch_timeout_secs: None,
        }
    }
}

impl SyncConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes.max(1) * 60)
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_secs.map(Duration::from_secs)
    }

    pub fn trace_loaded(&self) {
        info!(
            config_root_path = %self.config_root_path.display(),
            sync_enabled = self.sync_enabled,
            sync_mode = ?self.sync_mode,
            override_existing = self.override_existing,
            backup_enabled = self.backup_enabled,
            backup_path = %self.backup_path.display(),
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = SyncConfig::default();
        assert_eq!(c.config_root_path, PathBuf::from("configs"));
        assert!(c.sync_enabled);
        assert_eq!(c.sync_mode, SyncMode::Startup);
        assert_eq!(c.sync_interval_minutes, 30);
        assert!(c.override_existing);
        assert!(c.backup_enabled);
        assert_eq!(c.backup_path, PathBuf::from("backup"));
        assert_eq!(c.parallelism, 1);
    }

    #[test]
    fn mode_gates() {
        assert!(SyncMode::Startup.runs_on_startup());
        assert!(!SyncMode::Startup.runs_on_schedule());
        assert!(!SyncMode::Schedule.runs_on_startup());
        assert!(SyncMode::Schedule.runs_on_schedule());
        assert!(SyncMode::Both.runs_on_startup() && SyncMode::Both.runs_on_schedule());
    }

    #[test]
    fn mode_deserialises_from_uppercase() {
        let mode: SyncMode = serde_json::from_str("\"BOTH\"").unwrap();
        assert_eq!(mode, SyncMode::Both);
    }
}
