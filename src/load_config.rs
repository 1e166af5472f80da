/// `load_config` module: Loads a static YAML config and injects remote-store
/// credentials from the environment.
///
/// This is the only place where the user-supplied YAML file is parsed and mapped
/// to the strongly-typed [`SyncConfig`] and [`RemoteConfig`].
///
/// # Accepted schema
/// ```yaml
/// sync:
///   config_root_path: configs
///   sync_mode: BOTH          # STARTUP | SCHEDULE | BOTH
///   sync_interval_minutes: 30
///   override_existing: true
///   backup_enabled: true
///   backup_path: backup
/// remote:
///   server_addr: http://localhost:8848
///   namespace: ""
///   timeout_ms: 5000
/// ```
/// Both sections, and every key inside them, are optional.
///
/// # Environment
/// `CONFIG_SYNC_SERVER_ADDR`, `CONFIG_SYNC_USERNAME` and `CONFIG_SYNC_PASSWORD`
/// override the corresponding `remote` keys, so secrets can stay out of the file.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use config_sync_core::config::SyncConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::remote::RemoteConfig;

pub const ENV_SERVER_ADDR: &str = "CONFIG_SYNC_SERVER_ADDR";
pub const ENV_USERNAME: &str = "CONFIG_SYNC_USERNAME";
pub const ENV_PASSWORD: &str = "CONFIG_SYNC_PASSWORD";

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Loads a static YAML config file and injects env overrides for the remote section.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config = parse_config(&config_content).map_err(|e| {
        error!(error = %e, config_path = ?path_ref, "Failed to parse config YAML");
        e
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    apply_env_overrides(&mut config.remote);
    config.sync.trace_loaded();
    Ok(config)
}

/// Parse YAML text. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<CliConfig> {
    if content.trim().is_empty() {
        return Ok(CliConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))
}

fn apply_env_overrides(remote: &mut RemoteConfig) {
    if let Ok(addr) = std::env::var(ENV_SERVER_ADDR) {
        info!(server_addr = %addr, "{ENV_SERVER_ADDR} found in env");
        remote.server_addr = addr;
    }
    if let Ok(username) = std::env::var(ENV_USERNAME) {
        info!("{ENV_USERNAME} found in env");
        remote.username = Some(username);
    }
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        info!("{ENV_PASSWORD} found in env");
        remote.password = Some(password);
    }
}
