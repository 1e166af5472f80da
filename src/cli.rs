///
/// This module implements the CLI interface for config-sync: command parsing,
/// store selection and the user-visible output of every trigger.
///
/// All core business logic (scanning, reconciliation, backups) lives in the
/// [`config-sync-core`] crate. This module is strictly CLI glue.
///
/// ## Commands
/// - `sync`: manual full synchronisation
/// - `sync-one`: targeted synchronisation of one config file
/// - `scan`: list discovered metadata without touching the remote store
/// - `cleanup`: delete expired backups
/// - `get` / `remove`: read or delete one remote entry
/// - `health`: liveness probe
/// - `serve`: startup + periodic synchronisation until Ctrl-C
///
/// [`config-sync-core`]: ../../config-sync-core/
use crate::load_config::{load_config, CliConfig};
use crate::remote::HttpConfigStore;
use crate::schedule::serve;
use anyhow::Result;
use clap::{Parser, Subcommand};
use config_sync_core::backup::BackupManager;
use config_sync_core::contract::{RemoteStore, DEFAULT_GROUP, FETCH_TIMEOUT};
use config_sync_core::memory::MemoryStore;
use config_sync_core::synchronise::SyncOrchestrator;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// CLI for config-sync: publish a tree of config files to a configuration server.
#[derive(Parser)]
#[clap(
    name = "config-sync",
    version,
    about = "Synchronise <env>/<app>/<file> configuration trees into a remote configuration store"
)]
pub struct Cli {
    /// Path to the YAML config file (defaults are used when omitted)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use an in-memory store instead of the configured server
    #[clap(long, global = true)]
    pub dry_run: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronise every config file now
    Sync,
    /// Synchronise the first config file matching environment, app and name
    SyncOne {
        #[clap(long)]
        env: String,
        #[clap(long)]
        app: String,
        /// Substring of the data id to match
        #[clap(long = "config-name")]
        config_name: String,
    },
    /// List discovered config files and their derived metadata
    Scan,
    /// Delete backups older than the retention window
    Cleanup {
        #[clap(long, default_value_t = 7)]
        retention_days: u32,
    },
    /// Show the remote content of one entry
    Get {
        #[clap(long)]
        data_id: String,
        #[clap(long, default_value = DEFAULT_GROUP)]
        group: String,
    },
    /// Remove one entry from the remote store
    Remove {
        #[clap(long)]
        data_id: String,
        #[clap(long, default_value = DEFAULT_GROUP)]
        group: String,
    },
    /// Report service health
    Health,
    /// Run startup and scheduled synchronisation until interrupted
    Serve,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            tracing::info!("No config file given, using defaults");
            CliConfig::default()
        }
    };

    let result = if cli.dry_run {
        tracing::info!("Dry run: using in-memory remote store");
        let orchestrator = SyncOrchestrator::with_backup_manager(config.sync, MemoryStore::new());
        dispatch(cli.command, Arc::new(orchestrator)).await
    } else {
        let store = HttpConfigStore::new(&config.remote)
            .map_err(|e| anyhow::anyhow!("Failed to construct remote store: {e}"))?;
        let orchestrator = SyncOrchestrator::with_backup_manager(config.sync, store);
        dispatch(cli.command, Arc::new(orchestrator)).await
    };

    let exit_span = tracing::info_span!("exit");
    exit_span.in_scope(|| {
        tracing::info!(success = result.is_ok(), "exit");
    });

    // Explicit process exit only in main(), not in run()
    result
}

async fn dispatch<R>(command: Commands, orchestrator: Arc<SyncOrchestrator<R, BackupManager>>) -> Result<()>
where
    R: RemoteStore + 'static,
{
    match command {
        Commands::Sync => {
            let message = orchestrator.manual_sync().await;
            println!("{message}");
            Ok(())
        }
        Commands::SyncOne {
            env,
            app,
            config_name,
        } => {
            let success = orchestrator.targeted_sync(&env, &app, &config_name).await;
            println!(
                "{}",
                json!({ "success": success, "environment": env, "appName": app, "configName": config_name })
            );
            if success {
                Ok(())
            } else {
                Err(anyhow::anyhow!("Targeted sync did not publish {env}/{app}/{config_name}"))
            }
        }
        Commands::Scan => {
            let configs = orchestrator.scan();
            let out = json!({ "total": configs.len(), "data": configs });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Commands::Cleanup { retention_days } => {
            let deleted = orchestrator.cleanup_backups(retention_days);
            println!("{}", json!({ "deleted": deleted, "retentionDays": retention_days }));
            Ok(())
        }
        Commands::Get { data_id, group } => {
            let content = orchestrator.remote().get(&data_id, &group, FETCH_TIMEOUT).await;
            let out = json!({
                "dataId": data_id,
                "group": group,
                "exists": content.is_some(),
                "content": content,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Commands::Remove { data_id, group } => {
            let success = orchestrator.remote().remove(&data_id, &group).await;
            println!("{}", json!({ "success": success, "dataId": data_id, "group": group }));
            Ok(())
        }
        Commands::Health => {
            println!("{}", serde_json::to_string(&orchestrator.health())?);
            Ok(())
        }
        Commands::Serve => {
            let shutdown = CancellationToken::new();
            {
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Interrupt received, shutting down");
                    }
                    shutdown.cancel();
                });
            }
            let runs = serve(orchestrator, shutdown).await;
            tracing::info!(runs, "Serve finished");
            Ok(())
        }
    }
}
