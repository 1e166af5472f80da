#![doc = "config-sync-core: core logic library for config-sync."]

//! This crate contains the whole synchronisation engine for config-sync:
//! discovering configuration files, deriving their identity from the path
//! convention `<environment>/<app>/<file>`, reconciling them against a remote
//! configuration store and keeping timestamped backups of overwritten content.
//! Transport to a concrete remote store is not included here.
//!
//! # Usage
//! Implement [`contract::RemoteStore`] for your store (or use
//! [`memory::MemoryStore`]) and drive it through
//! [`synchronise::SyncOrchestrator`].

pub mod backup;
pub mod config;
pub mod contract;
pub mod memory;
pub mod metadata;
pub mod path_info;
pub mod scanner;
pub mod synchronise;
