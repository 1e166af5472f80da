#![allow(unused)]

//! # contract: seams between the orchestrator and its collaborators
//!
//! This module defines the two traits the synchronisation engine talks to:
//!
//! - [`RemoteStore`]: the remote configuration store (get / exists / publish / remove).
//! - [`BackupStore`]: where previous remote content is snapshotted before an overwrite.
//!
//! ## Failure contract
//! Remote calls never return errors to the orchestrator. A communication
//! failure is reported as `None` (for reads) or `false` (for writes); the
//! implementor is responsible for logging what went wrong.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`, so tests can assert on call counts
//! and call order (`MockRemoteStore`, `MockBackupStore`).

use std::time::Duration;

use async_trait::async_trait;
use mockall::{automock, predicate::*};

use crate::metadata::ConfigMetadata;

/// Timeout used when probing whether an entry already exists remotely.
pub const EXISTS_TIMEOUT: Duration = Duration::from_millis(3000);

/// Timeout used when fetching current remote content for a backup.
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(5000);

/// Group used when an entry has no application segment.
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Client for the remote configuration store.
///
/// All methods are blocking from the caller's point of view (they complete or
/// time out) and report failures as empty/false results.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the current content of `(data_id, group)`.
    ///
    /// Returns `None` when the entry is absent or the store could not be reached
    /// within `timeout`.
    async fn get(&self, data_id: &str, group: &str, timeout: Duration) -> Option<String>;

    /// Whether the entry exists, i.e. content fetched with [`EXISTS_TIMEOUT`] is non-empty.
    async fn exists(&self, data_id: &str, group: &str) -> bool;

    /// Publish (create or overwrite) the entry described by `metadata`.
    async fn publish(&self, metadata: &ConfigMetadata) -> bool;

    /// Remove `(data_id, group)` from the store.
    async fn remove(&self, data_id: &str, group: &str) -> bool;
}

/// Destination for snapshots of remote content that is about to be overwritten.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait BackupStore: Send + Sync {
    /// Snapshot `existing_content` for `metadata`. Failures are logged and swallowed.
    fn backup_config(&self, metadata: &ConfigMetadata, existing_content: &str);

    /// Delete snapshots older than `retention_days`, returning how many files were removed.
    fn cleanup_expired_backups(&self, retention_days: u32) -> usize;
}
