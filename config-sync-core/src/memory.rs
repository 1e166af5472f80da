//! In-process [`RemoteStore`], used for dry runs and end-to-end tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::contract::{RemoteStore, EXISTS_TIMEOUT};
use crate::metadata::ConfigMetadata;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly, bypassing `publish`.
    pub fn insert(&self, data_id: &str, group: &str, content: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert((data_id.to_string(), group.to_string()), content.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, data_id: &str, group: &str, _timeout: Duration) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&(data_id.to_string(), group.to_string()))
            .cloned()
    }

    async fn exists(&self, data_id: &str, group: &str) -> bool {
        self.get(data_id, group, EXISTS_TIMEOUT)
            .await
            .map(|c| !c.is_empty())
            .unwrap_or(false)
    }

    async fn publish(&self, metadata: &ConfigMetadata) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        entries.insert(
            (metadata.data_id.clone(), metadata.effective_group().to_string()),
            metadata.content_text(),
        );
        info!(data_id = %metadata.data_id, group = %metadata.effective_group(), "[MEMORY] Published config");
        true
    }

    async fn remove(&self, data_id: &str, group: &str) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        let removed = entries
            .remove(&(data_id.to_string(), group.to_string()))
            .is_some();
        debug!(data_id, group, removed, "[MEMORY] Remove config");
        removed
    }
}
