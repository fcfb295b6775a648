//! In-process record store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::RecordStore;
use crate::errors::StoreError;

/// Keeps the latest value per key in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    writes: RwLock<usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Returns the latest value under `key` parsed as JSON.
    #[must_use]
    pub fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        self.get(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Total number of successful writes across all keys.
    #[must_use]
    pub fn write_count(&self) -> usize {
        *self.writes.read()
    }

    /// Returns all stored keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn store(&self, key: &str, serialized: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .insert(key.to_string(), serialized.to_string());
        *self.writes.write() += 1;
        Ok(())
    }
}
