//! In-process key-value store.
use std::collections::HashMap;
use std::sync::RwLock;

use crate::traits::{KeyValueStore, StoreError};

/// Volatile store for hosts without durable session storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_removes_values() {
        let store = MemoryStore::new();
        assert!(store.get("clientId").is_none());
        store.set("clientId", "abc").unwrap();
        assert_eq!(store.get("clientId").as_deref(), Some("abc"));
        store.remove("clientId");
        assert!(store.get("clientId").is_none());
    }
}
