//! In-memory storage implementation
//!
//! Used by tests and by callers that do not need state to survive a
//! restart.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::KeyValueStore;

/// In-memory implementation of KeyValueStore
///
/// A BTreeMap behind an RwLock keeps prefix listing sorted.
pub struct InMemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{get_json, put_json};

    #[test]
    fn test_put_get_delete() {
        let store = InMemoryKeyValueStore::new();
        assert!(store.get("a").unwrap().is_none());

        store.put("a", b"1").unwrap();
        store.put("a", b"2").unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len(), 1);

        store.delete("a").unwrap();
        store.delete("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = InMemoryKeyValueStore::new();
        store.put("sync.last.incremental", b"x").unwrap();
        store.put("sync.last.historical", b"x").unwrap();
        store.put("sync.progress", b"x").unwrap();
        store.put("other", b"x").unwrap();

        let keys = store.keys_with_prefix("sync.last.").unwrap();
        assert_eq!(keys, vec!["sync.last.historical", "sync.last.incremental"]);
    }

    #[test]
    fn test_json_helpers() {
        let store = InMemoryKeyValueStore::new();
        put_json(&store, "numbers", &vec![1, 2, 3]).unwrap();
        let numbers: Option<Vec<i32>> = get_json(&store, "numbers").unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        store.put("broken", b"not json").unwrap();
        let broken: Result<Option<Vec<i32>>> = get_json(&store, "broken");
        assert!(broken.is_err());
    }
}
