//! Storage trait definitions

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Small key/value store for engine bookkeeping
///
/// Values are opaque bytes; the typed stores on top of it serialize JSON.
/// Implementations must be safe to share across the extraction workers.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or replace the value under `key`
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// List keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Read and decode a JSON value
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to decode stored value for {key}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Encode and store a JSON value
pub fn put_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)
        .with_context(|| format!("Failed to encode value for {key}"))?;
    store.put(key, &bytes)
}
