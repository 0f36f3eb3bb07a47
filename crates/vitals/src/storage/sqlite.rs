//! SQLite-backed key/value storage with zstd-compressed values

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::KeyValueStore;

/// zstd level 3 = good balance of speed vs compression
const COMPRESSION_LEVEL: i32 = 3;

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        r#"
        CREATE TABLE kv_entries (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL,  -- zstd compressed
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )])
}

/// SQLite key/value store
///
/// Resumable sync state holds a full reading snapshot, so values are
/// compressed before they hit the database.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Open (or create) the store at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        // WAL lets the UI read progress while a sync writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        let compressed: Option<Vec<u8>> = conn
            .query_row("SELECT value FROM kv_entries WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        compressed
            .map(|data| {
                zstd::decode_all(data.as_slice())
                    .with_context(|| format!("Failed to decompress value for {key}"))
            })
            .transpose()
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let compressed = zstd::encode_all(value, COMPRESSION_LEVEL)
            .with_context(|| format!("Failed to compress value for {key}"))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, compressed],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv_entries WHERE key = ?", [key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key FROM kv_entries WHERE substr(key, 1, ?) = ? ORDER BY key")?;

        let keys = stmt
            .query_map(params![prefix.chars().count() as i64, prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteKeyValueStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("vitals.test.sqlite");
        let store = SqliteKeyValueStore::new(&db_path).unwrap();
        (store, dir)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (store, _dir) = create_test_store();
        let payload = "reading ".repeat(1_000);

        store.put("resumable", payload.as_bytes()).unwrap();
        let loaded = store.get("resumable").unwrap().unwrap();
        assert_eq!(loaded, payload.as_bytes());
    }

    #[test]
    fn test_overwrite_and_delete() {
        let (store, _dir) = create_test_store();
        store.put("k", b"first").unwrap();
        store.put("k", b"second").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"second".to_vec()));

        store.delete("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
        store.delete("k").unwrap();
    }

    #[test]
    fn test_keys_with_prefix() {
        let store = SqliteKeyValueStore::open_in_memory().unwrap();
        store.put("sync.last.initial", b"1").unwrap();
        store.put("sync.last.incremental", b"2").unwrap();
        store.put("sync.global", b"3").unwrap();

        let keys = store.keys_with_prefix("sync.last.").unwrap();
        assert_eq!(keys, vec!["sync.last.incremental", "sync.last.initial"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("vitals.test.sqlite");
        {
            let store = SqliteKeyValueStore::new(&db_path).unwrap();
            store.put("sync.global", b"2026-10-01T00:00:00Z").unwrap();
        }

        let reopened = SqliteKeyValueStore::new(&db_path).unwrap();
        assert_eq!(
            reopened.get("sync.global").unwrap(),
            Some(b"2026-10-01T00:00:00Z".to_vec())
        );
    }
}
