//! Storage traits and implementations
//!
//! A small key/value abstraction with in-memory and SQLite backends, and
//! the typed stores the sync engine keeps its bookkeeping in.

mod memory;
mod persistence;
mod resumable;
mod sqlite;
mod traits;

pub use memory::InMemoryKeyValueStore;
pub use persistence::SyncPersistence;
pub use resumable::{DEFAULT_RESUMABLE_TTL_HOURS, ResumableStateStore};
pub use sqlite::SqliteKeyValueStore;
pub use traits::{KeyValueStore, get_json, put_json};
