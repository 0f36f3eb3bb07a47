//! Last-sync bookkeeping per sync kind

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{KeyValueStore, get_json, put_json};
use crate::models::SyncKind;
use crate::sync::cooldown_remaining;

const LAST_SYNC_PREFIX: &str = "sync.last.";
const GLOBAL_LAST_SYNC_KEY: &str = "sync.global_last";

/// Records when each kind of sync last completed
///
/// Feeds the cooldown guard and the startup decision between an initial
/// and an incremental sync.
#[derive(Clone)]
pub struct SyncPersistence {
    store: Arc<dyn KeyValueStore>,
}

impl SyncPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn kind_key(kind: SyncKind) -> String {
        format!("{}{}", LAST_SYNC_PREFIX, kind.as_str())
    }

    /// When a sync of `kind` last completed successfully
    pub fn last_sync(&self, kind: SyncKind) -> Result<Option<DateTime<Utc>>> {
        get_json(self.store.as_ref(), &Self::kind_key(kind))
    }

    /// When any sync last completed successfully
    pub fn last_global_sync(&self) -> Result<Option<DateTime<Utc>>> {
        get_json(self.store.as_ref(), GLOBAL_LAST_SYNC_KEY)
    }

    /// Record a successful completion for `kind` (and globally)
    pub fn record_sync(&self, kind: SyncKind, at: DateTime<Utc>) -> Result<()> {
        put_json(self.store.as_ref(), &Self::kind_key(kind), &at)?;
        put_json(self.store.as_ref(), GLOBAL_LAST_SYNC_KEY, &at)
    }

    /// Seconds left before `kind` may run again, `None` when not cooling down
    pub fn cooldown_remaining(&self, kind: SyncKind, cooldown_secs: u64) -> Result<Option<u64>> {
        let last = self.last_sync(kind)?;
        Ok(cooldown_remaining(last, cooldown_secs, Utc::now()))
    }

    pub fn in_cooldown(&self, kind: SyncKind, cooldown_secs: u64) -> Result<bool> {
        Ok(self.cooldown_remaining(kind, cooldown_secs)?.is_some())
    }

    /// Every kind that has completed at least once, in name order
    pub fn all_last_syncs(&self) -> Result<Vec<(SyncKind, DateTime<Utc>)>> {
        let mut result = Vec::new();
        for key in self.store.keys_with_prefix(LAST_SYNC_PREFIX)? {
            let Some(kind) = SyncKind::parse(&key[LAST_SYNC_PREFIX.len()..]) else {
                continue;
            };
            if let Some(at) = get_json(self.store.as_ref(), &key)? {
                result.push((kind, at));
            }
        }
        Ok(result)
    }

    /// Forget all recorded completions
    pub fn clear(&self) -> Result<()> {
        for key in self.store.keys_with_prefix(LAST_SYNC_PREFIX)? {
            self.store.delete(&key)?;
        }
        self.store.delete(GLOBAL_LAST_SYNC_KEY)
    }
}
