//! Persistence for interrupted upload sessions

use anyhow::Result;
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

use super::{KeyValueStore, get_json, put_json};
use crate::models::ResumableSyncState;

const RESUMABLE_STATE_KEY: &str = "sync.resumable_state";

/// Default lifetime of a saved upload session
pub const DEFAULT_RESUMABLE_TTL_HOURS: i64 = 24;

/// Saves and reloads the single in-flight [`ResumableSyncState`]
///
/// State older than the TTL is discarded on load, since the readings it
/// holds will be picked up again by the next gap analysis anyway.
#[derive(Clone)]
pub struct ResumableStateStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ResumableStateStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_ttl(store, Duration::hours(DEFAULT_RESUMABLE_TTL_HOURS))
    }

    pub fn with_ttl(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Overwrite the stored state
    pub fn save(&self, state: &ResumableSyncState) -> Result<()> {
        debug!(
            "Saving resumable state: {} readings, {}/{} chunks",
            state.pending_readings.len(),
            state.completed_chunks,
            state.total_chunks()
        );
        put_json(self.store.as_ref(), RESUMABLE_STATE_KEY, state)
    }

    /// Load the stored state if it exists and has not expired
    ///
    /// Expired state is deleted. Read or decode failures are logged and
    /// treated as "nothing to resume".
    pub fn load(&self) -> Option<ResumableSyncState> {
        let state: ResumableSyncState = match get_json(self.store.as_ref(), RESUMABLE_STATE_KEY) {
            Ok(Some(state)) => state,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to load resumable sync state: {:#}", e);
                return None;
            }
        };

        if state.is_expired(Utc::now(), self.ttl) {
            info!(
                "Discarding resumable {} sync saved at {}",
                state.sync_kind, state.saved_at
            );
            if let Err(e) = self.clear() {
                warn!("Failed to delete expired resumable state: {:#}", e);
            }
            return None;
        }

        Some(state)
    }

    /// Delete the stored state
    pub fn clear(&self) -> Result<()> {
        self.store.delete(RESUMABLE_STATE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricType, Reading, SyncKind};
    use crate::storage::InMemoryKeyValueStore;
    use uuid::Uuid;

    fn sample_state() -> ResumableSyncState {
        let start = Utc::now() - Duration::hours(3);
        let readings = (0..5)
            .map(|i| {
                Reading::builder(MetricType::HeartRate, 60.0 + i as f64, start + Duration::minutes(i))
                    .build()
            })
            .collect();
        ResumableSyncState::new(
            SyncKind::Incremental,
            readings,
            Some((start, Utc::now())),
            2,
        )
    }

    #[test]
    fn test_save_load_clear() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = ResumableStateStore::new(kv.clone());
        assert!(store.load().is_none());

        let state = sample_state().with_progress(Uuid::new_v4(), 1);
        store.save(&state).unwrap();
        assert_eq!(store.load(), Some(state));

        store.clear().unwrap();
        assert!(store.load().is_none());
        assert!(kv.is_empty());
    }

    #[test]
    fn test_expired_state_is_discarded_and_deleted() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = ResumableStateStore::new(kv.clone());

        let mut state = sample_state();
        state.saved_at = Utc::now() - Duration::hours(25);
        store.save(&state).unwrap();

        assert!(store.load().is_none());
        assert!(kv.get(RESUMABLE_STATE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_recent_state_is_returned_unchanged() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let store = ResumableStateStore::new(kv);

        let mut state = sample_state();
        state.saved_at = Utc::now() - Duration::hours(1);
        store.save(&state).unwrap();

        assert_eq!(store.load(), Some(state));
    }

    #[test]
    fn test_corrupt_state_loads_as_none() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        kv.put(RESUMABLE_STATE_KEY, b"{ not json").unwrap();

        let store = ResumableStateStore::new(kv);
        assert!(store.load().is_none());
    }
}
