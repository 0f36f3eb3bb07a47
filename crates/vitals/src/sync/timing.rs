//! Sync timing utilities for cooldown management and trigger decisions
//!
//! Pure functions that can be tested without a running engine.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::SyncKind;
use crate::storage::SyncPersistence;

/// What asked for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Explicit user request; bypasses the cooldown
    Manual,
    /// Scheduled background refresh
    Periodic,
    /// App returned to the foreground
    Foreground,
    /// Health data access was just granted
    PostAuthorization,
}

impl SyncTrigger {
    pub fn bypasses_cooldown(self) -> bool {
        matches!(self, SyncTrigger::Manual)
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::Periodic => "periodic",
            SyncTrigger::Foreground => "foreground",
            SyncTrigger::PostAuthorization => "post_authorization",
        };
        f.write_str(name)
    }
}

/// Check if enough time has elapsed since the last sync to allow a new sync.
///
/// # Arguments
/// * `last_sync_at` - When the last successful sync completed (None if never synced)
/// * `cooldown_secs` - Minimum seconds that must elapse between syncs
///
/// # Returns
/// `true` if enough time has passed (or never synced), `false` if still in cooldown
pub fn cooldown_elapsed(last_sync_at: Option<DateTime<Utc>>, cooldown_secs: u64) -> bool {
    cooldown_remaining(last_sync_at, cooldown_secs, Utc::now()).is_none()
}

/// Seconds left in the cooldown at `now`, `None` once it has elapsed
pub fn cooldown_remaining(
    last_sync_at: Option<DateTime<Utc>>,
    cooldown_secs: u64,
    now: DateTime<Utc>,
) -> Option<u64> {
    let last = last_sync_at?;
    let elapsed = (now - last).num_seconds().max(0) as u64;
    cooldown_secs
        .checked_sub(elapsed)
        .filter(|remaining| *remaining > 0)
}

/// Kind of sync to run for an automatic trigger, given the last global sync
pub fn sync_kind_for(last_global_sync: Option<DateTime<Utc>>) -> SyncKind {
    match last_global_sync {
        Some(_) => SyncKind::Incremental,
        None => SyncKind::Initial,
    }
}

/// Startup/foreground decision: `Initial` on a device that never completed
/// a sync, `Incremental` otherwise
pub fn determine_sync_kind(persistence: &SyncPersistence) -> Result<SyncKind> {
    Ok(sync_kind_for(persistence.last_global_sync()?))
}

/// Whether `trigger` should start a sync right now
///
/// Manual and post-authorization triggers always sync. Periodic and
/// foreground triggers wait out the cooldown since the last sync of any
/// kind.
pub fn should_auto_sync(
    trigger: SyncTrigger,
    persistence: &SyncPersistence,
    cooldown_secs: u64,
) -> Result<bool> {
    match trigger {
        SyncTrigger::Manual | SyncTrigger::PostAuthorization => Ok(true),
        SyncTrigger::Periodic | SyncTrigger::Foreground => {
            let last = persistence.last_global_sync()?;
            Ok(cooldown_remaining(last, cooldown_secs, Utc::now()).is_none())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKeyValueStore;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_cooldown_elapsed_never_synced() {
        assert!(cooldown_elapsed(None, 30));
        assert!(cooldown_elapsed(None, 0));
        assert!(cooldown_elapsed(None, 3600));
    }

    #[test]
    fn test_cooldown_elapsed_recent_sync() {
        let last_sync = Utc::now() - Duration::seconds(10);
        assert!(!cooldown_elapsed(Some(last_sync), 30));

        let last_sync = Utc::now() - Duration::seconds(1);
        assert!(!cooldown_elapsed(Some(last_sync), 30));
    }

    #[test]
    fn test_cooldown_elapsed_old_sync() {
        let last_sync = Utc::now() - Duration::seconds(60);
        assert!(cooldown_elapsed(Some(last_sync), 30));

        // Exactly at the boundary
        let last_sync = Utc::now() - Duration::seconds(30);
        assert!(cooldown_elapsed(Some(last_sync), 30));
    }

    #[test]
    fn test_cooldown_elapsed_zero_cooldown() {
        assert!(cooldown_elapsed(Some(Utc::now()), 0));
    }

    #[test]
    fn test_cooldown_remaining() {
        let now = Utc::now();
        assert_eq!(cooldown_remaining(None, 300, now), None);
        assert_eq!(
            cooldown_remaining(Some(now - Duration::seconds(100)), 300, now),
            Some(200)
        );
        assert_eq!(
            cooldown_remaining(Some(now - Duration::seconds(301)), 300, now),
            None
        );
        // Clock skew: a last sync in the future counts as just synced
        assert_eq!(
            cooldown_remaining(Some(now + Duration::seconds(5)), 300, now),
            Some(300)
        );
    }

    #[test]
    fn test_sync_kind_for() {
        assert_eq!(sync_kind_for(None), SyncKind::Initial);
        assert_eq!(sync_kind_for(Some(Utc::now())), SyncKind::Incremental);
    }

    #[test]
    fn test_should_auto_sync() {
        let persistence = SyncPersistence::new(Arc::new(InMemoryKeyValueStore::new()));

        // Never synced: everything goes
        assert!(should_auto_sync(SyncTrigger::Periodic, &persistence, 300).unwrap());
        assert_eq!(determine_sync_kind(&persistence).unwrap(), SyncKind::Initial);

        persistence
            .record_sync(SyncKind::Incremental, Utc::now() - Duration::seconds(30))
            .unwrap();
        assert_eq!(
            determine_sync_kind(&persistence).unwrap(),
            SyncKind::Incremental
        );
        assert!(!should_auto_sync(SyncTrigger::Foreground, &persistence, 300).unwrap());
        assert!(!should_auto_sync(SyncTrigger::Periodic, &persistence, 300).unwrap());
        assert!(should_auto_sync(SyncTrigger::Manual, &persistence, 300).unwrap());
        assert!(should_auto_sync(SyncTrigger::PostAuthorization, &persistence, 300).unwrap());
        assert!(should_auto_sync(SyncTrigger::Periodic, &persistence, 10).unwrap());
    }
}
