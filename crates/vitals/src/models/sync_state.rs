//! Persisted sync bookkeeping: sync kinds, resumable upload state and
//! UI-facing progress state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{Reading, chunk_count};

/// Why a sync run was started
///
/// Only affects window computation and bookkeeping, never pipeline
/// mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// First sync on this device
    Initial,
    /// Full lookback regardless of backend state
    Historical,
    /// Gap-filling sync based on backend timestamps
    Incremental,
    /// Fixed window covering the last day
    Last24Hours,
    /// Re-run after a network failure
    NetworkRetry,
}

impl SyncKind {
    pub const ALL: [SyncKind; 5] = [
        SyncKind::Initial,
        SyncKind::Historical,
        SyncKind::Incremental,
        SyncKind::Last24Hours,
        SyncKind::NetworkRetry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncKind::Initial => "initial",
            SyncKind::Historical => "historical",
            SyncKind::Incremental => "incremental",
            SyncKind::Last24Hours => "last_24_hours",
            SyncKind::NetworkRetry => "network_retry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_chunk_size() -> usize {
    500
}

/// In-flight upload progress, persisted so an interrupted run can be
/// continued after a restart
///
/// Holds the full reading snapshot of one run plus how many chunks of it
/// the backend has already accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumableSyncState {
    pub pending_readings: Vec<Reading>,
    pub completed_chunks: usize,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub sync_kind: SyncKind,
    pub saved_at: DateTime<Utc>,
    /// Upload session the completed chunks belong to
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl ResumableSyncState {
    /// Snapshot taken before the first chunk is sent
    pub fn new(
        sync_kind: SyncKind,
        pending_readings: Vec<Reading>,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        chunk_size: usize,
    ) -> Self {
        Self {
            pending_readings,
            completed_chunks: 0,
            window_start: window.map(|(start, _)| start),
            window_end: window.map(|(_, end)| end),
            sync_kind,
            saved_at: Utc::now(),
            session_id: None,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Record that `completed_chunks` chunks of `session_id` were accepted
    pub fn with_progress(mut self, session_id: Uuid, completed_chunks: usize) -> Self {
        self.session_id = Some(session_id);
        self.completed_chunks = completed_chunks;
        self.saved_at = Utc::now();
        self
    }

    pub fn total_chunks(&self) -> usize {
        chunk_count(self.pending_readings.len(), self.chunk_size)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_chunks >= self.total_chunks()
    }

    /// Readings not yet covered by an accepted chunk
    pub fn remaining_readings(&self) -> &[Reading] {
        let offset = self
            .completed_chunks
            .saturating_mul(self.chunk_size)
            .min(self.pending_readings.len());
        &self.pending_readings[offset..]
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.saved_at > ttl
    }
}

/// Snapshot of a running (or just finished) sync for UI consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgressState {
    pub is_syncing: bool,
    /// Fraction complete in `[0, 1]`
    pub progress: f64,
    pub message: String,
    pub total_count: usize,
    pub synced_count: usize,
    pub current_metric: String,
    pub started_at: DateTime<Utc>,
    pub sync_kind: SyncKind,
    /// Error message of a failed run, kept for display
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncProgressState {
    pub fn started(sync_kind: SyncKind) -> Self {
        Self {
            is_syncing: true,
            progress: 0.0,
            message: "Starting sync".to_string(),
            total_count: 0,
            synced_count: 0,
            current_metric: String::new(),
            started_at: Utc::now(),
            sync_kind,
            last_error: None,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.started_at > ttl
    }
}
