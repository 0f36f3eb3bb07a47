//! Vitals crate - Business logic for health metric synchronization
//!
//! This crate moves time-series health readings from a local health store to
//! a remote aggregation backend, incrementally and across interruptions:
//! - Domain models (MetricType, Reading, sync state)
//! - Paginated extraction from a `HealthSource`
//! - Gap analysis against the backend's latest timestamps
//! - Chunked, session-tagged uploads with resumable state
//! - Progress tracking pushed to subscribers
//!
//! The crate has zero UI dependencies. Everything runs on the caller's
//! thread except extraction, which fans out over a rayon pool.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod source;
pub mod storage;
pub mod sync;

pub use crate::config::EngineConfig;
pub use backend::{HttpBackend, InMemoryBackend, ReceivedChunk, VitalsBackend};
pub use error::{BackendError, SyncError};
pub use models::{
    BackendTimestamps, CORE_METRICS, ChunkEnvelope, ExtractionTarget, MetricType, Reading,
    ReadingSource, ResumableSyncState, SyncKind, SyncProgressState, WORKOUT_METRICS,
};
pub use source::{
    FileHealthSource, HealthSource, InMemoryHealthSource, RawSample, RawWorkout, SourceExtractor,
};
pub use storage::{
    InMemoryKeyValueStore, KeyValueStore, ResumableStateStore, SqliteKeyValueStore,
    SyncPersistence,
};
pub use sync::{
    // Sync execution
    CancellationToken, ChunkedUploader, SyncEngine, SyncRequest, SyncResult, SyncStatus,
    UploadStats,
    // Window planning
    GapAnalyzer, SyncStrategy, SyncWindow, decide_strategy,
    // Progress reporting
    ExecutionGrant, ExecutionHost, NoopExecutionHost, ProgressTracker, SyncEvent,
    // Sync decision (for app startup logic)
    SyncTrigger, cooldown_elapsed, determine_sync_kind, should_auto_sync,
};
