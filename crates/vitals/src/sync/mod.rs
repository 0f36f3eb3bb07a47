//! Sync engine for moving health readings to the backend
//!
//! Runs are resumable: an interrupted upload continues under the same
//! session id, and the backend treats `(session_id, chunk_number)` as an
//! idempotency key.

mod cancel;
mod engine;
mod gap;
mod progress;
mod timing;
mod uploader;

pub use cancel::CancellationToken;
pub use engine::{SyncEngine, SyncRequest, SyncResult, SyncStatus};
pub use gap::{
    DEFAULT_FALLBACK_LOOKBACK_DAYS, DEFAULT_HISTORICAL_LOOKBACK_DAYS, GapAnalyzer, SyncStrategy,
    SyncWindow, decide_strategy,
};
pub use progress::{
    DEFAULT_PROGRESS_TTL_HOURS, ExecutionGrant, ExecutionHost, NoopExecutionHost, ProgressTracker,
    SyncEvent,
};
pub use timing::{
    SyncTrigger, cooldown_elapsed, cooldown_remaining, determine_sync_kind, should_auto_sync,
    sync_kind_for,
};
pub use uploader::{ChunkedUploader, DEFAULT_CHUNK_SIZE, DEFAULT_PACING, UploadStats};
