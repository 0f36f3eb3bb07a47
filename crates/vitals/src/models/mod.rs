//! Domain models for health metric sync

mod chunk;
mod metric;
mod reading;
mod sync_state;
mod timestamps;

pub use chunk::{ChunkEnvelope, chunk_count};
pub use metric::{CORE_METRICS, ExtractionTarget, MetricType, UnitRule, WORKOUT_METRICS};
pub use reading::{Reading, ReadingBuilder, ReadingSource};
pub use sync_state::{ResumableSyncState, SyncKind, SyncProgressState};
pub use timestamps::BackendTimestamps;
