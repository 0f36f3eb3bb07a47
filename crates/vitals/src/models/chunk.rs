//! Upload chunk envelope

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session and sequence metadata attached to one upload call
///
/// All chunks of one upload session share `session_id`, which the backend
/// uses as a grouping and idempotency key together with `chunk_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEnvelope {
    pub session_id: Uuid,
    /// 1-based position within the session
    pub chunk_number: usize,
    pub total_chunks: usize,
    pub is_final: bool,
}

impl ChunkEnvelope {
    pub fn new(session_id: Uuid, chunk_number: usize, total_chunks: usize) -> Self {
        Self {
            session_id,
            chunk_number,
            total_chunks,
            is_final: chunk_number == total_chunks,
        }
    }
}

/// Number of chunks needed for `len` readings at `chunk_size` per chunk
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}
