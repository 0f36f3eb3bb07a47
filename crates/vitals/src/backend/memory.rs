//! In-memory backend
//!
//! Records every chunk it receives. Used by the tests and by `--dry-run`,
//! with knobs for injecting failures.

use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::VitalsBackend;
use super::api::{BulkUploadRequest, BulkUploadResponse};
use crate::error::BackendError;
use crate::models::{BackendTimestamps, ChunkEnvelope, Reading};

/// One chunk as the backend received it
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedChunk {
    pub envelope: ChunkEnvelope,
    pub readings: Vec<Reading>,
}

pub struct InMemoryBackend {
    timestamps: RwLock<Option<BackendTimestamps>>,
    chunks: RwLock<Vec<ReceivedChunk>>,
    /// Chunk numbers that fail with a 503
    failing_chunks: RwLock<HashSet<usize>>,
    fail_aggregation: RwLock<bool>,
    aggregation_calls: AtomicUsize,
}

impl InMemoryBackend {
    /// Backend with no data for any metric
    pub fn new() -> Self {
        Self::with_timestamps(BackendTimestamps::new())
    }

    pub fn with_timestamps(timestamps: BackendTimestamps) -> Self {
        Self {
            timestamps: RwLock::new(Some(timestamps)),
            chunks: RwLock::new(Vec::new()),
            failing_chunks: RwLock::new(HashSet::new()),
            fail_aggregation: RwLock::new(false),
            aggregation_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_timestamps(&self, timestamps: BackendTimestamps) {
        *self.timestamps.write().unwrap() = Some(timestamps);
    }

    /// Make the dashboard lookup fail
    pub fn fail_timestamps(&self) {
        *self.timestamps.write().unwrap() = None;
    }

    /// Make every submission of `chunk_number` fail
    pub fn fail_chunk(&self, chunk_number: usize) {
        self.failing_chunks.write().unwrap().insert(chunk_number);
    }

    pub fn clear_failures(&self) {
        self.failing_chunks.write().unwrap().clear();
        *self.fail_aggregation.write().unwrap() = false;
    }

    pub fn fail_aggregation(&self) {
        *self.fail_aggregation.write().unwrap() = true;
    }

    /// Every accepted chunk, in arrival order
    pub fn chunks(&self) -> Vec<ReceivedChunk> {
        self.chunks.read().unwrap().clone()
    }

    pub fn reading_count(&self) -> usize {
        self.chunks.read().unwrap().iter().map(|c| c.readings.len()).sum()
    }

    pub fn aggregation_calls(&self) -> usize {
        self.aggregation_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VitalsBackend for InMemoryBackend {
    fn latest_timestamps(&self) -> Result<BackendTimestamps> {
        self.timestamps
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| BackendError::Transport("dashboard unavailable".to_string()).into())
    }

    fn submit_chunk(&self, request: &BulkUploadRequest<'_>) -> Result<BulkUploadResponse> {
        let envelope = request.envelope;
        if self.failing_chunks.read().unwrap().contains(&envelope.chunk_number) {
            return Err(BackendError::Status {
                status: 503,
                body: format!("chunk {} rejected", envelope.chunk_number),
            }
            .into());
        }

        let mut chunks = self.chunks.write().unwrap();
        // (session_id, chunk_number) is the idempotency key
        let duplicate = chunks.iter().any(|c| {
            c.envelope.session_id == envelope.session_id
                && c.envelope.chunk_number == envelope.chunk_number
        });
        if duplicate {
            return Ok(BulkUploadResponse {
                accepted: 0,
                duplicates: request.readings.len(),
            });
        }

        chunks.push(ReceivedChunk {
            envelope,
            readings: request.readings.to_vec(),
        });
        Ok(BulkUploadResponse {
            accepted: request.readings.len(),
            duplicates: 0,
        })
    }

    fn trigger_aggregation(&self) -> Result<()> {
        self.aggregation_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_aggregation.read().unwrap() {
            return Err(anyhow!("aggregation service unavailable"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricType;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_duplicate_chunks_are_not_stored_twice() {
        let backend = InMemoryBackend::new();
        let readings = vec![Reading::builder(MetricType::HeartRate, 60.0, Utc::now()).build()];
        let request = BulkUploadRequest {
            readings: &readings,
            envelope: ChunkEnvelope::new(Uuid::new_v4(), 1, 1),
        };

        assert_eq!(backend.submit_chunk(&request).unwrap().accepted, 1);
        assert_eq!(backend.submit_chunk(&request).unwrap().duplicates, 1);
        assert_eq!(backend.chunks().len(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let backend = InMemoryBackend::new();
        backend.fail_timestamps();
        assert!(backend.latest_timestamps().is_err());

        backend.fail_chunk(1);
        let request = BulkUploadRequest {
            readings: &[],
            envelope: ChunkEnvelope::new(Uuid::new_v4(), 1, 1),
        };
        let err = backend.submit_chunk(&request).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BackendError>().and_then(|e| e.status_code()),
            Some(503)
        );

        backend.clear_failures();
        assert!(backend.submit_chunk(&request).is_ok());
    }
}
