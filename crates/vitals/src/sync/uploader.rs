//! Chunked, session-tagged upload of readings

use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::CancellationToken;
use crate::backend::VitalsBackend;
use crate::backend::api::BulkUploadRequest;
use crate::error::SyncError;
use crate::models::{ChunkEnvelope, Reading, chunk_count};

/// Readings per chunk unless configured otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Pause between consecutive chunks unless configured otherwise
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Statistics from one upload call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub session_id: Uuid,
    /// Chunks submitted by this call
    pub chunks_submitted: usize,
    pub total_chunks: usize,
    pub accepted: usize,
    pub duplicates: usize,
}

/// Splits readings into fixed-size chunks and submits them in order
///
/// Every chunk of one call shares a session id. The first failing chunk
/// aborts the rest; nothing is retried here.
pub struct ChunkedUploader {
    backend: Arc<dyn VitalsBackend>,
    chunk_size: usize,
    pacing: Duration,
}

impl ChunkedUploader {
    pub fn new(backend: Arc<dyn VitalsBackend>) -> Self {
        Self::with_settings(backend, DEFAULT_CHUNK_SIZE, DEFAULT_PACING)
    }

    pub fn with_settings(backend: Arc<dyn VitalsBackend>, chunk_size: usize, pacing: Duration) -> Self {
        Self {
            backend,
            chunk_size: chunk_size.max(1),
            pacing,
        }
    }

    /// Upload all readings under a fresh session
    ///
    /// `on_chunk` runs after every accepted chunk.
    pub fn submit_all<F>(
        &self,
        readings: &[Reading],
        cancel: &CancellationToken,
        on_chunk: F,
    ) -> Result<UploadStats, SyncError>
    where
        F: FnMut(&ChunkEnvelope),
    {
        self.submit_from(Uuid::new_v4(), readings, 1, cancel, on_chunk)
    }

    /// Continue `session_id` from chunk `first_chunk` (1-based)
    ///
    /// `readings` is the full reading set of the session so chunk numbers
    /// and boundaries match the original partition.
    pub fn submit_from<F>(
        &self,
        session_id: Uuid,
        readings: &[Reading],
        first_chunk: usize,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<UploadStats, SyncError>
    where
        F: FnMut(&ChunkEnvelope),
    {
        let total_chunks = chunk_count(readings.len(), self.chunk_size);
        let mut stats = UploadStats {
            session_id,
            total_chunks,
            ..Default::default()
        };

        let first_chunk = first_chunk.max(1);
        let chunks = readings
            .chunks(self.chunk_size)
            .enumerate()
            .skip(first_chunk - 1);

        for (index, chunk) in chunks {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            if stats.chunks_submitted > 0 && !self.pacing.is_zero() {
                std::thread::sleep(self.pacing);
            }

            let envelope = ChunkEnvelope::new(session_id, index + 1, total_chunks);
            let request = BulkUploadRequest {
                readings: chunk,
                envelope,
            };

            let response = self.backend.submit_chunk(&request).map_err(|source| {
                error!(
                    "Chunk {}/{} of session {} failed: {:#}",
                    envelope.chunk_number, total_chunks, session_id, source
                );
                SyncError::Upload {
                    chunk_number: envelope.chunk_number,
                    total_chunks,
                    source,
                }
            })?;

            debug!(
                "Submitted chunk {}/{} ({} readings)",
                envelope.chunk_number,
                total_chunks,
                chunk.len()
            );
            stats.chunks_submitted += 1;
            stats.accepted += response.accepted;
            stats.duplicates += response.duplicates;
            on_chunk(&envelope);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::models::MetricType;
    use chrono::{Duration as ChronoDuration, Utc};

    fn readings(n: usize) -> Vec<Reading> {
        let start = Utc::now() - ChronoDuration::days(1);
        (0..n)
            .map(|i| {
                Reading::builder(
                    MetricType::HeartRate,
                    60.0,
                    start + ChronoDuration::seconds(i as i64),
                )
                .build()
            })
            .collect()
    }

    fn uploader(backend: Arc<InMemoryBackend>) -> ChunkedUploader {
        ChunkedUploader::with_settings(backend, 500, Duration::ZERO)
    }

    #[test]
    fn test_partition_and_envelopes() {
        let backend = Arc::new(InMemoryBackend::new());
        let readings = readings(1_200);
        let mut progress = Vec::new();

        let stats = uploader(backend.clone())
            .submit_all(&readings, &CancellationToken::new(), |env| {
                progress.push((env.chunk_number, env.total_chunks))
            })
            .unwrap();

        assert_eq!(stats.chunks_submitted, 3);
        assert_eq!(stats.accepted, 1_200);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

        let chunks = backend.chunks();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.readings.len()).collect();
        assert_eq!(sizes, vec![500, 500, 200]);
        assert!(chunks.iter().all(|c| c.envelope.session_id == stats.session_id));
        let finals: Vec<bool> = chunks.iter().map(|c| c.envelope.is_final).collect();
        assert_eq!(finals, vec![false, false, true]);

        // Every reading lands in exactly one chunk, in order
        let uploaded: Vec<Reading> = chunks.into_iter().flat_map(|c| c.readings).collect();
        assert_eq!(uploaded, readings);
    }

    #[test]
    fn test_each_call_gets_a_new_session() {
        let backend = Arc::new(InMemoryBackend::new());
        let uploader = uploader(backend);
        let cancel = CancellationToken::new();
        let a = uploader.submit_all(&readings(3), &cancel, |_| {}).unwrap();
        let b = uploader.submit_all(&readings(3), &cancel, |_| {}).unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_failure_aborts_remaining_chunks() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_chunk(2);
        let mut accepted = Vec::new();

        let err = uploader(backend.clone())
            .submit_all(&readings(1_200), &CancellationToken::new(), |env| {
                accepted.push(env.chunk_number)
            })
            .unwrap_err();

        match err {
            SyncError::Upload {
                chunk_number,
                total_chunks,
                ..
            } => {
                assert_eq!(chunk_number, 2);
                assert_eq!(total_chunks, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(accepted, vec![1]);
        assert_eq!(backend.chunks().len(), 1);
    }

    #[test]
    fn test_submit_from_continues_session() {
        let backend = Arc::new(InMemoryBackend::new());
        let session = Uuid::new_v4();
        let readings = readings(1_200);

        let stats = uploader(backend.clone())
            .submit_from(session, &readings, 3, &CancellationToken::new(), |_| {})
            .unwrap();

        assert_eq!(stats.chunks_submitted, 1);
        let chunks = backend.chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].envelope, ChunkEnvelope::new(session, 3, 3));
        assert_eq!(chunks[0].readings, readings[1_000..].to_vec());
    }

    #[test]
    fn test_empty_upload_submits_nothing() {
        let backend = Arc::new(InMemoryBackend::new());
        let stats = uploader(backend.clone())
            .submit_all(&[], &CancellationToken::new(), |_| {})
            .unwrap();
        assert_eq!(stats.total_chunks, 0);
        assert!(backend.chunks().is_empty());
    }

    #[test]
    fn test_cancel_stops_before_next_chunk() {
        let backend = Arc::new(InMemoryBackend::new());
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let err = uploader(backend.clone())
            .submit_all(&readings(1_200), &cancel, |_| token.cancel())
            .unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(backend.chunks().len(), 1);
    }
}
