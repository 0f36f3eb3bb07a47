//! Error types for the sync engine

use thiserror::Error;

use crate::models::SyncKind;

/// Terminal and recoverable failures of a sync run.
///
/// Only `AlreadyRunning`, `CoolingDown`, `Cancelled`, `Upload`,
/// `NothingToResume` and `Persistence` (during resume) end a run. The others are
/// recovered inside the engine and only logged or recorded in the result.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A sync is already running")]
    AlreadyRunning,

    #[error("{kind} sync is cooling down ({remaining_secs}s remaining)")]
    CoolingDown { kind: SyncKind, remaining_secs: u64 },

    #[error("Sync cancelled")]
    Cancelled,

    /// Query against the local health store failed for one target
    #[error("Extraction failed for {target}: {source}")]
    Extraction {
        target: String,
        source: anyhow::Error,
    },

    /// Latest-timestamp lookup failed; callers fall back to a short window
    #[error("Failed to fetch backend timestamps: {0}")]
    BackendTimestamps(anyhow::Error),

    #[error("Upload failed at chunk {chunk_number} of {total_chunks}: {source}")]
    Upload {
        chunk_number: usize,
        total_chunks: usize,
        source: anyhow::Error,
    },

    #[error("Aggregation trigger failed: {0}")]
    AggregationTrigger(anyhow::Error),

    #[error("Persistence error: {0}")]
    Persistence(anyhow::Error),

    #[error("No resumable sync state")]
    NothingToResume,
}

impl SyncError {
    /// Whether re-running the sync (as a network retry) may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Upload { source, .. } => source
                .downcast_ref::<BackendError>()
                .is_none_or(BackendError::is_retryable),
            SyncError::CoolingDown { .. } | SyncError::AlreadyRunning => true,
            _ => false,
        }
    }
}

/// Errors returned by the HTTP backend client
#[derive(Debug, Error)]
pub enum BackendError {
    /// Non-success HTTP status from the backend
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Retry classification: transport failures, throttling and server
    /// errors are worth a retry, other client errors are not
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Status { status, .. } => {
                matches!(*status, 408 | 425 | 429 | 500..=599)
            }
            BackendError::Transport(_) => true,
            BackendError::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_identifies_chunk() {
        let err = SyncError::Upload {
            chunk_number: 2,
            total_chunks: 3,
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "Upload failed at chunk 2 of 3: boom");
    }

    #[test]
    fn test_retry_classification() {
        let server = BackendError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(server.is_retryable());
        assert_eq!(server.status_code(), Some(503));

        let rejected = BackendError::Status {
            status: 422,
            body: "bad reading".to_string(),
        };
        assert!(!rejected.is_retryable());

        assert!(BackendError::Transport("reset".to_string()).is_retryable());
    }

    #[test]
    fn test_transient_upload_errors() {
        let transient = SyncError::Upload {
            chunk_number: 1,
            total_chunks: 1,
            source: BackendError::Transport("timeout".to_string()).into(),
        };
        assert!(transient.is_transient());

        let permanent = SyncError::Upload {
            chunk_number: 1,
            total_chunks: 1,
            source: BackendError::Status {
                status: 400,
                body: String::new(),
            }
            .into(),
        };
        assert!(!permanent.is_transient());
        assert!(!SyncError::Cancelled.is_transient());
    }
}
