//! Remote aggregation backend
//!
//! This module provides:
//! - The [`VitalsBackend`] capability the engine talks to
//! - An HTTP client for the real backend
//! - An in-memory backend that records what it was sent

mod client;
mod memory;

pub use client::HttpBackend;
pub use memory::{InMemoryBackend, ReceivedChunk};

use anyhow::Result;

use crate::models::BackendTimestamps;
use api::{BulkUploadRequest, BulkUploadResponse};

/// Operations the sync engine needs from the backend
pub trait VitalsBackend: Send + Sync {
    /// Timestamp of the latest reading the backend holds, per metric
    fn latest_timestamps(&self) -> Result<BackendTimestamps>;

    /// Submit one chunk of an upload session
    fn submit_chunk(&self, request: &BulkUploadRequest<'_>) -> Result<BulkUploadResponse>;

    /// Ask the backend to recompute aggregates; advisory
    fn trigger_aggregation(&self) -> Result<()>;
}

/// Backend API request and response types
pub mod api {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    use crate::models::{BackendTimestamps, ChunkEnvelope, MetricType, Reading};

    /// Response from `GET /dashboard`
    #[derive(Debug, Default, Deserialize)]
    pub struct DashboardResponse {
        #[serde(default)]
        pub latest_vitals: HashMap<String, LatestVital>,
    }

    /// Most recent reading the backend holds for one metric
    #[derive(Debug, Clone, Deserialize)]
    pub struct LatestVital {
        pub recorded_at: DateTime<Utc>,
        #[serde(default)]
        pub value: Option<f64>,
        #[serde(default)]
        pub unit: Option<String>,
    }

    impl DashboardResponse {
        /// Latest timestamp per known metric; unknown names are ignored
        pub fn timestamps(&self) -> BackendTimestamps {
            self.latest_vitals
                .iter()
                .filter_map(|(name, vital)| {
                    MetricType::from_wire_name(name).map(|metric| (metric, vital.recorded_at))
                })
                .collect()
        }
    }

    /// Body of `POST /vitals/bulk`
    #[derive(Debug, Serialize)]
    pub struct BulkUploadRequest<'a> {
        pub readings: &'a [Reading],
        #[serde(flatten)]
        pub envelope: ChunkEnvelope,
    }

    /// Response from `POST /vitals/bulk`
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BulkUploadResponse {
        #[serde(default)]
        pub accepted: usize,
        #[serde(default)]
        pub duplicates: usize,
    }
}
