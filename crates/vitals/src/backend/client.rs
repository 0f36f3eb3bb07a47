//! HTTP client for the aggregation backend
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::time::Duration;
use url::Url;

use super::VitalsBackend;
use super::api::{BulkUploadRequest, BulkUploadResponse, DashboardResponse};
use crate::error::BackendError;
use crate::models::BackendTimestamps;

/// Attempts for idempotent reads before giving up
const MAX_READ_ATTEMPTS: u32 = 3;

/// JSON-over-HTTP backend authenticated with a bearer token
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    /// Create a client for the backend rooted at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.example.com/v1`
    /// * `token` - Bearer token sent with every request, if any
    /// * `timeout` - Overall deadline for each request
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid backend URL: {base_url}"))?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint path: {path}"))
    }

    fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {}", token))
    }

    /// Fetch the dashboard once
    fn get_dashboard(&self) -> Result<DashboardResponse> {
        let url = self.endpoint("dashboard")?;
        let mut request = self.agent.get(url.as_str());
        if let Some(auth) = self.authorization() {
            request = request.header("Authorization", &auth);
        }

        let response = request.call().map_err(transport_error)?;
        let mut response = check_status(response)?;

        let dashboard: DashboardResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| BackendError::Decode(e.to_string()))
            .context("Failed to parse dashboard response")?;

        Ok(dashboard)
    }
}

impl VitalsBackend for HttpBackend {
    /// Dashboard lookup with exponential backoff on retryable failures
    fn latest_timestamps(&self) -> Result<BackendTimestamps> {
        let mut delay = Duration::from_millis(200);
        let mut attempt = 1;

        loop {
            match self.get_dashboard() {
                Ok(dashboard) => {
                    let timestamps = dashboard.timestamps();
                    debug!("Backend holds data for {} metrics", timestamps.len());
                    return Ok(timestamps);
                }
                Err(e) if attempt < MAX_READ_ATTEMPTS && is_retryable(&e) => {
                    warn!("Dashboard request failed (attempt {}): {:#}", attempt, e);
                    let jitter = Duration::from_millis(rand_jitter());
                    std::thread::sleep(delay + jitter);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn submit_chunk(&self, request: &BulkUploadRequest<'_>) -> Result<BulkUploadResponse> {
        let url = self.endpoint("vitals/bulk")?;
        let mut http = self.agent.post(url.as_str());
        if let Some(auth) = self.authorization() {
            http = http.header("Authorization", &auth);
        }

        let response = http.send_json(request).map_err(transport_error)?;
        let mut response = check_status(response)?;

        let result: BulkUploadResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| BackendError::Decode(e.to_string()))
            .context("Failed to parse bulk upload response")?;

        debug!(
            "Chunk {}/{} accepted {} readings ({} duplicates)",
            request.envelope.chunk_number,
            request.envelope.total_chunks,
            result.accepted,
            result.duplicates
        );
        Ok(result)
    }

    fn trigger_aggregation(&self) -> Result<()> {
        let url = self.endpoint("vitals/aggregate/trigger")?;
        let mut http = self.agent.post(url.as_str());
        if let Some(auth) = self.authorization() {
            http = http.header("Authorization", &auth);
        }

        let response = http.send_empty().map_err(transport_error)?;
        check_status(response)?;
        Ok(())
    }
}

/// Map non-success responses to [`BackendError::Status`], keeping the body
fn check_status(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<ureq::http::Response<ureq::Body>, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

fn transport_error(err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::StatusCode(status) => BackendError::Status {
            status,
            body: String::new(),
        },
        other => BackendError::Transport(other.to_string()),
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<BackendError>()
        .is_some_and(BackendError::is_retryable)
}

/// 0-99 ms of jitter from std's randomly seeded hasher
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
