//! Engine configuration
//!
//! Loaded in order of priority:
//! 1. Environment variables (`VITALSYNC_*`), overriding individual fields
//! 2. An explicit JSON file, or `vitalsync.json` in the config directory
//! 3. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::storage::DEFAULT_RESUMABLE_TTL_HOURS;
use crate::sync::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FALLBACK_LOOKBACK_DAYS, DEFAULT_HISTORICAL_LOOKBACK_DAYS,
    DEFAULT_PROGRESS_TTL_HOURS, GapAnalyzer,
};

/// Config filename in the vitalsync config directory
pub const CONFIG_FILE: &str = "vitalsync.json";

const ENV_BACKEND_URL: &str = "VITALSYNC_BACKEND_URL";
const ENV_API_TOKEN: &str = "VITALSYNC_API_TOKEN";
const ENV_CHUNK_SIZE: &str = "VITALSYNC_CHUNK_SIZE";
const ENV_PACING_MS: &str = "VITALSYNC_PACING_MS";
const ENV_COOLDOWN_SECS: &str = "VITALSYNC_COOLDOWN_SECS";

/// Tunables for the sync engine and its HTTP backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// API root of the aggregation backend
    pub backend_url: Option<String>,
    /// Bearer token; provisioned externally and never refreshed here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub chunk_size: usize,
    /// Pause between upload chunks
    pub pacing_ms: u64,
    pub request_timeout_secs: u64,
    pub historical_lookback_days: i64,
    /// Window used when backend timestamps are unavailable
    pub fallback_lookback_days: i64,
    /// Minimum time between automatic syncs of the same kind
    pub cooldown_secs: u64,
    pub resumable_ttl_hours: i64,
    pub progress_ttl_hours: i64,
    /// Upper bound on the extraction pool size
    pub max_extraction_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_token: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pacing_ms: 100,
            request_timeout_secs: 30,
            historical_lookback_days: DEFAULT_HISTORICAL_LOOKBACK_DAYS,
            fallback_lookback_days: DEFAULT_FALLBACK_LOOKBACK_DAYS,
            cooldown_secs: 300,
            resumable_ttl_hours: DEFAULT_RESUMABLE_TTL_HOURS,
            progress_ttl_hours: DEFAULT_PROGRESS_TTL_HOURS,
            max_extraction_threads: 12,
        }
    }
}

impl EngineConfig {
    /// Load from the config directory (if the file exists), then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if config::config_exists(CONFIG_FILE) {
            config::load_json(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a specific JSON file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config: Self = config::load_json_file(path)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Parse from a JSON string, without environment overrides
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine config JSON")
    }

    /// Write to `vitalsync.json` in the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(CONFIG_FILE, self)
    }

    /// Default config file path (~/.config/vitalsync/vitalsync.json)
    pub fn default_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_url = Some(url);
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(value) = lookup(ENV_CHUNK_SIZE) {
            self.chunk_size = parse_var(ENV_CHUNK_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_PACING_MS) {
            self.pacing_ms = parse_var(ENV_PACING_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_COOLDOWN_SECS) {
            self.cooldown_secs = parse_var(ENV_COOLDOWN_SECS, &value)?;
        }
        Ok(())
    }

    /// Backend URL, required for any command that talks to the backend
    pub fn require_backend_url(&self) -> Result<&str> {
        self.backend_url.as_deref().with_context(|| {
            format!(
                "Backend URL not configured (set {} or backend_url in {})",
                ENV_BACKEND_URL, CONFIG_FILE
            )
        })
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resumable_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.resumable_ttl_hours)
    }

    pub fn progress_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.progress_ttl_hours)
    }

    pub fn gap_analyzer(&self) -> GapAnalyzer {
        GapAnalyzer::new(
            chrono::Duration::days(self.historical_lookback_days),
            chrono::Duration::days(self.fallback_lookback_days),
        )
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.pacing(), Duration::from_millis(100));
        assert_eq!(config.cooldown_secs, 300);
        assert_eq!(config.resumable_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.progress_ttl(), chrono::Duration::hours(1));
        assert!(config.require_backend_url().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "backend_url": "https://api.example.com", "chunk_size": 250 }"#,
        )
        .unwrap();
        assert_eq!(config.require_backend_url().unwrap(), "https://api.example.com");
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.fallback_lookback_days, 7);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_BACKEND_URL, "https://staging.example.com"),
            (ENV_API_TOKEN, "token"),
            (ENV_CHUNK_SIZE, " 1000 "),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend_url.as_deref(), Some("https://staging.example.com"));
        assert_eq!(config.api_token.as_deref(), Some("token"));
        assert_eq!(config.chunk_size, 1_000);
        assert_eq!(config.cooldown_secs, 300);
    }

    #[test]
    fn test_invalid_override() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_COOLDOWN_SECS).then(|| "five minutes".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_token_not_written_when_absent() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert!(json.get("api_token").is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "cooldown_secs": 60 }"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert!(config.cooldown_secs == 60 || std::env::var(ENV_COOLDOWN_SECS).is_ok());
    }
}
