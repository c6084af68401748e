//! Configuration file
//!
//! Every setting has a default, so the config file is optional and may
//! name only the fields it changes:
//!
//! ```yaml
//! stream:
//!   url: https://api.twitter.com/2/tweets/sample/stream?expansions=author_id
//!   read_timeout_secs: 60
//! retry:
//!   max_attempts: 250000
//!   backoff: exponential
//! records:
//!   on_error: skip
//! dataset:
//!   path: dataset.csv
//!   delimiter: ","
//! ```
//!
//! The bearer token is never read from this file; it comes from the
//! `BEARER_TOKEN` environment variable.

use crate::dataset::DatasetFormat;
use crate::decode::{DEFAULT_FIELD_PATH, DEFAULT_MAX_LINE_BYTES};
use crate::engine::IngestConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::{default_user_agent, RateLimiterConfig, StreamClientConfig, DEFAULT_STREAM_URL};
use crate::types::{AttemptLimit, BackoffType, RecordErrorPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Stream endpoint settings
    pub stream: StreamSection,
    /// Reconnect behaviour
    pub retry: RetrySection,
    /// Malformed record handling
    pub records: RecordsSection,
    /// Dataset file
    pub dataset: DatasetSection,
}

impl AppConfig {
    /// Load a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.stream.url.trim().is_empty() {
            return Err(Error::invalid_value("stream.url", "must not be empty"));
        }
        url::Url::parse(&self.stream.url)?;
        if self.stream.user_agent.trim().is_empty() {
            return Err(Error::invalid_value("stream.user_agent", "must not be empty"));
        }
        if self.stream.field_path.trim().is_empty() {
            return Err(Error::invalid_value("stream.field_path", "must not be empty"));
        }
        if self.stream.read_timeout_secs == 0 {
            return Err(Error::invalid_value("stream.read_timeout_secs", "must be positive"));
        }
        if self.stream.connect_timeout_secs == 0 {
            return Err(Error::invalid_value(
                "stream.connect_timeout_secs",
                "must be positive",
            ));
        }
        if self.stream.max_line_bytes == 0 {
            return Err(Error::invalid_value("stream.max_line_bytes", "must be positive"));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(Error::invalid_value("retry.max_attempts", "must be positive"));
        }
        if self.retry.reconnects_per_minute == Some(0) {
            return Err(Error::invalid_value(
                "retry.reconnects_per_minute",
                "must be positive",
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_secs.saturating_mul(1000) {
            return Err(Error::config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_secs",
            ));
        }
        self.dataset.format()?;
        if self.dataset.path.as_os_str().is_empty() {
            return Err(Error::invalid_value("dataset.path", "must not be empty"));
        }
        Ok(())
    }

    /// Settings for the streaming HTTP client
    pub fn client_config(&self) -> StreamClientConfig {
        StreamClientConfig::builder()
            .url(&self.stream.url)
            .connect_timeout(Duration::from_secs(self.stream.connect_timeout_secs))
            .user_agent(&self.stream.user_agent)
            .build()
    }

    /// Settings for the ingest loop
    pub fn ingest_config(&self) -> IngestConfig {
        let mut config = IngestConfig::new()
            .with_attempts(AttemptLimit::from_max(self.retry.max_attempts))
            .with_read_timeout(Duration::from_secs(self.stream.read_timeout_secs))
            .with_backoff(
                self.retry.backoff,
                Duration::from_millis(self.retry.initial_backoff_ms),
                Duration::from_secs(self.retry.max_backoff_secs),
            )
            .with_record_errors(self.records.on_error)
            .with_max_line_bytes(self.stream.max_line_bytes);
        if let Some(n) = self.retry.reconnects_per_minute {
            config = config.with_reconnect_limit(RateLimiterConfig::per_minute(n));
        }
        config
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Stream endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSection {
    /// Stream URL
    pub url: String,
    /// Client identifier sent as `User-Agent`
    pub user_agent: String,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated on an open stream, in seconds
    pub read_timeout_secs: u64,
    /// Path of the field written to the dataset
    pub field_path: String,
    /// Longest accepted record line in bytes
    pub max_line_bytes: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            user_agent: default_user_agent(),
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            field_path: DEFAULT_FIELD_PATH.to_string(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Reconnect behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    /// Attempt ceiling (absent = reconnect until cancelled)
    pub max_attempts: Option<u64>,
    /// Backoff strategy after transient failures
    pub backoff: BackoffType,
    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in seconds
    pub max_backoff_secs: u64,
    /// Optional cap on connections per minute
    pub reconnects_per_minute: Option<u32>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: BackoffType::Exponential,
            initial_backoff_ms: 1000,
            max_backoff_secs: 320,
            reconnects_per_minute: None,
        }
    }
}

/// Malformed record handling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordsSection {
    /// Fail the run or skip the record
    pub on_error: RecordErrorPolicy,
}

/// Dataset file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetSection {
    /// Dataset path
    pub path: PathBuf,
    /// Field delimiter (single ASCII character)
    pub delimiter: char,
    /// Header row (empty = no header)
    pub header: Vec<String>,
}

impl Default for DatasetSection {
    fn default() -> Self {
        let format = DatasetFormat::default();
        Self {
            path: PathBuf::from("dataset.csv"),
            delimiter: char::from(format.delimiter),
            header: format.header,
        }
    }
}

impl DatasetSection {
    /// The on-disk format shared by ingest and dedupe
    pub fn format(&self) -> Result<DatasetFormat> {
        Ok(DatasetFormat::new()
            .with_delimiter(self.delimiter)?
            .with_header(self.header.iter().cloned()))
    }
}
