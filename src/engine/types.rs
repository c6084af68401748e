//! Engine types
//!
//! Configuration and statistics for the ingest loop.

use crate::decode::DEFAULT_MAX_LINE_BYTES;
use crate::http::RateLimiterConfig;
use crate::types::{AttemptLimit, BackoffType, RecordErrorPolicy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Configuration for an ingest run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Ceiling on connection attempts
    pub attempts: AttemptLimit,
    /// Longest wait for the next body chunk before the connection is
    /// considered dead
    pub read_timeout: Duration,
    /// Backoff strategy after a transient failure
    pub backoff_type: BackoffType,
    /// Initial backoff delay
    pub initial_backoff: Duration,
    /// Maximum backoff delay
    pub max_backoff: Duration,
    /// What to do with malformed records
    pub on_record_error: RecordErrorPolicy,
    /// Optional pacing of connection attempts
    pub reconnect_limit: Option<RateLimiterConfig>,
    /// Longest accepted record line in bytes
    pub max_line_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            attempts: AttemptLimit::Unbounded,
            read_timeout: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(320),
            on_record_error: RecordErrorPolicy::Fail,
            reconnect_limit: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl IngestConfig {
    /// Create a new ingest config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of attempts
    #[must_use]
    pub fn with_max_attempts(mut self, max: u64) -> Self {
        self.attempts = AttemptLimit::Bounded(max);
        self
    }

    /// Set the attempt limit
    #[must_use]
    pub fn with_attempts(mut self, attempts: AttemptLimit) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the read timeout
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set backoff configuration
    #[must_use]
    pub fn with_backoff(
        mut self,
        backoff_type: BackoffType,
        initial: Duration,
        max: Duration,
    ) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Set the malformed record policy
    #[must_use]
    pub fn with_record_errors(mut self, policy: RecordErrorPolicy) -> Self {
        self.on_record_error = policy;
        self
    }

    /// Pace connection attempts
    #[must_use]
    pub fn with_reconnect_limit(mut self, limit: RateLimiterConfig) -> Self {
        self.reconnect_limit = Some(limit);
        self
    }

    /// Set the line length ceiling
    #[must_use]
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Backoff delay after `failures` consecutive transient failures
    /// (0 = first failure)
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self
                .initial_backoff
                .saturating_mul(failures.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(failures);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }
}

/// Statistics from an ingest run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Connection attempts made
    pub attempts: u64,
    /// Rows appended to the dataset
    pub rows_written: u64,
    /// Blank keep-alive lines ignored
    pub empty_lines: u64,
    /// Malformed records skipped under the skip policy
    pub records_skipped: u64,
    /// Attempts that ended in a transient failure
    pub transient_failures: u64,
    /// Status code of the most recent response
    pub last_status: Option<u16>,
    /// Whether the run stopped because it was cancelled
    pub cancelled: bool,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run ended
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self {
            attempts: 0,
            rows_written: 0,
            empty_lines: 0,
            records_skipped: 0,
            transient_failures: 0,
            last_status: None,
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

impl IngestStats {
    /// Create new stats starting now
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that arrived, whether written or skipped
    pub fn records_received(&self) -> u64 {
        self.rows_written + self.records_skipped
    }

    /// Mark the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
