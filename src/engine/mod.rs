//! Execution engine module
//!
//! The long-running ingest loop.
//!
//! # Overview
//!
//! `StreamIngestor` keeps one streaming connection open at a time, turns
//! every record line into a dataset row, and reconnects when the server
//! closes the stream:
//!
//! - a clean disconnect (status 200, body ended) reconnects immediately
//! - a transient failure (transport error, read timeout, 5xx) reconnects
//!   after a backoff delay; the delay grows with consecutive failures and
//!   starts over once a connection has delivered records
//! - any other failure (4xx status, malformed record under the fail policy,
//!   dataset I/O) ends the run with an error
//! - a transient failure on the final allowed attempt is returned as the
//!   run's error
//!
//! The run also ends when the attempt limit is reached or the cancellation
//! token fires.

mod types;

pub use types::{IngestConfig, IngestStats};

use crate::dataset::DatasetWriter;
use crate::decode::{FieldDecoder, LineSplitter, RecordDecoder};
use crate::error::{Error, Result};
use crate::http::{RateLimiter, StreamResponse, StreamTransport};
use crate::types::RecordErrorPolicy;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a single connection attempt ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptEnd {
    /// The server closed the stream
    Disconnected,
    /// The caller cancelled the run
    Cancelled,
}

/// Consumes the stream endpoint into the dataset
pub struct StreamIngestor<T> {
    /// Opens the stream
    transport: T,
    /// Shared by every attempt of the run
    writer: DatasetWriter,
    /// Turns lines into rows
    decoder: Box<dyn RecordDecoder>,
    /// Run configuration
    config: IngestConfig,
    /// Reconnect pacing
    limiter: Option<RateLimiter>,
    /// Statistics
    stats: IngestStats,
}

impl<T: StreamTransport> StreamIngestor<T> {
    /// Create an ingestor that writes usernames through `writer`
    pub fn new(transport: T, writer: DatasetWriter, config: IngestConfig) -> Self {
        let limiter = config.reconnect_limit.as_ref().map(RateLimiter::new);
        Self {
            transport,
            writer,
            decoder: Box::new(FieldDecoder::new()),
            config,
            limiter,
            stats: IngestStats::new(),
        }
    }

    /// Use a different record decoder
    #[must_use]
    pub fn with_decoder(mut self, decoder: impl RecordDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Get statistics
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Get the run configuration
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Give back the dataset writer so the caller can close it
    pub fn into_writer(self) -> DatasetWriter {
        self.writer
    }

    /// Run until the attempt limit is reached, the token is cancelled, or a
    /// fatal error occurs.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<IngestStats> {
        self.stats.started_at = Utc::now();
        self.stats.finished_at = None;
        info!(max_attempts = %self.config.attempts, "starting stream ingest");

        let result = self.run_loop(cancel).await;
        self.stats.finish();

        match &result {
            Ok(()) => info!(
                attempts = self.stats.attempts,
                rows_written = self.stats.rows_written,
                cancelled = self.stats.cancelled,
                "stream ingest finished"
            ),
            Err(e) => warn!(
                attempts = self.stats.attempts,
                rows_written = self.stats.rows_written,
                error = %e,
                "stream ingest aborted"
            ),
        }

        result.map(|()| self.stats.clone())
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut consecutive_failures: u32 = 0;

        loop {
            if !self.config.attempts.allows(self.stats.attempts) {
                debug!(attempts = self.stats.attempts, "attempt limit reached");
                return Ok(());
            }
            if cancel.is_cancelled() {
                self.stats.cancelled = true;
                return Ok(());
            }

            if let Some(limiter) = &self.limiter {
                let cancelled = tokio::select! {
                    () = cancel.cancelled() => true,
                    () = limiter.wait() => false,
                };
                if cancelled {
                    self.stats.cancelled = true;
                    return Ok(());
                }
            }

            self.stats.attempts += 1;
            let attempt = self.stats.attempts;
            let received = self.stats.records_received();

            match self.run_attempt(attempt, cancel).await {
                Ok(AttemptEnd::Disconnected) => {
                    consecutive_failures = 0;
                    info!(attempt, "stream closed by server");
                }
                Ok(AttemptEnd::Cancelled) => {
                    self.stats.cancelled = true;
                    return Ok(());
                }
                Err(e) if e.is_transient() => {
                    self.stats.transient_failures += 1;
                    // The stream was healthy before it dropped
                    if self.stats.records_received() > received {
                        consecutive_failures = 0;
                    }
                    let delay = self.config.backoff_delay(consecutive_failures);
                    consecutive_failures = consecutive_failures.saturating_add(1);

                    // Nothing left to retry with
                    if !self.config.attempts.allows(self.stats.attempts) {
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        error = %e,
                        ?delay,
                        "transient stream failure, reconnecting"
                    );

                    let cancelled = tokio::select! {
                        () = cancel.cancelled() => true,
                        () = tokio::time::sleep(delay) => false,
                    };
                    if cancelled {
                        self.stats.cancelled = true;
                        return Ok(());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One connection: open, check status, consume lines until the stream ends
    async fn run_attempt(
        &mut self,
        attempt: u64,
        cancel: &CancellationToken,
    ) -> Result<AttemptEnd> {
        let response = tokio::select! {
            () = cancel.cancelled() => return Ok(AttemptEnd::Cancelled),
            opened = self.transport.open() => opened?,
        };

        self.stats.last_status = Some(response.status);
        info!(attempt, status = response.status, "stream response");

        if !response.is_success() {
            return Err(self.status_error(response).await);
        }

        let mut body = response.body;
        let mut splitter = LineSplitter::with_max_line(self.config.max_line_bytes);
        let mut line_no: u64 = 0;

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return Ok(AttemptEnd::Cancelled),
                next = tokio::time::timeout(self.config.read_timeout, body.next()) => next,
            };

            let chunk = match next {
                Ok(Some(chunk)) => chunk?,
                Ok(None) => break,
                Err(_) => {
                    return Err(Error::Timeout {
                        timeout_ms: self.config.read_timeout.as_millis() as u64,
                    })
                }
            };

            for line in splitter.push(&chunk) {
                line_no += 1;
                self.handle_line(line, line_no)?;
            }
        }

        if let Some(line) = splitter.finish() {
            line_no += 1;
            self.handle_line(line, line_no)?;
        }

        Ok(AttemptEnd::Disconnected)
    }

    /// Build the error for a non-200 response, carrying its body text
    async fn status_error(&self, response: StreamResponse) -> Error {
        let status = response.status;
        let body = match tokio::time::timeout(self.config.read_timeout, response.text()).await {
            Ok(Ok(text)) => text.trim().to_string(),
            Ok(Err(e)) => format!("<failed to read body: {e}>"),
            Err(_) => "<timed out reading body>".to_string(),
        };
        Error::http_status(status, body)
    }

    fn handle_line(&mut self, line: Result<Bytes>, line_no: u64) -> Result<()> {
        let decoded = line.and_then(|bytes| self.decode_line(&bytes, line_no));
        match decoded {
            Ok(Some(row)) => {
                self.writer.append(&row)?;
                self.stats.rows_written += 1;
                debug!(line_no, row = ?row, "appended row");
            }
            Ok(None) => self.stats.empty_lines += 1,
            Err(e) => match self.config.on_record_error {
                RecordErrorPolicy::Fail => return Err(e),
                RecordErrorPolicy::Skip => {
                    self.stats.records_skipped += 1;
                    warn!(line_no, error = %e, "skipping malformed record");
                }
            },
        }

        Ok(())
    }

    /// Decode one line; `None` for a blank keep-alive line
    fn decode_line(&self, bytes: &[u8], line_no: u64) -> Result<Option<Vec<String>>> {
        let line = std::str::from_utf8(bytes)
            .map_err(|e| Error::record_parse(line_no, format!("invalid UTF-8: {e}")))?
            .trim();
        if line.is_empty() {
            return Ok(None);
        }
        self.decoder.decode(line, line_no).map(Some)
    }
}

impl<T> std::fmt::Debug for StreamIngestor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIngestor")
            .field("writer", &self.writer)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
