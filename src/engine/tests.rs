//! Tests for the ingest engine

use super::*;
use crate::dataset::{Dataset, DatasetFormat};
use crate::error::Error;
use crate::http::RateLimiterConfig;
use crate::types::{AttemptLimit, BackoffType};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

// ============================================================================
// Test Transport
// ============================================================================

/// Replays scripted responses; once the script runs out every attempt gets
/// an empty 200 stream.
#[derive(Clone, Default)]
struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<StreamResponse>>>>,
    opened: Arc<AtomicU64>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self::default()
    }

    fn then(self, response: Result<StreamResponse>) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    fn then_lines(self, status: u16, lines: &[&str]) -> Self {
        let body: Vec<String> = lines.iter().map(|l| format!("{l}\n")).collect();
        self.then(Ok(StreamResponse::from_chunks(status, body)))
    }

    fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(&self) -> Result<StreamResponse> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(StreamResponse::from_chunks(200, Vec::<&'static str>::new())))
    }
}

fn user_line(name: &str) -> String {
    format!(r#"{{"data":{{"id":"1"}},"includes":{{"users":[{{"username":"{name}"}}]}}}}"#)
}

fn fast_config(max_attempts: u64) -> IngestConfig {
    IngestConfig::new()
        .with_max_attempts(max_attempts)
        .with_backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .with_read_timeout(Duration::from_millis(200))
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dataset.csv");
    (dir, path)
}

fn ingestor(
    transport: ScriptedTransport,
    path: &Path,
    config: IngestConfig,
) -> StreamIngestor<ScriptedTransport> {
    let writer = DatasetWriter::open(path, &DatasetFormat::default()).unwrap();
    StreamIngestor::new(transport, writer, config)
}

fn dataset_rows(path: &Path) -> Vec<Vec<String>> {
    Dataset::load(path, &DatasetFormat::default()).unwrap().rows
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_ingest_config_default() {
    let config = IngestConfig::default();
    assert_eq!(config.attempts, AttemptLimit::Unbounded);
    assert_eq!(config.read_timeout, Duration::from_secs(60));
    assert_eq!(config.on_record_error, RecordErrorPolicy::Fail);
    assert!(config.reconnect_limit.is_none());
}

#[test]
fn test_backoff_exponential() {
    let config = IngestConfig::new().with_backoff(
        BackoffType::Exponential,
        Duration::from_millis(100),
        Duration::from_secs(1),
    );

    assert_eq!(config.backoff_delay(0), Duration::from_millis(100));
    assert_eq!(config.backoff_delay(1), Duration::from_millis(200));
    assert_eq!(config.backoff_delay(2), Duration::from_millis(400));
    assert_eq!(config.backoff_delay(10), Duration::from_secs(1));
    assert_eq!(config.backoff_delay(u32::MAX), Duration::from_secs(1));
}

#[test]
fn test_backoff_linear_and_constant() {
    let linear = IngestConfig::new().with_backoff(
        BackoffType::Linear,
        Duration::from_millis(100),
        Duration::from_secs(10),
    );
    assert_eq!(linear.backoff_delay(0), Duration::from_millis(100));
    assert_eq!(linear.backoff_delay(2), Duration::from_millis(300));

    let constant = IngestConfig::new().with_backoff(
        BackoffType::Constant,
        Duration::from_millis(100),
        Duration::from_secs(10),
    );
    assert_eq!(constant.backoff_delay(5), Duration::from_millis(100));
}

// ============================================================================
// Ingest Tests
// ============================================================================

#[tokio::test]
async fn test_one_row_per_record_in_order() {
    let (_dir, path) = setup();
    let transport =
        ScriptedTransport::new().then_lines(200, &[&user_line("alice"), &user_line("bob")]);

    let mut ingestor = ingestor(transport, &path, fast_config(1));
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.rows_written, 2);
    assert_eq!(stats.last_status, Some(200));
    assert_eq!(
        dataset_rows(&path),
        vec![vec!["alice".to_string()], vec!["bob".to_string()]]
    );
}

#[tokio::test]
async fn test_empty_lines_produce_no_rows() {
    let (_dir, path) = setup();
    let body = format!("\r\n{}\r\n\r\n   \n{}\n\n", user_line("a"), user_line("b"));
    let transport =
        ScriptedTransport::new().then(Ok(StreamResponse::from_chunks(200, vec![body])));

    let mut ingestor = ingestor(transport, &path, fast_config(1));
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.rows_written, 2);
    assert_eq!(stats.empty_lines, 4);
    assert_eq!(dataset_rows(&path).len(), 2);
}

#[tokio::test]
async fn test_records_split_across_chunks() {
    let (_dir, path) = setup();
    let line = user_line("carol");
    let (head, tail) = line.split_at(10);
    let chunks = vec![head.to_string(), format!("{tail}\n{}", user_line("dave"))];
    let transport =
        ScriptedTransport::new().then(Ok(StreamResponse::from_chunks(200, chunks)));

    let mut ingestor = ingestor(transport, &path, fast_config(1));
    ingestor.run(&CancellationToken::new()).await.unwrap();

    // Trailing line without newline is still consumed at end of stream
    assert_eq!(
        dataset_rows(&path),
        vec![vec!["carol".to_string()], vec!["dave".to_string()]]
    );
}

#[tokio::test]
async fn test_fatal_status_carries_code_and_body() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new().then(Ok(StreamResponse::from_chunks(
        429,
        vec!["rate limited"],
    )));

    let mut ingestor = ingestor(transport.clone(), &path, fast_config(10));
    let err = ingestor.run(&CancellationToken::new()).await.unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Stops immediately even though attempts remain
    assert_eq!(transport.opened(), 1);
    assert_eq!(ingestor.stats().attempts, 1);
}

#[tokio::test]
async fn test_error_body_is_not_parsed_as_records() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new().then_lines(401, &[r#"{"title":"Unauthorized"}"#]);

    let mut ingestor = ingestor(transport, &path, fast_config(3));
    let err = ingestor.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 401, .. }));
    assert!(dataset_rows(&path).is_empty());
}

#[tokio::test]
async fn test_attempts_never_exceed_limit() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new();

    let mut ingestor = ingestor(transport.clone(), &path, fast_config(3));
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.attempts, 3);
    assert_eq!(transport.opened(), 3);
    assert_eq!(stats.rows_written, 0);
    assert!(!stats.cancelled);
    assert!(stats.finished_at.is_some());
    assert!(dataset_rows(&path).is_empty());
}

#[tokio::test]
async fn test_writer_persists_across_attempts() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new()
        .then_lines(200, &[&user_line("first")])
        .then_lines(200, &[])
        .then_lines(200, &[&user_line("second")]);

    let mut ingestor = ingestor(transport, &path, fast_config(3));
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(ingestor.into_writer().finish().unwrap(), 2);

    assert_eq!(stats.attempts, 3);
    assert_eq!(
        dataset_rows(&path),
        vec![vec!["first".to_string()], vec!["second".to_string()]]
    );
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new()
        .then(Ok(StreamResponse::from_chunks(503, vec!["busy"])))
        .then_lines(200, &[&user_line("alice")]);

    let mut ingestor = ingestor(transport, &path, fast_config(2));
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.transient_failures, 1);
    assert_eq!(stats.rows_written, 1);
}

#[tokio::test]
async fn test_transient_failure_on_last_attempt_is_returned() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new()
        .then(Err(Error::Timeout { timeout_ms: 5 }))
        .then(Err(Error::Timeout { timeout_ms: 5 }));

    let mut ingestor = ingestor(transport.clone(), &path, fast_config(2));
    let err = ingestor.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(transport.opened(), 2);
    assert_eq!(ingestor.stats().transient_failures, 2);
}

#[tokio::test]
async fn test_silent_stream_times_out_and_reconnects() {
    let (_dir, path) = setup();
    let silent = StreamResponse::new(200, stream::pending().boxed());
    let transport = ScriptedTransport::new()
        .then(Ok(silent))
        .then_lines(200, &[&user_line("alice")]);

    let config = fast_config(2).with_read_timeout(Duration::from_millis(50));
    let mut ingestor = ingestor(transport, &path, config);
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.transient_failures, 1);
    assert_eq!(stats.rows_written, 1);
}

#[tokio::test]
async fn test_malformed_record_fails_by_default() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new().then_lines(
        200,
        &[&user_line("alice"), r#"{"data":{}}"#, &user_line("bob")],
    );

    let mut ingestor = ingestor(transport, &path, fast_config(5));
    let err = ingestor.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::RecordParse { line: 2, .. }));
    assert_eq!(dataset_rows(&path), vec![vec!["alice".to_string()]]);
}

#[tokio::test]
async fn test_malformed_record_skipped_by_policy() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new().then_lines(
        200,
        &[&user_line("alice"), "garbage", &user_line("bob")],
    );

    let config = fast_config(1).with_record_errors(RecordErrorPolicy::Skip);
    let mut ingestor = ingestor(transport, &path, config);
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.records_skipped, 1);
    assert_eq!(stats.rows_written, 2);
}

fn invalid_utf8_body() -> Vec<u8> {
    let mut body = format!("{}\n", user_line("alice")).into_bytes();
    body.extend_from_slice(b"{\"includes\":{\"users\":[{\"username\":\"al\xFFice\"}]}}\n");
    body.extend_from_slice(format!("{}\n", user_line("bob")).as_bytes());
    body
}

#[tokio::test]
async fn test_invalid_utf8_record_fails_by_default() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new()
        .then(Ok(StreamResponse::from_chunks(200, vec![invalid_utf8_body()])));

    let mut ingestor = ingestor(transport, &path, fast_config(1));
    let err = ingestor.run(&CancellationToken::new()).await.unwrap_err();

    match err {
        Error::RecordParse { line, message } => {
            assert_eq!(line, 2);
            assert!(message.contains("invalid UTF-8"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(dataset_rows(&path), vec![vec!["alice".to_string()]]);
}

#[tokio::test]
async fn test_invalid_utf8_record_skipped_by_policy() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new()
        .then(Ok(StreamResponse::from_chunks(200, vec![invalid_utf8_body()])));

    let config = fast_config(1).with_record_errors(RecordErrorPolicy::Skip);
    let mut ingestor = ingestor(transport, &path, config);
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.records_skipped, 1);
    assert_eq!(
        dataset_rows(&path),
        vec![vec!["alice".to_string()], vec!["bob".to_string()]]
    );
}

#[tokio::test]
async fn test_oversized_line_skipped_by_policy() {
    let (_dir, path) = setup();
    let chunks = vec![
        format!("{}\n", user_line("alice")),
        "x".repeat(200),
        format!("{}\n{}\n", "x".repeat(100), user_line("bob")),
    ];
    let transport =
        ScriptedTransport::new().then(Ok(StreamResponse::from_chunks(200, chunks)));

    let config = fast_config(1)
        .with_record_errors(RecordErrorPolicy::Skip)
        .with_max_line_bytes(128);
    let mut ingestor = ingestor(transport, &path, config);
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(stats.records_skipped, 1);
    assert_eq!(
        dataset_rows(&path),
        vec![vec!["alice".to_string()], vec!["bob".to_string()]]
    );
}

#[tokio::test]
async fn test_oversized_line_fails_by_default() {
    let (_dir, path) = setup();
    let chunks = vec![format!("{}\n", user_line("alice")), "x".repeat(200)];
    let transport =
        ScriptedTransport::new().then(Ok(StreamResponse::from_chunks(200, chunks)));

    let config = fast_config(1).with_max_line_bytes(128);
    let mut ingestor = ingestor(transport, &path, config);
    let err = ingestor.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::RecordParse { line: 2, .. }));
}

#[tokio::test]
async fn test_custom_decoder() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new().then_lines(200, &[r#"{"data":{"author_id":"7"}}"#]);

    let mut ingestor = ingestor(transport, &path, fast_config(1))
        .with_decoder(FieldDecoder::with_path("data.author_id"));
    ingestor.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(dataset_rows(&path), vec![vec!["7".to_string()]]);
}

// ============================================================================
// Backoff Timing Tests
// ============================================================================

/// A 200 stream that delivers one record and then drops
fn productive_then_dropped(name: &str) -> Result<StreamResponse> {
    let body = stream::iter(vec![
        Ok(Bytes::from(format!("{}\n", user_line(name)))),
        Err(Error::Timeout { timeout_ms: 60_000 }),
    ]);
    Ok(StreamResponse::new(200, body.boxed()))
}

#[tokio::test(start_paused = true)]
async fn test_backoff_resets_after_productive_connection() {
    let (_dir, path) = setup();
    let mut transport = ScriptedTransport::new();
    for i in 0..10 {
        transport = transport.then(productive_then_dropped(&format!("user{i}")));
    }

    let config = IngestConfig::new().with_max_attempts(11);
    let mut ingestor = ingestor(transport, &path, config);
    let start = tokio::time::Instant::now();
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(stats.rows_written, 10);
    assert_eq!(stats.transient_failures, 10);
    // Every drop waits only the initial delay
    assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_across_failed_connections() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new()
        .then(Err(Error::Timeout { timeout_ms: 5 }))
        .then(Err(Error::Timeout { timeout_ms: 5 }))
        .then(Err(Error::Timeout { timeout_ms: 5 }));

    let config = IngestConfig::new().with_max_attempts(4);
    let mut ingestor = ingestor(transport, &path, config);
    let start = tokio::time::Instant::now();
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(stats.transient_failures, 3);
    // 1s + 2s + 4s
    assert!(elapsed >= Duration::from_secs(7), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(8), "{elapsed:?}");
}

#[tokio::test]
async fn test_started_at_marks_run_start() {
    let (_dir, path) = setup();
    let mut ingestor = ingestor(ScriptedTransport::new(), &path, fast_config(1));

    tokio::time::sleep(Duration::from_millis(20)).await;
    let before = Utc::now();
    let stats = ingestor.run(&CancellationToken::new()).await.unwrap();

    assert!(stats.started_at >= before);
    assert!(stats.finished_at.unwrap() >= stats.started_at);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut ingestor = ingestor(transport.clone(), &path, IngestConfig::new());
    let stats = ingestor.run(&cancel).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.attempts, 0);
    assert_eq!(transport.opened(), 0);
}

#[tokio::test]
async fn test_cancel_unbounded_run_mid_stream() {
    let (_dir, path) = setup();
    let body = stream::iter(vec![Ok(Bytes::from(format!("{}\n", user_line("alice"))))])
        .chain(stream::pending());
    let transport = ScriptedTransport::new().then(Ok(StreamResponse::new(200, body.boxed())));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let config = IngestConfig::new().with_read_timeout(Duration::from_secs(30));
    let mut ingestor = ingestor(transport, &path, config);
    let stats = ingestor.run(&cancel).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.rows_written, 1);
}

#[tokio::test]
async fn test_reconnect_limit_waits_and_honours_cancel() {
    let (_dir, path) = setup();
    let transport = ScriptedTransport::new();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    // One connection per minute: the second attempt has to wait
    let config = fast_config(5).with_reconnect_limit(RateLimiterConfig::per_minute(1));
    let mut ingestor = ingestor(transport.clone(), &path, config);
    let stats = ingestor.run(&cancel).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.attempts, 1);
    assert_eq!(transport.opened(), 1);
}
