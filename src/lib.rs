// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

//! # stream-harvest
//!
//! Collects author usernames from a sampled tweet stream into a CSV dataset.
//!
//! ## Features
//!
//! - **Streaming ingest**: one long-lived authenticated GET, newline-delimited
//!   JSON records, one dataset row per record
//! - **Reconnect loop**: clean disconnects reopen immediately, transient
//!   failures back off, client errors stop the run
//! - **Durable appends**: every row is flushed before the next line is read
//! - **Dedupe**: rewrite the dataset keeping the first occurrence of each row
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stream_harvest::auth::Credential;
//! use stream_harvest::dataset::{DatasetFormat, DatasetWriter};
//! use stream_harvest::engine::{IngestConfig, StreamIngestor};
//! use stream_harvest::http::{StreamClient, StreamClientConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> stream_harvest::Result<()> {
//!     let format = DatasetFormat::default();
//!     let writer = DatasetWriter::open("dataset.csv", &format)?;
//!     let client = StreamClient::new(StreamClientConfig::default(), Credential::from_env())?;
//!
//!     let config = IngestConfig::new().with_max_attempts(250_000);
//!     let mut ingestor = StreamIngestor::new(client, writer, config);
//!     let stats = ingestor.run(&CancellationToken::new()).await?;
//!     println!("{} rows", stats.rows_written);
//!
//!     stream_harvest::dataset::dedupe("dataset.csv", &format)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   StreamClient ──bytes──▶ LineSplitter ──lines──▶ FieldDecoder
//!        ▲                                              │ rows
//!        │ reconnect                                    ▼
//!   StreamIngestor ◀──────── stats ──────────── DatasetWriter ──▶ dataset.csv
//!                                                                    │
//!                                                         dedupe ◀───┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Bearer token authentication
pub mod auth;

/// Streaming HTTP client and reconnect pacing
pub mod http;

/// Line splitting and record decoding
pub mod decode;

/// Dataset file: appends and dedupe
pub mod dataset;

/// Reconnecting ingest loop
pub mod engine;

/// Configuration file
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::AppConfig;
pub use dataset::{dedupe, DatasetFormat, DatasetWriter, DedupeStats};
pub use engine::{IngestConfig, IngestStats, StreamIngestor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
