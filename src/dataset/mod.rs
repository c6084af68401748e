//! Dataset module
//!
//! The dataset is a single CSV file shared by the two operations:
//! - `DatasetWriter` appends one row per streamed record during ingest
//! - `dedupe` rewrites the file without duplicate rows
//!
//! Both sides take the same `DatasetFormat`, so the delimiter used to read
//! the file is always the one it was written with.

mod dedupe;
mod types;
mod writer;

pub use dedupe::{dedupe, dedupe_rows};
pub use types::{Dataset, DatasetFormat, DedupeStats, Row};
pub use writer::DatasetWriter;
