//! Record decoder module
//!
//! Turns the newline-delimited JSON body into rows.
//!
//! # Overview
//!
//! - `LineSplitter` reassembles lines from arbitrarily split byte chunks
//! - `FieldDecoder` parses one line and extracts the configured field

mod decoders;
mod types;

pub use decoders::{extract_simple_path, FieldDecoder, LineSplitter, DEFAULT_MAX_LINE_BYTES};
pub use types::{RecordDecoder, DEFAULT_FIELD_PATH};
