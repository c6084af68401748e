//! Decoder types and traits

use crate::error::Result;

/// Path of the author's username in an expanded stream record
pub const DEFAULT_FIELD_PATH: &str = "includes.users[0].username";

/// Trait for decoding one streamed line into a dataset row
pub trait RecordDecoder: Send + Sync {
    /// Decode a non-empty line. `line_no` is 1-based within the attempt.
    fn decode(&self, line: &str, line_no: u64) -> Result<Vec<String>>;
}
