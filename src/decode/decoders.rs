//! Decoder implementations

use super::types::{RecordDecoder, DEFAULT_FIELD_PATH};
use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use serde_json::Value;

// ============================================================================
// Line Splitter
// ============================================================================

/// Default ceiling on the length of a single line
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

/// Splits a chunked byte stream into lines.
///
/// Chunk boundaries carry no meaning: a line may arrive across several
/// chunks and one chunk may hold several lines. `\n` and `\r\n` both end a
/// line. Lines are handed out as raw bytes; text validation is up to the
/// caller.
///
/// A line longer than the ceiling is reported once as a record error and
/// its remaining bytes are dropped up to the next `\n`, so memory stays
/// bounded when the peer never sends a terminator.
#[derive(Debug)]
pub struct LineSplitter {
    pending: BytesMut,
    /// Prefix of `pending` already known to hold no `\n`
    scanned: usize,
    max_line: usize,
    /// Dropping the tail of an oversized line
    discarding: bool,
    /// Lines handed out so far, oversized ones included
    lines: u64,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineSplitter {
    /// Create an empty splitter with the default line ceiling
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty splitter that rejects lines over `max_line` bytes
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            scanned: 0,
            max_line,
            discarding: false,
            lines: 0,
        }
    }

    /// Feed a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Bytes>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(offset) = self.pending[self.scanned..].iter().position(|&b| b == b'\n') {
            let line = self.pending.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            if self.discarding {
                self.discarding = false;
                continue;
            }
            lines.push(self.complete(line));
        }
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_line {
            self.pending.clear();
            self.scanned = 0;
            if !self.discarding {
                self.discarding = true;
                self.lines += 1;
                lines.push(Err(self.oversized()));
            }
        }
        lines
    }

    /// Take whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<Result<Bytes>> {
        let discarding = std::mem::take(&mut self.discarding);
        self.scanned = 0;
        if discarding || self.pending.is_empty() {
            self.pending.clear();
            return None;
        }
        let rest = self.pending.split();
        Some(self.complete(rest))
    }

    /// Number of bytes waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lines handed out so far
    pub fn lines(&self) -> u64 {
        self.lines
    }

    fn complete(&mut self, mut line: BytesMut) -> Result<Bytes> {
        self.lines += 1;
        if line.last() == Some(&b'\n') {
            line.truncate(line.len() - 1);
        }
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.len() > self.max_line {
            return Err(self.oversized());
        }
        Ok(line.freeze())
    }

    fn oversized(&self) -> Error {
        Error::record_parse(
            self.lines,
            format!("line longer than {} bytes", self.max_line),
        )
    }
}

// ============================================================================
// Field Decoder
// ============================================================================

/// Parses a JSON line and extracts a single string field
#[derive(Debug, Clone)]
pub struct FieldDecoder {
    path: String,
}

impl Default for FieldDecoder {
    fn default() -> Self {
        Self::with_path(DEFAULT_FIELD_PATH)
    }
}

impl FieldDecoder {
    /// Decoder for the author's username
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder for an arbitrary dot/bracket path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The configured path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extract the field from a parsed record
    pub fn extract(&self, record: &Value) -> Option<String> {
        match extract_simple_path(record, &self.path)? {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl RecordDecoder for FieldDecoder {
    fn decode(&self, line: &str, line_no: u64) -> Result<Vec<String>> {
        let record: Value = serde_json::from_str(line)
            .map_err(|e| Error::record_parse(line_no, format!("invalid JSON: {e}")))?;

        match self.extract(&record) {
            Some(value) => Ok(vec![value]),
            None => Err(Error::record_parse(
                line_no,
                format!("no string at '{}'", self.path),
            )),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Look up a value using simple dot-notation with optional array indexing,
/// e.g. `includes.users[0].username` or `data[-1]`.
pub fn extract_simple_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    let mut current = value;
    for part in path.split('.') {
        let Some(bracket_pos) = part.find('[') else {
            current = current.get(part)?;
            continue;
        };

        let name = &part[..bracket_pos];
        if !name.is_empty() {
            current = current.get(name)?;
        }

        // Chained indices such as `grid[0][1]`
        for index_str in part[bracket_pos..].split(']').filter(|s| !s.is_empty()) {
            let index: i64 = index_str.strip_prefix('[')?.parse().ok()?;
            let arr = current.as_array()?;
            #[allow(clippy::cast_possible_wrap)]
            let idx = if index < 0 {
                arr.len() as i64 + index
            } else {
                index
            };
            current = arr.get(usize::try_from(idx).ok()?)?;
        }
    }

    Some(current)
}
