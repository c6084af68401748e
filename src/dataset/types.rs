//! Dataset types

use crate::error::{Error, Result};
use serde::Serialize;

/// One dataset row
pub type Row = Vec<String>;

/// On-disk layout of the dataset file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFormat {
    /// Field delimiter
    pub delimiter: u8,
    /// Header row written at the top of a new file (empty = no header)
    pub header: Row,
}

impl Default for DatasetFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header: vec!["username".to_string()],
        }
    }
}

impl DatasetFormat {
    /// Create a format with the default delimiter and header
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delimiter from a single-byte character
    pub fn with_delimiter(mut self, delimiter: char) -> Result<Self> {
        self.delimiter = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                Error::invalid_value("dataset.delimiter", "must be a single ASCII character")
            })?;
        Ok(self)
    }

    /// Set the header row
    #[must_use]
    pub fn with_header<I, S>(mut self, header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header = header.into_iter().map(Into::into).collect();
        self
    }

    /// Drop the header row
    #[must_use]
    pub fn without_header(mut self) -> Self {
        self.header.clear();
        self
    }

    /// Whether files in this format carry a header row
    pub fn has_header(&self) -> bool {
        !self.header.is_empty()
    }

    pub(crate) fn writer_builder(&self) -> csv::WriterBuilder {
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .has_headers(false);
        builder
    }

    pub(crate) fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(false);
        builder
    }
}

/// The full dataset held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    /// Header row found at the top of the file, if any
    pub header: Option<Row>,
    /// Data rows in file order
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Create a dataset from rows
    pub fn new(header: Option<Row>, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a dedupe pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupeStats {
    /// Data rows before the pass
    pub rows_before: usize,
    /// Data rows after the pass
    pub rows_after: usize,
    /// Rows dropped as duplicates
    pub removed: usize,
    /// Whether the file was rewritten
    pub rewritten: bool,
}
