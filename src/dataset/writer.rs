//! Append-only dataset writer
//!
//! Opened once per ingest run and shared by every connection attempt.
//! Each row is flushed as soon as it is written so a concurrent reader of
//! the file sees it immediately.

use super::types::DatasetFormat;
use crate::error::{Error, Result};
use csv::Writer;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appends rows to the dataset file
pub struct DatasetWriter {
    writer: Writer<File>,
    path: PathBuf,
    rows_written: u64,
}

impl DatasetWriter {
    /// Open the dataset for appending, creating it if needed.
    ///
    /// Existing content is never truncated. A file that is empty when opened
    /// gets the format's header row first.
    pub fn open(path: impl AsRef<Path>, format: &DatasetFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::dataset(path.display().to_string(), format!("open: {e}")))?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = format.writer_builder().from_writer(file);
        if is_new && format.has_header() {
            writer.write_record(&format.header)?;
            writer.flush()?;
            debug!(path = %path.display(), "wrote dataset header");
        }

        Ok(Self {
            writer,
            path,
            rows_written: 0,
        })
    }

    /// Append one row and flush it to the file
    pub fn append<S: AsRef<[u8]>>(&mut self, row: &[S]) -> Result<()> {
        self.writer.write_record(row)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Rows appended through this writer
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Path of the dataset file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, sync to disk, and close the file
    pub fn finish(self) -> Result<u64> {
        let rows = self.rows_written;
        let file = self.writer.into_inner().map_err(|e| {
            Error::dataset(
                self.path.display().to_string(),
                format!("flush: {}", e.error()),
            )
        })?;
        file.sync_all()?;
        Ok(rows)
    }
}

impl std::fmt::Debug for DatasetWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetWriter")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}
