//! Dataset deduplication
//!
//! Loads the whole file, keeps the first occurrence of every distinct row
//! and rewrites the file through a temporary file plus atomic rename.

use super::types::{Dataset, DatasetFormat, DedupeStats, Row};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::io::BufWriter;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

impl Dataset {
    /// Load the full dataset from disk.
    ///
    /// The first record is taken as the header when it equals the format's
    /// header row; otherwise every record is data.
    pub fn load(path: impl AsRef<Path>, format: &DatasetFormat) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let mut reader = format.reader_builder().from_path(path)?;
        let mut rows: Vec<Row> = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }

        let header = if format.has_header() && rows.first() == Some(&format.header) {
            Some(rows.remove(0))
        } else {
            None
        };

        Ok(Self { header, rows })
    }

    /// Drop repeated rows in place, returning how many were removed
    pub fn dedupe(&mut self) -> usize {
        let before = self.rows.len();
        self.rows = dedupe_rows(std::mem::take(&mut self.rows));
        before - self.rows.len()
    }

    /// Replace the file at `path` with this dataset.
    ///
    /// Writes to a temporary file in the same directory and renames it over
    /// the target, so a crash leaves either the old or the new content.
    pub fn save(&self, path: impl AsRef<Path>, format: &DatasetFormat) -> Result<()> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let temp = NamedTempFile::new_in(parent)
            .map_err(|e| Error::dataset(&path_str, format!("create temporary file: {e}")))?;
        let mut writer = format.writer_builder().from_writer(BufWriter::new(temp));

        let header = self
            .header
            .as_ref()
            .or_else(|| format.has_header().then_some(&format.header));
        if let Some(header) = header {
            writer.write_record(header)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }

        let buffered = writer
            .into_inner()
            .map_err(|e| Error::dataset(&path_str, format!("flush: {}", e.error())))?;
        let temp = buffered
            .into_inner()
            .map_err(|e| Error::dataset(&path_str, format!("flush: {}", e.error())))?;
        temp.as_file().sync_all()?;

        if let Ok(meta) = std::fs::metadata(path) {
            std::fs::set_permissions(temp.path(), meta.permissions())?;
        }

        temp.persist(path)
            .map_err(|e| Error::dataset(&path_str, format!("rename: {}", e.error)))?;
        Ok(())
    }
}

/// Keep the first occurrence of each distinct row, preserving order
pub fn dedupe_rows(rows: Vec<Row>) -> Vec<Row> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

/// Remove duplicate rows from the dataset file at `path`.
///
/// The file is only rewritten when something was removed, so running this
/// on an already distinct dataset leaves it untouched.
pub fn dedupe(path: impl AsRef<Path>, format: &DatasetFormat) -> Result<DedupeStats> {
    let path = path.as_ref();
    let mut dataset = Dataset::load(path, format)?;

    let rows_before = dataset.len();
    let removed = dataset.dedupe();
    let rewritten = removed > 0;
    if rewritten {
        dataset.save(path, format)?;
    }

    let stats = DedupeStats {
        rows_before,
        rows_after: dataset.len(),
        removed,
        rewritten,
    };
    info!(
        path = %path.display(),
        rows_before = stats.rows_before,
        rows_after = stats.rows_after,
        removed = stats.removed,
        "dedupe finished"
    );
    Ok(stats)
}
