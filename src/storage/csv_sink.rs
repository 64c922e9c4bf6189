//! CSV output sink
//!
//! The output file starts with a UTF-8 byte-order mark so spreadsheet tools
//! detect the encoding. The mark and the header are written only when the file
//! is created (or found empty); an existing file is always appended to.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{Record, RECORD_HEADER};

use super::RecordSink;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Append-only CSV writer for [`Record`]s
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows_written: u64,
}

impl CsvSink {
    /// Open `path` for appending, writing the header if the file is new
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                Error::with_source(format!("Failed to open output file: {}", path.display()), e)
            })?;

        let is_new = file.metadata()?.len() == 0;
        if is_new {
            file.write_all(UTF8_BOM)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(RECORD_HEADER)?;
            writer.flush()?;
            tracing::info!(path = %path.display(), "Created output file");
        } else {
            tracing::info!(path = %path.display(), "Appending to existing output file");
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended by this sink since it was opened
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.writer.write_record(record.to_row())?;
            self.rows_written += 1;
        }
        self.writer.flush()?;

        tracing::debug!(
            path = %self.path.display(),
            rows = records.len(),
            total = self.rows_written,
            "Appended records"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
