//! Output persistence
//!
//! Records are appended to a CSV file through the [`RecordSink`] trait, and
//! the position reached by a run is recorded in a JSON checkpoint.

pub mod checkpoint;
pub mod csv_sink;

use crate::error::Result;
use crate::models::Record;

pub use checkpoint::RunCheckpoint;
pub use csv_sink::CsvSink;

/// Append-only destination for extracted records
pub trait RecordSink {
    /// Append records in order; rows already written are never touched
    fn append(&mut self, records: &[Record]) -> Result<()>;

    /// Push buffered rows to durable storage
    fn flush(&mut self) -> Result<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&mut self, records: &[Record]) -> Result<()> {
        (**self).append(records)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
