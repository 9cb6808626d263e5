use crate::core::record::Record;
use crate::error::BatchError;

/// Represents the result of reading a record.
///
/// - `Ok(Some(record))` when a record is successfully read
/// - `Ok(None)` when the end of the stream is reached
/// - `Err(BatchError)` when an error occurs during reading
pub type RecordReaderResult<P> = Result<Option<Record<P>>, BatchError>;

/// A trait for reading records from a data source.
///
/// The engine opens the reader exactly once before the first read, drains it
/// until `Ok(None)`, and closes it exactly once on every exit path. Readers
/// are expected to preserve source order and to stamp each record's header
/// with its sequence number.
///
/// # Example
///
/// ```
/// use std::time::SystemTime;
/// use batch_engine_rs::core::reader::{RecordReader, RecordReaderResult};
/// use batch_engine_rs::core::record::{Header, Record};
///
/// struct LineReader {
///     lines: Vec<String>,
///     position: usize,
/// }
///
/// impl RecordReader<String> for LineReader {
///     fn read_record(&mut self) -> RecordReaderResult<String> {
///         match self.lines.get(self.position) {
///             Some(line) => {
///                 self.position += 1;
///                 let header = Header::new(self.position as u64, "lines", SystemTime::now());
///                 Ok(Some(Record::new(header, line.clone())))
///             }
///             None => Ok(None),
///         }
///     }
/// }
/// ```
pub trait RecordReader<P> {
    /// Opens the reader.
    ///
    /// Called once, before the first `read_record`. The default
    /// implementation does nothing.
    fn open(&mut self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Reads the next record, or `Ok(None)` at the end of the stream.
    fn read_record(&mut self) -> RecordReaderResult<P>;

    /// Closes the reader.
    ///
    /// Called once, after the run terminates. Failures are logged by the
    /// engine and never affect the job outcome. The default implementation
    /// does nothing.
    fn close(&mut self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// Reader used when a job is built without one: an immediately empty stream.
#[derive(Debug, Default)]
pub struct NoopReader;

impl<P> RecordReader<P> for NoopReader {
    fn read_record(&mut self) -> RecordReaderResult<P> {
        Ok(None)
    }
}
