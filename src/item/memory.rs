use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::core::reader::{RecordReader, RecordReaderResult};
use crate::core::record::{Header, Record};
use crate::core::writer::{RecordWriter, RecordWriterResult};

/// Reader yielding records from an in-memory vector.
///
/// Each payload is wrapped into a record with a header stamping the 1-based
/// sequence number, the source name (`"memory"` unless overridden) and the
/// read instant.
///
/// # Example
///
/// ```
/// use batch_engine_rs::core::reader::RecordReader;
/// use batch_engine_rs::item::memory::VecReader;
///
/// let mut reader = VecReader::new(vec!["a", "b"]).source("letters");
/// let record = reader.read_record().unwrap().unwrap();
/// assert_eq!(record.header().number(), 1);
/// assert_eq!(record.header().source(), "letters");
/// ```
pub struct VecReader<P> {
    payloads: std::vec::IntoIter<P>,
    source: String,
    current: u64,
}

impl<P> VecReader<P> {
    pub fn new(payloads: Vec<P>) -> Self {
        Self {
            payloads: payloads.into_iter(),
            source: "memory".to_string(),
            current: 0,
        }
    }

    /// Overrides the source name stamped on record headers.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

impl<P> RecordReader<P> for VecReader<P> {
    fn read_record(&mut self) -> RecordReaderResult<P> {
        match self.payloads.next() {
            Some(payload) => {
                self.current += 1;
                let header = Header::new(self.current, self.source.clone(), SystemTime::now());
                Ok(Some(Record::new(header, payload)))
            }
            None => Ok(None),
        }
    }
}

/// Writer collecting every written record into a shared vector.
///
/// Clones share the same sink, so a test can keep one clone and hand the
/// other to a job, even one running on another thread.
pub struct CollectingWriter<P> {
    sink: Arc<Mutex<Vec<Record<P>>>>,
}

impl<P> Default for CollectingWriter<P> {
    fn default() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<P> Clone for CollectingWriter<P> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
        }
    }
}

impl<P: Clone> CollectingWriter<P> {
    /// Snapshot of everything written so far, in write order.
    pub fn records(&self) -> Vec<Record<P>> {
        self.sink.lock().expect("collecting writer lock poisoned").clone()
    }
}

impl<P: Clone> RecordWriter<P> for CollectingWriter<P> {
    fn write_records(&mut self, batch: &[Record<P>]) -> RecordWriterResult {
        self.sink
            .lock()
            .expect("collecting writer lock poisoned")
            .extend_from_slice(batch);
        Ok(())
    }
}
