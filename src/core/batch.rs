use crate::core::record::Record;

/// Bounded accumulator for pipeline survivors.
///
/// Records are appended in pipeline output order until the batch is full or
/// the reader is exhausted, then the whole batch is handed to the writer.
/// After a flush, successful or not, a fresh batch begins; a failed batch is
/// dropped, never retried.
pub struct Batch<P> {
    records: Vec<Record<P>>,
    capacity: usize,
}

impl<P> Batch<P> {
    pub fn new(capacity: usize) -> Batch<P> {
        Batch {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: Record<P>) {
        debug_assert!(self.records.len() < self.capacity);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() == self.capacity
    }

    pub fn records(&self) -> &[Record<P>] {
        &self.records
    }

    /// Drains the accumulated records for a flush, leaving the batch empty.
    pub fn take(&mut self) -> Vec<Record<P>> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Header;
    use std::time::SystemTime;

    fn record(number: u64) -> Record<u64> {
        Record::new(Header::new(number, "test", SystemTime::UNIX_EPOCH), number)
    }

    #[test]
    fn fills_up_to_capacity() {
        let mut batch = Batch::new(2);
        assert!(batch.is_empty());
        assert!(!batch.is_full());

        batch.push(record(1));
        assert!(!batch.is_full());

        batch.push(record(2));
        assert!(batch.is_full());
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn take_preserves_order_and_empties_the_batch() {
        let mut batch = Batch::new(3);
        batch.push(record(1));
        batch.push(record(2));

        let records = batch.take();
        assert_eq!(
            records.iter().map(|r| *r.payload()).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(batch.is_empty());
        assert!(!batch.is_full());
    }
}
