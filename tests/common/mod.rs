use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use batch_engine_rs::core::record::{Header, Record};

#[allow(dead_code)]
pub fn record(number: u64, payload: &str) -> Record<String> {
    Record::new(
        Header::new(number, "test", SystemTime::UNIX_EPOCH),
        payload.to_string(),
    )
}

/// Shared, thread-safe log of listener and stage invocations.
#[derive(Clone, Default)]
pub struct InvocationLog {
    entries: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl InvocationLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count_of(&self, entry: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == entry)
            .count()
    }
}
