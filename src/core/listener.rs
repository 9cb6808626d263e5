use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::warn;

use crate::core::job::JobParameters;
use crate::core::record::Record;
use crate::core::report::JobReport;
use crate::error::BatchError;

/// Callbacks around the whole job run.
///
/// Hooks are invoked synchronously on the job's worker thread. A panicking
/// job listener is logged and swallowed; it never changes the job outcome.
pub trait JobListener {
    fn before_job_start(&self, _parameters: &JobParameters) {}
    fn after_job_end(&self, _report: &JobReport) {}
}

/// Callbacks around each batch.
///
/// `after_batch_processing` and the writing hooks fire at the flush boundary
/// only, never per record; empty batches reach none of them. A panicking
/// batch listener is logged and swallowed.
pub trait BatchListener<P> {
    fn before_batch_reading(&self) {}
    fn after_batch_processing(&self, _batch: &[Record<P>]) {}
    fn after_batch_writing(&self, _batch: &[Record<P>]) {}
    fn on_batch_writing_error(&self, _batch: &[Record<P>], _error: &BatchError) {}
}

/// Callbacks around each record read.
pub trait RecordReaderListener<P> {
    fn before_record_reading(&self) {}
    fn after_record_reading(&self, _record: &Record<P>) {}
    fn on_record_reading_error(&self, _error: &BatchError) {}
}

/// Callbacks around the pipeline, per record.
///
/// `before_record_processing` may replace the record, drop it by returning
/// `Ok(None)`, or fail; a failure from either fallible hook is accounted as a
/// processing error for that record, which then never reaches the writer.
pub trait PipelineListener<P> {
    fn before_record_processing(
        &self,
        record: Record<P>,
    ) -> Result<Option<Record<P>>, BatchError> {
        Ok(Some(record))
    }

    fn after_record_processing(
        &self,
        _input: &Record<P>,
        _output: &Record<P>,
    ) -> Result<(), BatchError> {
        Ok(())
    }

    fn on_record_processing_error(&self, _record: &Record<P>, _error: &BatchError) {}
}

/// Callbacks around each batch write.
pub trait RecordWriterListener<P> {
    fn before_record_writing(&self, _batch: &[Record<P>]) {}
    fn after_record_writing(&self, _batch: &[Record<P>]) {}
    fn on_record_writing_error(&self, _batch: &[Record<P>], _error: &BatchError) {}
}

// Listeners of one kind compose as a chain: before-hooks run in registration
// order, after-hooks in reverse.

fn shielded(hook: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!("{hook} listener panicked, ignoring");
    }
}

#[derive(Default)]
pub(crate) struct CompositeJobListener {
    listeners: Vec<Arc<dyn JobListener + Send + Sync>>,
}

impl CompositeJobListener {
    pub(crate) fn add(&mut self, listener: Arc<dyn JobListener + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub(crate) fn before_job_start(&self, parameters: &JobParameters) {
        for listener in &self.listeners {
            shielded("before_job_start", || listener.before_job_start(parameters));
        }
    }

    pub(crate) fn after_job_end(&self, report: &JobReport) {
        for listener in self.listeners.iter().rev() {
            shielded("after_job_end", || listener.after_job_end(report));
        }
    }
}

pub(crate) struct CompositeBatchListener<P> {
    listeners: Vec<Arc<dyn BatchListener<P> + Send + Sync>>,
}

impl<P> Default for CompositeBatchListener<P> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<P> CompositeBatchListener<P> {
    pub(crate) fn add(&mut self, listener: Arc<dyn BatchListener<P> + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub(crate) fn before_batch_reading(&self) {
        for listener in &self.listeners {
            shielded("before_batch_reading", || listener.before_batch_reading());
        }
    }

    pub(crate) fn after_batch_processing(&self, batch: &[Record<P>]) {
        for listener in self.listeners.iter().rev() {
            shielded("after_batch_processing", || {
                listener.after_batch_processing(batch)
            });
        }
    }

    pub(crate) fn after_batch_writing(&self, batch: &[Record<P>]) {
        for listener in self.listeners.iter().rev() {
            shielded("after_batch_writing", || listener.after_batch_writing(batch));
        }
    }

    pub(crate) fn on_batch_writing_error(&self, batch: &[Record<P>], error: &BatchError) {
        for listener in &self.listeners {
            shielded("on_batch_writing_error", || {
                listener.on_batch_writing_error(batch, error)
            });
        }
    }
}

pub(crate) struct CompositeRecordReaderListener<P> {
    listeners: Vec<Arc<dyn RecordReaderListener<P> + Send + Sync>>,
}

impl<P> Default for CompositeRecordReaderListener<P> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<P> CompositeRecordReaderListener<P> {
    pub(crate) fn add(&mut self, listener: Arc<dyn RecordReaderListener<P> + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub(crate) fn before_record_reading(&self) {
        for listener in &self.listeners {
            listener.before_record_reading();
        }
    }

    pub(crate) fn after_record_reading(&self, record: &Record<P>) {
        for listener in self.listeners.iter().rev() {
            listener.after_record_reading(record);
        }
    }

    pub(crate) fn on_record_reading_error(&self, error: &BatchError) {
        for listener in &self.listeners {
            listener.on_record_reading_error(error);
        }
    }
}

pub(crate) struct CompositePipelineListener<P> {
    listeners: Vec<Arc<dyn PipelineListener<P> + Send + Sync>>,
}

impl<P> Default for CompositePipelineListener<P> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<P> CompositePipelineListener<P> {
    pub(crate) fn add(&mut self, listener: Arc<dyn PipelineListener<P> + Send + Sync>) {
        self.listeners.push(listener);
    }

    /// Threads the record through every listener in registration order.
    /// The first listener that drops or fails the record wins.
    pub(crate) fn before_record_processing(
        &self,
        record: Record<P>,
    ) -> Result<Option<Record<P>>, BatchError> {
        let mut current = record;
        for listener in &self.listeners {
            match listener.before_record_processing(current)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub(crate) fn after_record_processing(
        &self,
        input: &Record<P>,
        output: &Record<P>,
    ) -> Result<(), BatchError> {
        for listener in self.listeners.iter().rev() {
            listener.after_record_processing(input, output)?;
        }
        Ok(())
    }

    pub(crate) fn on_record_processing_error(&self, record: &Record<P>, error: &BatchError) {
        for listener in &self.listeners {
            listener.on_record_processing_error(record, error);
        }
    }
}

pub(crate) struct CompositeRecordWriterListener<P> {
    listeners: Vec<Arc<dyn RecordWriterListener<P> + Send + Sync>>,
}

impl<P> Default for CompositeRecordWriterListener<P> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<P> CompositeRecordWriterListener<P> {
    pub(crate) fn add(&mut self, listener: Arc<dyn RecordWriterListener<P> + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub(crate) fn before_record_writing(&self, batch: &[Record<P>]) {
        for listener in &self.listeners {
            listener.before_record_writing(batch);
        }
    }

    pub(crate) fn after_record_writing(&self, batch: &[Record<P>]) {
        for listener in self.listeners.iter().rev() {
            listener.after_record_writing(batch);
        }
    }

    pub(crate) fn on_record_writing_error(&self, batch: &[Record<P>], error: &BatchError) {
        for listener in &self.listeners {
            listener.on_record_writing_error(batch, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Header;
    use std::sync::Mutex;
    use std::time::SystemTime;

    struct Named {
        name: &'static str,
        invocations: Arc<Mutex<Vec<String>>>,
    }

    impl Named {
        fn log(&self, hook: &str) {
            self.invocations
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, hook));
        }
    }

    impl BatchListener<String> for Named {
        fn before_batch_reading(&self) {
            self.log("before");
        }

        fn after_batch_writing(&self, _batch: &[Record<String>]) {
            self.log("after");
        }
    }

    impl PipelineListener<String> for Named {
        fn before_record_processing(
            &self,
            record: Record<String>,
        ) -> Result<Option<Record<String>>, BatchError> {
            self.log("before");
            let payload = format!("{}+{}", record.payload(), self.name);
            Ok(Some(record.with_payload(payload)))
        }

        fn after_record_processing(
            &self,
            _input: &Record<String>,
            _output: &Record<String>,
        ) -> Result<(), BatchError> {
            self.log("after");
            Ok(())
        }
    }

    struct Panicking;

    impl JobListener for Panicking {
        fn before_job_start(&self, _parameters: &JobParameters) {
            panic!("listener bug");
        }
    }

    fn record(payload: &str) -> Record<String> {
        Record::new(
            Header::new(1, "test", SystemTime::UNIX_EPOCH),
            payload.to_string(),
        )
    }

    #[test]
    fn before_hooks_run_forward_and_after_hooks_reverse() {
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let mut composite = CompositeBatchListener::default();
        composite.add(Arc::new(Named {
            name: "first",
            invocations: invocations.clone(),
        }));
        composite.add(Arc::new(Named {
            name: "second",
            invocations: invocations.clone(),
        }));

        composite.before_batch_reading();
        composite.after_batch_writing(&[]);

        assert_eq!(
            *invocations.lock().unwrap(),
            vec!["first:before", "second:before", "second:after", "first:after"]
        );
    }

    #[test]
    fn pipeline_before_hook_threads_the_record_through_the_chain() {
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let mut composite = CompositePipelineListener::default();
        composite.add(Arc::new(Named {
            name: "a",
            invocations: invocations.clone(),
        }));
        composite.add(Arc::new(Named {
            name: "b",
            invocations: invocations.clone(),
        }));

        let result = composite.before_record_processing(record("r")).unwrap();
        assert_eq!(result.unwrap().payload(), "r+a+b");
    }

    #[test]
    fn dropping_listener_short_circuits_the_chain() {
        struct Dropper;

        impl PipelineListener<String> for Dropper {
            fn before_record_processing(
                &self,
                _record: Record<String>,
            ) -> Result<Option<Record<String>>, BatchError> {
                Ok(None)
            }
        }

        let invocations = Arc::new(Mutex::new(Vec::new()));
        let mut composite = CompositePipelineListener::default();
        composite.add(Arc::new(Dropper));
        composite.add(Arc::new(Named {
            name: "unreached",
            invocations: invocations.clone(),
        }));

        let result = composite.before_record_processing(record("r")).unwrap();
        assert!(result.is_none());
        assert!(invocations.lock().unwrap().is_empty());
    }

    #[test]
    fn job_listener_panic_is_swallowed() {
        let mut composite = CompositeJobListener::default();
        composite.add(Arc::new(Panicking));
        // Must not propagate the panic.
        composite.before_job_start(&JobParameters::default());
    }
}
