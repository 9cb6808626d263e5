use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::batch::Batch;
use crate::core::listener::{
    BatchListener, CompositeBatchListener, CompositeJobListener, CompositePipelineListener,
    CompositeRecordReaderListener, CompositeRecordWriterListener, JobListener, PipelineListener,
    RecordReaderListener, RecordWriterListener,
};
use crate::core::monitor::{global_registry, JobMonitor, MonitorRegistry};
use crate::core::pipeline::{
    Pipeline, PipelineOutcome, RecordFilter, RecordProcessor, RecordValidator,
};
use crate::core::reader::{NoopReader, RecordReader};
use crate::core::record::Record;
use crate::core::report::{JobReport, JobStatus};
use crate::core::writer::{NoopWriter, RecordWriter};
use crate::error::BatchError;

/// Name given to jobs built without one.
pub const DEFAULT_JOB_NAME: &str = "job";

/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Per-job configuration. Immutable once the job is built.
#[derive(Debug, Clone)]
pub struct JobParameters {
    name: String,
    batch_size: usize,
    error_threshold: u64,
    timeout: Option<Duration>,
    monitoring: bool,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            name: DEFAULT_JOB_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            error_threshold: u64::MAX,
            timeout: None,
            monitoring: false,
        }
    }
}

impl JobParameters {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Maximum tolerated error count; `u64::MAX` means unlimited.
    pub fn error_threshold(&self) -> u64 {
        self.error_threshold
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the job registers a monitor with the management registry.
    pub fn monitoring(&self) -> bool {
        self.monitoring
    }
}

/// Cooperative stop flag for a running job.
///
/// Cloning the signal shares it; any clone can request the stop. The runner
/// checks the flag after each record and after each batch flush, then winds
/// down through STOPPING to ABORTED. In-flight reader or writer calls are
/// never interrupted.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

enum RunEnd {
    Clean,
    Fatal,
    Stopped,
}

/// A single-use batch job: the state machine driving records from a reader
/// through the pipeline into batched writes.
///
/// A job executes on one thread; stages run strictly sequentially and in
/// source order. The reader and writer are each opened at most once and
/// closed exactly once on every exit path, including panics from components.
pub struct Job<P> {
    reader: Box<dyn RecordReader<P> + Send>,
    writer: Box<dyn RecordWriter<P> + Send>,
    pipeline: Pipeline<P>,
    job_listeners: CompositeJobListener,
    batch_listeners: CompositeBatchListener<P>,
    reader_listeners: CompositeRecordReaderListener<P>,
    writer_listeners: CompositeRecordWriterListener<P>,
    pipeline_listeners: CompositePipelineListener<P>,
    report: JobReport,
    registry: Arc<dyn MonitorRegistry>,
    stop: StopSignal,
    used: AtomicBool,
}

impl<P: Clone> Job<P> {
    pub fn execution_id(&self) -> Uuid {
        self.report.execution_id()
    }

    pub fn parameters(&self) -> &JobParameters {
        self.report.parameters()
    }

    /// Live view of the run; clones observe updates as they happen.
    pub fn report(&self) -> &JobReport {
        &self.report
    }

    /// Shared handle to request a cooperative stop.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs the job to completion and returns its report.
    ///
    /// A job instance is single-use: any invocation after the first fails
    /// with [`BatchError::JobAlreadyExecuted`]. Failures of the run itself
    /// are reported through the returned report's status and last error, not
    /// through `Err`.
    pub fn execute(&mut self) -> Result<JobReport, BatchError> {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(BatchError::JobAlreadyExecuted(format!(
                "job '{}', execution {}",
                self.report.parameters().name(),
                self.report.execution_id()
            )));
        }

        let name = self.report.parameters().name().to_string();
        let id = self.report.execution_id();
        info!("Start of job: {}, id: {}", name, id);

        self.job_listeners.before_job_start(self.report.parameters());
        let monitor_name = self.register_monitor();

        let status = self.run();
        self.report.set_status(status);

        info!("End of job: {}, id: {}, status: {}", name, id, status);
        self.job_listeners.after_job_end(&self.report);
        self.deregister_monitor(monitor_name);

        Ok(self.report.clone())
    }

    fn run(&mut self) -> JobStatus {
        let mut opened = false;
        let end = if let Err(error) = self.reader.open() {
            error!("Unable to open record reader: {}", error);
            self.report.set_last_error(error);
            RunEnd::Fatal
        } else if let Err(error) = self.writer.open() {
            error!("Unable to open record writer: {}", error);
            self.report.set_last_error(error);
            RunEnd::Fatal
        } else {
            opened = true;
            self.report.set_status(JobStatus::Started);
            self.report.metrics().mark_start();
            let deadline = self
                .report
                .parameters()
                .timeout()
                .map(|timeout| Instant::now() + timeout);
            match catch_unwind(AssertUnwindSafe(|| self.process_all(deadline))) {
                Ok(end) => end,
                Err(panic) => {
                    let message = panic_message(panic);
                    error!("Job '{}' panicked: {}", self.report.parameters().name(), message);
                    self.report
                        .set_last_error(BatchError::Processing(format!("panic: {message}")));
                    RunEnd::Fatal
                }
            }
        };

        if opened {
            self.report.set_status(JobStatus::Stopping);
        }
        if let Err(error) = self.writer.close() {
            warn!("Error closing record writer: {}", error);
        }
        if let Err(error) = self.reader.close() {
            warn!("Error closing record reader: {}", error);
        }
        self.report.metrics().mark_end();

        match end {
            RunEnd::Clean => JobStatus::Completed,
            RunEnd::Fatal => JobStatus::Failed,
            RunEnd::Stopped => JobStatus::Aborted,
        }
    }

    fn process_all(&mut self, deadline: Option<Instant>) -> RunEnd {
        let batch_size = self.report.parameters().batch_size();
        let mut write_failed = false;

        loop {
            if self.should_stop(deadline) {
                info!("Job '{}' stopped", self.report.parameters().name());
                return RunEnd::Stopped;
            }

            self.batch_listeners.before_batch_reading();
            let mut batch = Batch::new(batch_size);
            let mut end_of_stream = false;

            loop {
                self.reader_listeners.before_record_reading();
                match self.reader.read_record() {
                    Err(error) => {
                        error!("Unable to read next record: {}", error);
                        self.reader_listeners.on_record_reading_error(&error);
                        self.report.set_last_error(error);
                        return RunEnd::Fatal;
                    }
                    Ok(None) => {
                        end_of_stream = true;
                        break;
                    }
                    Ok(Some(record)) => {
                        self.report.metrics().inc_read_count();
                        self.reader_listeners.after_record_reading(&record);
                        if let Some(survivor) = self.drive_pipeline(record) {
                            batch.push(survivor);
                        }
                        if self.threshold_exceeded() {
                            warn!(
                                "Error threshold ({}) exceeded, aborting execution",
                                self.report.parameters().error_threshold()
                            );
                            return RunEnd::Fatal;
                        }
                    }
                }
                if batch.is_full() {
                    break;
                }
                if self.should_stop(deadline) {
                    info!("Job '{}' stopped", self.report.parameters().name());
                    return RunEnd::Stopped;
                }
            }

            if !batch.is_empty() && !self.flush(batch.take()) {
                write_failed = true;
                if self.threshold_exceeded() {
                    warn!(
                        "Error threshold ({}) exceeded, aborting execution",
                        self.report.parameters().error_threshold()
                    );
                    return RunEnd::Fatal;
                }
            }

            if end_of_stream {
                return if write_failed {
                    RunEnd::Fatal
                } else {
                    RunEnd::Clean
                };
            }
        }
    }

    /// Drives one record through the pipeline listeners and stages.
    /// Returns the survivor, or `None` for filtered and failed records after
    /// accounting for them.
    fn drive_pipeline(&self, record: Record<P>) -> Option<Record<P>> {
        let input = record.clone();
        let staged = match self.pipeline_listeners.before_record_processing(record) {
            Ok(Some(staged)) => staged,
            Ok(None) => {
                debug!("{} filtered", input.header());
                self.report.metrics().inc_filtered_count();
                return None;
            }
            Err(error) => {
                self.record_error(&input, error);
                return None;
            }
        };
        match self.pipeline.apply(staged) {
            PipelineOutcome::Output(output) => {
                if let Err(error) = self.pipeline_listeners.after_record_processing(&input, &output)
                {
                    self.record_error(&input, error);
                    return None;
                }
                Some(output)
            }
            PipelineOutcome::Filtered => {
                debug!("{} filtered", input.header());
                self.report.metrics().inc_filtered_count();
                None
            }
            PipelineOutcome::Failed(error) => {
                self.record_error(&input, error);
                None
            }
        }
    }

    fn record_error(&self, record: &Record<P>, error: BatchError) {
        warn!("Unable to process {}: {}", record.header(), error);
        self.pipeline_listeners.on_record_processing_error(record, &error);
        self.report.metrics().inc_error_count(1);
        self.report.set_last_error(error);
    }

    fn flush(&mut self, records: Vec<Record<P>>) -> bool {
        debug!("Writing batch of {} records", records.len());
        self.batch_listeners.after_batch_processing(&records);
        self.writer_listeners.before_record_writing(&records);
        match self.writer.write_records(&records) {
            Ok(()) => {
                self.report.metrics().inc_write_count(records.len() as u64);
                self.writer_listeners.after_record_writing(&records);
                self.batch_listeners.after_batch_writing(&records);
                true
            }
            Err(error) => {
                warn!(
                    "Unable to write batch of {} records: {}",
                    records.len(),
                    error
                );
                self.report.metrics().inc_error_count(records.len() as u64);
                self.writer_listeners.on_record_writing_error(&records, &error);
                self.batch_listeners.on_batch_writing_error(&records, &error);
                self.report.set_last_error(error);
                false
            }
        }
    }

    fn threshold_exceeded(&self) -> bool {
        self.report.metrics().error_count() > self.report.parameters().error_threshold()
    }

    fn should_stop(&self, deadline: Option<Instant>) -> bool {
        self.stop.is_stopped() || deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn register_monitor(&self) -> Option<String> {
        if !self.report.parameters().monitoring() {
            return None;
        }
        let monitor = JobMonitor::new(self.report.clone());
        let name = monitor.object_name();
        match self.registry.register(monitor) {
            Ok(()) => {
                debug!("Job monitor registered as {}", name);
                Some(name)
            }
            Err(error) => {
                warn!("Unable to register job monitor {}: {}", name, error);
                None
            }
        }
    }

    fn deregister_monitor(&self, name: Option<String>) {
        if let Some(name) = name {
            if let Err(error) = self.registry.deregister(&name) {
                warn!("Unable to deregister job monitor {}: {}", name, error);
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    match panic.downcast_ref::<&str>() {
        Some(message) => (*message).to_string(),
        None => match panic.downcast_ref::<String>() {
            Some(message) => message.clone(),
            None => "opaque panic payload".to_string(),
        },
    }
}

/// Builder for [`Job`] instances.
///
/// All setters are chainable. `build` falls back to defaults for anything
/// left unset: an immediately empty reader, a discarding writer, an empty
/// pipeline, empty listener chains, and the process-wide monitor registry.
pub struct JobBuilder<P> {
    parameters: JobParameters,
    reader: Option<Box<dyn RecordReader<P> + Send>>,
    writer: Option<Box<dyn RecordWriter<P> + Send>>,
    pipeline: Pipeline<P>,
    job_listeners: CompositeJobListener,
    batch_listeners: CompositeBatchListener<P>,
    reader_listeners: CompositeRecordReaderListener<P>,
    writer_listeners: CompositeRecordWriterListener<P>,
    pipeline_listeners: CompositePipelineListener<P>,
    registry: Option<Arc<dyn MonitorRegistry>>,
}

impl<P> Default for JobBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> JobBuilder<P> {
    pub fn new() -> Self {
        Self {
            parameters: JobParameters::default(),
            reader: None,
            writer: None,
            pipeline: Pipeline::new(),
            job_listeners: CompositeJobListener::default(),
            batch_listeners: CompositeBatchListener::default(),
            reader_listeners: CompositeRecordReaderListener::default(),
            writer_listeners: CompositeRecordWriterListener::default(),
            pipeline_listeners: CompositePipelineListener::default(),
            registry: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.parameters.name = name.into();
        self
    }

    /// Number of records per batch. Must be at least 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size >= 1, "batch size must be at least 1");
        self.parameters.batch_size = batch_size;
        self
    }

    /// Maximum tolerated error count before the run fails. Must be greater
    /// than zero; leave unset for unlimited.
    pub fn error_threshold(mut self, error_threshold: u64) -> Self {
        assert!(
            error_threshold > 0,
            "error threshold must be greater than zero"
        );
        self.parameters.error_threshold = error_threshold;
        self
    }

    /// Wall-clock budget for the run; an expired budget stops the job
    /// cooperatively and ends it ABORTED.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.parameters.timeout = Some(timeout);
        self
    }

    /// Registers the job with the monitor registry for the duration of the
    /// run.
    pub fn monitoring(mut self, monitoring: bool) -> Self {
        self.parameters.monitoring = monitoring;
        self
    }

    pub fn reader(mut self, reader: impl RecordReader<P> + Send + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    pub fn writer(mut self, writer: impl RecordWriter<P> + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Appends a processor to the pipeline, in registration order.
    pub fn processor(mut self, processor: impl RecordProcessor<P> + Send + Sync + 'static) -> Self {
        self.pipeline.add_processor(Arc::new(processor));
        self
    }

    /// Appends a filter to the pipeline, in registration order.
    pub fn filter(mut self, filter: impl RecordFilter<P> + Send + Sync + 'static) -> Self {
        self.pipeline.add_filter(Arc::new(filter));
        self
    }

    /// Appends a validator to the pipeline, in registration order.
    pub fn validator(mut self, validator: impl RecordValidator<P> + Send + Sync + 'static) -> Self {
        self.pipeline.add_validator(Arc::new(validator));
        self
    }

    pub fn job_listener(mut self, listener: impl JobListener + Send + Sync + 'static) -> Self {
        self.job_listeners.add(Arc::new(listener));
        self
    }

    pub fn batch_listener(mut self, listener: impl BatchListener<P> + Send + Sync + 'static) -> Self {
        self.batch_listeners.add(Arc::new(listener));
        self
    }

    pub fn reader_listener(
        mut self,
        listener: impl RecordReaderListener<P> + Send + Sync + 'static,
    ) -> Self {
        self.reader_listeners.add(Arc::new(listener));
        self
    }

    pub fn writer_listener(
        mut self,
        listener: impl RecordWriterListener<P> + Send + Sync + 'static,
    ) -> Self {
        self.writer_listeners.add(Arc::new(listener));
        self
    }

    pub fn pipeline_listener(
        mut self,
        listener: impl PipelineListener<P> + Send + Sync + 'static,
    ) -> Self {
        self.pipeline_listeners.add(Arc::new(listener));
        self
    }

    /// Substitutes the process-wide monitor registry, mainly for tests.
    pub fn monitor_registry(mut self, registry: Arc<dyn MonitorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Job<P> {
        let registry = self.registry.unwrap_or_else(|| {
            let registry: Arc<dyn MonitorRegistry> = global_registry();
            registry
        });
        Job {
            reader: self.reader.unwrap_or_else(|| Box::new(NoopReader)),
            writer: self.writer.unwrap_or_else(|| Box::new(NoopWriter)),
            pipeline: self.pipeline,
            job_listeners: self.job_listeners,
            batch_listeners: self.batch_listeners,
            reader_listeners: self.reader_listeners,
            writer_listeners: self.writer_listeners,
            pipeline_listeners: self.pipeline_listeners,
            report: JobReport::new(self.parameters),
            registry,
            stop: StopSignal::default(),
            used: AtomicBool::new(false),
        }
    }
}
