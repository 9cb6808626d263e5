use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::core::job::JobParameters;
use crate::error::BatchError;

/// Represents the status of a job.
///
/// Transitions are monotonic along
/// `Starting -> Started -> Stopping -> {Completed | Failed | Aborted}`.
/// A job that fails before its resources are open jumps straight from
/// `Starting` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum JobStatus {
    /// The job is initializing its components.
    Starting = 0,
    /// The job is reading, processing and writing records.
    Started = 1,
    /// The job is releasing its resources.
    Stopping = 2,
    /// The job finished without a fatal error.
    Completed = 3,
    /// The job ended because of a fatal error or an exceeded error threshold.
    Failed = 4,
    /// The job was stopped cooperatively before the end of the stream.
    Aborted = 5,
}

impl JobStatus {
    pub(crate) fn ordinal(self) -> u8 {
        self as u8
    }

    fn from_ordinal(ordinal: u8) -> JobStatus {
        match ordinal {
            0 => JobStatus::Starting,
            1 => JobStatus::Started,
            2 => JobStatus::Stopping,
            3 => JobStatus::Completed,
            4 => JobStatus::Failed,
            _ => JobStatus::Aborted,
        }
    }

    /// Whether the status is one of the three terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Aborted
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Starting => "STARTING",
            JobStatus::Started => "STARTED",
            JobStatus::Stopping => "STOPPING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Monotonic counters and timing for a single run.
///
/// Counters are plain atomics updated by the single runner thread and read
/// concurrently by the monitor; release stores paired with acquire loads are
/// enough to guarantee a reader never observes a counter regress.
#[derive(Debug, Default)]
pub struct JobMetrics {
    read_count: AtomicU64,
    write_count: AtomicU64,
    filtered_count: AtomicU64,
    error_count: AtomicU64,
    // epoch millis, 0 = unset
    start_time: AtomicU64,
    end_time: AtomicU64,
}

impl JobMetrics {
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Acquire)
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Acquire)
    }

    pub fn filtered_count(&self) -> u64 {
        self.filtered_count.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Acquire)
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        millis_to_time(self.start_time.load(Ordering::Acquire))
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        millis_to_time(self.end_time.load(Ordering::Acquire))
    }

    /// Wall-clock duration of the run, `None` until the run has started.
    /// While the job is live this is the time elapsed so far.
    pub fn duration(&self) -> Option<Duration> {
        let start = self.start_time.load(Ordering::Acquire);
        if start == 0 {
            return None;
        }
        let end = self.end_time.load(Ordering::Acquire);
        let end = if end == 0 { now_millis() } else { end };
        Some(Duration::from_millis(end.saturating_sub(start)))
    }

    pub(crate) fn inc_read_count(&self) {
        self.read_count.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn inc_filtered_count(&self) {
        self.filtered_count.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn inc_error_count(&self, count: u64) {
        self.error_count.fetch_add(count, Ordering::Release);
    }

    pub(crate) fn inc_write_count(&self, count: u64) {
        self.write_count.fetch_add(count, Ordering::Release);
    }

    pub(crate) fn mark_start(&self) {
        self.start_time.store(now_millis(), Ordering::Release);
    }

    pub(crate) fn mark_end(&self) {
        self.end_time.store(now_millis(), Ordering::Release);
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            read_count: self.read_count(),
            write_count: self.write_count(),
            filtered_count: self.filtered_count(),
            error_count: self.error_count(),
            start_time_millis: non_zero(self.start_time.load(Ordering::Acquire)),
            end_time_millis: non_zero(self.end_time.load(Ordering::Acquire)),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn millis_to_time(millis: u64) -> Option<SystemTime> {
    if millis == 0 {
        None
    } else {
        Some(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

fn non_zero(millis: u64) -> Option<u64> {
    if millis == 0 {
        None
    } else {
        Some(millis)
    }
}

/// Frozen, serializable view of [`JobMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobMetricsSnapshot {
    pub read_count: u64,
    pub write_count: u64,
    pub filtered_count: u64,
    pub error_count: u64,
    pub start_time_millis: Option<u64>,
    pub end_time_millis: Option<u64>,
}

/// Frozen, serializable view of a [`JobReport`].
#[derive(Debug, Clone, Serialize)]
pub struct JobReportSnapshot {
    pub execution_id: String,
    pub name: String,
    pub status: JobStatus,
    pub metrics: JobMetricsSnapshot,
    pub last_error: Option<String>,
}

struct ReportState {
    execution_id: Uuid,
    parameters: JobParameters,
    metrics: JobMetrics,
    status: AtomicU8,
    last_error: Mutex<Option<BatchError>>,
    system_properties: BTreeMap<String, String>,
}

/// Live view of a running job, frozen once the job reaches a terminal status.
///
/// The report is a cheap-to-clone handle: the runner updates it in place and
/// every clone (executor handle, monitor, listeners) observes the same state.
/// Status transitions are applied with a monotonic max so a concurrent reader
/// can never see the status move backwards.
#[derive(Clone)]
pub struct JobReport {
    state: Arc<ReportState>,
}

impl JobReport {
    pub(crate) fn new(parameters: JobParameters) -> Self {
        Self {
            state: Arc::new(ReportState {
                execution_id: Uuid::new_v4(),
                parameters,
                metrics: JobMetrics::default(),
                status: AtomicU8::new(JobStatus::Starting.ordinal()),
                last_error: Mutex::new(None),
                system_properties: std::env::vars().collect(),
            }),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.state.execution_id
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.state.parameters
    }

    pub fn metrics(&self) -> &JobMetrics {
        &self.state.metrics
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_ordinal(self.state.status.load(Ordering::Acquire))
    }

    pub fn last_error(&self) -> Option<BatchError> {
        self.state
            .last_error
            .lock()
            .expect("report lock poisoned")
            .clone()
    }

    /// Environment of the process, captured when the job was built.
    pub fn system_properties(&self) -> &BTreeMap<String, String> {
        &self.state.system_properties
    }

    /// Advances the status. Transitions only ever move forward; a stale or
    /// out-of-order store is ignored.
    pub(crate) fn set_status(&self, status: JobStatus) {
        self.state
            .status
            .fetch_max(status.ordinal(), Ordering::AcqRel);
    }

    pub(crate) fn set_last_error(&self, error: BatchError) {
        *self.state.last_error.lock().expect("report lock poisoned") = Some(error);
    }

    pub fn snapshot(&self) -> JobReportSnapshot {
        JobReportSnapshot {
            execution_id: self.state.execution_id.to_string(),
            name: self.state.parameters.name().to_string(),
            status: self.status(),
            metrics: self.state.metrics.snapshot(),
            last_error: self.last_error().map(|e| e.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl fmt::Debug for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobReport")
            .field("execution_id", &self.state.execution_id)
            .field("name", &self.state.parameters.name())
            .field("status", &self.status())
            .field("metrics", &self.state.metrics)
            .finish()
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameters = self.parameters();
        let metrics = self.metrics();
        writeln!(f, "Job report")?;
        writeln!(f, "==========")?;
        writeln!(f, "Name:           {}", parameters.name())?;
        writeln!(f, "Execution id:   {}", self.execution_id())?;
        writeln!(f, "Status:         {}", self.status())?;
        writeln!(f, "Batch size:     {}", parameters.batch_size())?;
        match parameters.error_threshold() {
            u64::MAX => writeln!(f, "Error threshold: none")?,
            threshold => writeln!(f, "Error threshold: {threshold}")?,
        }
        match metrics.duration() {
            Some(duration) => writeln!(f, "Duration:       {duration:?}")?,
            None => writeln!(f, "Duration:       not started")?,
        }
        writeln!(f, "Read count:     {}", metrics.read_count())?;
        writeln!(f, "Write count:    {}", metrics.write_count())?;
        writeln!(f, "Filtered count: {}", metrics.filtered_count())?;
        writeln!(f, "Error count:    {}", metrics.error_count())?;
        match self.last_error() {
            Some(error) => write!(f, "Last error:     {error}"),
            None => write!(f, "Last error:     none"),
        }
    }
}
