use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;

use uuid::Uuid;

use crate::core::report::{JobReport, JobStatus};
use crate::error::BatchError;

/// Domain prefix of every management name.
pub const MONITOR_DOMAIN: &str = "batch.engine.monitor";

/// Read-only live projection of a running job.
///
/// A monitor holds a clone of the job's report handle, so every read sees
/// the runner's latest counter stores. Monitors are registered under
/// `"batch.engine.monitor:name=<jobName>,id=<executionId>"` for the duration
/// of the run when the job has monitoring enabled.
#[derive(Clone)]
pub struct JobMonitor {
    report: JobReport,
}

impl JobMonitor {
    pub fn new(report: JobReport) -> Self {
        Self { report }
    }

    /// Management name this monitor registers under.
    pub fn object_name(&self) -> String {
        format!(
            "{}:name={},id={}",
            MONITOR_DOMAIN,
            self.report.parameters().name(),
            self.report.execution_id()
        )
    }

    pub fn job_name(&self) -> String {
        self.report.parameters().name().to_string()
    }

    pub fn execution_id(&self) -> Uuid {
        self.report.execution_id()
    }

    pub fn status(&self) -> JobStatus {
        self.report.status()
    }

    pub fn read_count(&self) -> u64 {
        self.report.metrics().read_count()
    }

    pub fn write_count(&self) -> u64 {
        self.report.metrics().write_count()
    }

    pub fn filtered_count(&self) -> u64 {
        self.report.metrics().filtered_count()
    }

    pub fn error_count(&self) -> u64 {
        self.report.metrics().error_count()
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.report.metrics().start_time()
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.report.metrics().end_time()
    }

    pub fn last_error_message(&self) -> Option<String> {
        self.report.last_error().map(|error| error.to_string())
    }
}

/// Management surface the engine publishes monitors to.
///
/// The process-wide registry is a plain in-memory map; tests and embedders
/// can substitute their own implementation through the job builder. A
/// registration failure is logged by the engine and never fails the job.
pub trait MonitorRegistry: Send + Sync {
    fn register(&self, monitor: JobMonitor) -> Result<(), BatchError>;
    fn deregister(&self, object_name: &str) -> Result<(), BatchError>;
}

/// Default [`MonitorRegistry`] keeping monitors in a shared map.
#[derive(Default)]
pub struct InMemoryMonitorRegistry {
    entries: RwLock<HashMap<String, JobMonitor>>,
}

impl InMemoryMonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, object_name: &str) -> Option<JobMonitor> {
        self.entries
            .read()
            .expect("monitor registry lock poisoned")
            .get(object_name)
            .cloned()
    }

    pub fn is_registered(&self, object_name: &str) -> bool {
        self.entries
            .read()
            .expect("monitor registry lock poisoned")
            .contains_key(object_name)
    }

    pub fn object_names(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("monitor registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl MonitorRegistry for InMemoryMonitorRegistry {
    fn register(&self, monitor: JobMonitor) -> Result<(), BatchError> {
        let name = monitor.object_name();
        let mut entries = self
            .entries
            .write()
            .expect("monitor registry lock poisoned");
        if entries.contains_key(&name) {
            return Err(BatchError::Monitor(format!("{name} already registered")));
        }
        entries.insert(name, monitor);
        Ok(())
    }

    fn deregister(&self, object_name: &str) -> Result<(), BatchError> {
        let mut entries = self
            .entries
            .write()
            .expect("monitor registry lock poisoned");
        match entries.remove(object_name) {
            Some(_) => Ok(()),
            None => Err(BatchError::Monitor(format!("{object_name} not registered"))),
        }
    }
}

/// The process-wide monitor registry, used by jobs built without an explicit
/// one.
pub fn global_registry() -> Arc<InMemoryMonitorRegistry> {
    static REGISTRY: OnceLock<Arc<InMemoryMonitorRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Arc::new(InMemoryMonitorRegistry::new()))
        .clone()
}
