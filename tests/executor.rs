use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;

use batch_engine_rs::core::executor::JobExecutor;
use batch_engine_rs::core::job::JobBuilder;
use batch_engine_rs::core::listener::JobListener;
use batch_engine_rs::core::monitor::{InMemoryMonitorRegistry, MONITOR_DOMAIN};
use batch_engine_rs::core::reader::{RecordReader, RecordReaderResult};
use batch_engine_rs::core::record::{Header, Record};
use batch_engine_rs::core::report::{JobReport, JobStatus};
use batch_engine_rs::error::BatchError;
use batch_engine_rs::item::memory::{CollectingWriter, VecReader};

mod common;
use common::InvocationLog;

/// Endless reader pacing the run so tests can interact with a live job.
struct TickReader {
    current: u64,
    pause: Duration,
}

impl TickReader {
    fn new(pause: Duration) -> Self {
        Self { current: 0, pause }
    }
}

impl RecordReader<u64> for TickReader {
    fn read_record(&mut self) -> RecordReaderResult<u64> {
        thread::sleep(self.pause);
        self.current += 1;
        let header = Header::new(self.current, "ticks", SystemTime::now());
        Ok(Some(Record::new(header, self.current)))
    }
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn stop_signal_aborts_a_running_job() -> Result<()> {
    let executor = JobExecutor::new();
    let job = JobBuilder::new()
        .name("endless")
        .batch_size(2)
        .reader(TickReader::new(Duration::from_millis(1)))
        .build();

    let handle = executor.submit(job);
    assert!(wait_until(Duration::from_secs(5), || {
        handle.report().metrics().read_count() >= 3
    }));

    handle.stop();
    let report = handle.wait()?;

    assert_eq!(report.status(), JobStatus::Aborted);
    assert!(report.metrics().read_count() >= 3);
    assert!(report.last_error().is_none());
    Ok(())
}

#[test]
fn timeout_aborts_a_running_job() -> Result<()> {
    let executor = JobExecutor::new();
    let job = JobBuilder::new()
        .name("too-slow")
        .timeout(Duration::from_millis(50))
        .reader(TickReader::new(Duration::from_millis(1)))
        .build();

    let report = executor.submit(job).wait()?;

    assert_eq!(report.status(), JobStatus::Aborted);
    assert!(report.metrics().read_count() >= 1);
    Ok(())
}

#[test]
fn live_report_is_observable_while_the_job_runs() -> Result<()> {
    let executor = JobExecutor::new();
    let job = JobBuilder::new()
        .reader(TickReader::new(Duration::from_millis(1)))
        .build();

    let handle = executor.submit(job);
    assert!(wait_until(Duration::from_secs(5), || {
        handle.report().metrics().read_count() >= 1
    }));
    assert_eq!(handle.report().status(), JobStatus::Started);

    // Counters never regress between two reads.
    let first = handle.report().metrics().read_count();
    let second = handle.report().metrics().read_count();
    assert!(second >= first);

    handle.stop();
    handle.wait()?;
    Ok(())
}

#[test]
fn jobs_run_in_parallel_without_sharing_state() -> Result<()> {
    let executor = JobExecutor::new();
    let first_writer = CollectingWriter::default();
    let second_writer = CollectingWriter::default();

    let first = JobBuilder::new()
        .name("first")
        .reader(VecReader::new(vec![1, 2, 3]))
        .writer(first_writer.clone())
        .build();
    let second = JobBuilder::new()
        .name("second")
        .reader(VecReader::new(vec![4, 5]))
        .writer(second_writer.clone())
        .build();
    let first_id = first.execution_id();
    let second_id = second.execution_id();

    let first_handle = executor.submit(first);
    let second_handle = executor.submit(second);
    let first_report = first_handle.wait()?;
    let second_report = second_handle.wait()?;

    assert_ne!(first_id, second_id);
    assert_eq!(first_report.status(), JobStatus::Completed);
    assert_eq!(second_report.status(), JobStatus::Completed);
    assert_eq!(first_writer.records().len(), 3);
    assert_eq!(second_writer.records().len(), 2);
    Ok(())
}

#[test]
fn used_job_cannot_be_executed_again() {
    let executor = JobExecutor::new();
    let mut job = JobBuilder::<u64>::new().build();

    executor.execute(&mut job).unwrap();
    match executor.execute(&mut job) {
        Err(BatchError::JobAlreadyExecuted(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn monitor_is_registered_during_the_run_and_removed_after() -> Result<()> {
    let registry = Arc::new(InMemoryMonitorRegistry::new());
    let log = InvocationLog::default();

    #[derive(Clone)]
    struct RegistryProbe {
        registry: Arc<InMemoryMonitorRegistry>,
        log: InvocationLog,
    }

    impl JobListener for RegistryProbe {
        fn after_job_end(&self, report: &JobReport) {
            let name = format!(
                "{}:name={},id={}",
                MONITOR_DOMAIN,
                report.parameters().name(),
                report.execution_id()
            );
            match self.registry.get(&name) {
                Some(monitor) => {
                    self.log.push(format!(
                        "registered:{}:{}:{}",
                        monitor.job_name(),
                        monitor.status(),
                        monitor.read_count()
                    ));
                }
                None => self.log.push("missing"),
            }
        }
    }

    let mut job = JobBuilder::new()
        .name("master")
        .monitoring(true)
        .monitor_registry(registry.clone())
        .reader(VecReader::new(vec!["r1".to_string(), "r2".to_string()]))
        .job_listener(RegistryProbe {
            registry: registry.clone(),
            log: log.clone(),
        })
        .build();
    let execution_id = job.execution_id();

    let report = job.execute()?;

    // Still registered when the job listener ran, gone afterwards.
    assert_eq!(
        log.entries(),
        vec!["registered:master:COMPLETED:2".to_string()]
    );
    let name = format!("{MONITOR_DOMAIN}:name=master,id={execution_id}");
    assert!(!registry.is_registered(&name));
    assert!(registry.object_names().is_empty());
    assert_eq!(report.status(), JobStatus::Completed);
    Ok(())
}

#[test]
fn monitoring_disabled_registers_nothing() -> Result<()> {
    let registry = Arc::new(InMemoryMonitorRegistry::new());
    let mut job = JobBuilder::new()
        .monitor_registry(registry.clone())
        .reader(VecReader::new(vec![1]))
        .build();

    job.execute()?;

    assert!(registry.object_names().is_empty());
    Ok(())
}
