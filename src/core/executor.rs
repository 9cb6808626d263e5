use std::thread::{self, JoinHandle};

use log::debug;

use crate::core::job::{Job, StopSignal};
use crate::core::report::JobReport;
use crate::error::BatchError;

/// Handle on a job submitted for asynchronous execution.
///
/// The handle exposes the live report and the job's stop signal while the
/// worker runs; `wait` joins the worker and returns the final report.
pub struct JobHandle {
    report: JobReport,
    stop: StopSignal,
    worker: JoinHandle<Result<JobReport, BatchError>>,
}

impl JobHandle {
    /// Live view of the running job.
    pub fn report(&self) -> &JobReport {
        &self.report
    }

    /// Requests a cooperative stop; the job winds down to ABORTED at the
    /// next check point.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Blocks until the job terminates and returns its final report.
    pub fn wait(self) -> Result<JobReport, BatchError> {
        match self.worker.join() {
            Ok(result) => result,
            Err(_) => Err(BatchError::Processing(
                "job worker thread panicked".to_string(),
            )),
        }
    }
}

/// Schedules job runners.
///
/// `execute` runs a job to completion on the calling thread; `submit` hands
/// it to a dedicated worker thread and returns a [`JobHandle`]. Jobs
/// submitted concurrently run in parallel but each job stays strictly
/// single-threaded internally. Single-use is enforced by the job itself:
/// executing a used instance fails with [`BatchError::JobAlreadyExecuted`].
#[derive(Debug, Default)]
pub struct JobExecutor;

impl JobExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs the job on the calling thread, blocking until it terminates.
    pub fn execute<P: Clone>(&self, job: &mut Job<P>) -> Result<JobReport, BatchError> {
        job.execute()
    }

    /// Runs the job on a dedicated worker thread.
    pub fn submit<P>(&self, mut job: Job<P>) -> JobHandle
    where
        P: Clone + Send + 'static,
    {
        let report = job.report().clone();
        let stop = job.stop_signal();
        let name = format!("job-worker-{}", job.parameters().name());
        debug!("Submitting job '{}' to worker", job.parameters().name());
        let worker = thread::Builder::new()
            .name(name)
            .spawn(move || job.execute())
            .expect("unable to spawn job worker thread");
        JobHandle {
            report,
            stop,
            worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobBuilder;
    use crate::core::report::JobStatus;
    use crate::item::memory::{CollectingWriter, VecReader};

    #[test]
    fn execute_blocks_and_returns_the_report() {
        let executor = JobExecutor::new();
        let mut job = JobBuilder::new()
            .reader(VecReader::new(vec![1, 2]))
            .build();

        let report = executor.execute(&mut job).unwrap();
        assert_eq!(report.status(), JobStatus::Completed);
        assert_eq!(report.metrics().read_count(), 2);
    }

    #[test]
    fn submit_runs_the_job_on_a_worker() {
        let executor = JobExecutor::new();
        let writer = CollectingWriter::default();
        let job = JobBuilder::new()
            .name("async")
            .reader(VecReader::new(vec!["a", "b", "c"]))
            .writer(writer.clone())
            .build();

        let handle = executor.submit(job);
        let report = handle.wait().unwrap();

        assert_eq!(report.status(), JobStatus::Completed);
        assert_eq!(writer.records().len(), 3);
    }

    #[test]
    fn handle_report_shares_state_with_the_job() {
        let executor = JobExecutor::new();
        let job = JobBuilder::new()
            .reader(VecReader::new(vec![1]))
            .build();
        let execution_id = job.execution_id();

        let handle = executor.submit(job);
        assert_eq!(handle.report().execution_id(), execution_id);

        let report = handle.wait().unwrap();
        assert_eq!(report.execution_id(), execution_id);
    }
}
