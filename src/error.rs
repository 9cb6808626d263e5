use thiserror::Error;

/// Batch error
///
/// Errors are classified by kind rather than by the component type that
/// raised them, so callers can match on the failure policy they care about.
/// Variants carry the underlying error message; the engine stores the most
/// recent one in the job report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("RecordReader open: {0}")]
    OpenReader(String),

    #[error("RecordWriter open: {0}")]
    OpenWriter(String),

    #[error("RecordReader: {0}")]
    ReadRecord(String),

    #[error("RecordValidator: {0}")]
    Validation(String),

    #[error("RecordProcessor: {0}")]
    Processing(String),

    #[error("RecordWriter: {0}")]
    WriteRecords(String),

    #[error("listener: {0}")]
    Listener(String),

    #[error("monitor registry: {0}")]
    Monitor(String),

    #[error("job already executed: {0}")]
    JobAlreadyExecuted(String),
}
