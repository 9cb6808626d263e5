use std::sync::Arc;

use crate::core::record::Record;
use crate::error::BatchError;

/// Represents the result of processing a record.
///
/// - `Ok(Some(record))` when the record survives the stage
/// - `Ok(None)` when the stage drops the record (not an error)
/// - `Err(BatchError)` when the stage fails on the record
pub type RecordProcessorResult<P> = Result<Option<Record<P>>, BatchError>;

/// A trait for transforming records.
///
/// A processor receives a record by reference and produces a new record,
/// `None` to drop the input, or an error. Dropping a record through a
/// processor is accounted exactly like a filter match.
pub trait RecordProcessor<P> {
    fn process_record(&self, record: &Record<P>) -> RecordProcessorResult<P>;
}

/// A trait for dropping records based on a predicate.
///
/// Returning `true` drops the record; a filtered record is never an error.
pub trait RecordFilter<P> {
    fn filter_record(&self, record: &Record<P>) -> bool;
}

/// A trait for rejecting invalid records.
///
/// A validation failure is accounted as a record error and checked against
/// the job's error threshold.
pub trait RecordValidator<P> {
    fn validate_record(&self, record: &Record<P>) -> Result<(), BatchError>;
}

enum Stage<P> {
    Processor(Arc<dyn RecordProcessor<P> + Send + Sync>),
    Filter(Arc<dyn RecordFilter<P> + Send + Sync>),
    Validator(Arc<dyn RecordValidator<P> + Send + Sync>),
}

/// The outcome of driving one record through the whole pipeline.
///
/// Exactly one outcome is produced per input record.
#[derive(Debug)]
pub enum PipelineOutcome<P> {
    /// The record survived every stage.
    Output(Record<P>),
    /// A stage dropped the record.
    Filtered,
    /// A stage failed on the record.
    Failed(BatchError),
}

/// Ordered chain of processors, filters and validators.
///
/// Stages run in registration order. The first stage that drops or fails a
/// record short-circuits the chain; later stages never see it.
pub struct Pipeline<P> {
    stages: Vec<Stage<P>>,
}

impl<P> Default for Pipeline<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Pipeline<P> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn add_processor(&mut self, processor: Arc<dyn RecordProcessor<P> + Send + Sync>) {
        self.stages.push(Stage::Processor(processor));
    }

    pub fn add_filter(&mut self, filter: Arc<dyn RecordFilter<P> + Send + Sync>) {
        self.stages.push(Stage::Filter(filter));
    }

    pub fn add_validator(&mut self, validator: Arc<dyn RecordValidator<P> + Send + Sync>) {
        self.stages.push(Stage::Validator(validator));
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Drives one record through the stages.
    pub fn apply(&self, record: Record<P>) -> PipelineOutcome<P> {
        let mut current = record;
        for stage in &self.stages {
            match stage {
                Stage::Filter(filter) => {
                    if filter.filter_record(&current) {
                        return PipelineOutcome::Filtered;
                    }
                }
                Stage::Validator(validator) => {
                    if let Err(error) = validator.validate_record(&current) {
                        return PipelineOutcome::Failed(error);
                    }
                }
                Stage::Processor(processor) => match processor.process_record(&current) {
                    Ok(Some(next)) => current = next,
                    Ok(None) => return PipelineOutcome::Filtered,
                    Err(error) => return PipelineOutcome::Failed(error),
                },
            }
        }
        PipelineOutcome::Output(current)
    }
}
