use std::fmt::Debug;

use log::info;

use crate::core::record::Record;
use crate::core::writer::{RecordWriter, RecordWriterResult};

/// Writer that logs each record of a batch through the `log` facade.
#[derive(Default)]
pub struct LoggerWriter {}

impl<P> RecordWriter<P> for LoggerWriter
where
    P: Debug,
{
    fn write_records(&mut self, batch: &[Record<P>]) -> RecordWriterResult {
        batch
            .iter()
            .for_each(|record| info!("Record:{:?}", record.payload()));
        Ok(())
    }
}
