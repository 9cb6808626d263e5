//#![warn(missing_docs)]

/*!
 # Batch Engine for Rust

 A lightweight, record-oriented batch processing engine. The engine drives
 records from a reader through a pipeline of processors, filters and
 validators, accumulates the survivors into fixed-size batches, and hands
 each batch atomically to a writer, while firing lifecycle listeners,
 accumulating metrics and enforcing an error threshold.

 ## Features
 + Generic over the record payload: the engine never inspects your data
 + Batch-oriented writing with all-or-nothing batch semantics
 + Five listener extension points (job, batch, reader, writer, pipeline)
 + Live, thread-safe job reports and an in-process monitoring registry
 + Cooperative stop signals and per-job timeouts
 + Blocking and worker-thread execution through [`core::executor::JobExecutor`]

 ## Example

```rust
 use batch_engine_rs::core::executor::JobExecutor;
 use batch_engine_rs::core::job::JobBuilder;
 use batch_engine_rs::core::pipeline::{RecordProcessor, RecordProcessorResult};
 use batch_engine_rs::core::record::Record;
 use batch_engine_rs::core::report::JobStatus;
 use batch_engine_rs::error::BatchError;
 use batch_engine_rs::item::memory::{CollectingWriter, VecReader};

 struct Uppercase;

 impl RecordProcessor<String> for Uppercase {
     fn process_record(&self, record: &Record<String>) -> RecordProcessorResult<String> {
         Ok(Some(record.with_payload(record.payload().to_uppercase())))
     }
 }

 fn main() -> Result<(), BatchError> {
     let writer = CollectingWriter::default();

     let mut job = JobBuilder::new()
         .name("uppercase")
         .batch_size(2)
         .reader(VecReader::new(vec!["tango".to_string(), "cash".to_string()]))
         .processor(Uppercase)
         .writer(writer.clone())
         .build();

     let report = JobExecutor::new().execute(&mut job)?;

     assert_eq!(report.status(), JobStatus::Completed);
     assert_eq!(report.metrics().write_count(), 2);
     assert_eq!(*writer.records()[0].payload(), "TANGO");
     Ok(())
 }
```

 ## License

 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
*/

pub mod core;

/// Error types for batch operations
pub mod error;

/// Bundled record sources and sinks (in-memory reader/writer, logging writer)
pub mod item;

#[doc(inline)]
pub use error::*;
