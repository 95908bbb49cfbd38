//! Batching bulk ingestion.
//!
//! A `BulkProcessor` buffers `BulkItem`s across a small pool of workers and
//! commits them to a `BulkExecutor` in batches.

mod processor;

pub use processor::{BulkListener, BulkProcessor, BulkProcessorParameters, BulkProcessorStats};
