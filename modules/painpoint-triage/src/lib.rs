pub mod aggregator;
pub mod batcher;
pub mod classifier;
pub mod dead_letter;
pub mod filter;
pub mod ingest;
pub mod pipeline;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod text;

pub use classifier::{BatchClassifier, LlmClassifier};
pub use dead_letter::{load_failed_batches, CsvDeadLetter, DeadLetterSink};
pub use pipeline::{Pipeline, RunOutcome};
pub use stats::RunStats;
