//! crpt-batch: runs the file container over many files
//!
//! Pipeline: FileWalker → output naming → overwrite policy → blocking worker → FileOutcome

pub mod engine;
pub mod error;
pub mod naming;
pub mod walk;

pub use engine::{run_batch, BatchOptions, ProgressFn};
pub use error::{BatchError, BatchResult};
pub use walk::FileWalker;
