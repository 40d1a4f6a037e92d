//! Install, update and uninstall orchestration

pub mod queue;
pub mod runner;

pub use queue::{EnqueueOutcome, OperationQueue, PackageOperation, queue_all_updates};
pub use runner::{MAX_OPERATION_ATTEMPTS, OperationReport, OperationRunner};
