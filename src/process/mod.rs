//! Process execution and task logging

pub mod harness;
pub mod logger;
pub mod task_log;

pub use harness::{ProcessCommand, ProcessHarness, ProcessOutput, START_FAILED_EXIT_CODE};
pub use logger::{LoggedTask, ManagerLogger};
pub use task_log::{LogLine, LoggableTaskType, NativeTaskLog, ProcessTaskLog, Severity};
