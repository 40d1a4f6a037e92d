use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error at '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    StdIoError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("Package manager not found: {0}")]
    ManagerNotFound(String),

    /// An adapter was assembled with capabilities it cannot honor
    #[error("Manager contract violation: {0}")]
    ContractViolation(String),

    #[error("System command '{command}' failed: {reason}")]
    SystemCommandFailed { command: String, reason: String },

    #[error(
        "Task {task} for manager {manager} did not finish after {seconds} seconds, aborting. \
         You may disable timeouts with the DisableTimeoutOnPackageListingTasks setting"
    )]
    ListingTimeout {
        manager: String,
        task: String,
        seconds: u64,
    },

    /// Remote resource fetch error (HTTP, network, etc.)
    #[error("Failed to fetch remote resource: {0}")]
    RemoteFetchError(String),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),

    /// Lock acquisition failed (e.g., mutex poisoned)
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Invalid install options: {0}")]
    InvalidOptions(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
