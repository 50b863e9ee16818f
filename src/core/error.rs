//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The task already has a live process.
    #[error("task already running: {0}")]
    AlreadyRunning(String),
    /// The transfer tool executable could not be located.
    #[error("{0} not found in PATH, please install {0}")]
    TransferToolNotFound(String),
    /// Spawning the transfer process failed.
    #[error("failed to spawn task {task}: {source}")]
    Spawn {
        /// Task whose process failed to start.
        task: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Delivering a signal to a process failed.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target process id.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// A task section carries options that cannot be used.
    #[error("invalid task {task}: {reason}")]
    InvalidTask {
        /// Task name.
        task: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
    /// Other I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
