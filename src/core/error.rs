//! Error types for limiter and scheduler operations.

use thiserror::Error;

/// Errors reported synchronously to callers of a limiter.
#[derive(Debug, Error)]
pub enum LimiterError {
    /// The concurrency ceiling must be at least one.
    #[error("max concurrency must be greater than 0")]
    InvalidConcurrency,
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The underlying scheduler refused the work.
    #[error("scheduler rejected task: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Errors produced by an underlying scheduler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler no longer accepts work.
    #[error("scheduler is shut down")]
    Shutdown,
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Failure channel of a task future.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The task body panicked; carries the panic message.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was cancelled or removed before it ran.
    #[error("task was cancelled")]
    Cancelled,
    /// Waiting for the result timed out.
    #[error("timed out waiting for task result")]
    Timeout,
    /// The task was never handed to a scheduler.
    #[error("task rejected: {0}")]
    Rejected(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
