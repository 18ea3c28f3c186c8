//! # Error types used by the pool runtime and tasks.
//!
//! This module defines two main error enums:
//!
//! - [`PoolError`] errors raised by the pool surface itself (submission,
//!   lifecycle transitions).
//! - [`TaskError`] failures raised by individual task executions.
//!
//! Both types provide an `as_label` helper for logs and metrics.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the pool surface.
///
/// These represent rejected submissions and illegal lifecycle transitions.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PoolError {
    /// Submission rejected because the pool is not accepting work
    /// (not started, paused, or already stopped).
    #[error("pool is not running")]
    NotRunning,

    /// Submission rejected because shutdown has begun.
    #[error("pool is shutting down")]
    ShuttingDown,

    /// The task queue is at capacity; the task was not enqueued.
    #[error("task queue is full")]
    QueueFull,

    /// `start` was called on a pool that already left the created state.
    #[error("pool has already been started")]
    AlreadyStarted,

    /// `resume` was called on a pool that is not paused.
    #[error("pool is not paused")]
    NotPaused,

    /// The bounded stop-and-wait deadline elapsed before the queue drained.
    #[error("timed out after {timeout:?} waiting for queued tasks to finish")]
    DrainTimeout {
        /// The caller-supplied overall deadline.
        timeout: Duration,
    },
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::NotRunning => "pool_not_running",
            PoolError::ShuttingDown => "pool_shutting_down",
            PoolError::QueueFull => "pool_queue_full",
            PoolError::AlreadyStarted => "pool_already_started",
            PoolError::NotPaused => "pool_not_paused",
            PoolError::DrainTimeout { .. } => "pool_drain_timeout",
        }
    }
}

/// # Failures produced by task execution.
///
/// Carried in the result's `outcome` field without further interpretation
/// by the pool.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task's deadline fired before the task returned.
    #[error("deadline exceeded after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Task-reported failure.
    #[error("execution failed: {reason}")]
    Fail { reason: String },

    /// The task panicked; the worker caught the unwind and kept going.
    #[error("aborted: {reason}")]
    Aborted { reason: String },

    /// The task observed cancellation and gave up.
    ///
    /// This is **not an error** in the traditional sense, but signals
    /// intentional termination during shutdown.
    #[error("canceled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Aborted { .. } => "task_aborted",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Whether this failure came from the deadline firing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }

    /// Whether this failure came from a caught panic.
    pub fn is_aborted(&self) -> bool {
        matches!(self, TaskError::Aborted { .. })
    }
}
