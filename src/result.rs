//! # Task results and the result stream.
//!
//! Every dispatched task produces at most one [`TaskResult`], pushed in
//! completion order (not submission order) onto a bounded stream. The
//! consumer side is [`ResultStream`]; it is handed out once by the pool and
//! yields `None` after shutdown closes the producer side and the buffer
//! drains. Consumers must drain until `None` to observe pool termination.

use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;

use crate::error::TaskError;

/// The observable outcome of a dispatched task.
#[derive(Debug)]
pub struct TaskResult<T> {
    /// Identifier of the task that produced this result.
    pub task_id: String,
    /// The task's value on success, its failure otherwise.
    pub outcome: Result<T, TaskError>,
    /// Wall-clock instant execution began.
    pub started_at: SystemTime,
    /// Wall-clock instant execution ended.
    pub finished_at: SystemTime,
    /// Monotonic elapsed execution time.
    pub duration: Duration,
}

impl<T> TaskResult<T> {
    /// Whether the task returned a value.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Borrows the success value, if any.
    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// Borrows the failure, if any.
    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }
}

/// Consumer handle over the pool's result channel.
///
/// Obtained once via the pool's `results()`; `recv` returns `None` after the
/// pool has stopped, every worker has exited, and buffered results are
/// drained.
pub struct ResultStream<T> {
    rx: mpsc::Receiver<TaskResult<T>>,
}

impl<T> ResultStream<T> {
    pub(crate) fn new(rx: mpsc::Receiver<TaskResult<T>>) -> Self {
        Self { rx }
    }

    /// Receives the next result, waiting if none is ready yet.
    pub async fn recv(&mut self) -> Option<TaskResult<T>> {
        self.rx.recv().await
    }

    /// Receives a result without waiting.
    pub fn try_recv(&mut self) -> Option<TaskResult<T>> {
        self.rx.try_recv().ok()
    }
}
