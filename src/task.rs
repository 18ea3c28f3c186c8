//! # Task: the unit of work accepted by the pool.
//!
//! A [`Task`] pairs a one-shot async work function with an identifier and an
//! optional per-task timeout. The work function receives a
//! [`CancellationToken`] (the task's deadline) and should check it at safe
//! points to stop cooperatively when the deadline fires or the pool shuts
//! down.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskpool::{Task, TaskError};
//!
//! let task: Task<u64> = Task::new(|ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     Ok(42)
//! })
//! .with_id("answer")
//! .with_timeout(Duration::from_secs(1));
//!
//! assert_eq!(task.id(), "answer");
//! ```

use std::{fmt, future::Future, pin::Pin, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future produced by a task's work function.
///
/// - **Boxed**: tasks of differing closure types share one queue
/// - **Pinned**: required for trait-object futures
/// - **Send**: task futures move to worker executors
pub type TaskFuture<T> = Pin<Box<dyn Future<Output = Result<T, TaskError>> + Send + 'static>>;

/// Boxed one-shot work function. `FnOnce` because tasks run at most once.
pub(crate) type WorkFn<T> = Box<dyn FnOnce(CancellationToken) -> TaskFuture<T> + Send + 'static>;

/// A single deferred computation accepted by the pool.
///
/// Once submitted, the task is owned by the queue; the submitter retains no
/// handle that permits mutation.
pub struct Task<T> {
    id: String,
    work: WorkFn<T>,
    timeout: Option<Duration>,
}

impl<T: Send + 'static> Task<T> {
    /// Creates a task from an async work function.
    ///
    /// The identifier starts empty; the pool assigns `"task-N"` on
    /// submission unless [`with_id`](Task::with_id) set one.
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self {
            id: String::new(),
            work: Box::new(move |ctx| Box::pin(work(ctx))),
            timeout: None,
        }
    }

    /// Sets an explicit task identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets a per-task timeout, overriding the pool default.
    ///
    /// `Duration::ZERO` means "use the pool default".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the task identifier (empty until assigned).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the per-task timeout, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    /// Resolves the timeout that applies to this task: its own when set and
    /// non-zero, otherwise the pool default.
    pub(crate) fn effective_timeout(&self, pool_default: Option<Duration>) -> Option<Duration> {
        self.timeout.filter(|d| !d.is_zero()).or(pool_default)
    }

    pub(crate) fn into_parts(self) -> (String, WorkFn<T>) {
        (self.id, self.work)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
