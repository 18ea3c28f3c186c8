//! # Pool: the public submission and lifecycle surface.
//!
//! [`Pool`] is a cheap clonable handle over the supervisor core. A process
//! may host any number of independent pools; there is no global state.
//!
//! ```text
//!  submitter ──submit()──► task queue ──► workers ──► result stream ──► consumer
//!                              ▲              │
//!                        autoscaler ◄── supervisor (lifecycle, limits)
//! ```
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskpool::{Config, Pool, Task, TaskError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut cfg = Config::default();
//!     cfg.min_workers = 2;
//!     cfg.max_workers = 4;
//!     cfg.task_timeout = Duration::from_secs(5);
//!
//!     let pool: Pool<u64> = Pool::new(cfg);
//!     pool.start().expect("first start");
//!
//!     pool.submit(Task::new(|_ctx: CancellationToken| async move {
//!         Ok::<_, TaskError>(6 * 7)
//!     }))
//!     .expect("queue has room");
//!
//!     let mut results = pool.results().expect("stream not yet taken");
//!     let result = results.recv().await.expect("one result");
//!     assert_eq!(result.value(), Some(&42));
//!
//!     pool.stop().await;
//! }
//! ```

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::{
    config::Config,
    error::PoolError,
    logging::{self, Logger},
    metrics::{Metrics, NoopMetrics},
    result::{ResultStream, TaskResult},
    supervisor::{PoolPhase, Supervisor},
    task::Task,
    worker::FaultHandler,
};

/// Concurrent task execution pool, generic over the task value type.
///
/// Cloning yields another handle to the same pool.
pub struct Pool<T> {
    core: Arc<Supervisor<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Creates a pool with default collaborators. Call [`start`](Pool::start)
    /// to launch the workers. Use [`PoolBuilder`] to attach a logger,
    /// metrics sink, or fault handler.
    pub fn new(cfg: Config) -> Self {
        PoolBuilder::new(cfg).build()
    }

    /// Launches the minimum worker set and begins accepting tasks.
    ///
    /// Legal exactly once, from the created state. Must be called inside a
    /// tokio runtime.
    pub fn start(&self) -> Result<(), PoolError> {
        self.core.start()
    }

    /// Enqueues a task without blocking.
    ///
    /// Assigns a `"task-N"` identifier when the task carries none. Fails
    /// with [`PoolError::QueueFull`] instead of blocking when the queue is
    /// at capacity, [`PoolError::NotRunning`] when the pool is not
    /// accepting work, and [`PoolError::ShuttingDown`] once shutdown began.
    pub fn submit(&self, task: Task<T>) -> Result<(), PoolError> {
        self.core.submit(task)
    }

    /// Submits a task and waits for its result.
    ///
    /// The result is delivered through a private completion channel keyed by
    /// the task id, so concurrent callers never disturb each other or the
    /// shared [`results`](Pool::results) stream. Returns
    /// [`PoolError::ShuttingDown`] if the pool stops before the task
    /// finishes.
    pub async fn submit_and_wait(&self, mut task: Task<T>) -> Result<TaskResult<T>, PoolError> {
        if task.id().is_empty() {
            task.assign_id(self.core.next_task_id());
        }
        let id = task.id().to_string();

        let (tx, mut rx) = oneshot::channel();
        self.core.waiters.insert(id.clone(), tx);
        if let Err(err) = self.core.submit(task) {
            self.core.waiters.remove(&id);
            return Err(err);
        }

        tokio::select! {
            biased;
            delivered = &mut rx => delivered.map_err(|_| PoolError::ShuttingDown),
            _ = self.core.root.cancelled() => {
                self.core.waiters.remove(&id);
                Err(PoolError::ShuttingDown)
            }
        }
    }

    /// Takes the result stream. Returns `None` once taken; there is a
    /// single consumer. The stream closes after a stop completes and every
    /// buffered result is drained.
    pub fn results(&self) -> Option<ResultStream<T>> {
        self.core.take_results().map(ResultStream::new)
    }

    /// Removes all queued tasks without executing them; returns the count
    /// discarded. Accepted tasks that are already executing are unaffected.
    pub fn drain(&self) -> usize {
        self.core.drain()
    }

    /// Rejects new submissions while keeping workers alive; queued and
    /// in-flight tasks continue. Legal from the running state.
    pub fn pause(&self) -> Result<(), PoolError> {
        self.core.pause()
    }

    /// Resumes submissions after a pause.
    pub fn resume(&self) -> Result<(), PoolError> {
        self.core.resume()
    }

    /// Updates the worker bounds (`min >= 1`, `max >= min`); immediately
    /// starts workers when the pool sits below the new floor. Shrinking
    /// lowers future limits only. Legal while running or paused.
    pub fn resize(&self, min: usize, max: usize) -> Result<(), PoolError> {
        self.core.resize(min, max)
    }

    /// Gracefully shuts the pool down: in-flight tasks finish, queued tasks
    /// are discarded, every worker exits, then both channels close.
    /// Idempotent: later calls are no-ops.
    pub async fn stop(&self) {
        self.core.stop().await;
    }

    /// Lets the queue drain (queued tasks run; in-flight tasks keep their
    /// deadlines), then stops. New submissions are rejected from the moment
    /// of the call.
    pub async fn stop_and_wait(&self) {
        // Without a deadline the drain wait cannot fail.
        let _ = self.core.stop_and_wait(None).await;
    }

    /// Like [`stop_and_wait`](Pool::stop_and_wait), bounded by an overall
    /// deadline. On expiry the remaining queue is discarded, the pool stops
    /// immediately, and [`PoolError::DrainTimeout`] is returned.
    pub async fn stop_and_wait_timeout(&self, timeout: Duration) -> Result<(), PoolError> {
        self.core.stop_and_wait(Some(timeout)).await
    }

    /// Read-only snapshot of counters, sizes, and the current phase.
    pub fn stats(&self) -> PoolStats {
        self.core.snapshot()
    }

    /// Current number of active workers (atomic read).
    pub fn size(&self) -> usize {
        self.core.counters.active()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> PoolPhase {
        self.core.phase()
    }

    /// Waits until every worker started so far has exited. Intended for use
    /// after [`stop`](Pool::stop); before shutdown begins it parks.
    pub async fn wait(&self) {
        self.core.wait().await;
    }
}

/// Builder wiring optional collaborators into a pool.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use taskpool::{Config, Pool, PoolBuilder, NoopMetrics};
///
/// let pool: Pool<String> = PoolBuilder::new(Config::default())
///     .with_metrics(Arc::new(NoopMetrics))
///     .with_fault_handler(|_payload| { /* page someone */ })
///     .build();
/// # drop(pool);
/// ```
pub struct PoolBuilder {
    cfg: Config,
    logger: Option<Arc<dyn Logger>>,
    metrics: Option<Arc<dyn Metrics>>,
    fault_handler: Option<FaultHandler>,
}

impl PoolBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            logger: None,
            metrics: None,
            fault_handler: None,
        }
    }

    /// Routes pool logs into a custom sink.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Records pool activity into a custom metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receives the opaque payload whenever a task panics. The handler must
    /// not panic itself.
    pub fn with_fault_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(handler));
        self
    }

    /// Normalizes the configuration and builds the pool.
    pub fn build<T: Send + 'static>(self) -> Pool<T> {
        let cfg = self.cfg.normalized();
        let logger = self
            .logger
            .unwrap_or_else(|| logging::default_logger(&cfg.name));
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(NoopMetrics) as Arc<dyn Metrics>);
        Pool {
            core: Arc::new(Supervisor::new(cfg, logger, metrics, self.fault_handler)),
        }
    }
}

/// Read-only statistics snapshot.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub name: String,
    pub phase: PoolPhase,
    pub min_workers: usize,
    pub max_workers: usize,
    pub active_workers: usize,
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
}
