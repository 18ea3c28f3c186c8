//! # Supervisor: shared pool state and the lifecycle state machine.
//!
//! The [`Supervisor`] owns everything the workers share (task queue, result
//! sink, completion waiters, counters, root cancellation token) and drives
//! the pool through its phases:
//!
//! ```text
//!               start            pause
//!    Created ──────────▶ Running ──────▶ Paused
//!                         │ ▲   resume    │
//!                         │ └─────────────┘
//!                    stop │                │ stop
//!                         ▼                ▼
//!                      Stopping ◀──────────┘
//!                         │
//!                         ▼  (all workers exited, channels closed)
//!                      Stopped
//! ```
//!
//! ## Rules
//! - Every transition is serialised through one writer lock; read-only
//!   queries use the reader lock or the atomic counters.
//! - Workers are spawned only under the writer lock, so the active count
//!   never exceeds the configured maximum.
//! - The root token is cancelled exactly once, by the first stop.
//! - The task queue and the result sink are closed in one place, strictly
//!   after every worker has exited.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::Config,
    error::PoolError,
    logging::Logger,
    metrics::Metrics,
    pool::PoolStats,
    queue::{PushError, TaskQueue},
    result::TaskResult,
    scaler::Autoscaler,
    task::Task,
    worker::{FaultHandler, Worker},
};

/// Poll interval while stop-and-wait watches the queue empty out.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Lifecycle phase of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    /// Built but not started; submissions are rejected.
    Created,
    /// Accepting and executing tasks.
    Running,
    /// Submissions rejected; workers stay alive and keep draining the queue.
    Paused,
    /// Shutdown in progress; workers are winding down.
    Stopping,
    /// All workers exited and both channels are closed.
    Stopped,
}

impl PoolPhase {
    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolPhase::Created => "created",
            PoolPhase::Running => "running",
            PoolPhase::Paused => "paused",
            PoolPhase::Stopping => "stopping",
            PoolPhase::Stopped => "stopped",
        }
    }
}

/// Worker-count bounds and the lifecycle phase, guarded by one lock.
struct Limits {
    phase: PoolPhase,
    min_workers: usize,
    max_workers: usize,
}

/// Atomic counters shared across workers and the pool surface.
pub(crate) struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    active: AtomicUsize,
    stop_tokens: AtomicUsize,
    task_seq: AtomicU64,
    worker_seq: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            active: AtomicUsize::new(0),
            stop_tokens: AtomicUsize::new(0),
            task_seq: AtomicU64::new(0),
            worker_seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a finished task; `failed` marks the outcome as a failure.
    pub(crate) fn record_outcome(&self, failed: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub(crate) fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub(crate) fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    fn worker_started(&self) -> usize {
        self.active.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn worker_exited(&self) -> usize {
        self.active.fetch_sub(1, Ordering::Relaxed) - 1
    }

    fn next_task_seq(&self) -> u64 {
        self.task_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn next_worker_id(&self) -> u64 {
        self.worker_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn grant_stop_tokens(&self, n: usize) {
        self.stop_tokens.fetch_add(n, Ordering::Relaxed);
    }

    fn clear_stop_tokens(&self) {
        self.stop_tokens.store(0, Ordering::Relaxed);
    }

    fn stop_tokens(&self) -> usize {
        self.stop_tokens.load(Ordering::Relaxed)
    }

    /// Consumes one stop token if any are outstanding.
    pub(crate) fn take_stop_token(&self) -> bool {
        self.stop_tokens
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Shared core of a pool: state machine, channels, counters, collaborators.
pub(crate) struct Supervisor<T> {
    pub(crate) name: String,
    pub(crate) default_timeout: Option<Duration>,
    autoscale: bool,
    pub(crate) scale_interval: Duration,

    limits: RwLock<Limits>,
    pub(crate) counters: Counters,

    pub(crate) queue: TaskQueue<Task<T>>,
    sink: Mutex<Option<mpsc::Sender<TaskResult<T>>>>,
    results: Mutex<Option<mpsc::Receiver<TaskResult<T>>>>,
    pub(crate) waiters: DashMap<String, oneshot::Sender<TaskResult<T>>>,

    pub(crate) root: CancellationToken,
    tracker: TaskTracker,
    /// Wakes idle workers so they can consume freshly granted stop tokens.
    pub(crate) shrink: Notify,

    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) metrics: Arc<dyn Metrics>,
    pub(crate) fault_handler: Option<FaultHandler>,
}

impl<T: Send + 'static> Supervisor<T> {
    /// Builds the core from a normalized [`Config`] and its collaborators.
    pub(crate) fn new(
        cfg: Config,
        logger: Arc<dyn Logger>,
        metrics: Arc<dyn Metrics>,
        fault_handler: Option<FaultHandler>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(cfg.queue_capacity);

        Self {
            name: cfg.name.clone(),
            default_timeout: cfg.default_timeout(),
            autoscale: cfg.autoscale,
            scale_interval: cfg.scale_interval,
            limits: RwLock::new(Limits {
                phase: PoolPhase::Created,
                min_workers: cfg.min_workers,
                max_workers: cfg.max_workers,
            }),
            counters: Counters::new(),
            queue: TaskQueue::new(cfg.queue_capacity),
            sink: Mutex::new(Some(tx)),
            results: Mutex::new(Some(rx)),
            waiters: DashMap::new(),
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
            shrink: Notify::new(),
            logger,
            metrics,
            fault_handler,
        }
    }

    fn limits_read(&self) -> RwLockReadGuard<'_, Limits> {
        self.limits.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn limits_write(&self) -> RwLockWriteGuard<'_, Limits> {
        self.limits.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn phase(&self) -> PoolPhase {
        self.limits_read().phase
    }

    // ---- lifecycle transitions ----

    /// Created → Running: launches the minimum worker set and, when
    /// configured, the autoscaler. Must be called inside a tokio runtime.
    pub(crate) fn start(self: &Arc<Self>) -> Result<(), PoolError> {
        let mut limits = self.limits_write();
        if limits.phase != PoolPhase::Created {
            return Err(PoolError::AlreadyStarted);
        }
        limits.phase = PoolPhase::Running;
        self.logger.info(&format!(
            "starting pool '{}' with {} workers (max: {})",
            self.name, limits.min_workers, limits.max_workers
        ));
        for _ in 0..limits.min_workers {
            self.spawn_worker();
        }
        if self.autoscale {
            let scaler = Autoscaler::new(Arc::clone(self));
            tokio::spawn(scaler.run(self.root.clone()));
        }
        Ok(())
    }

    /// Running → Paused: rejects future submissions, keeps workers alive.
    pub(crate) fn pause(&self) -> Result<(), PoolError> {
        let mut limits = self.limits_write();
        if limits.phase != PoolPhase::Running {
            return Err(PoolError::NotRunning);
        }
        limits.phase = PoolPhase::Paused;
        self.logger.info(&format!("pool '{}' paused", self.name));
        Ok(())
    }

    /// Paused → Running.
    pub(crate) fn resume(&self) -> Result<(), PoolError> {
        let mut limits = self.limits_write();
        if limits.phase != PoolPhase::Paused {
            return Err(PoolError::NotPaused);
        }
        limits.phase = PoolPhase::Running;
        self.logger.info(&format!("pool '{}' resumed", self.name));
        Ok(())
    }

    /// Updates worker bounds; grows immediately when below the new floor.
    /// Shrinking only lowers future limits; running workers are never
    /// interrupted.
    pub(crate) fn resize(self: &Arc<Self>, min: usize, max: usize) -> Result<(), PoolError> {
        let mut limits = self.limits_write();
        if !matches!(limits.phase, PoolPhase::Running | PoolPhase::Paused) {
            return Err(PoolError::NotRunning);
        }
        let min = min.max(1);
        let max = max.max(min);
        limits.min_workers = min;
        limits.max_workers = max;
        // Stale shrink grants could undercut a raised floor.
        self.counters.clear_stop_tokens();

        let active = self.counters.active();
        for _ in active..min {
            self.spawn_worker();
        }
        self.logger.info(&format!(
            "pool '{}' resized: min={min}, max={max}",
            self.name
        ));
        Ok(())
    }

    /// Idempotent shutdown: cancels the root token, discards queued tasks,
    /// waits for every worker, then closes both channels.
    pub(crate) async fn stop(&self) {
        if !self.begin_stop() {
            return;
        }
        self.logger.info(&format!(
            "stopping pool '{}', waiting for in-flight tasks",
            self.name
        ));
        self.root.cancel();
        let discarded = self.queue.drain();
        if discarded > 0 {
            self.logger
                .debug(&format!("discarded {discarded} queued tasks"));
        }
        self.teardown().await;
    }

    /// Waits for the queue to empty (queued tasks run to completion), then
    /// performs the stop sequence. With a `deadline`, a queue that does not
    /// drain in time is discarded and `DrainTimeout` is reported.
    pub(crate) async fn stop_and_wait(&self, deadline: Option<Duration>) -> Result<(), PoolError> {
        if !self.begin_stop() {
            return Ok(());
        }
        self.logger.info(&format!(
            "stopping pool '{}' after queued tasks finish",
            self.name
        ));

        let drained = async {
            while !self.queue.is_empty() {
                time::sleep(DRAIN_POLL).await;
            }
        };
        if let Some(limit) = deadline {
            if time::timeout(limit, drained).await.is_err() {
                self.root.cancel();
                let discarded = self.queue.drain();
                self.logger.warn(&format!(
                    "drain deadline exceeded; discarding {discarded} queued tasks"
                ));
                self.teardown().await;
                return Err(PoolError::DrainTimeout { timeout: limit });
            }
        } else {
            drained.await;
        }

        self.root.cancel();
        self.teardown().await;
        Ok(())
    }

    /// Marks the pool as stopping unless shutdown already began.
    fn begin_stop(&self) -> bool {
        let mut limits = self.limits_write();
        match limits.phase {
            PoolPhase::Stopping | PoolPhase::Stopped => false,
            _ => {
                limits.phase = PoolPhase::Stopping;
                true
            }
        }
    }

    async fn teardown(&self) {
        self.tracker.close();
        self.tracker.wait().await;

        // Single closure site, strictly after every worker has exited.
        self.queue.close();
        drop(self.lock_sink().take());
        self.waiters.clear();

        self.limits_write().phase = PoolPhase::Stopped;
        self.logger.info(&format!(
            "pool '{}' stopped (completed={}, failed={})",
            self.name,
            self.counters.completed(),
            self.counters.failed()
        ));
    }

    /// Awaits the exit of every worker started so far. Only meaningful once
    /// a stop has begun; otherwise it parks until one does.
    pub(crate) async fn wait(&self) {
        self.tracker.wait().await;
    }

    // ---- submission ----

    /// Phase-gates, labels, and enqueues a task without blocking.
    pub(crate) fn submit(&self, mut task: Task<T>) -> Result<(), PoolError> {
        {
            let limits = self.limits_read();
            match limits.phase {
                PoolPhase::Running => {}
                PoolPhase::Stopping => return Err(PoolError::ShuttingDown),
                PoolPhase::Created | PoolPhase::Paused | PoolPhase::Stopped => {
                    return Err(PoolError::NotRunning)
                }
            }
        }
        if self.root.is_cancelled() {
            return Err(PoolError::ShuttingDown);
        }

        if task.id().is_empty() {
            task.assign_id(self.next_task_id());
        }
        let id = task.id().to_string();

        match self.queue.push(task) {
            Ok(()) => {
                self.counters.record_submitted();
                self.metrics.task_queued();
                self.logger.debug(&format!("task {id} queued"));
                Ok(())
            }
            Err(PushError::Full) => Err(PoolError::QueueFull),
            Err(PushError::Closed) => Err(PoolError::ShuttingDown),
        }
    }

    pub(crate) fn next_task_id(&self) -> String {
        format!("task-{}", self.counters.next_task_seq())
    }

    /// Discards every queued task, returning the count.
    pub(crate) fn drain(&self) -> usize {
        let count = self.queue.drain();
        self.logger
            .info(&format!("drained {count} tasks from pool '{}'", self.name));
        count
    }

    /// Hands out the single result stream receiver; `None` once taken.
    pub(crate) fn take_results(&self) -> Option<mpsc::Receiver<TaskResult<T>>> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // ---- scaling ----

    /// One autoscaler pass. Grows at most by doubling when the backlog
    /// outpaces the workers; shrinks by granting stop tokens that the next
    /// idle workers consume, never dropping below the floor.
    pub(crate) fn rebalance(self: &Arc<Self>) {
        let limits = self.limits_write();
        if limits.phase != PoolPhase::Running {
            return;
        }
        let queued = self.queue.len();
        let active = self.counters.active();
        self.metrics.queue_size(queued);

        if queued > active && active < limits.max_workers {
            self.counters.clear_stop_tokens();
            let to_add = active.min(limits.max_workers - active);
            if to_add > 0 {
                self.logger.info(&format!(
                    "scaling up: adding {to_add} workers (active: {active}, queued: {queued})"
                ));
                for _ in 0..to_add {
                    self.spawn_worker();
                }
            }
        } else if queued == 0 && active > limits.min_workers {
            let outstanding = self.counters.stop_tokens();
            let surplus = (active - limits.min_workers).saturating_sub(outstanding);
            if surplus > 0 {
                let grant = (surplus / 4).max(1);
                self.counters.grant_stop_tokens(grant);
                self.logger.info(&format!(
                    "scaling down: releasing {grant} idle workers (active: {active})"
                ));
                self.shrink.notify_waiters();
            }
        }
    }

    /// Launches one worker. Callers hold the limits write lock, which keeps
    /// the active count within `max_workers`.
    fn spawn_worker(self: &Arc<Self>) {
        let results = match self.lock_sink().as_ref() {
            Some(tx) => tx.clone(),
            None => return,
        };
        let id = self.counters.next_worker_id();
        let active = self.counters.worker_started();
        self.metrics.active_workers(active);

        let worker = Worker::new(Arc::clone(self), id, results);
        self.tracker.spawn(worker.run(self.root.clone()));
    }

    fn lock_sink(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<TaskResult<T>>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read-only projection of counters, sizes, and the current phase.
    pub(crate) fn snapshot(&self) -> PoolStats {
        let limits = self.limits_read();
        PoolStats {
            name: self.name.clone(),
            phase: limits.phase,
            min_workers: limits.min_workers,
            max_workers: limits.max_workers,
            active_workers: self.counters.active(),
            queue_size: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            submitted: self.counters.submitted(),
            completed: self.counters.completed(),
            failed: self.counters.failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_tokens_never_go_negative() {
        let counters = Counters::new();
        assert!(!counters.take_stop_token());
        counters.grant_stop_tokens(2);
        assert!(counters.take_stop_token());
        assert!(counters.take_stop_token());
        assert!(!counters.take_stop_token());
    }

    #[test]
    fn outcome_counters_add_up() {
        let counters = Counters::new();
        counters.record_outcome(false);
        counters.record_outcome(true);
        counters.record_outcome(false);
        assert_eq!(counters.completed(), 3);
        assert_eq!(counters.failed(), 1);
    }

    #[test]
    fn phase_labels() {
        assert_eq!(PoolPhase::Created.as_label(), "created");
        assert_eq!(PoolPhase::Stopping.as_label(), "stopping");
    }
}
