//! # Worker: one cooperative task executor.
//!
//! Each worker loops over dequeue → execute → publish until the root token
//! fires, the queue closes, or it consumes a stop token granted by the
//! autoscaler. Within one worker, execution is strictly sequential.
//!
//! Task panics are caught at the worker boundary: the opaque payload goes to
//! the configured fault handler (default: log and continue), the failure is
//! recorded, and the worker moves on to the next task. A worker is never
//! terminated by a task's fault.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    deadline::Deadline, error::TaskError, result::TaskResult, supervisor::Supervisor, task::Task,
};

/// Callback receiving the opaque payload of a caught task panic.
///
/// Invoked from the worker's hot path; it must not panic itself.
pub type FaultHandler = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

pub(crate) struct Worker<T> {
    core: Arc<Supervisor<T>>,
    id: u64,
    results: mpsc::Sender<TaskResult<T>>,
}

impl<T: Send + 'static> Worker<T> {
    pub(crate) fn new(core: Arc<Supervisor<T>>, id: u64, results: mpsc::Sender<TaskResult<T>>) -> Self {
        Self { core, id, results }
    }

    pub(crate) async fn run(self, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                self.core
                    .logger
                    .debug(&format!("worker {} stopping: pool shutdown", self.id));
                break;
            }
            // A stop token is consumed only while the queue is idle, so the
            // pool never sheds a worker that still has work to pick up.
            if self.core.queue.is_empty() && self.core.counters.take_stop_token() {
                self.core
                    .logger
                    .debug(&format!("worker {} stopping: scaled down", self.id));
                break;
            }

            let task = tokio::select! {
                biased;
                _ = token.cancelled() => continue,
                _ = self.core.shrink.notified() => continue,
                popped = self.core.queue.pop() => match popped {
                    Some(task) => task,
                    None => {
                        self.core
                            .logger
                            .debug(&format!("worker {} stopping: queue closed", self.id));
                        break;
                    }
                },
            };

            self.execute(task, &token).await;
        }

        let active = self.core.counters.worker_exited();
        self.core.metrics.active_workers(active);
    }

    /// Runs one task under its deadline and publishes the outcome.
    async fn execute(&self, task: Task<T>, token: &CancellationToken) {
        self.core.metrics.task_started();

        let timeout = task.effective_timeout(self.core.default_timeout);
        let deadline = Deadline::derive(token, timeout);
        let ctx = deadline.token();
        let (id, work) = task.into_parts();

        let started_at = SystemTime::now();
        let started = Instant::now();
        // The closure call is deferred into the future so a panic while
        // constructing it is trapped along with panics while polling it.
        let guarded = AssertUnwindSafe(async move { work(ctx).await }).catch_unwind();
        let outcome = match deadline.enforce(guarded).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(payload)) => Err(self.trap_fault(payload)),
            Err(timed_out) => Err(timed_out),
        };
        deadline.release();
        let duration = started.elapsed();
        let finished_at = SystemTime::now();

        self.core.counters.record_outcome(outcome.is_err());
        match &outcome {
            Ok(_) => {
                self.core.metrics.task_completed(duration);
                self.core
                    .logger
                    .debug(&format!("task {id} completed in {duration:?}"));
            }
            Err(err) => {
                self.core.metrics.task_failed(err);
                self.core.logger.error(&format!("task {id} failed: {err}"));
            }
        }

        let result = TaskResult {
            task_id: id,
            outcome,
            started_at,
            finished_at,
            duration,
        };
        self.publish(result, token).await;
    }

    fn trap_fault(&self, payload: Box<dyn Any + Send>) -> TaskError {
        let reason = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        match &self.core.fault_handler {
            Some(handler) => handler(payload.as_ref()),
            None => self.core.logger.error(&format!(
                "worker {} recovered from task panic: {reason}",
                self.id
            )),
        }
        TaskError::Aborted { reason }
    }

    /// Delivers the result: a waiter registered for this task id wins over
    /// the shared stream. Publication only blocks when the stream is full,
    /// and a blocked publish abandoned by shutdown discards the result.
    async fn publish(&self, result: TaskResult<T>, token: &CancellationToken) {
        let result = match self.core.waiters.remove(&result.task_id) {
            Some((_, waiter)) => match waiter.send(result) {
                Ok(()) => return,
                // The caller gave up waiting; surface it on the stream.
                Err(result) => result,
            },
            None => result,
        };

        match self.results.try_send(result) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(result)) => {
                let send = self.results.send(result);
                tokio::pin!(send);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {}
                    sent = &mut send => {
                        let _ = sent;
                    }
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
