//! # taskpool
//!
//! **taskpool** is a bounded worker pool for async tasks.
//!
//! It accepts one-shot units of work, dispatches them across a bounded set
//! of worker executors, enforces per-task deadlines, and streams structured
//! results back, with adaptive sizing, pause/resume, and two shutdown
//! disciplines. The crate is designed as a building block for services that
//! need in-process task execution with backpressure.
//!
//! ## Features
//!
//! | Area             | Description                                                    | Key types / traits              |
//! |------------------|----------------------------------------------------------------|---------------------------------|
//! | **Submission**   | Non-blocking submit with backpressure, or submit-and-wait.     | [`Pool`], [`Task`]              |
//! | **Results**      | Bounded stream of outcomes in completion order.                | [`ResultStream`], [`TaskResult`]|
//! | **Deadlines**    | Per-task timeouts composed with pool-wide cancellation.        | [`Task::with_timeout`]          |
//! | **Scaling**      | Backlog-driven growth, idle shrink, manual resize.             | [`Config`], [`Pool::resize`]    |
//! | **Lifecycle**    | Pause/resume, graceful stop, drain-then-stop.                  | [`PoolPhase`], [`Pool::stop`]   |
//! | **Faults**       | Task panics contained at the worker boundary.                  | [`FaultHandler`]                |
//! | **Observability**| Pluggable logging and metrics sinks.                           | [`Logger`], [`Metrics`]         |
//! | **Errors**       | Typed failures for submissions and task runs.                  | [`PoolError`], [`TaskError`]    |
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskpool::{Config, Pool, Task, TaskError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut cfg = Config::default();
//!     cfg.min_workers = 2;
//!     cfg.max_workers = 8;
//!     cfg.autoscale = true;
//!     cfg.task_timeout = Duration::from_secs(5);
//!
//!     let pool: Pool<u64> = Pool::new(cfg);
//!     pool.start().expect("first start");
//!
//!     for n in 1..=5u64 {
//!         pool.submit(Task::new(move |ctx: CancellationToken| async move {
//!             if ctx.is_cancelled() {
//!                 return Err(TaskError::Canceled);
//!             }
//!             Ok(n * n)
//!         }))
//!         .expect("queue has room");
//!     }
//!
//!     let mut results = pool.results().expect("single consumer");
//!     pool.stop_and_wait().await;
//!     while let Some(result) = results.recv().await {
//!         println!("{} -> {:?}", result.task_id, result.outcome);
//!     }
//! }
//! ```
//!
//! ---

mod config;
mod deadline;
mod error;
mod logging;
mod metrics;
mod pool;
mod queue;
mod result;
mod scaler;
mod supervisor;
mod task;
mod worker;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{PoolError, TaskError};
pub use logging::{Logger, TraceLogger};
pub use metrics::{Metrics, NoopMetrics};
pub use pool::{Pool, PoolBuilder, PoolStats};
pub use result::{ResultStream, TaskResult};
pub use supervisor::PoolPhase;
pub use task::{Task, TaskFuture};
pub use worker::FaultHandler;
