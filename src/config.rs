//! # Pool configuration.
//!
//! [`Config`] defines the pool's shape: worker bounds, queue capacity,
//! default task timeout, and autoscaling behavior.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → use `10 * max_workers`
//! - `task_timeout = 0s` → no default timeout (tasks run until completion)
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskpool::Config;
//!
//! let mut cfg = Config::default();
//! cfg.min_workers = 2;
//! cfg.max_workers = 8;
//! cfg.task_timeout = Duration::from_secs(5);
//! cfg.autoscale = true;
//!
//! assert_eq!(cfg.normalized().queue_capacity, 80);
//! ```

use std::time::Duration;

/// Configuration for a worker pool.
///
/// All fields are public for flexibility. Prefer the helper accessors over
/// sprinkling sentinel checks (`0`) across call sites.
#[derive(Clone, Debug)]
pub struct Config {
    /// Human-readable pool name, used in logs.
    pub name: String,

    /// Number of workers launched on start; the pool never shrinks below it.
    ///
    /// Clamped to a minimum of 1.
    pub min_workers: usize,

    /// Upper bound on concurrent workers. Clamped to at least `min_workers`.
    pub max_workers: usize,

    /// Capacity of the task queue and of the result stream.
    ///
    /// `0` = use `10 * max_workers`.
    pub queue_capacity: usize,

    /// Default per-task timeout.
    ///
    /// - `Duration::ZERO` = no timeout (task runs until completion)
    /// - `> 0` = applied to every task that does not carry its own timeout
    pub task_timeout: Duration,

    /// Whether the autoscaler runs alongside the workers.
    pub autoscale: bool,

    /// Autoscaler tick interval.
    pub scale_interval: Duration,
}

impl Config {
    /// Returns the default per-task timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per task
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.task_timeout.is_zero() {
            None
        } else {
            Some(self.task_timeout)
        }
    }

    /// Returns a copy with worker bounds and queue capacity normalized:
    /// `min_workers >= 1`, `max_workers >= min_workers`, and a zero
    /// `queue_capacity` replaced by `10 * max_workers`.
    pub fn normalized(&self) -> Config {
        let mut cfg = self.clone();
        cfg.min_workers = cfg.min_workers.max(1);
        cfg.max_workers = cfg.max_workers.max(cfg.min_workers);
        if cfg.queue_capacity == 0 {
            cfg.queue_capacity = cfg.max_workers * 10;
        }
        cfg
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `name = "worker-pool"`
    /// - `min_workers = 1`, `max_workers = 1`
    /// - `queue_capacity = 0` (derive from `max_workers`)
    /// - `task_timeout = 30s`
    /// - `autoscale = false`, `scale_interval = 5s`
    fn default() -> Self {
        Self {
            name: "worker-pool".to_string(),
            min_workers: 1,
            max_workers: 1,
            queue_capacity: 0,
            task_timeout: Duration::from_secs(30),
            autoscale: false,
            scale_interval: Duration::from_secs(5),
        }
    }
}
