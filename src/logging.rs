//! # Logger collaborator.
//!
//! The pool logs through a [`Logger`] trait object so embedders can route
//! messages into whatever they already run. The default, [`TraceLogger`],
//! forwards to the `tracing` facade and is free when no subscriber is
//! installed. No ordering is guaranteed across workers.

use std::sync::Arc;

/// Leveled logging sink consumed by the pool.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default logger: forwards to the `tracing` facade under the `taskpool`
/// target, tagging every record with the pool name.
pub struct TraceLogger {
    pool: String,
}

impl TraceLogger {
    pub fn new(pool: impl Into<String>) -> Self {
        Self { pool: pool.into() }
    }
}

impl Logger for TraceLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "taskpool", pool = %self.pool, "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "taskpool", pool = %self.pool, "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "taskpool", pool = %self.pool, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "taskpool", pool = %self.pool, "{message}");
    }
}

pub(crate) fn default_logger(pool: &str) -> Arc<dyn Logger> {
    Arc::new(TraceLogger::new(pool))
}
