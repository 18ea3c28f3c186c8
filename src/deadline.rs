//! # Deadline: cancellation composed with an optional timeout.
//!
//! A [`Deadline`] derives a child [`CancellationToken`] from a parent, so
//! the child fires at `min(parent cancellation, now + timeout)`:
//!
//! ```text
//!   root token ──child_token()──► deadline token ──► task future
//!                                      ▲
//!                 timeout elapses ─────┘ (cancel + TaskError::Timeout)
//! ```
//!
//! Cancelling the parent propagates to the child; the timeout is enforced by
//! racing the task future against `tokio::time::timeout`. Releasing the
//! deadline cancels the child so any clones the task handed out observe it.

use std::{future::Future, time::Duration};

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

pub(crate) struct Deadline {
    token: CancellationToken,
    timeout: Option<Duration>,
}

impl Deadline {
    /// Derives a deadline from `parent`, optionally bounded by `timeout`.
    pub(crate) fn derive(parent: &CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token: parent.child_token(),
            timeout: timeout.filter(|d| !d.is_zero()),
        }
    }

    /// The token handed to the task's work function.
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Drives `fut` to completion, bounded by the deadline's timeout.
    ///
    /// On expiry the child token is cancelled (so the task future, if it is
    /// still referenced elsewhere, observes it) and `TaskError::Timeout` is
    /// returned in place of the task's own output.
    pub(crate) async fn enforce<F>(&self, fut: F) -> Result<F::Output, TaskError>
    where
        F: Future,
    {
        match self.timeout {
            Some(dur) => match time::timeout(dur, fut).await {
                Ok(out) => Ok(out),
                Err(_elapsed) => {
                    self.token.cancel();
                    Err(TaskError::Timeout { timeout: dur })
                }
            },
            None => Ok(fut.await),
        }
    }

    /// Cancels the child token, releasing the deadline and anything derived
    /// from it.
    pub(crate) fn release(&self) {
        self.token.cancel();
    }
}
