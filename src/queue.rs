//! # Bounded multi-consumer FIFO of pending tasks.
//!
//! tokio's `mpsc` channel is single-consumer, and draining it would require
//! taking the receiver away from a parked worker, so the queue is built
//! directly from a locked deque and a [`Notify`]:
//!
//! - `push` is non-blocking: the capacity check and the insert happen under
//!   one lock, so the bound is exact.
//! - `pop` parks on the `Notify` until an item arrives or the queue closes;
//!   callers race it against their cancellation token.
//! - `drain` removes everything queued without waking the workers.
//!
//! FIFO order is observed per producer; arrivals from concurrent producers
//! interleave in lock-acquisition order.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

/// Push failure modes.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushError {
    /// The queue is at capacity.
    Full,
    /// The queue has been closed by shutdown.
    Closed,
}

struct Slots<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub(crate) struct TaskQueue<T> {
    slots: Mutex<Slots<T>>,
    available: Notify,
    capacity: usize,
}

impl<T> TaskQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues without blocking. Fails with [`PushError::Full`] at capacity
    /// and [`PushError::Closed`] after shutdown.
    pub(crate) fn push(&self, item: T) -> Result<(), PushError> {
        {
            let mut slots = self.lock();
            if slots.closed {
                return Err(PushError::Closed);
            }
            if slots.items.len() >= self.capacity {
                return Err(PushError::Full);
            }
            slots.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Dequeues the next task, waiting for one to arrive. Returns `None`
    /// once the queue is closed and empty.
    pub(crate) async fn pop(&self) -> Option<T> {
        loop {
            // Register for a wakeup before inspecting the queue so a push
            // between the check and the await cannot be missed.
            let notified = self.available.notified();

            {
                let mut slots = self.lock();
                if let Some(item) = slots.items.pop_front() {
                    if !slots.items.is_empty() {
                        // Pass the baton: this consumer may have absorbed
                        // the only stored permit.
                        self.available.notify_one();
                    }
                    return Some(item);
                }
                if slots.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Removes every queued task without executing it; returns the count.
    pub(crate) fn drain(&self) -> usize {
        let mut slots = self.lock();
        let count = slots.items.len();
        slots.items.clear();
        count
    }

    /// Closes the queue: pending `pop` calls return once the backlog is
    /// consumed, new `push` calls fail.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
