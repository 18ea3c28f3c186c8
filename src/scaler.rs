//! # Autoscaler: periodic worker-count controller.
//!
//! Ticks on a fixed interval and asks the supervisor to rebalance: grow
//! while the backlog outpaces the workers, grant stop tokens while the pool
//! idles above its floor. The loop exits when the root token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::supervisor::Supervisor;

pub(crate) struct Autoscaler<T> {
    core: Arc<Supervisor<T>>,
}

impl<T: Send + 'static> Autoscaler<T> {
    pub(crate) fn new(core: Arc<Supervisor<T>>) -> Self {
        Self { core }
    }

    pub(crate) async fn run(self, token: CancellationToken) {
        let period = self.core.scale_interval.max(Duration::from_millis(1));
        let mut tick = time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so rebalancing
        // starts one full period after the pool comes up.
        tick.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tick.tick() => self.core.rebalance(),
            }
        }
    }
}
