//! Periodic snapshot broadcast
//!
//! Every tick the whole current [`MovementSnapshot`] goes to every observer,
//! changed or not. The payload is small and the tick slow, so no diffing.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use super::aggregator::MovementSnapshot;
use super::observers::{ObserverHub, ObserverMessage};

pub struct SnapshotBroadcaster {
    snapshot: watch::Receiver<MovementSnapshot>,
    observers: ObserverHub,
    interval: Duration,
    ticks: u64,
}

impl SnapshotBroadcaster {
    pub fn new(
        snapshot: watch::Receiver<MovementSnapshot>,
        observers: ObserverHub,
        interval: Duration,
    ) -> Self {
        Self {
            snapshot,
            observers,
            interval,
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Publishes the snapshot as it is right now.
    pub fn tick(&mut self) -> MovementSnapshot {
        let snapshot = *self.snapshot.borrow();
        let reached = self.observers.publish(ObserverMessage::Movement(snapshot));
        trace!("Movement snapshot sent to {} observers", reached);
        self.ticks += 1;
        snapshot
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "Starting snapshot broadcast with {} ms tick",
            self.interval.as_millis()
        );
        let mut interval_timer = tokio::time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval_timer.tick() => {
                    self.tick();
                }
            }
        }
        info!("Snapshot broadcast stopped after {} ticks", self.ticks);
    }
}
