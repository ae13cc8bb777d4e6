//! Telemetry Aggregator
//!
//! Folds the vehicle's telemetry stream into a [`MovementSnapshot`]
//! (last value wins per field) and forwards discrete phase and battery
//! events to observers the moment they arrive.
//!
//! Only yaw is converted from radians to degrees; roll and pitch are stored
//! exactly as the vehicle reports them. Observers built against the existing
//! display depend on that asymmetry.

use serde::Serialize;
use std::f64::consts::PI;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::observers::{ObserverHub, ObserverMessage};
use crate::vehicle::TelemetryEvent;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MovementSnapshot {
    pub roll: f64,
    pub pitch: f64,
    /// Degrees
    pub yaw: f64,
    pub altitude: f64,
    pub speed: f64,
}

pub struct TelemetryAggregator {
    snapshot: watch::Sender<MovementSnapshot>,
    observers: ObserverHub,
}

impl TelemetryAggregator {
    pub fn new(observers: ObserverHub) -> (Self, watch::Receiver<MovementSnapshot>) {
        let (snapshot, receiver) = watch::channel(MovementSnapshot::default());
        (
            Self {
                snapshot,
                observers,
            },
            receiver,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<MovementSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> MovementSnapshot {
        *self.snapshot.borrow()
    }

    pub fn apply(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::AltitudeChanged(altitude) => {
                trace!("Altitude: {}", altitude);
                self.snapshot.send_modify(|s| s.altitude = altitude);
            }
            TelemetryEvent::SpeedChanged(speed) => {
                trace!("Speed: {}", speed);
                self.snapshot.send_modify(|s| s.speed = speed);
            }
            TelemetryEvent::AttitudeChanged(attitude) => {
                trace!("Attitude: {:?}", attitude);
                self.snapshot.send_modify(|s| {
                    s.roll = attitude.roll;
                    s.pitch = attitude.pitch;
                    s.yaw = attitude.yaw * 180.0 / PI;
                });
            }
            TelemetryEvent::PhaseChanged(phase) => {
                info!("{}", phase.to_string().to_uppercase());
                self.observers.publish(ObserverMessage::Phase(phase));
            }
            TelemetryEvent::Battery(level) => {
                info!("Battery: {}%", level);
                self.observers.publish(ObserverMessage::Battery(level));
            }
        }
    }

    pub async fn run(
        self,
        mut events: broadcast::Receiver<TelemetryEvent>,
        cancel: CancellationToken,
    ) {
        info!("Telemetry aggregator subscribed to vehicle events");
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => received,
            };
            match received {
                Ok(event) => self.apply(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Telemetry aggregator lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("Telemetry source closed");
                    break;
                }
            }
        }
        info!("Telemetry aggregator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{Attitude, FlightPhase};

    fn aggregator() -> (TelemetryAggregator, ObserverHub) {
        let hub = ObserverHub::new(16, "hi");
        let (agg, _) = TelemetryAggregator::new(hub.clone());
        (agg, hub)
    }

    #[test]
    fn attitude_converts_only_yaw() {
        let (agg, _) = aggregator();
        agg.apply(TelemetryEvent::AttitudeChanged(Attitude {
            roll: 1.0,
            pitch: 2.0,
            yaw: PI / 2.0,
        }));
        let s = agg.snapshot();
        assert_eq!(s.roll, 1.0);
        assert_eq!(s.pitch, 2.0);
        assert!((s.yaw - 90.0).abs() < 1e-9, "yaw {}", s.yaw);
    }

    #[test]
    fn fields_update_independently() {
        let (agg, _) = aggregator();
        agg.apply(TelemetryEvent::AltitudeChanged(12.5));
        agg.apply(TelemetryEvent::SpeedChanged(3.0));
        agg.apply(TelemetryEvent::AltitudeChanged(13.0));
        assert_eq!(
            agg.snapshot(),
            MovementSnapshot {
                altitude: 13.0,
                speed: 3.0,
                ..Default::default()
            }
        );
    }

    #[test]
    fn phase_and_battery_are_forwarded_not_merged() {
        let (agg, hub) = aggregator();
        let mut sub = hub.subscribe();
        sub.try_recv();

        agg.apply(TelemetryEvent::PhaseChanged(FlightPhase::Takeoff));
        agg.apply(TelemetryEvent::Battery(64));

        assert_eq!(
            sub.try_recv(),
            Some(ObserverMessage::Phase(FlightPhase::Takeoff))
        );
        assert_eq!(sub.try_recv(), Some(ObserverMessage::Battery(64)));
        assert_eq!(agg.snapshot(), MovementSnapshot::default());
    }

    #[test]
    fn snapshot_changes_are_not_pushed_to_observers() {
        let (agg, hub) = aggregator();
        let mut sub = hub.subscribe();
        sub.try_recv();
        agg.apply(TelemetryEvent::SpeedChanged(1.0));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn run_folds_events_until_source_closes() {
        let hub = ObserverHub::new(16, "hi");
        let (agg, snapshot) = TelemetryAggregator::new(hub);
        let (tx, rx) = broadcast::channel(16);
        let task = tokio::spawn(agg.run(rx, CancellationToken::new()));

        tx.send(TelemetryEvent::AltitudeChanged(4.0)).unwrap();
        tx.send(TelemetryEvent::SpeedChanged(2.0)).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(snapshot.borrow().altitude, 4.0);
        assert_eq!(snapshot.borrow().speed, 2.0);
    }
}
