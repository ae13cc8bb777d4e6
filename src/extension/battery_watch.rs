//! Low battery warning
//!
//! Watches battery telemetry and tells the operator once when the level drops
//! to or below `battery_watch.warn_percent`. The warning re-arms after the
//! level climbs back above the threshold (battery swap on the ground).

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Capabilities, Extension, ExtensionError};
use crate::telemetry::observers::ObserverMessage;
use crate::vehicle::TelemetryEvent;

pub struct BatteryWatch;

impl Extension for BatteryWatch {
    fn name(&self) -> &'static str {
        "battery-watch"
    }

    fn register(
        &self,
        capabilities: &Capabilities,
    ) -> Result<Option<JoinHandle<()>>, ExtensionError> {
        let threshold = capabilities.config().battery_watch.warn_percent;
        let mut monitor = BatteryMonitor::new(threshold);
        let mut events = capabilities.telemetry().subscribe();
        let observers = capabilities.observers();
        let cancel = capabilities.cancellation();

        info!("Battery watch warns at {}%", threshold);

        let task = tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => received,
                };
                match received {
                    Ok(TelemetryEvent::Battery(level)) => {
                        if let Some(notice) = monitor.observe(level) {
                            warn!("{}", notice);
                            observers.publish(ObserverMessage::Notice(notice));
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Battery watch skipped {} telemetry events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Battery watch stopped");
        });

        Ok(Some(task))
    }
}

#[derive(Debug)]
pub struct BatteryMonitor {
    threshold: u8,
    armed: bool,
}

impl BatteryMonitor {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            armed: true,
        }
    }

    /// Returns the notice to raise, if this level crosses the threshold.
    pub fn observe(&mut self, level: u8) -> Option<String> {
        if level > self.threshold {
            self.armed = true;
            return None;
        }
        if !self.armed {
            return None;
        }
        self.armed = false;
        Some(format!("Battery low: {}%", level))
    }
}
