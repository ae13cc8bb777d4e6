//! Dry-run vehicle link
//!
//! Stands in for a real protocol client: every command is logged, and the
//! phase notifications a real vehicle would send after takeoff, landing or an
//! emergency stop are echoed on the telemetry channel so observers see the
//! advisory flow end to end. No flight dynamics are simulated.

use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::{FlightPhase, TelemetryEvent, TelemetrySource, VehicleCommands};
use crate::flight::camera::CameraOrientation;
use crate::flight::command_synthesizer::CommandFrame;

pub struct DryRunLink {
    address: String,
    telemetry: broadcast::Sender<TelemetryEvent>,
}

impl DryRunLink {
    pub fn new(address: impl Into<String>, capacity: usize) -> Self {
        let address = address.into();
        let (telemetry, _) = broadcast::channel(capacity.max(1));
        info!("Dry-run vehicle link for {} (no packets leave this host)", address);
        Self { address, telemetry }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn echo(&self, phases: &[FlightPhase]) {
        for phase in phases {
            debug!("Echoing advisory phase {}", phase);
            // No subscribers is fine
            let _ = self.telemetry.send(TelemetryEvent::PhaseChanged(*phase));
        }
    }
}

impl VehicleCommands for DryRunLink {
    fn apply_motion(&self, frame: CommandFrame) {
        trace!(
            "PCMD flag={} roll={} pitch={} yaw={} vertical={}",
            frame.active as u8,
            frame.roll,
            frame.pitch,
            frame.yaw,
            frame.vertical
        );
    }

    fn takeoff(&self) {
        info!("[{}] takeoff", self.address);
        self.echo(&[FlightPhase::Takeoff, FlightPhase::Hovering]);
    }

    fn land(&self) {
        info!("[{}] land", self.address);
        self.echo(&[FlightPhase::Landing, FlightPhase::Landed]);
    }

    fn emergency_stop(&self) {
        info!("[{}] EMERGENCY", self.address);
        self.echo(&[FlightPhase::Landed]);
    }

    fn set_camera_orientation(&self, orientation: CameraOrientation) {
        info!(
            "[{}] camera tilt={} pan={}",
            self.address, orientation.tilt, orientation.pan
        );
    }

    fn start_recording(&self) {
        info!("[{}] start recording", self.address);
    }

    fn stop_recording(&self) {
        info!("[{}] stop recording", self.address);
    }
}

impl TelemetrySource for DryRunLink {
    fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }
}
