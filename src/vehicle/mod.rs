//! Vehicle link boundary
//!
//! The core never talks to the flying vehicle directly. It sees two narrow
//! seams:
//!
//! ```text
//!            ┌──────────────────────┐
//! Core ────► │ VehicleCommands      │  fire-and-forget command sink
//!            │ TelemetrySource      │ ──► broadcast of TelemetryEvent
//!            └──────────────────────┘
//! ```
//!
//! Any concrete link (dry run, a real protocol client, a recording mock in
//! tests) implements both traits. Command methods take `&self` and return
//! nothing: delivery failures are the link's business and must never block
//! or surface into the tick loops.

pub mod dry_run;
#[cfg(test)]
pub mod recording;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::flight::camera::CameraOrientation;
use crate::flight::command_synthesizer::CommandFrame;

/// Command sink of the vehicle link
pub trait VehicleCommands: Send + Sync + 'static {
    fn apply_motion(&self, frame: CommandFrame);

    fn takeoff(&self);

    fn land(&self);

    fn emergency_stop(&self);

    fn set_camera_orientation(&self, orientation: CameraOrientation);

    fn start_recording(&self);

    fn stop_recording(&self);
}

/// Telemetry side of the vehicle link
///
/// Every call hands out an independent receiver; events published before the
/// call are not replayed.
pub trait TelemetrySource: Send + Sync + 'static {
    fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent>;
}

/// Flight phase as reported by the vehicle
///
/// Advisory only. Local mode state is never derived from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPhase {
    Landing,
    Landed,
    Takeoff,
    Hovering,
    Flying,
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightPhase::Landing => write!(f, "landing"),
            FlightPhase::Landed => write!(f, "landed"),
            FlightPhase::Takeoff => write!(f, "takeoff"),
            FlightPhase::Hovering => write!(f, "hovering"),
            FlightPhase::Flying => write!(f, "flying"),
        }
    }
}

/// Attitude report, angles in radians as delivered by the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Named telemetry facts emitted by the vehicle
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    AltitudeChanged(f64),
    SpeedChanged(f64),
    AttitudeChanged(Attitude),
    /// Remaining charge in percent
    Battery(u8),
    PhaseChanged(FlightPhase),
}
