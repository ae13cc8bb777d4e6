//! Camera Controller
//!
//! Accumulates relative pan/tilt nudges into an absolute orientation and
//! pushes it to the vehicle on every change. Each axis is clamped to
//! `[-limit, limit]` before the orientation is sent, so the vehicle never
//! receives an out-of-range value.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::vehicle::VehicleCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CameraOrientation {
    pub tilt: i32,
    pub pan: i32,
}

impl CameraOrientation {
    pub fn clamped(self, limit: i32) -> Self {
        Self {
            tilt: self.tilt.clamp(-limit, limit),
            pan: self.pan.clamp(-limit, limit),
        }
    }
}

pub struct CameraController {
    orientation: CameraOrientation,
    limit: i32,
    commands: Arc<dyn VehicleCommands>,
}

impl CameraController {
    pub fn new(limit: i32, commands: Arc<dyn VehicleCommands>) -> Self {
        Self {
            orientation: CameraOrientation::default(),
            limit,
            commands,
        }
    }

    pub fn orientation(&self) -> CameraOrientation {
        self.orientation
    }

    /// Adds a relative move, clamps and sends the result.
    pub fn nudge(&mut self, pan: i32, tilt: i32) -> CameraOrientation {
        let moved = CameraOrientation {
            tilt: self.orientation.tilt.saturating_add(tilt),
            pan: self.orientation.pan.saturating_add(pan),
        };
        self.apply(moved)
    }

    pub fn reset(&mut self) -> CameraOrientation {
        self.apply(CameraOrientation::default())
    }

    fn apply(&mut self, orientation: CameraOrientation) -> CameraOrientation {
        self.orientation = orientation.clamped(self.limit);
        debug!(
            "Camera orientation tilt={} pan={}",
            self.orientation.tilt, self.orientation.pan
        );
        self.commands.set_camera_orientation(self.orientation);
        self.orientation
    }
}
