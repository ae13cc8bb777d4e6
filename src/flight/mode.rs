//! Mode State Machine
//!
//! Two independent axes, flight and recording, give four reachable
//! combinations. Transitions are owned by button edges only and are
//! optimistic: local belief flips the moment the command is issued, whether
//! or not the vehicle follows. Phase notifications coming back from the
//! vehicle never touch this state.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::vehicle::VehicleCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightMode {
    #[default]
    Landed,
    Flying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    #[default]
    Idle,
    Recording,
}

/// Edge-triggered request coming from a button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    ToggleFly,
    Emergency,
    ToggleRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModeState {
    pub flight: FlightMode,
    pub record: RecordMode,
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.flight, self.record)
    }
}

pub struct ModeStateMachine {
    state: ModeState,
    commands: Arc<dyn VehicleCommands>,
}

impl ModeStateMachine {
    pub fn new(commands: Arc<dyn VehicleCommands>) -> Self {
        Self {
            state: ModeState::default(),
            commands,
        }
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    /// Issues the command for `command` and flips local state. Returns the
    /// state after the transition.
    pub fn handle(&mut self, command: ModeCommand) -> ModeState {
        match command {
            ModeCommand::ToggleFly => self.toggle_fly(),
            ModeCommand::Emergency => self.emergency(),
            ModeCommand::ToggleRecord => self.toggle_record(),
        }
        self.state
    }

    fn toggle_fly(&mut self) {
        match self.state.flight {
            FlightMode::Flying => {
                info!("Landing.");
                self.commands.land();
                self.state.flight = FlightMode::Landed;
            }
            FlightMode::Landed => {
                info!("Taking off.");
                self.commands.takeoff();
                self.state.flight = FlightMode::Flying;
            }
        }
    }

    fn emergency(&mut self) {
        warn!("Emergency stop (was {:?})", self.state.flight);
        self.commands.emergency_stop();
        self.state.flight = FlightMode::Landed;
    }

    fn toggle_record(&mut self) {
        match self.state.record {
            RecordMode::Recording => {
                info!("Stop recording.");
                self.commands.stop_recording();
                self.state.record = RecordMode::Idle;
            }
            RecordMode::Idle => {
                info!("Start recording.");
                self.commands.start_recording();
                self.state.record = RecordMode::Recording;
            }
        }
    }
}
