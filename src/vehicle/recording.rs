//! In-memory link that records every command, used by the tests

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::{TelemetryEvent, TelemetrySource, VehicleCommands};
use crate::flight::camera::CameraOrientation;
use crate::flight::command_synthesizer::CommandFrame;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Motion(CommandFrame),
    Takeoff,
    Land,
    EmergencyStop,
    Camera(CameraOrientation),
    StartRecording,
    StopRecording,
}

#[derive(Clone)]
pub struct RecordingLink {
    commands: Arc<Mutex<Vec<Command>>>,
    telemetry: broadcast::Sender<TelemetryEvent>,
}

impl Default for RecordingLink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingLink {
    pub fn new() -> Self {
        let (telemetry, _) = broadcast::channel(64);
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            telemetry,
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    /// Everything except motion frames, in issue order
    pub fn discrete_commands(&self) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|c| !matches!(c, Command::Motion(_)))
            .collect()
    }

    pub fn motion_frames(&self) -> Vec<CommandFrame> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Motion(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn emit(&self, event: TelemetryEvent) {
        let _ = self.telemetry.send(event);
    }

    fn push(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }
}

impl VehicleCommands for RecordingLink {
    fn apply_motion(&self, frame: CommandFrame) {
        self.push(Command::Motion(frame));
    }

    fn takeoff(&self) {
        self.push(Command::Takeoff);
    }

    fn land(&self) {
        self.push(Command::Land);
    }

    fn emergency_stop(&self) {
        self.push(Command::EmergencyStop);
    }

    fn set_camera_orientation(&self, orientation: CameraOrientation) {
        self.push(Command::Camera(orientation));
    }

    fn start_recording(&self) {
        self.push(Command::StartRecording);
    }

    fn stop_recording(&self) {
        self.push(Command::StopRecording);
    }
}

impl TelemetrySource for RecordingLink {
    fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }
}
