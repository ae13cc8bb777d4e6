//! The input task
//!
//! Samples are handled strictly one after another: the normalizer updates
//! the control state, and any edge event it produces goes to the mode machine
//! or the camera before the next sample is looked at.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::controller::event_collector::InputSample;
use crate::controller::normalizer::{ControlEvent, InputNormalizer};
use crate::flight::camera::CameraController;
use crate::flight::mode::{ModeState, ModeStateMachine};

pub struct InputLoop {
    normalizer: InputNormalizer,
    modes: ModeStateMachine,
    camera: CameraController,
    mode_sender: watch::Sender<ModeState>,
    samples: u64,
}

impl InputLoop {
    pub fn new(
        normalizer: InputNormalizer,
        modes: ModeStateMachine,
        camera: CameraController,
    ) -> (Self, watch::Receiver<ModeState>) {
        let (mode_sender, mode_receiver) = watch::channel(modes.state());
        (
            Self {
                normalizer,
                modes,
                camera,
                mode_sender,
                samples: 0,
            },
            mode_receiver,
        )
    }

    pub fn handle(&mut self, sample: &InputSample) {
        self.samples += 1;
        let Some(event) = self.normalizer.handle(sample) else {
            return;
        };
        match event {
            ControlEvent::CameraNudge { pan, tilt } => {
                self.camera.nudge(pan, tilt);
            }
            ControlEvent::CameraReset => {
                self.camera.reset();
            }
            ControlEvent::Mode(command) => {
                let state = self.modes.handle(command);
                debug!("Mode now {}", state);
                self.mode_sender.send_replace(state);
            }
        }
    }

    pub async fn run(mut self, mut input: mpsc::Receiver<InputSample>, cancel: CancellationToken) {
        info!("Input loop waiting for samples");
        loop {
            let sample = tokio::select! {
                _ = cancel.cancelled() => break,
                sample = input.recv() => sample,
            };
            let Some(sample) = sample else {
                info!("Input source closed");
                break;
            };
            self.handle(&sample);
        }
        info!(
            "Input loop stopped after {} samples, final mode {}",
            self.samples,
            self.modes.state()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;
    use crate::flight::camera::CameraOrientation;
    use crate::flight::mode::FlightMode;
    use crate::vehicle::recording::{Command, RecordingLink};
    use std::sync::Arc;

    fn input_loop(link: &RecordingLink) -> (InputLoop, watch::Receiver<ModeState>) {
        let (normalizer, _) = InputNormalizer::new(&InputConfig::default(), 3);
        let commands = Arc::new(link.clone());
        InputLoop::new(
            normalizer,
            ModeStateMachine::new(commands.clone()),
            CameraController::new(180, commands),
        )
    }

    #[test]
    fn mode_buttons_reach_the_machine() {
        let link = RecordingLink::new();
        let (mut input, modes) = input_loop(&link);

        input.handle(&InputSample::button(0, 4, true));
        assert_eq!(modes.borrow().flight, FlightMode::Flying);
        input.handle(&InputSample::button(0, 4, false));
        input.handle(&InputSample::button(0, 5, true));
        assert_eq!(modes.borrow().flight, FlightMode::Landed);

        assert_eq!(
            link.discrete_commands(),
            vec![Command::Takeoff, Command::EmergencyStop]
        );
    }

    #[test]
    fn camera_buttons_move_the_camera() {
        let link = RecordingLink::new();
        let (mut input, _) = input_loop(&link);

        input.handle(&InputSample::button(0, 0, true));
        input.handle(&InputSample::button(0, 3, true));
        input.handle(&InputSample::button(0, 8, true));

        assert_eq!(
            link.discrete_commands(),
            vec![
                Command::Camera(CameraOrientation { tilt: 3, pan: 0 }),
                Command::Camera(CameraOrientation { tilt: 3, pan: 3 }),
                Command::Camera(CameraOrientation::default()),
            ]
        );
    }

    #[tokio::test]
    async fn run_stops_when_the_source_closes() {
        let link = RecordingLink::new();
        let (input, modes) = input_loop(&link);
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(input.run(rx, CancellationToken::new()));

        tx.send(InputSample::button(0, 11, true)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(link.discrete_commands(), vec![Command::StartRecording]);
        assert_eq!(modes.borrow().flight, FlightMode::Landed);
    }
}
