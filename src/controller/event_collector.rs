use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Raw device sample, indices follow the standard gamepad layout
#[derive(Debug, Clone, PartialEq)]
pub enum InputSample {
    Axis {
        device: usize,
        axis: u32,
        value: f32,
        timestamp: DateTime<Local>,
    },
    Button {
        device: usize,
        button: u32,
        pressed: bool,
        timestamp: DateTime<Local>,
    },
}

impl InputSample {
    pub fn axis(device: usize, axis: u32, value: f32) -> Self {
        InputSample::Axis {
            device,
            axis,
            value,
            timestamp: Local::now(),
        }
    }

    pub fn button(device: usize, button: u32, pressed: bool) -> Self {
        InputSample::Button {
            device,
            button,
            pressed,
            timestamp: Local::now(),
        }
    }
}

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub poll_interval: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(16),
        }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Collector thread error: {0}")]
    ThreadError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,
    settings: CollectorSettings,
    event_sender: mpsc::Sender<InputSample>,
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: CollectorSettings,
        event_sender: mpsc::Sender<InputSample>,
    ) -> Result<Self, CollectorError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => g,
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, settings, event_sender))
    }

    // List attached devices, then start collecting from all of them
    pub fn initialize(self) -> EventCollector<Collecting> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one to appear");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!(
                    "  [{}] ID: {}, Name: {}, UUID: {:?}",
                    idx,
                    id,
                    gamepad.name(),
                    gamepad.uuid()
                );
            }
        }

        self.transition()
    }
}

impl EventCollector<Collecting> {
    // Drain everything gilrs has buffered. Returns false once the receiver is gone.
    fn collect_pending(&mut self) -> bool {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            let Some(sample) = convert_gilrs_event(usize::from(id), event) else {
                continue;
            };
            if self.event_sender.blocking_send(sample).is_err() {
                info!("Input receiver dropped, stopping collection");
                return false;
            }
        }
        true
    }

    pub fn run_collection_loop(mut self, cancel: CancellationToken) {
        info!(
            "Starting Event Collector loop ({} ms poll)",
            self.settings.poll_interval.as_millis()
        );

        let mut sample_count: u64 = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(30);

        while !cancel.is_cancelled() {
            if !self.collect_pending() {
                break;
            }
            sample_count += 1;

            let now = Local::now();
            if now - last_log_time > log_interval {
                debug!("Event Collector alive, {} polls since last report", sample_count);
                sample_count = 0;
                last_log_time = now;
            }

            std::thread::sleep(self.settings.poll_interval);
        }

        info!("Event Collector stopped");
    }
}

// Owns the collector thread. gilrs lives entirely on that thread.
pub struct CollectorHandle {
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CollectorHandle {
    pub async fn spawn(
        settings: CollectorSettings,
        event_sender: mpsc::Sender<InputSample>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("gamepad-collector".to_string())
            .spawn(move || match EventCollector::create(settings, event_sender) {
                Ok(collector) => {
                    let _ = ready_tx.send(Ok(()));
                    collector.initialize().run_collection_loop(cancel);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CollectorError::ThreadError(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                info!("Event Collector successfully started");
                Ok(Self {
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CollectorError::ThreadError(
                "collector thread exited during startup".to_string(),
            )),
        }
    }

    // Blocks until the thread has seen the cancellation
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Event Collector thread panicked");
            }
        }
    }
}

fn convert_gilrs_event(device: usize, event: EventType) -> Option<InputSample> {
    match event {
        EventType::AxisChanged(axis, value, _) => {
            let Some(index) = map_axis(axis) else {
                debug!("Ignoring unsupported axis: {:?}", axis);
                return None;
            };
            Some(InputSample::axis(device, index, value))
        }
        EventType::ButtonPressed(button, _) => {
            map_button(button).map(|index| InputSample::button(device, index, true))
        }
        EventType::ButtonReleased(button, _) => {
            map_button(button).map(|index| InputSample::button(device, index, false))
        }
        EventType::Connected => {
            info!("Gamepad {} connected", device);
            None
        }
        EventType::Disconnected => {
            warn!("Gamepad {} disconnected", device);
            None
        }
        _ => None,
    }
}

// Standard gamepad layout axis indices
fn map_axis(axis: Axis) -> Option<u32> {
    match axis {
        Axis::LeftStickX => Some(0),
        Axis::LeftStickY => Some(1),
        Axis::RightStickX => Some(2),
        Axis::RightStickY => Some(3),
        Axis::LeftZ => Some(4),
        Axis::RightZ => Some(5),
        _ => None,
    }
}

// Standard gamepad layout button indices
fn map_button(button: Button) -> Option<u32> {
    match button {
        Button::South => Some(0),
        Button::East => Some(1),
        Button::West => Some(2),
        Button::North => Some(3),
        Button::LeftTrigger => Some(4),
        Button::RightTrigger => Some(5),
        Button::LeftTrigger2 => Some(6),
        Button::RightTrigger2 => Some(7),
        Button::Select => Some(8),
        Button::Start => Some(9),
        Button::LeftThumb => Some(10),
        Button::RightThumb => Some(11),
        Button::DPadUp => Some(12),
        Button::DPadDown => Some(13),
        Button::DPadLeft => Some(14),
        Button::DPadRight => Some(15),
        Button::Mode => Some(16),
        _ => None,
    }
}
