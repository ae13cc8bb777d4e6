//! Input Normalizer
//!
//! Turns raw device samples into the typed [`ControlState`] and discrete
//! [`ControlEvent`]s:
//!
//! ```text
//! InputSample::Axis   ──► scale ──► deadband ──► ControlState field (watch)
//! InputSample::Button ──► button table ──► ControlEvent (press edges only)
//! ```
//!
//! The normalizer owns the only `watch::Sender<ControlState>`, which makes it
//! the single writer of the control state. Readers hold receivers and look at
//! the latest value whenever they need it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::{debug, info};

use super::event_collector::InputSample;
use crate::config::InputConfig;
use crate::flight::mode::ModeCommand;

/// Normalized analog state, each value in control units (default ±100)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    pub motion_x: i32,
    pub motion_y: i32,
    /// Vertical throttle
    pub up: i32,
    /// Yaw rate
    pub side: i32,
}

/// Field of [`ControlState`] an axis feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisField {
    Side,
    Up,
    MotionX,
    MotionY,
}

impl AxisField {
    pub const ALL: [AxisField; 4] = [
        AxisField::Side,
        AxisField::Up,
        AxisField::MotionX,
        AxisField::MotionY,
    ];
}

/// What a mapped button does on its press edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ButtonAction {
    TiltUp,
    TiltDown,
    PanLeft,
    PanRight,
    CameraReset,
    ToggleFly,
    Emergency,
    ToggleRecord,
}

/// Discrete edge event produced from a button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Relative camera move in degrees
    CameraNudge { pan: i32, tilt: i32 },
    CameraReset,
    Mode(ModeCommand),
}

/// True when `value` lies strictly inside the deadband. Zero is always
/// inside, even with a deadzone of 0.
pub fn near_zero(value: i32, deadzone: i32) -> bool {
    let deadzone = deadzone.max(1);
    value > -deadzone && value < deadzone
}

pub struct InputNormalizer {
    scale: i32,
    deadzone: i32,
    camera_step: i32,
    axes: HashMap<u32, AxisField>,
    buttons: HashMap<u32, ButtonAction>,
    state_sender: watch::Sender<ControlState>,
}

impl InputNormalizer {
    /// Creates the normalizer and the receiver side of the control state.
    pub fn new(config: &InputConfig, camera_step: i32) -> (Self, watch::Receiver<ControlState>) {
        let (state_sender, state_receiver) = watch::channel(ControlState::default());

        let axes: HashMap<u32, AxisField> =
            config.axes.iter().map(|b| (b.index, b.field)).collect();
        let buttons: HashMap<u32, ButtonAction> =
            config.buttons.iter().map(|b| (b.index, b.action)).collect();

        info!(
            "Input normalizer: scale {}, deadzone ±{}, camera step {}°",
            config.scale, config.deadzone, camera_step
        );
        let mut axis_table: Vec<_> = axes.iter().collect();
        axis_table.sort_by_key(|(index, _)| **index);
        for (index, field) in axis_table {
            info!("  axis {:>2} -> {:?}", index, field);
        }
        let mut button_table: Vec<_> = buttons.iter().collect();
        button_table.sort_by_key(|(index, _)| **index);
        for (index, action) in button_table {
            info!("  button {:>2} -> {:?}", index, action);
        }

        (
            Self {
                scale: config.scale,
                deadzone: config.deadzone,
                camera_step,
                axes,
                buttons,
                state_sender,
            },
            state_receiver,
        )
    }

    /// Another reader of the control state
    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.state_sender.subscribe()
    }

    pub fn state(&self) -> ControlState {
        *self.state_sender.borrow()
    }

    /// Scales a raw device value and applies the deadband.
    ///
    /// Returns `None` for non-finite values or values outside [-1.0, 1.0].
    pub fn normalize_axis(&self, raw: f32) -> Option<i32> {
        if !raw.is_finite() || !(-1.0..=1.0).contains(&raw) {
            return None;
        }
        let scaled = (raw * self.scale as f32).trunc() as i32;
        if near_zero(scaled, self.deadzone) {
            Some(0)
        } else {
            Some(scaled)
        }
    }

    /// Applies one sample. Axis samples update the control state in place,
    /// press edges of mapped buttons come back as a [`ControlEvent`].
    pub fn handle(&mut self, sample: &InputSample) -> Option<ControlEvent> {
        match *sample {
            InputSample::Axis {
                device, axis, value, ..
            } => {
                let Some(field) = self.axes.get(&axis).copied() else {
                    debug!("Ignoring unmapped axis {} from device {}", axis, device);
                    return None;
                };
                let Some(normalized) = self.normalize_axis(value) else {
                    debug!(
                        "Ignoring malformed sample {} on axis {} from device {}",
                        value, axis, device
                    );
                    return None;
                };
                self.state_sender.send_if_modified(|state| {
                    let slot = match field {
                        AxisField::Side => &mut state.side,
                        AxisField::Up => &mut state.up,
                        AxisField::MotionX => &mut state.motion_x,
                        AxisField::MotionY => &mut state.motion_y,
                    };
                    if *slot == normalized {
                        false
                    } else {
                        *slot = normalized;
                        true
                    }
                });
                None
            }
            InputSample::Button {
                device,
                button,
                pressed,
                ..
            } => {
                if !pressed {
                    debug!("up {{ id: {}, num: {} }}", device, button);
                    return None;
                }
                debug!("down {{ id: {}, num: {} }}", device, button);
                let action = self.buttons.get(&button).copied()?;
                Some(self.resolve(action))
            }
        }
    }

    fn resolve(&self, action: ButtonAction) -> ControlEvent {
        let step = self.camera_step;
        match action {
            ButtonAction::TiltUp => ControlEvent::CameraNudge { pan: 0, tilt: step },
            ButtonAction::TiltDown => ControlEvent::CameraNudge { pan: 0, tilt: -step },
            ButtonAction::PanLeft => ControlEvent::CameraNudge { pan: -step, tilt: 0 },
            ButtonAction::PanRight => ControlEvent::CameraNudge { pan: step, tilt: 0 },
            ButtonAction::CameraReset => ControlEvent::CameraReset,
            ButtonAction::ToggleFly => ControlEvent::Mode(ModeCommand::ToggleFly),
            ButtonAction::Emergency => ControlEvent::Mode(ModeCommand::Emergency),
            ButtonAction::ToggleRecord => ControlEvent::Mode(ModeCommand::ToggleRecord),
        }
    }
}
