//! Command Synthesizer
//!
//! Emits exactly one [`CommandFrame`] per tick, decoupled from how bursty the
//! input stream is. Releasing both sticks yields an inactive all-zero motion
//! frame on the next tick, which the vehicle treats as hold position.

use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::controller::normalizer::{near_zero, ControlState};
use crate::vehicle::VehicleCommands;

/// One motion command for the vehicle. Never retained after sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CommandFrame {
    pub active: bool,
    pub roll: i32,
    pub pitch: i32,
    pub yaw: i32,
    pub vertical: i32,
}

impl CommandFrame {
    /// Inactive frame with every channel at zero
    pub fn hold() -> Self {
        Self::default()
    }

    /// Builds the frame for `state`. Motion is re-checked against the
    /// deadband because motion values may come from a source other than the
    /// axis normalizer.
    pub fn from_control(state: &ControlState, deadzone: i32) -> Self {
        let idle = near_zero(state.motion_x, deadzone) && near_zero(state.motion_y, deadzone);
        let (roll, pitch) = if idle {
            (0, 0)
        } else {
            (state.motion_x, state.motion_y)
        };
        Self {
            active: !idle,
            roll,
            pitch,
            yaw: state.side,
            vertical: state.up,
        }
    }
}

pub struct CommandSynthesizer {
    control: watch::Receiver<ControlState>,
    commands: Arc<dyn VehicleCommands>,
    deadzone: i32,
    interval: Duration,
    frames_sent: u64,
}

impl CommandSynthesizer {
    pub fn new(
        control: watch::Receiver<ControlState>,
        commands: Arc<dyn VehicleCommands>,
        deadzone: i32,
        interval: Duration,
    ) -> Self {
        Self {
            control,
            commands,
            deadzone,
            interval,
            frames_sent: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// One tick: read the latest control state, send one frame.
    pub fn tick(&mut self) -> CommandFrame {
        let state = *self.control.borrow();
        let frame = CommandFrame::from_control(&state, self.deadzone);
        trace!("Command frame: {:?}", frame);
        self.commands.apply_motion(frame);
        self.frames_sent += 1;
        frame
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "Starting command synthesizer with {} ms tick",
            self.interval.as_millis()
        );

        let mut interval_timer = tokio::time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_stats_time = Local::now();
        let mut frames_at_last_stats = 0;
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval_timer.tick() => {
                    self.tick();
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
                let frames = self.frames_sent - frames_at_last_stats;
                debug!(
                    "Command synthesizer stats: {} frames in {} seconds ({:.1}/sec)",
                    frames,
                    elapsed_seconds,
                    frames as f64 / elapsed_seconds as f64
                );
                frames_at_last_stats = self.frames_sent;
                last_stats_time = now;
            }
        }

        info!(
            "Command synthesizer stopped after {} frames",
            self.frames_sent
        );
    }
}
