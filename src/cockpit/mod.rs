//! Core lifecycle
//!
//! ```text
//! Cockpit<Assembling> ──install_extensions()──► Cockpit<Assembling>
//!         │
//!       start()      spawns input loop, command tick, aggregator, broadcast tick
//!         ▼
//! Cockpit<Running> ──shutdown()──► Cockpit<Stopped>
//! ```
//!
//! Extensions can only be installed while assembling; a running core has no
//! method for it.

pub mod input_loop;
pub mod subscriptions;


use statum::{machine, state};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use self::input_loop::InputLoop;
use self::subscriptions::Subscriptions;
use crate::config::{CockpitConfig, ConfigError};
use crate::controller::event_collector::{CollectorError, InputSample};
use crate::controller::normalizer::{ControlState, InputNormalizer};
use crate::extension::{Capabilities, ExtensionError, ExtensionRegistry};
use crate::flight::camera::CameraController;
use crate::flight::command_synthesizer::CommandSynthesizer;
use crate::flight::mode::{ModeState, ModeStateMachine};
use crate::telemetry::aggregator::{MovementSnapshot, TelemetryAggregator};
use crate::telemetry::broadcaster::SnapshotBroadcaster;
use crate::telemetry::observers::ObserverHub;
use crate::vehicle::{TelemetrySource, VehicleCommands};

#[derive(Debug, thiserror::Error)]
pub enum CockpitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error("Gamepad input unavailable: {0}")]
    Collector(#[from] CollectorError),
}

#[state]
#[derive(Debug, Clone)]
pub enum LifecycleState {
    Assembling,
    Running,
    Stopped,
}

/// Components built at assembly, moved into their tasks by `start()`
pub struct CoreParts {
    input: mpsc::Receiver<InputSample>,
    input_loop: InputLoop,
    synthesizer: CommandSynthesizer,
    aggregator: TelemetryAggregator,
    broadcaster: SnapshotBroadcaster,
}

#[machine]
pub struct Cockpit<S: LifecycleState> {
    config: Arc<CockpitConfig>,
    commands: Arc<dyn VehicleCommands>,
    telemetry: Arc<dyn TelemetrySource>,
    observers: ObserverHub,
    registry: ExtensionRegistry,
    subscriptions: Subscriptions,
    root: CancellationToken,
    parts: Option<CoreParts>,
    control: watch::Receiver<ControlState>,
    modes: watch::Receiver<ModeState>,
    snapshot: watch::Receiver<MovementSnapshot>,
}

impl<S: LifecycleState> Cockpit<S> {
    pub fn config(&self) -> &CockpitConfig {
        &self.config
    }

    /// Observer side of the core
    pub fn observers(&self) -> ObserverHub {
        self.observers.clone()
    }

    pub fn control(&self) -> watch::Receiver<ControlState> {
        self.control.clone()
    }

    pub fn modes(&self) -> watch::Receiver<ModeState> {
        self.modes.clone()
    }

    pub fn snapshot(&self) -> watch::Receiver<MovementSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscription_names(&self) -> Vec<&str> {
        self.subscriptions.names()
    }
}

impl Cockpit<Assembling> {
    /// Wires every core component against the given link and input stream.
    /// Nothing runs until [`Cockpit::start`].
    pub fn assemble(
        config: CockpitConfig,
        commands: Arc<dyn VehicleCommands>,
        telemetry: Arc<dyn TelemetrySource>,
        input: mpsc::Receiver<InputSample>,
        registry: ExtensionRegistry,
    ) -> Self {
        let config = Arc::new(config);
        let observers = ObserverHub::new(
            config.observers.capacity,
            config.observers.welcome.clone(),
        );

        let (normalizer, control) =
            InputNormalizer::new(&config.input, config.camera.step_degrees);
        let (input_loop, modes) = InputLoop::new(
            normalizer,
            ModeStateMachine::new(Arc::clone(&commands)),
            CameraController::new(config.camera.limit_degrees, Arc::clone(&commands)),
        );
        let synthesizer = CommandSynthesizer::new(
            control.clone(),
            Arc::clone(&commands),
            config.input.deadzone,
            config.command_tick(),
        );
        let (aggregator, snapshot) = TelemetryAggregator::new(observers.clone());
        let broadcaster =
            SnapshotBroadcaster::new(snapshot.clone(), observers.clone(), config.broadcast_tick());

        let root = CancellationToken::new();
        let parts = CoreParts {
            input,
            input_loop,
            synthesizer,
            aggregator,
            broadcaster,
        };

        info!("Cockpit assembled");
        Self::new(
            config,
            commands,
            telemetry,
            observers,
            registry,
            Subscriptions::new(root.clone()),
            root,
            Some(parts),
            control,
            modes,
            snapshot,
        )
    }

    /// Registers the extensions listed in `extensions.enabled`.
    pub fn install_extensions(mut self) -> Result<Self, CockpitError> {
        let enabled = self.config.extensions.enabled.clone();
        if enabled.is_empty() {
            info!("No extensions enabled");
            return Ok(self);
        }
        let capabilities = Capabilities::new(
            Arc::clone(&self.commands),
            Arc::clone(&self.telemetry),
            self.observers.clone(),
            Arc::clone(&self.config),
            self.root.clone(),
        );
        for installed in self.registry.install(&enabled, &capabilities)? {
            self.subscriptions
                .adopt(installed.name, installed.cancel, installed.task);
        }
        Ok(self)
    }

    pub fn start(mut self) -> Cockpit<Running> {
        let Some(parts) = self.parts.take() else {
            warn!("Core tasks already handed out");
            return self.transition();
        };
        let CoreParts {
            input,
            input_loop,
            synthesizer,
            aggregator,
            broadcaster,
        } = parts;
        let telemetry = self.telemetry.subscribe();

        self.subscriptions
            .spawn("input", move |cancel| input_loop.run(input, cancel));
        self.subscriptions
            .spawn("command-tick", move |cancel| synthesizer.run(cancel));
        self.subscriptions
            .spawn("telemetry", move |cancel| aggregator.run(telemetry, cancel));
        self.subscriptions
            .spawn("broadcast-tick", move |cancel| broadcaster.run(cancel));

        info!(
            "Cockpit running ({} subscriptions)",
            self.subscriptions.len()
        );
        self.transition()
    }
}

impl Cockpit<Running> {
    /// Stops a single task by name, leaving the rest of the core running.
    pub fn cancel_subscription(&self, name: &str) -> bool {
        self.subscriptions.cancel(name)
    }

    pub async fn shutdown(mut self) -> Cockpit<Stopped> {
        info!("Shutting down cockpit");
        self.subscriptions.shutdown().await;
        self.transition()
    }
}

impl Cockpit<Stopped> {
    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }
}
