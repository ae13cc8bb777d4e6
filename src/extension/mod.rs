//! Extension Registry
//!
//! Optional feature modules build on the core through an explicit
//! [`Capabilities`] value instead of reaching into shared state:
//!
//! ```text
//! Capabilities
//! ├── commands()     vehicle command sink
//! ├── telemetry()    vehicle telemetry source
//! ├── observers()    observer broadcast hub
//! ├── config()       active configuration (read-only)
//! └── cancellation() token cancelled when the core shuts down
//! ```
//!
//! Extensions are installed once, before the core starts ticking. A task an
//! extension spawns is handed back to the core, which cancels and joins it on
//! shutdown. The core runs identically with no extensions at all.

pub mod battery_watch;
pub mod mqtt_bridge;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::CockpitConfig;
use crate::telemetry::observers::ObserverHub;
use crate::vehicle::{TelemetrySource, VehicleCommands};

#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("Unknown extension: {0}")]
    Unknown(String),

    #[error("Extension {name} failed to register: {reason}")]
    Registration { name: String, reason: String },
}

/// Read-only view of the shared resources an extension may use
#[derive(Clone)]
pub struct Capabilities {
    commands: Arc<dyn VehicleCommands>,
    telemetry: Arc<dyn TelemetrySource>,
    observers: ObserverHub,
    config: Arc<CockpitConfig>,
    cancel: CancellationToken,
}

impl Capabilities {
    pub fn new(
        commands: Arc<dyn VehicleCommands>,
        telemetry: Arc<dyn TelemetrySource>,
        observers: ObserverHub,
        config: Arc<CockpitConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            commands,
            telemetry,
            observers,
            config,
            cancel,
        }
    }

    pub fn commands(&self) -> Arc<dyn VehicleCommands> {
        Arc::clone(&self.commands)
    }

    pub fn telemetry(&self) -> Arc<dyn TelemetrySource> {
        Arc::clone(&self.telemetry)
    }

    pub fn observers(&self) -> ObserverHub {
        self.observers.clone()
    }

    pub fn config(&self) -> &CockpitConfig {
        &self.config
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // Same resources, own cancellation scope
    fn scoped(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }
}

pub trait Extension: Send + Sync {
    /// Name used in `extensions.enabled`
    fn name(&self) -> &'static str;

    /// Wires the extension up. Long-running work goes into the returned
    /// task, which must stop when `capabilities.cancellation()` fires.
    fn register(&self, capabilities: &Capabilities)
        -> Result<Option<JoinHandle<()>>, ExtensionError>;
}

/// An extension that has been registered
pub struct InstalledExtension {
    pub name: String,
    pub cancel: CancellationToken,
    pub task: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct ExtensionRegistry {
    available: Vec<Box<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.add(Box::new(mqtt_bridge::MqttBridge));
        registry.add(Box::new(battery_watch::BatteryWatch));
        registry
    }

    pub fn add(&mut self, extension: Box<dyn Extension>) {
        debug!("Extension available: {}", extension.name());
        self.available.retain(|e| e.name() != extension.name());
        self.available.push(extension);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.available.iter().map(|e| e.name()).collect()
    }

    fn find(&self, name: &str) -> Option<&dyn Extension> {
        self.available
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    /// Registers every extension in `enabled`, in order. All names are
    /// checked before anything is registered.
    pub fn install(
        &self,
        enabled: &[String],
        capabilities: &Capabilities,
    ) -> Result<Vec<InstalledExtension>, ExtensionError> {
        if let Some(unknown) = enabled.iter().find(|name| self.find(name).is_none()) {
            return Err(ExtensionError::Unknown(unknown.clone()));
        }

        let mut installed: Vec<InstalledExtension> = Vec::with_capacity(enabled.len());
        for name in enabled {
            let Some(extension) = self.find(name) else {
                continue;
            };
            info!("Loading {} extension.", name);
            let scoped = capabilities.scoped();
            let task = match extension.register(&scoped) {
                Ok(task) => task,
                Err(e) => {
                    // Roll back what was already started
                    for done in &installed {
                        done.cancel.cancel();
                    }
                    return Err(e);
                }
            };
            installed.push(InstalledExtension {
                name: name.clone(),
                cancel: scoped.cancellation(),
                task,
            });
        }
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::recording::{Command, RecordingLink};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn capabilities(link: &RecordingLink) -> Capabilities {
        Capabilities::new(
            Arc::new(link.clone()),
            Arc::new(link.clone()),
            ObserverHub::new(8, "hi"),
            Arc::new(CockpitConfig::default()),
            CancellationToken::new(),
        )
    }

    struct Counting(Arc<AtomicUsize>);

    impl Extension for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn register(
            &self,
            capabilities: &Capabilities,
        ) -> Result<Option<JoinHandle<()>>, ExtensionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            capabilities.commands().start_recording();
            Ok(None)
        }
    }

    struct Failing;

    impl Extension for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn register(&self, _: &Capabilities) -> Result<Option<JoinHandle<()>>, ExtensionError> {
            Err(ExtensionError::Registration {
                name: "failing".to_string(),
                reason: "nope".to_string(),
            })
        }
    }

    #[test]
    fn builtins_are_listed() {
        let names = ExtensionRegistry::with_builtins().names();
        assert!(names.contains(&"mqtt-bridge"));
        assert!(names.contains(&"battery-watch"));
    }

    #[test]
    fn nothing_enabled_installs_nothing() {
        let link = RecordingLink::new();
        let installed = ExtensionRegistry::with_builtins()
            .install(&[], &capabilities(&link))
            .unwrap();
        assert!(installed.is_empty());
    }

    #[test]
    fn unknown_name_is_rejected_before_registering_anything() {
        let link = RecordingLink::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = ExtensionRegistry::empty();
        registry.add(Box::new(Counting(count.clone())));

        let result = registry.install(
            &["counting".to_string(), "jetpack".to_string()],
            &capabilities(&link),
        );
        assert!(matches!(result, Err(ExtensionError::Unknown(name)) if name == "jetpack"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn extensions_reach_the_vehicle_through_capabilities() {
        let link = RecordingLink::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = ExtensionRegistry::empty();
        registry.add(Box::new(Counting(count.clone())));

        let installed = registry
            .install(&["counting".to_string()], &capabilities(&link))
            .unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].name, "counting");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(link.commands(), vec![Command::StartRecording]);
    }

    #[test]
    fn each_extension_gets_a_child_token() {
        let link = RecordingLink::new();
        let caps = capabilities(&link);
        let mut registry = ExtensionRegistry::empty();
        registry.add(Box::new(Counting(Arc::new(AtomicUsize::new(0)))));

        let installed = registry.install(&["counting".to_string()], &caps).unwrap();
        installed[0].cancel.cancel();
        assert!(!caps.cancellation().is_cancelled());

        caps.cancellation().cancel();
        assert!(installed[0].cancel.is_cancelled());
    }

    #[test]
    fn failed_registration_is_reported() {
        let link = RecordingLink::new();
        let mut registry = ExtensionRegistry::empty();
        registry.add(Box::new(Failing));
        assert!(matches!(
            registry.install(&["failing".to_string()], &capabilities(&link)),
            Err(ExtensionError::Registration { .. })
        ));
    }
}
