//! Load-time configuration
//!
//! Everything the core treats as a constant lives here: tick intervals, the
//! axis and button mapping tables, camera step and limits, observer channel
//! sizing and the list of enabled extensions. The file is TOML; every section
//! has defaults, but the file itself must exist. A missing or invalid file is
//! fatal at startup and never reloaded afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::controller::normalizer::{AxisField, ButtonAction};

pub const CONFIG_FILE_NAME: &str = "cockpit.toml";
pub const CONFIG_ENV: &str = "COCKPIT_CONFIG";
/// Same convention as the vehicle SDKs: overrides `vehicle.address`
pub const DRONE_IP_ENV: &str = "DEFAULT_DRONE_IP";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing config file {0}. Have a look at cockpit.example.toml if you need an example.")]
    Missing(PathBuf),

    #[error("Unable to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupted config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct CockpitConfig {
    pub logging: LoggingConfig,
    pub timing: TimingConfig,
    pub input: InputConfig,
    pub camera: CameraConfig,
    pub vehicle: VehicleConfig,
    pub observers: ObserverConfig,
    pub extensions: ExtensionsConfig,
    pub mqtt: MqttConfig,
    pub battery_watch: BatteryWatchConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Command frame interval. Well below human reaction time.
    pub command_tick_ms: u64,
    /// Movement snapshot broadcast interval
    pub broadcast_tick_ms: u64,
    /// Gamepad polling interval of the device collector
    pub input_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_tick_ms: 24,
            broadcast_tick_ms: 100,
            input_poll_ms: 16,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisBinding {
    pub index: u32,
    pub field: AxisField,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonBinding {
    pub index: u32,
    pub action: ButtonAction,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Multiplier from the device range [-1.0, 1.0] to control units
    pub scale: i32,
    /// Values strictly inside (-deadzone, deadzone) collapse to zero
    pub deadzone: i32,
    pub axes: Vec<AxisBinding>,
    pub buttons: Vec<ButtonBinding>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            scale: 100,
            deadzone: 20,
            axes: vec![
                AxisBinding {
                    index: 0,
                    field: AxisField::Side,
                },
                AxisBinding {
                    index: 1,
                    field: AxisField::Up,
                },
                AxisBinding {
                    index: 2,
                    field: AxisField::MotionX,
                },
                AxisBinding {
                    index: 3,
                    field: AxisField::MotionY,
                },
            ],
            buttons: vec![
                ButtonBinding {
                    index: 0,
                    action: ButtonAction::TiltUp,
                },
                ButtonBinding {
                    index: 1,
                    action: ButtonAction::TiltDown,
                },
                ButtonBinding {
                    index: 2,
                    action: ButtonAction::PanLeft,
                },
                ButtonBinding {
                    index: 3,
                    action: ButtonAction::PanRight,
                },
                ButtonBinding {
                    index: 4,
                    action: ButtonAction::ToggleFly,
                },
                ButtonBinding {
                    index: 5,
                    action: ButtonAction::Emergency,
                },
                ButtonBinding {
                    index: 8,
                    action: ButtonAction::CameraReset,
                },
                ButtonBinding {
                    index: 11,
                    action: ButtonAction::ToggleRecord,
                },
            ],
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub step_degrees: i32,
    pub limit_degrees: i32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            step_degrees: 3,
            limit_degrees: 180,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VehicleConfig {
    pub address: String,
    /// Buffer of the link's telemetry channel
    pub telemetry_capacity: usize,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.1".to_string(),
            telemetry_capacity: 64,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ObserverConfig {
    pub capacity: usize,
    /// Notice every observer receives when it joins
    pub welcome: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            welcome: "Welcome to cockpit :-)".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub enabled: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic_prefix: String,
    pub keep_alive_secs: u64,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "cockpit".to_string(),
            topic_prefix: "cockpit".to_string(),
            keep_alive_secs: 5,
            user: None,
            password: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BatteryWatchConfig {
    pub warn_percent: u8,
}

impl Default for BatteryWatchConfig {
    fn default() -> Self {
        Self { warn_percent: 20 }
    }
}

impl CockpitConfig {
    /// Resolves the config path: explicit argument, then `COCKPIT_CONFIG`,
    /// then the platform config directory.
    pub fn locate(explicit: Option<String>, env: Option<String>) -> PathBuf {
        if let Some(path) = explicit.or(env) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|dir| dir.join("cockpit").join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Reads, parses and validates the file. `drone_ip` is the value of
    /// `DEFAULT_DRONE_IP`, if set.
    pub fn load(path: &Path, drone_ip: Option<String>) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_overrides(drone_ip);
        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_overrides(&mut self, drone_ip: Option<String>) {
        if let Some(ip) = drone_ip.filter(|ip| !ip.trim().is_empty()) {
            info!("Vehicle address overridden by {}: {}", DRONE_IP_ENV, ip);
            self.vehicle.address = ip;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.max_log_level()?;

        if self.timing.command_tick_ms == 0
            || self.timing.broadcast_tick_ms == 0
            || self.timing.input_poll_ms == 0
        {
            return Err(ConfigError::Invalid(
                "tick intervals must be greater than zero".to_string(),
            ));
        }

        if self.input.scale <= 0 {
            return Err(ConfigError::Invalid("input.scale must be positive".to_string()));
        }
        // A deadzone of 0 would turn released sticks into an active frame
        if self.input.deadzone < 1 || self.input.deadzone >= self.input.scale {
            return Err(ConfigError::Invalid(format!(
                "input.deadzone must be within [1, {})",
                self.input.scale
            )));
        }

        let mut indices = HashSet::new();
        let mut fields = HashSet::new();
        for binding in &self.input.axes {
            if !indices.insert(binding.index) {
                return Err(ConfigError::Invalid(format!(
                    "axis {} is mapped twice",
                    binding.index
                )));
            }
            if !fields.insert(binding.field) {
                return Err(ConfigError::Invalid(format!(
                    "field {:?} is mapped to more than one axis",
                    binding.field
                )));
            }
        }
        if fields.len() != AxisField::ALL.len() {
            return Err(ConfigError::Invalid(
                "input.axes must map side, up, motion-x and motion-y".to_string(),
            ));
        }

        let mut buttons = HashSet::new();
        for binding in &self.input.buttons {
            if !buttons.insert(binding.index) {
                return Err(ConfigError::Invalid(format!(
                    "button {} is mapped twice",
                    binding.index
                )));
            }
        }

        if self.camera.step_degrees <= 0 || self.camera.limit_degrees <= 0 {
            return Err(ConfigError::Invalid(
                "camera step and limit must be positive".to_string(),
            ));
        }

        if self.observers.capacity == 0 || self.vehicle.telemetry_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel capacities must be greater than zero".to_string(),
            ));
        }

        let mut extensions = HashSet::new();
        for name in &self.extensions.enabled {
            if !extensions.insert(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "extension {} is enabled twice",
                    name
                )));
            }
        }

        if self.battery_watch.warn_percent > 100 {
            return Err(ConfigError::Invalid(
                "battery_watch.warn_percent is a percentage".to_string(),
            ));
        }

        Ok(())
    }

    pub fn max_log_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.logging.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {}", self.logging.level)))
    }

    pub fn command_tick(&self) -> Duration {
        Duration::from_millis(self.timing.command_tick_ms)
    }

    pub fn broadcast_tick(&self) -> Duration {
        Duration::from_millis(self.timing.broadcast_tick_ms)
    }

    pub fn input_poll(&self) -> Duration {
        Duration::from_millis(self.timing.input_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = CockpitConfig::from_toml_str("").unwrap();
        assert_eq!(config, CockpitConfig::default());
        assert_eq!(config.command_tick(), Duration::from_millis(24));
        assert_eq!(config.broadcast_tick(), Duration::from_millis(100));
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = CockpitConfig::from_toml_str(
            r#"
            [timing]
            command_tick_ms = 30

            [camera]
            step_degrees = 5

            [extensions]
            enabled = ["battery-watch"]
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.command_tick_ms, 30);
        assert_eq!(config.timing.broadcast_tick_ms, 100);
        assert_eq!(config.camera.step_degrees, 5);
        assert_eq!(config.camera.limit_degrees, 180);
        assert_eq!(config.extensions.enabled, vec!["battery-watch".to_string()]);
    }

    #[test]
    fn axis_table_parses_from_toml() {
        let config = CockpitConfig::from_toml_str(
            r#"
            [input]
            axes = [
                { index = 1, field = "side" },
                { index = 0, field = "up" },
                { index = 3, field = "motion-x" },
                { index = 2, field = "motion-y" },
            ]
            buttons = [ { index = 7, action = "emergency" } ]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.input.axes[2].field, AxisField::MotionX);
        assert_eq!(config.input.buttons[0].action, ButtonAction::Emergency);
    }

    #[test]
    fn zero_tick_is_rejected() {
        let mut config = CockpitConfig::default();
        config.timing.broadcast_tick_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn duplicate_axis_field_is_rejected() {
        let mut config = CockpitConfig::default();
        config.input.axes[0].field = AxisField::Up;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_axis_field_is_rejected() {
        let mut config = CockpitConfig::default();
        config.input.axes.pop();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn deadzone_must_stay_below_scale() {
        let mut config = CockpitConfig::default();
        config.input.deadzone = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_deadzone_is_rejected() {
        let mut config = CockpitConfig::default();
        config.input.deadzone = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.input.deadzone = 1;
        config.validate().unwrap();
    }

    #[test]
    fn extension_enabled_twice_is_rejected() {
        let config = CockpitConfig::from_toml_str(
            "[extensions]\nenabled = [\"battery-watch\", \"battery-watch\"]\n",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = CockpitConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            CockpitConfig::from_toml_str("[timing\ncommand_tick_ms = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_fatal() {
        let path = std::env::temp_dir().join("cockpit-does-not-exist.toml");
        assert!(matches!(
            CockpitConfig::load(&path, None),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn drone_ip_override_replaces_address() {
        let mut config = CockpitConfig::default();
        config.apply_overrides(Some("10.1.2.3".to_string()));
        assert_eq!(config.vehicle.address, "10.1.2.3");

        config.apply_overrides(Some("  ".to_string()));
        assert_eq!(config.vehicle.address, "10.1.2.3");
    }

    #[test]
    fn shipped_example_is_valid() {
        let config = CockpitConfig::from_toml_str(include_str!("../cockpit.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.input, InputConfig::default());
        assert_eq!(config.extensions.enabled, vec!["battery-watch".to_string()]);
    }

    #[test]
    fn explicit_path_wins() {
        let path = CockpitConfig::locate(Some("a.toml".into()), Some("b.toml".into()));
        assert_eq!(path, PathBuf::from("a.toml"));
        let path = CockpitConfig::locate(None, Some("b.toml".into()));
        assert_eq!(path, PathBuf::from("b.toml"));
    }
}
