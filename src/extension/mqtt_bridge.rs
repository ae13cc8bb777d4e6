//! MQTT bridge extension
//!
//! Republishes every observer message to an MQTT broker so dashboards and
//! loggers can follow the flight without connecting to the cockpit itself.
//!
//! ```text
//! ObserverHub ──► bridge task ──try_publish──► <prefix>/movement
//!                                              <prefix>/phase
//!                                              <prefix>/battery
//!                                              <prefix>/notice
//! ```
//!
//! Payloads are JSON. Publishing uses `try_publish`, so a slow or absent
//! broker only costs dropped messages; the event loop keeps reconnecting in
//! the background.

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{Capabilities, Extension, ExtensionError};
use crate::config::MqttConfig;
use crate::telemetry::observers::ObserverMessage;

const CLIENT_CAPACITY: usize = 100;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct MqttBridge;

impl Extension for MqttBridge {
    fn name(&self) -> &'static str {
        "mqtt-bridge"
    }

    fn register(
        &self,
        capabilities: &Capabilities,
    ) -> Result<Option<JoinHandle<()>>, ExtensionError> {
        let config = capabilities.config().mqtt.clone();
        if config.host.trim().is_empty() {
            return Err(ExtensionError::Registration {
                name: self.name().to_string(),
                reason: "mqtt.host is empty".to_string(),
            });
        }

        let options = mqtt_options(&config);
        let (client, mut eventloop) = AsyncClient::new(options, CLIENT_CAPACITY);
        let mut subscription = capabilities.observers().subscribe();
        let cancel = capabilities.cancellation();
        let prefix = config.topic_prefix.clone();

        info!(
            "MQTT bridge publishing to {}:{} under {}/",
            config.host, config.port, prefix
        );

        let task = tokio::spawn(async move {
            let mut published: u64 = 0;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    notification = eventloop.poll() => match notification {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("MQTT bridge connected");
                        }
                        Ok(event) => trace!("MQTT event: {:?}", event),
                        Err(e) => {
                            warn!("MQTT connection error: {}", e);
                            tokio::time::sleep(RECONNECT_DELAY).await;
                        }
                    },
                    message = subscription.recv() => {
                        let Some(message) = message else { break };
                        if publish(&client, &prefix, &message) {
                            published += 1;
                        }
                    }
                }
            }
            if let Err(e) = client.try_disconnect() {
                debug!("MQTT disconnect: {}", e);
            }
            info!("MQTT bridge stopped after {} messages", published);
        });

        Ok(Some(task))
    }
}

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(1)));
    if let (Some(user), Some(password)) = (&config.user, &config.password) {
        options.set_credentials(user.clone(), password.clone());
    }
    options
}

fn publish(client: &AsyncClient, prefix: &str, message: &ObserverMessage) -> bool {
    let payload = match payload(message) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Unable to encode {} message: {}", message.topic(), e);
            return false;
        }
    };
    match client.try_publish(topic(prefix, message), QoS::AtMostOnce, false, payload) {
        Ok(()) => true,
        Err(e) => {
            debug!("Dropping {} message: {}", message.topic(), e);
            false
        }
    }
}

pub fn topic(prefix: &str, message: &ObserverMessage) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        message.topic().to_string()
    } else {
        format!("{}/{}", prefix, message.topic())
    }
}

/// JSON body without the topic wrapper
pub fn payload(message: &ObserverMessage) -> Result<Vec<u8>, serde_json::Error> {
    match message {
        ObserverMessage::Movement(snapshot) => serde_json::to_vec(snapshot),
        ObserverMessage::Phase(phase) => serde_json::to_vec(phase),
        ObserverMessage::Battery(level) => serde_json::to_vec(level),
        ObserverMessage::Notice(text) => serde_json::to_vec(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::aggregator::MovementSnapshot;
    use crate::vehicle::FlightPhase;

    #[test]
    fn topics_are_prefixed() {
        let message = ObserverMessage::Battery(40);
        assert_eq!(topic("cockpit", &message), "cockpit/battery");
        assert_eq!(topic("drone/1/", &message), "drone/1/battery");
        assert_eq!(topic("", &message), "battery");
    }

    #[test]
    fn movement_payload_is_a_json_object() {
        let snapshot = MovementSnapshot {
            roll: 0.5,
            pitch: -0.25,
            yaw: 90.0,
            altitude: 1.5,
            speed: 2.0,
        };
        let body = payload(&ObserverMessage::Movement(snapshot)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["yaw"], 90.0);
        assert_eq!(value["altitude"], 1.5);
        assert_eq!(value["pitch"], -0.25);
    }

    #[test]
    fn discrete_payloads_are_bare_values() {
        assert_eq!(
            payload(&ObserverMessage::Phase(FlightPhase::Hovering)).unwrap(),
            b"\"hovering\"".to_vec()
        );
        assert_eq!(payload(&ObserverMessage::Battery(73)).unwrap(), b"73".to_vec());
        assert_eq!(
            payload(&ObserverMessage::Notice("hi".to_string())).unwrap(),
            b"\"hi\"".to_vec()
        );
    }

    #[test]
    fn credentials_require_both_parts() {
        let mut config = MqttConfig::default();
        config.user = Some("pilot".to_string());
        let options = mqtt_options(&config);
        assert!(options.credentials().is_none());

        config.password = Some("secret".to_string());
        let options = mqtt_options(&config);
        assert!(options.credentials().is_some());
    }
}
