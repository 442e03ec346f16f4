// MQTT Client Module
// Plain-TCP broker session for one boot: connect, subscribe to the command
// topic, collect inbound messages, publish the retained snapshot.
// A receiver thread pumps the ESP-IDF connection into static Embassy
// channels so the boot task can poll without blocking.

// Import ESP-IDF MQTT client functionality
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, MqttClientConfiguration};

// Import MQTT event types
use embedded_svc::mqtt::client::{Details, EventPayload, QoS};

// Import Embassy sync primitives for coordination with the receiver thread
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

// Import logging macros for debug output with consistent emoji prefixes
use log::{debug, info, warn};

// Import anyhow for error handling following existing patterns
use anyhow::{anyhow, Result};

use std::thread;
use std::time::Duration;

use climate_node_shared::config::Configuration;
use climate_node_shared::sync::InboundMessage;

// Session tuning
const INBOUND_CAPACITY: usize = 8; // Messages buffered between polls
const MAX_PAYLOAD_BYTES: usize = 256; // Commands are a few bytes; drop anything larger
const RECEIVER_STACK_SIZE: usize = 6 * 1024;
const KEEP_ALIVE_SECS: u64 = 30;
const NETWORK_TIMEOUT_SECS: u64 = 5;

/// Connection-level events raised by the receiver thread
#[derive(Debug, Clone)]
enum BrokerEvent {
    Connected,
    Disconnected,
    Failed(String),
}

// Global coordination between the receiver thread and the boot task
static BROKER_EVENT: Signal<CriticalSectionRawMutex, BrokerEvent> = Signal::new();
static INBOUND: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_CAPACITY> =
    Channel::new();

fn credential(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn spawn_receiver(mut connection: EspMqttConnection) -> Result<()> {
    thread::Builder::new()
        .name("mqtt-rx".into())
        .stack_size(RECEIVER_STACK_SIZE)
        .spawn(move || {
            while let Ok(event) = connection.next() {
                match event.payload() {
                    EventPayload::Connected(_) => BROKER_EVENT.signal(BrokerEvent::Connected),
                    EventPayload::Disconnected => BROKER_EVENT.signal(BrokerEvent::Disconnected),
                    EventPayload::Error(e) => {
                        BROKER_EVENT.signal(BrokerEvent::Failed(format!("{:?}", e)))
                    }
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } => {
                        if data.len() > MAX_PAYLOAD_BYTES {
                            warn!("⚠️ Dropping {} byte message on {}", data.len(), topic);
                            continue;
                        }
                        let message = InboundMessage {
                            topic: topic.to_string(),
                            payload: data.to_vec(),
                        };
                        if INBOUND.try_send(message).is_err() {
                            warn!("⚠️ Inbound queue full, dropping message on {}", topic);
                        }
                    }
                    EventPayload::Subscribed(id) => debug!("📨 Subscription {} acknowledged", id),
                    _ => {}
                }
            }
            info!("📭 MQTT receiver finished");
        })
        .map_err(|e| anyhow!("Failed to spawn MQTT receiver: {}", e))?;
    Ok(())
}

/// One broker session; dropping it closes the connection
pub struct MqttSession {
    client: EspMqttClient<'static>,
    connected: bool,
}

impl MqttSession {
    /// Start the connection attempt; completion is observed via `poll_connected`
    pub fn connect(config: &Configuration, client_id: &str) -> Result<Self> {
        BROKER_EVENT.reset();
        while INBOUND.try_receive().is_ok() {}

        let broker_url = config.broker_url();
        info!("🔌 Connecting to MQTT broker {} as {}", broker_url, client_id);

        let mqtt_config = MqttClientConfiguration {
            client_id: Some(client_id),
            username: credential(&config.mqtt_user),
            password: credential(&config.mqtt_password),
            keep_alive_interval: Some(Duration::from_secs(KEEP_ALIVE_SECS)),
            network_timeout: Duration::from_secs(NETWORK_TIMEOUT_SECS),
            ..Default::default()
        };

        let (client, connection) = EspMqttClient::new(&broker_url, &mqtt_config)
            .map_err(|e| anyhow!("Failed to create MQTT client: {:?}", e))?;
        spawn_receiver(connection)?;

        Ok(Self {
            client,
            connected: false,
        })
    }

    /// `Ok(false)` while pending; any failure before the first CONNACK is final
    pub fn poll_connected(&mut self) -> Result<bool> {
        match BROKER_EVENT.try_take() {
            Some(BrokerEvent::Connected) => {
                info!("✅ MQTT connected");
                self.connected = true;
            }
            Some(BrokerEvent::Disconnected) if !self.connected => {
                return Err(anyhow!("broker closed the connection"));
            }
            Some(BrokerEvent::Disconnected) => {
                warn!("⚠️ MQTT connection lost");
                self.connected = false;
            }
            Some(BrokerEvent::Failed(reason)) if !self.connected => {
                return Err(anyhow!("broker connection failed: {}", reason));
            }
            Some(BrokerEvent::Failed(reason)) => warn!("⚠️ MQTT error: {}", reason),
            None => {}
        }
        Ok(self.connected)
    }

    pub fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| anyhow!("Failed to subscribe to {}: {:?}", topic, e))?;
        info!("📨 Subscribed to {}", topic);
        Ok(())
    }

    pub fn try_receive(&mut self) -> Option<InboundMessage> {
        INBOUND.try_receive().ok()
    }

    pub fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .map_err(|e| anyhow!("Failed to publish to {}: {:?}", topic, e))?;
        info!("📤 Published {} bytes to {} (retain={})", payload.len(), topic, retain);
        Ok(())
    }
}
