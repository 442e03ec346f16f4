// Durable Configuration
// Settings that survive power loss. The whole structure is stored as one JSON
// document under one key so a single store write is the batch: either the old
// document or the new one is present, never a mix.

use log::{info, warn};

use anyhow::{anyhow, Result};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC_PREFIX: &str = "climate-node";
pub const DEFAULT_SLEEP_INTERVAL_SECS: u32 = 60;
pub const DEFAULT_CONTRAST: u8 = 1;
pub const DEFAULT_SEND_TELEMETRY: bool = true;

const COMMAND_TOPIC_SUFFIX: &str = "display/set";
const TELEMETRY_TOPIC_SUFFIX: &str = "sensor";

/// Node configuration; any field missing from the stored document takes its default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub wifi_ssid: String,        // Station network name
    pub wifi_password: String,    // Station passphrase
    pub mqtt_host: String,        // Broker host name or IP
    pub mqtt_port: u16,           // Broker TCP port
    pub mqtt_user: String,        // Broker user (empty = anonymous)
    pub mqtt_password: String,    // Broker password
    pub topic_prefix: String,     // Prefix for command and telemetry topics
    pub sleep_interval_secs: u32, // Timer wake interval
    pub contrast: u8,             // SSD1306 contrast register value
    pub send_telemetry: bool,     // Whether to run the network sync at all
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            mqtt_host: String::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_user: String::new(),
            mqtt_password: String::new(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            sleep_interval_secs: DEFAULT_SLEEP_INTERVAL_SECS,
            contrast: DEFAULT_CONTRAST,
            send_telemetry: DEFAULT_SEND_TELEMETRY,
        }
    }
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: Configuration = serde_json::from_str(json)
            .map_err(|e| anyhow!("Failed to parse stored configuration: {}", e))?;
        Ok(parsed.sanitized())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| anyhow!("Failed to serialize configuration: {}", e))
    }

    /// Replace values that cannot be honoured with their defaults
    pub fn sanitized(mut self) -> Self {
        if self.sleep_interval_secs == 0 {
            warn!(
                "⚠️ Stored sleep interval is 0, using default {}s",
                DEFAULT_SLEEP_INTERVAL_SECS
            );
            self.sleep_interval_secs = DEFAULT_SLEEP_INTERVAL_SECS;
        }
        if self.mqtt_port == 0 {
            warn!("⚠️ Stored MQTT port is 0, using default {}", DEFAULT_MQTT_PORT);
            self.mqtt_port = DEFAULT_MQTT_PORT;
        }
        let prefix = self.topic_prefix.trim().trim_end_matches('/');
        self.topic_prefix = if prefix.is_empty() {
            DEFAULT_TOPIC_PREFIX.to_string()
        } else {
            prefix.to_string()
        };
        self
    }

    pub fn command_topic(&self) -> String {
        format!("{}/{}", self.topic_prefix, COMMAND_TOPIC_SUFFIX)
    }

    pub fn telemetry_topic(&self) -> String {
        format!("{}/{}", self.topic_prefix, TELEMETRY_TOPIC_SUFFIX)
    }

    pub fn broker_url(&self) -> String {
        format!("mqtt://{}:{}", self.mqtt_host, self.mqtt_port)
    }

    pub fn has_network(&self) -> bool {
        !self.wifi_ssid.is_empty() && !self.mqtt_host.is_empty()
    }
}

/// Backing store for the configuration document
///
/// `load` opens the store read-only. `persist` is the only write path and is
/// called from the configuration portal, immediately before restart.
pub trait ConfigStore {
    fn load(&mut self) -> Result<Option<String>>;
    fn persist(&mut self, json: &str) -> Result<()>;
}

/// Resolve the durable configuration. Never fails: absent or unreadable
/// documents yield the defaults.
pub fn load_config(store: &mut dyn ConfigStore) -> Configuration {
    match store.load() {
        Ok(Some(json)) => match Configuration::from_json(&json) {
            Ok(config) => {
                info!(
                    "✅ Configuration loaded: sleep={}s contrast={} telemetry={}",
                    config.sleep_interval_secs, config.contrast, config.send_telemetry
                );
                config
            }
            Err(e) => {
                warn!("⚠️ {}, using defaults", e);
                Configuration::default()
            }
        },
        Ok(None) => {
            info!("📭 No stored configuration, using defaults");
            Configuration::default()
        }
        Err(e) => {
            warn!("⚠️ Could not read configuration store: {}, using defaults", e);
            Configuration::default()
        }
    }
}
