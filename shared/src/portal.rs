// Configuration Portal contract
// The portal collaborator is handed the current values, blocks until the user
// submits or it gives up, and the boot then ends in a restart. Whatever
// values come back are written in one store write.

use log::{error, info, warn};

use anyhow::{anyhow, Result};

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{ConfigStore, Configuration};
use crate::error::NodeError;

pub const PORTAL_AP_SSID: &str = "ClimateNode-Setup";
pub const PORTAL_TIMEOUT_SECS: u64 = 300;

const MAX_SSID_LEN: usize = 32;
const MIN_PASSPHRASE_LEN: usize = 8;
const MAX_PASSPHRASE_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq)]
pub enum PortalOutcome {
    Submitted(Configuration),
    Failed(String),
    TimedOut,
}

/// Access point + form collaborator
pub trait ConfigPortal {
    fn run(&mut self, current: &Configuration) -> PortalOutcome;
}

/// Secret field: absent or `""` keeps the stored value, `null` clears it
fn secret<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn merge_secret(stored: &mut String, update: Option<Option<String>>) {
    match update {
        Some(None) => stored.clear(),
        Some(Some(value)) if !value.is_empty() => *stored = value,
        _ => {}
    }
}

/// Form body sent by the portal page; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub wifi_ssid: Option<String>,
    #[serde(deserialize_with = "secret")]
    pub wifi_password: Option<Option<String>>,
    pub mqtt_host: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_user: Option<String>,
    #[serde(deserialize_with = "secret")]
    pub mqtt_password: Option<Option<String>>,
    pub topic_prefix: Option<String>,
    pub sleep_interval_secs: Option<u32>,
    pub contrast: Option<u8>,
    pub send_telemetry: Option<bool>,
}

impl ConfigUpdate {
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| anyhow!("Invalid configuration form: {}", e))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ssid) = &self.wifi_ssid {
            if ssid.len() > MAX_SSID_LEN {
                return Err(anyhow!("SSID must be at most {} bytes", MAX_SSID_LEN));
            }
        }
        if let Some(Some(pass)) = &self.wifi_password {
            if !pass.is_empty() && !(MIN_PASSPHRASE_LEN..=MAX_PASSPHRASE_LEN).contains(&pass.len()) {
                return Err(anyhow!(
                    "WiFi passphrase must be {}-{} characters",
                    MIN_PASSPHRASE_LEN,
                    MAX_PASSPHRASE_LEN
                ));
            }
        }
        if self.mqtt_port == Some(0) {
            return Err(anyhow!("MQTT port must be greater than 0"));
        }
        if self.sleep_interval_secs == Some(0) {
            return Err(anyhow!("Sleep interval must be greater than 0"));
        }
        Ok(())
    }

    /// Merge onto the current configuration
    pub fn apply(self, current: &Configuration) -> Configuration {
        let mut next = current.clone();

        if let Some(v) = self.wifi_ssid {
            next.wifi_ssid = v.trim().to_string();
        }
        merge_secret(&mut next.wifi_password, self.wifi_password);
        if let Some(v) = self.mqtt_host {
            next.mqtt_host = v.trim().to_string();
        }
        if let Some(v) = self.mqtt_port {
            next.mqtt_port = v;
        }
        if let Some(v) = self.mqtt_user {
            next.mqtt_user = v;
        }
        merge_secret(&mut next.mqtt_password, self.mqtt_password);
        if let Some(v) = self.topic_prefix {
            next.topic_prefix = v;
        }
        if let Some(v) = self.sleep_interval_secs {
            next.sleep_interval_secs = v;
        }
        if let Some(v) = self.contrast {
            next.contrast = v;
        }
        if let Some(v) = self.send_telemetry {
            next.send_telemetry = v;
        }

        next.sanitized()
    }
}

/// Values the portal page may show; secrets are never sent back
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub wifi_ssid: String,
    pub wifi_password_set: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password_set: bool,
    pub topic_prefix: String,
    pub sleep_interval_secs: u32,
    pub contrast: u8,
    pub send_telemetry: bool,
}

impl From<&Configuration> for ConfigView {
    fn from(config: &Configuration) -> Self {
        Self {
            wifi_ssid: config.wifi_ssid.clone(),
            wifi_password_set: !config.wifi_password.is_empty(),
            mqtt_host: config.mqtt_host.clone(),
            mqtt_port: config.mqtt_port,
            mqtt_user: config.mqtt_user.clone(),
            mqtt_password_set: !config.mqtt_password.is_empty(),
            topic_prefix: config.topic_prefix.clone(),
            sleep_interval_secs: config.sleep_interval_secs,
            contrast: config.contrast,
            send_telemetry: config.send_telemetry,
        }
    }
}

/// Drive the portal and persist its result. Returns the persist error, if
/// any; the caller restarts either way.
pub fn run_portal(
    portal: &mut dyn ConfigPortal,
    store: &mut dyn ConfigStore,
    current: &Configuration,
) -> Option<NodeError> {
    info!("🔧 Entering configuration portal ({})", PORTAL_AP_SSID);

    let chosen = match portal.run(current) {
        PortalOutcome::Submitted(config) => {
            info!("✅ Portal returned new configuration");
            config
        }
        PortalOutcome::Failed(reason) => {
            warn!("⚠️ Portal failed: {}, keeping current values", reason);
            current.clone()
        }
        PortalOutcome::TimedOut => {
            warn!("⚠️ Portal timed out, keeping current values");
            current.clone()
        }
    };

    let written = chosen.to_json().and_then(|json| store.persist(&json));
    match written {
        Ok(()) => {
            info!("💾 Configuration persisted");
            None
        }
        Err(e) => {
            error!("❌ Failed to persist configuration: {}", e);
            Some(NodeError::ConfigPersistFailure(e.to_string()))
        }
    }
}
