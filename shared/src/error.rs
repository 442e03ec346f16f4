// Error taxonomy for one boot-to-sleep cycle
// Every variant is recoverable at the controller level: none of them may
// prevent the node from arming its wake sources and going back to sleep.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeError {
    SensorUnavailable(String),    // Climate sensor absent or read failed
    DisplayInitFailure(String),   // OLED did not respond on the bus
    WiFiConnectTimeout(u32),      // Station never came up within this many polls
    BrokerConnectFailure(String), // Broker refused or never acknowledged
    SubscribeFailure(String),     // Command topic subscription rejected
    PublishFailure(String),       // Telemetry publish rejected
    ConfigPersistFailure(String), // Durable configuration write failed
    NotConfigured(&'static str),  // Required network setting is empty
    Io(String),                   // Collaborator error that fits no other bucket
}

impl NodeError {
    /// Short text shown on the OLED status line
    pub fn status_text(&self) -> &'static str {
        match self {
            NodeError::SensorUnavailable(_) => "Sensor error",
            NodeError::DisplayInitFailure(_) => "Display error",
            NodeError::WiFiConnectTimeout(_) => "WiFi timeout",
            NodeError::BrokerConnectFailure(_) => "MQTT failed",
            NodeError::SubscribeFailure(_) => "MQTT failed",
            NodeError::PublishFailure(_) => "Publish failed",
            NodeError::ConfigPersistFailure(_) => "Save failed",
            NodeError::NotConfigured(_) => "Not configured",
            NodeError::Io(_) => "I/O error",
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::SensorUnavailable(e) => write!(f, "sensor unavailable: {}", e),
            NodeError::DisplayInitFailure(e) => write!(f, "display init failed: {}", e),
            NodeError::WiFiConnectTimeout(polls) => {
                write!(f, "wifi not connected after {} polls", polls)
            }
            NodeError::BrokerConnectFailure(e) => write!(f, "broker connect failed: {}", e),
            NodeError::SubscribeFailure(e) => write!(f, "subscribe failed: {}", e),
            NodeError::PublishFailure(e) => write!(f, "publish failed: {}", e),
            NodeError::ConfigPersistFailure(e) => write!(f, "config persist failed: {}", e),
            NodeError::NotConfigured(field) => write!(f, "{} is not configured", field),
            NodeError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}
