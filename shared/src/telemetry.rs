// Telemetry and command payloads exchanged with the broker

use anyhow::{anyhow, Result};

use serde::Serialize;

use crate::retention::RetentionState;

/// Retained sensor message published once per sync
///
/// Readings are rounded values, written as the shortest JSON number that
/// round-trips, so whole volts come out as `4.0` rather than `4.00`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub temperature: f32,       // 1 decimal
    pub humidity: f32,          // 1 decimal
    pub voltage: f32,           // 2 decimals
    pub display_status: &'static str,
    pub boot_count: String,     // Integer rendered as a string
}

fn round_to(value: f32, scale: f32) -> f32 {
    (value * scale).round() / scale
}

impl TelemetrySnapshot {
    pub fn from_state(state: &RetentionState) -> Self {
        Self {
            temperature: round_to(state.last_temperature_c, 10.0),
            humidity: round_to(state.last_humidity_pct, 10.0),
            voltage: round_to(state.last_battery_voltage, 100.0),
            display_status: if state.display_enabled { "ON" } else { "OFF" },
            boot_count: state.boot_count.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| anyhow!("Failed to serialize telemetry: {}", e))
    }
}

/// Remote display command received on `<prefix>/display/set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    On,
    Off,
}

impl DisplayCommand {
    /// Unrecognised payloads yield `None` and must not change state
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?.trim();
        if ["ON", "1", "true"].iter().any(|p| text.eq_ignore_ascii_case(p)) {
            Some(DisplayCommand::On)
        } else if ["OFF", "0", "false"].iter().any(|p| text.eq_ignore_ascii_case(p)) {
            Some(DisplayCommand::Off)
        } else {
            None
        }
    }

    pub fn enabled(self) -> bool {
        self == DisplayCommand::On
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_to_exact_payload() {
        let state = RetentionState {
            display_enabled: true,
            boot_count: 7,
            last_temperature_c: 21.4,
            last_humidity_pct: 55.2,
            last_battery_voltage: 3.87,
            ..RetentionState::new()
        };

        let json = TelemetrySnapshot::from_state(&state).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"temperature":21.4,"humidity":55.2,"voltage":3.87,"display_status":"ON","boot_count":"7"}"#
        );
    }

    #[test]
    fn snapshot_rounds_raw_readings() {
        let state = RetentionState {
            display_enabled: false,
            boot_count: 120,
            last_temperature_c: 19.96,
            last_humidity_pct: 40.04,
            last_battery_voltage: 4.0149,
            ..RetentionState::new()
        };

        let json = TelemetrySnapshot::from_state(&state).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"temperature":20.0,"humidity":40.0,"voltage":4.01,"display_status":"OFF","boot_count":"120"}"#
        );
    }

    #[test]
    fn whole_readings_use_shortest_number_form() {
        let state = RetentionState {
            boot_count: 1,
            last_temperature_c: 20.0,
            last_humidity_pct: 50.0,
            last_battery_voltage: 3.999,
            ..RetentionState::new()
        };

        let json = TelemetrySnapshot::from_state(&state).to_json().unwrap();
        assert!(json.contains(r#""voltage":4.0,"#));
        assert!(json.contains(r#""temperature":20.0,"#));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["voltage"].as_f64(), Some(4.0));
    }

    #[test]
    fn command_payloads() {
        for on in ["ON", "1", "true", "on", " True\n"] {
            assert_eq!(DisplayCommand::parse(on.as_bytes()), Some(DisplayCommand::On));
        }
        for off in ["OFF", "0", "false", "Off"] {
            assert_eq!(DisplayCommand::parse(off.as_bytes()), Some(DisplayCommand::Off));
        }
        for junk in ["", "toggle", "2", "ONN"] {
            assert_eq!(DisplayCommand::parse(junk.as_bytes()), None);
        }
        assert_eq!(DisplayCommand::parse(&[0xFF, 0xFE]), None);
    }
}
