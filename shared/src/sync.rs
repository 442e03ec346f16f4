// Network Sync Session
// WiFi -> broker -> subscribe -> listen window -> retained publish, each step
// on a fixed budget. The listen window runs before the publish so a retained
// display command is seen before the node reports and goes back to sleep.

use log::{debug, info, warn};

use crate::clock::{poll_until, run_window, Clock, PollBudget};
use crate::config::Configuration;
use crate::error::NodeError;
use crate::retention::RetentionState;
use crate::telemetry::{DisplayCommand, TelemetrySnapshot};

pub const WIFI_BUDGET: PollBudget = PollBudget::new(20, 500);
pub const BROKER_BUDGET: PollBudget = PollBudget::new(50, 100);
pub const LISTEN_TICKS: u32 = 20;
pub const LISTEN_TICK_MS: u32 = 100;
pub const FLUSH_TICKS: u32 = 5;
pub const FLUSH_TICK_MS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Radio and MQTT client as seen by the sync protocol
pub trait NetworkSession {
    /// Configure station mode and issue the connect; must not block
    fn begin_wifi(&mut self, ssid: &str, password: &str) -> Result<(), NodeError>;
    fn wifi_connected(&mut self) -> bool;

    /// Start one broker connection attempt; must not block
    fn connect_broker(&mut self, config: &Configuration) -> Result<(), NodeError>;
    /// `Ok(false)` while pending, `Err` when the broker refused
    fn broker_connected(&mut self) -> Result<bool, NodeError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), NodeError>;
    /// Next message delivered since the last call, if any
    fn poll_inbound(&mut self) -> Option<InboundMessage>;
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), NodeError>;

    /// Tear down broker and radio; always called at session end
    fn shutdown(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub result: Result<(), NodeError>,
    pub display_changed: bool,
    pub commands_applied: u32,
}

/// Drain inbound messages, applying display commands in arrival order
fn drain_commands(
    net: &mut dyn NetworkSession,
    command_topic: &str,
    state: &mut RetentionState,
) -> u32 {
    let mut applied = 0;
    while let Some(message) = net.poll_inbound() {
        if message.topic != command_topic {
            debug!("📭 Ignoring message on {}", message.topic);
            continue;
        }
        match DisplayCommand::parse(&message.payload) {
            Some(command) => {
                info!("📨 Display command {:?} received", command);
                state.display_enabled = command.enabled();
                applied += 1;
            }
            None => warn!(
                "⚠️ Unrecognised display command payload ({} bytes) ignored",
                message.payload.len()
            ),
        }
    }
    applied
}

fn run_steps(
    net: &mut dyn NetworkSession,
    clock: &mut dyn Clock,
    config: &Configuration,
    state: &mut RetentionState,
    applied: &mut u32,
) -> Result<(), NodeError> {
    if config.wifi_ssid.is_empty() {
        return Err(NodeError::NotConfigured("wifi ssid"));
    }
    if config.mqtt_host.is_empty() {
        return Err(NodeError::NotConfigured("mqtt host"));
    }

    info!("📶 Connecting to WiFi network: {}", config.wifi_ssid);
    net.begin_wifi(&config.wifi_ssid, &config.wifi_password)?;
    if poll_until(clock, WIFI_BUDGET, || net.wifi_connected()).is_none() {
        return Err(NodeError::WiFiConnectTimeout(WIFI_BUDGET.max_polls));
    }
    info!("✅ WiFi connected");

    info!("🔌 Connecting to broker {}", config.broker_url());
    net.connect_broker(config)
        .map_err(|e| NodeError::BrokerConnectFailure(e.to_string()))?;
    let mut refused = None;
    let connected = poll_until(clock, BROKER_BUDGET, || match net.broker_connected() {
        Ok(up) => up,
        Err(e) => {
            refused.get_or_insert(e);
            // Refusal is final for this session; stop polling
            true
        }
    });
    if let Some(e) = refused {
        return Err(NodeError::BrokerConnectFailure(e.to_string()));
    }
    if connected.is_none() {
        return Err(NodeError::BrokerConnectFailure(format!(
            "no acknowledgement within {} ms",
            BROKER_BUDGET.total_ms()
        )));
    }
    info!("✅ Broker connected");

    let command_topic = config.command_topic();
    net.subscribe(&command_topic)
        .map_err(|e| NodeError::SubscribeFailure(e.to_string()))?;
    info!("📨 Subscribed to {}", command_topic);

    run_window(clock, LISTEN_TICKS, LISTEN_TICK_MS, |_| {
        *applied += drain_commands(net, &command_topic, state);
    });

    let payload = TelemetrySnapshot::from_state(state)
        .to_json()
        .map_err(|e| NodeError::PublishFailure(e.to_string()))?;
    let telemetry_topic = config.telemetry_topic();
    net.publish(&telemetry_topic, payload.as_bytes(), true)
        .map_err(|e| NodeError::PublishFailure(e.to_string()))?;
    info!("📤 Published telemetry to {}: {}", telemetry_topic, payload);

    // Give the client time to hand the retained message to the broker.
    // Commands arriving now wait for the next boot so the published snapshot
    // matches the state the node sleeps with.
    run_window(clock, FLUSH_TICKS, FLUSH_TICK_MS, |_| {
        while let Some(message) = net.poll_inbound() {
            debug!("📭 Message on {} after publish left for next boot", message.topic);
        }
    });

    Ok(())
}

/// Run one bounded sync. Failures end the session only; the caller always
/// proceeds to sleep with whatever state is current.
pub fn run_sync(
    net: &mut dyn NetworkSession,
    clock: &mut dyn Clock,
    config: &Configuration,
    state: &mut RetentionState,
) -> SyncReport {
    let display_before = state.display_enabled;
    let mut applied = 0;

    let result = run_steps(net, clock, config, state, &mut applied);
    net.shutdown();

    match &result {
        Ok(()) => info!("✅ Sync session complete"),
        Err(e) => warn!("⚠️ Sync session abandoned: {}", e),
    }

    SyncReport {
        result,
        display_changed: state.display_enabled != display_before,
        commands_applied: applied,
    }
}
