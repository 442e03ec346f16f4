// In-memory collaborators for host tests

use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::clock::Clock;
use crate::config::{ConfigStore, Configuration};
use crate::controller::Radio;
use crate::display::{DisplaySink, DrawCommand};
use crate::error::NodeError;
use crate::portal::{ConfigPortal, PortalOutcome};
use crate::retention::{RetentionState, RetentionStore};
use crate::sensors::{BatteryAdc, ClimateReading, ClimateSensor};
use crate::sync::{InboundMessage, NetworkSession};

#[derive(Debug, Default)]
pub struct ManualClock {
    now: u64,
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now += u64::from(ms);
    }
}

#[derive(Debug, Default)]
pub struct MemoryRetention {
    pub state: RetentionState,
}

impl RetentionStore for MemoryRetention {
    fn load(&mut self) -> RetentionState {
        self.state
    }

    fn store(&mut self, state: &RetentionState) {
        self.state = *state;
    }
}

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    pub document: Option<String>,
    pub writes: u32,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryConfigStore {
    pub fn with_document(json: &str) -> Self {
        Self {
            document: Some(json.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Default::default()
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&mut self) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(anyhow!("flash read error"));
        }
        Ok(self.document.clone())
    }

    fn persist(&mut self, json: &str) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("flash write error"));
        }
        self.document = Some(json.to_string());
        self.writes += 1;
        Ok(())
    }
}

pub struct FakeSensor {
    result: Result<ClimateReading, NodeError>,
}

impl FakeSensor {
    pub fn reading(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            result: Ok(ClimateReading {
                temperature_c,
                humidity_pct,
            }),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(NodeError::SensorUnavailable("no ack at 0x38".to_string())),
        }
    }
}

impl ClimateSensor for FakeSensor {
    fn read(&mut self) -> Result<ClimateReading, NodeError> {
        self.result.clone()
    }
}

#[derive(Debug, Default)]
pub struct FakeAdc {
    values: Vec<u16>,
    fail_at: Vec<u32>,
    pub reads: u32,
}

impl FakeAdc {
    pub fn constant(raw: u16) -> Self {
        Self::sequence(&[raw])
    }

    pub fn sequence(values: &[u16]) -> Self {
        Self {
            values: values.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_failures(raw: u16, fail_at: &[u32]) -> Self {
        Self {
            values: vec![raw],
            fail_at: fail_at.to_vec(),
            reads: 0,
        }
    }

    pub fn dead() -> Self {
        Self::default()
    }
}

impl BatteryAdc for FakeAdc {
    fn read_raw(&mut self) -> Result<u16, NodeError> {
        let index = self.reads;
        self.reads += 1;
        if self.values.is_empty() || self.fail_at.contains(&index) {
            return Err(NodeError::Io("adc timeout".to_string()));
        }
        Ok(self.values[index as usize % self.values.len()])
    }
}

#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub power: Vec<bool>,
    pub commands: Vec<DrawCommand>,
    pub contrast: Option<u8>,
    pub fail_init: bool,
}

impl DisplaySink for RecordingDisplay {
    fn init(&mut self, contrast: u8) -> Result<(), NodeError> {
        if self.fail_init {
            return Err(NodeError::DisplayInitFailure("no ack at 0x3C".to_string()));
        }
        self.contrast = Some(contrast);
        Ok(())
    }

    fn set_power(&mut self, on: bool) -> Result<(), NodeError> {
        self.power.push(on);
        Ok(())
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<(), NodeError> {
        self.commands.push(command.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCall {
    BeginWifi,
    WifiStatus,
    ConnectBroker,
    BrokerStatus,
    Subscribe(String),
    PollInbound,
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerScript {
    Accept,
    Refuse,
    Silent,
}

/// Network double that records every call in order
#[derive(Debug)]
pub struct ScriptedNetwork {
    pub calls: Vec<NetCall>,
    pub wifi_up_after: Option<u32>,
    pub broker: BrokerScript,
    pub fail_publish: bool,
    pub wifi_polls: u32,
    inbound: VecDeque<InboundMessage>,
    after_publish: VecDeque<InboundMessage>,
    subscribed: bool,
}

impl ScriptedNetwork {
    pub fn healthy() -> Self {
        Self {
            calls: Vec::new(),
            wifi_up_after: Some(1),
            broker: BrokerScript::Accept,
            fail_publish: false,
            wifi_polls: 0,
            inbound: VecDeque::new(),
            after_publish: VecDeque::new(),
            subscribed: false,
        }
    }

    pub fn wifi_never_up() -> Self {
        Self {
            wifi_up_after: None,
            ..Self::healthy()
        }
    }

    pub fn broker_refuses() -> Self {
        Self {
            broker: BrokerScript::Refuse,
            ..Self::healthy()
        }
    }

    pub fn broker_silent() -> Self {
        Self {
            broker: BrokerScript::Silent,
            ..Self::healthy()
        }
    }

    /// Message the broker delivers once the node has subscribed
    pub fn queue_message(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Message the broker delivers only once telemetry has gone out
    pub fn queue_after_publish(&mut self, topic: &str, payload: &[u8]) {
        self.after_publish.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    pub fn published(&self) -> Option<(String, String, bool)> {
        self.calls.iter().find_map(|call| match call {
            NetCall::Publish {
                topic,
                payload,
                retain,
            } => Some((topic.clone(), payload.clone(), *retain)),
            _ => None,
        })
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                NetCall::Subscribe(topic) => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }
}

impl NetworkSession for ScriptedNetwork {
    fn begin_wifi(&mut self, _ssid: &str, _password: &str) -> Result<(), NodeError> {
        self.calls.push(NetCall::BeginWifi);
        Ok(())
    }

    fn wifi_connected(&mut self) -> bool {
        self.calls.push(NetCall::WifiStatus);
        self.wifi_polls += 1;
        matches!(self.wifi_up_after, Some(n) if self.wifi_polls >= n)
    }

    fn connect_broker(&mut self, _config: &Configuration) -> Result<(), NodeError> {
        self.calls.push(NetCall::ConnectBroker);
        Ok(())
    }

    fn broker_connected(&mut self) -> Result<bool, NodeError> {
        self.calls.push(NetCall::BrokerStatus);
        match self.broker {
            BrokerScript::Accept => Ok(true),
            BrokerScript::Refuse => Err(NodeError::Io("connection refused".to_string())),
            BrokerScript::Silent => Ok(false),
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), NodeError> {
        self.calls.push(NetCall::Subscribe(topic.to_string()));
        self.subscribed = true;
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.calls.push(NetCall::PollInbound);
        if self.subscribed {
            self.inbound.pop_front()
        } else {
            None
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), NodeError> {
        if self.fail_publish {
            return Err(NodeError::Io("outbox full".to_string()));
        }
        self.calls.push(NetCall::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        });
        self.inbound.append(&mut self.after_publish);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.calls.push(NetCall::Shutdown);
    }
}

pub struct ScriptedPortal {
    outcome: PortalOutcome,
    pub seen: Option<Configuration>,
}

impl ScriptedPortal {
    pub fn new(outcome: PortalOutcome) -> Self {
        Self {
            outcome,
            seen: None,
        }
    }
}

impl ConfigPortal for ScriptedPortal {
    fn run(&mut self, current: &Configuration) -> PortalOutcome {
        self.seen = Some(current.clone());
        self.outcome.clone()
    }
}

pub struct TestRadio {
    pub net: ScriptedNetwork,
    pub portal: ScriptedPortal,
}

impl TestRadio {
    pub fn new(net: ScriptedNetwork, portal: ScriptedPortal) -> Self {
        Self { net, portal }
    }
}

impl Radio for TestRadio {
    fn network(&mut self) -> &mut dyn NetworkSession {
        &mut self.net
    }

    fn portal(&mut self) -> &mut dyn ConfigPortal {
        &mut self.portal
    }
}
