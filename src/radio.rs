// The single radio, used either as the sync session or as the portal
// The WiFi driver is brought up lazily so a boot with telemetry disabled
// never powers the modem.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use log::{error, info};

use climate_node_shared::config::Configuration;
use climate_node_shared::portal::{ConfigPortal, PortalOutcome};
use climate_node_shared::sync::{InboundMessage, NetworkSession};
use climate_node_shared::{NodeError, Radio};

use crate::device_info;
use crate::http_portal;
use crate::mqtt_client::MqttSession;
use crate::wifi_client::WiFiClient;

pub struct EspRadio {
    modem: Option<Modem>,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    wifi: Option<WiFiClient>,
    mqtt: Option<MqttSession>,
}

impl EspRadio {
    pub fn new(modem: Modem, sys_loop: EspSystemEventLoop, nvs: EspDefaultNvsPartition) -> Self {
        Self {
            modem: Some(modem),
            sys_loop,
            nvs,
            wifi: None,
            mqtt: None,
        }
    }

    fn wifi(&mut self) -> Result<&mut WiFiClient, NodeError> {
        if self.wifi.is_none() {
            let modem = self
                .modem
                .take()
                .ok_or_else(|| NodeError::Io("modem already released".to_string()))?;
            let client = WiFiClient::new(modem, self.sys_loop.clone(), self.nvs.clone())
                .map_err(|e| NodeError::Io(format!("wifi driver init failed: {:?}", e)))?;
            self.wifi = Some(client);
        }
        self.wifi
            .as_mut()
            .ok_or_else(|| NodeError::Io("wifi driver unavailable".to_string()))
    }

    fn mqtt(&mut self) -> Result<&mut MqttSession, NodeError> {
        self.mqtt
            .as_mut()
            .ok_or_else(|| NodeError::Io("no broker session".to_string()))
    }
}

impl NetworkSession for EspRadio {
    fn begin_wifi(&mut self, ssid: &str, password: &str) -> Result<(), NodeError> {
        self.wifi()?
            .start_station(ssid, password)
            .map_err(|e| NodeError::Io(format!("{:?}", e)))
    }

    fn wifi_connected(&mut self) -> bool {
        match self.wifi.as_ref() {
            Some(wifi) if wifi.is_up() => {
                if let Some(ip) = wifi.ip_address() {
                    info!("📶 WiFi up, IP {}", ip);
                }
                true
            }
            _ => false,
        }
    }

    fn connect_broker(&mut self, config: &Configuration) -> Result<(), NodeError> {
        let client_id = device_info::mqtt_client_id();
        let session =
            MqttSession::connect(config, &client_id).map_err(|e| NodeError::Io(e.to_string()))?;
        self.mqtt = Some(session);
        Ok(())
    }

    fn broker_connected(&mut self) -> Result<bool, NodeError> {
        self.mqtt()?
            .poll_connected()
            .map_err(|e| NodeError::Io(e.to_string()))
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), NodeError> {
        self.mqtt()?
            .subscribe(topic)
            .map_err(|e| NodeError::SubscribeFailure(e.to_string()))
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.mqtt.as_mut().and_then(MqttSession::try_receive)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), NodeError> {
        self.mqtt()?
            .publish(topic, payload, retain)
            .map_err(|e| NodeError::PublishFailure(e.to_string()))
    }

    fn shutdown(&mut self) {
        if self.mqtt.take().is_some() {
            info!("🔌 MQTT session closed");
        }
        if let Some(wifi) = self.wifi.as_mut() {
            wifi.stop();
        }
    }
}

impl ConfigPortal for EspRadio {
    fn run(&mut self, current: &Configuration) -> PortalOutcome {
        let outcome = match self.wifi() {
            Ok(wifi) => http_portal::serve(wifi, current),
            Err(e) => PortalOutcome::Failed(e.to_string()),
        };
        if let PortalOutcome::Failed(reason) = &outcome {
            error!("❌ Portal failed: {}", reason);
        }
        if let Some(wifi) = self.wifi.as_mut() {
            wifi.stop();
        }
        outcome
    }
}

impl Radio for EspRadio {
    fn network(&mut self) -> &mut dyn NetworkSession {
        self
    }

    fn portal(&mut self) -> &mut dyn ConfigPortal {
        self
    }
}
