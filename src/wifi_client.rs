// Import ESP-IDF event loop for handling system events
// The event loop manages WiFi connection events, IP assignment, etc.
use esp_idf_svc::eventloop::EspSystemEventLoop;

// Import peripheral trait for hardware access
use esp_idf_svc::hal::peripheral::Peripheral;

// Import NVS partition for WiFi driver storage needs
use esp_idf_svc::nvs::EspDefaultNvsPartition;

// Import ESP-IDF error type
use esp_idf_svc::sys::EspError;

// Import WiFi-related types
// - BlockingWifi: Synchronous wrapper, used for the portal access point
// - EspWifi: Low-level driver, polled for the station link
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

// Import logging macros
use log::{info, warn};

// Import standard library IPv4 address type
use std::net::Ipv4Addr;

use climate_node_shared::portal::PORTAL_AP_SSID;

// Portal access point channel
const AP_CHANNEL: u8 = 1;

fn invalid_arg() -> EspError {
    EspError::from_infallible::<{ esp_idf_svc::sys::ESP_ERR_INVALID_ARG }>()
}

// WiFi client manager - owns the driver for the whole boot
// The station link is started without blocking; the caller polls
// `is_up()` against its own time budget.
pub struct WiFiClient {
    wifi: EspWifi<'static>,       // ESP-IDF WiFi driver
    sys_loop: EspSystemEventLoop, // Needed to block on AP start
}

impl WiFiClient {
    pub fn new(
        modem: impl Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, EspError> {
        info!("📶 Initializing WiFi driver");
        let wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
        Ok(Self { wifi, sys_loop })
    }

    fn determine_auth_method(password: &str) -> AuthMethod {
        if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        }
    }

    /// Configure station mode and issue the connect request
    pub fn start_station(&mut self, ssid: &str, password: &str) -> Result<(), EspError> {
        info!("📶 Connecting to WiFi network: {}", ssid);

        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| invalid_arg())?,
            password: password.try_into().map_err(|_| invalid_arg())?,
            channel: None,
            auth_method: Self::determine_auth_method(password),
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        self.wifi.start()?;
        self.wifi.connect()?;
        Ok(())
    }

    /// Associated and holding an IP address
    pub fn is_up(&self) -> bool {
        match self.wifi.is_up() {
            Ok(up) => up,
            Err(e) => {
                warn!("⚠️ WiFi status query failed: {:?}", e);
                false
            }
        }
    }

    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }

    /// Open, unsecured setup access point
    pub fn start_access_point(&mut self) -> Result<Ipv4Addr, EspError> {
        let mut wifi = BlockingWifi::wrap(&mut self.wifi, self.sys_loop.clone())?;
        wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
            ssid: PORTAL_AP_SSID.try_into().map_err(|_| invalid_arg())?,
            auth_method: AuthMethod::None,
            channel: AP_CHANNEL,
            ..Default::default()
        }))?;
        wifi.start()?;
        wifi.wait_netif_up()?;

        let ip = wifi.wifi().ap_netif().get_ip_info()?.ip;
        info!("📡 Access point '{}' up at {}", PORTAL_AP_SSID, ip);
        Ok(ip)
    }

    /// Radio off; errors are logged since the chip is about to sleep or restart
    pub fn stop(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("⚠️ WiFi disconnect: {:?}", e);
        }
        if let Err(e) = self.wifi.stop() {
            warn!("⚠️ WiFi stop: {:?}", e);
        }
        info!("📴 WiFi stopped");
    }
}
