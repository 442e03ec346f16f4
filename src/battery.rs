// Battery voltage input: 1:2 divider into ADC1, 11 dB attenuation
// Returns raw 12-bit codes; averaging and scaling happen in the shared crate.

use esp_idf_svc::hal::adc::attenuation::DB_11;
use esp_idf_svc::hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_svc::hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_svc::hal::adc::ADC1;
use esp_idf_svc::hal::gpio::Gpio3;
use esp_idf_svc::sys::EspError;

use log::info;

use climate_node_shared::sensors::BatteryAdc;
use climate_node_shared::NodeError;

use crate::board;

pub struct BatteryMonitor<'d> {
    channel: AdcChannelDriver<'d, Gpio3, AdcDriver<'d, ADC1>>,
}

impl<'d> BatteryMonitor<'d> {
    pub fn new(adc1: ADC1, pin: Gpio3) -> Result<Self, EspError> {
        let adc = AdcDriver::new(adc1)?;
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(adc, pin, &config)?;
        info!("🔋 Battery ADC ready on GPIO{}", board::BATTERY_ADC_GPIO);
        Ok(Self { channel })
    }
}

impl BatteryAdc for BatteryMonitor<'_> {
    fn read_raw(&mut self) -> Result<u16, NodeError> {
        self.channel
            .read_raw()
            .map_err(|e| NodeError::Io(format!("adc read failed: {:?}", e)))
    }
}
