// Climate node firmware
// Every boot runs one power cycle and ends in deep sleep (normal path) or a
// restart (after the configuration portal). Hardware bring-up failures still
// arm the default sleep so the node never stays awake on the battery.

use std::cell::RefCell;

use embedded_hal_bus::i2c::RefCellDevice;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use anyhow::{Context, Result};
use log::{error, info, warn};

use climate_node_shared::config::DEFAULT_SLEEP_INTERVAL_SECS;
use climate_node_shared::{BootOutcome, Collaborators, PowerCycleController, SleepPlan};

mod aht20;
mod battery;
mod board;
mod clock;
mod config_storage;
mod device_info;
mod http_portal;
mod mqtt_client;
mod oled;
mod power;
mod radio;
mod rtc_retention;
mod wifi_client;

use crate::aht20::Aht20;
use crate::battery::BatteryMonitor;
use crate::clock::EspClock;
use crate::config_storage::NvsConfigStore;
use crate::oled::OledDisplay;
use crate::radio::EspRadio;
use crate::rtc_retention::RtcRetention;

fn main() {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    EspLogger::initialize_default();

    info!("🚀 Climate node v{} starting", env!("CARGO_PKG_VERSION"));

    match run_power_cycle() {
        Ok(BootOutcome::Sleep(plan)) => power::deep_sleep(&plan),
        Ok(BootOutcome::Restart { persist_error }) => {
            if let Some(e) = persist_error {
                warn!("⚠️ Restarting without saved configuration: {}", e);
            }
            power::restart()
        }
        Err(e) => {
            error!("❌ Hardware bring-up failed: {:?}", e);
            power::deep_sleep(&SleepPlan::after_secs(DEFAULT_SLEEP_INTERVAL_SECS))
        }
    }
}

fn run_power_cycle() -> Result<BootOutcome> {
    let reset = power::reset_kind();
    let hardware_wake = power::hardware_wake();
    let mut retention = RtcRetention::for_reset(reset);

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // Buttons first: a short press may already be over by the time WiFi is up
    let buttons = power::sample_buttons(pins.gpio4, pins.gpio5).context("button sampling")?;
    info!("🆔 Device MAC {}", device_info::device_mac_address());

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // OLED and AHT20 share I2C0 on GPIO8/GPIO9
    let i2c_config = I2cConfig::new().baudrate(Hertz(board::I2C_BAUDRATE_HZ));
    let i2c = I2cDriver::new(peripherals.i2c0, pins.gpio8, pins.gpio9, &i2c_config)
        .context("I2C0 driver")?;
    let bus = RefCell::new(i2c);
    info!(
        "🔧 I2C bus on SDA GPIO{} / SCL GPIO{}",
        board::I2C_SDA_GPIO,
        board::I2C_SCL_GPIO
    );

    let mut climate = Aht20::new(RefCellDevice::new(&bus));
    let mut display = OledDisplay::new(RefCellDevice::new(&bus));
    let mut battery = BatteryMonitor::new(peripherals.adc1, pins.gpio3).context("battery ADC")?;
    let mut config_store = NvsConfigStore::new(nvs.clone());
    let mut radio = EspRadio::new(peripherals.modem, sys_loop, nvs);
    let mut clock = EspClock;

    let mut controller = PowerCycleController::new(Collaborators {
        retention: &mut retention,
        config_store: &mut config_store,
        climate: &mut climate,
        battery: &mut battery,
        display: &mut display,
        radio: &mut radio,
        clock: &mut clock,
    });

    let outcome = controller.run(buttons, hardware_wake);
    info!("🏁 Power cycle finished in {:?}", controller.phase());
    Ok(outcome)
}
