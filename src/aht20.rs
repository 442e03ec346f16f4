// AHT20 temperature/humidity sensor on the shared I2C bus (address 0x38)
// One blocking measurement per boot: calibrate if needed, trigger, wait for
// the conversion, then read and CRC-check the 7-byte frame.

use embedded_hal::i2c::I2c;
use esp_idf_hal::delay::FreeRtos;

use log::{debug, info, warn};

use climate_node_shared::sensors::{ClimateReading, ClimateSensor};
use climate_node_shared::NodeError;

const AHT20_ADDRESS: u8 = 0x38;

const CMD_INITIALIZE: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

const POWER_UP_MS: u32 = 40;
const CALIBRATION_MS: u32 = 10;
const CONVERSION_MS: u32 = 80;
const BUSY_RETRY_MS: u32 = 10;
const BUSY_RETRIES: u32 = 5;

const FULL_SCALE: f32 = 1_048_576.0; // 2^20

/// CRC-8, polynomial 0x31, initial value 0xFF
fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0xFFu8, |crc, byte| {
        (0..8).fold(crc ^ byte, |crc, _| {
            if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            }
        })
    })
}

/// Decode a completed measurement frame
fn decode(frame: &[u8; 7]) -> Result<ClimateReading, NodeError> {
    if crc8(&frame[..6]) != frame[6] {
        return Err(NodeError::SensorUnavailable(
            "aht20 frame failed crc".to_string(),
        ));
    }

    let raw_humidity =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature =
        ((u32::from(frame[3]) & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    Ok(ClimateReading {
        temperature_c: raw_temperature as f32 / FULL_SCALE * 200.0 - 50.0,
        humidity_pct: raw_humidity as f32 / FULL_SCALE * 100.0,
    })
}

pub struct Aht20<I> {
    i2c: I,
    calibrated: bool,
}

impl<I: I2c> Aht20<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            calibrated: false,
        }
    }

    fn bus_error(e: I::Error) -> NodeError {
        NodeError::SensorUnavailable(format!("aht20 i2c error: {:?}", e))
    }

    fn status(&mut self) -> Result<u8, NodeError> {
        let mut status = [0u8; 1];
        self.i2c
            .read(AHT20_ADDRESS, &mut status)
            .map_err(Self::bus_error)?;
        Ok(status[0])
    }

    fn ensure_calibrated(&mut self) -> Result<(), NodeError> {
        if self.calibrated {
            return Ok(());
        }

        FreeRtos::delay_ms(POWER_UP_MS);
        if self.status()? & STATUS_CALIBRATED == 0 {
            info!("🌡️ AHT20 not calibrated, sending init");
            self.i2c
                .write(AHT20_ADDRESS, &CMD_INITIALIZE)
                .map_err(Self::bus_error)?;
            FreeRtos::delay_ms(CALIBRATION_MS);
        }
        self.calibrated = true;
        Ok(())
    }

    fn measure(&mut self) -> Result<ClimateReading, NodeError> {
        self.ensure_calibrated()?;
        self.i2c
            .write(AHT20_ADDRESS, &CMD_TRIGGER)
            .map_err(Self::bus_error)?;
        FreeRtos::delay_ms(CONVERSION_MS);

        let mut frame = [0u8; 7];
        for attempt in 0..=BUSY_RETRIES {
            self.i2c
                .read(AHT20_ADDRESS, &mut frame)
                .map_err(Self::bus_error)?;
            if frame[0] & STATUS_BUSY == 0 {
                return decode(&frame);
            }
            debug!("⏳ AHT20 busy (attempt {})", attempt + 1);
            FreeRtos::delay_ms(BUSY_RETRY_MS);
        }

        Err(NodeError::SensorUnavailable(
            "aht20 stayed busy".to_string(),
        ))
    }
}

impl<I: I2c> ClimateSensor for Aht20<I> {
    fn read(&mut self) -> Result<ClimateReading, NodeError> {
        match self.measure() {
            Ok(reading) => {
                info!(
                    "🌡️ {:.1} C, {:.1} %RH",
                    reading.temperature_c, reading.humidity_pct
                );
                Ok(reading)
            }
            Err(e) => {
                warn!("⚠️ Climate read failed: {}", e);
                Err(e)
            }
        }
    }
}
