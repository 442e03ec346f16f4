// Sensor Acquisition
// Battery voltage from an averaged ADC read and temperature/humidity from the
// climate sensor. A failed read never overwrites the last good values.

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::error::NodeError;
use crate::retention::RetentionState;

pub const BATTERY_SAMPLES: u32 = 10;
pub const BATTERY_SAMPLE_DELAY_MS: u32 = 2;

// Hardware constants of the battery divider
pub const ADC_MAX_CODE: f32 = 4095.0; // 12-bit ADC
pub const ADC_REFERENCE_VOLTS: f32 = 3.3;
pub const DIVIDER_RATIO: f32 = 2.0; // Two equal resistors halve the cell voltage
pub const CALIBRATION_FACTOR: f32 = 0.9; // Measured against a multimeter

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Blocking temperature/humidity driver
pub trait ClimateSensor {
    fn read(&mut self) -> Result<ClimateReading, NodeError>;
}

/// One raw conversion of the battery divider input
pub trait BatteryAdc {
    fn read_raw(&mut self) -> Result<u16, NodeError>;
}

/// Convert an averaged raw code to cell voltage
pub fn raw_to_voltage(average_raw: f32) -> f32 {
    (average_raw / ADC_MAX_CODE) * ADC_REFERENCE_VOLTS * DIVIDER_RATIO * CALIBRATION_FACTOR
}

/// Average `BATTERY_SAMPLES` conversions and convert to volts.
///
/// Failed conversions are left out of the average; when none succeed the
/// sensor is reported unavailable.
pub fn read_battery_voltage(
    adc: &mut dyn BatteryAdc,
    clock: &mut dyn Clock,
) -> Result<f32, NodeError> {
    let mut sum: u32 = 0;
    let mut good: u32 = 0;

    for sample in 0..BATTERY_SAMPLES {
        match adc.read_raw() {
            Ok(raw) => {
                sum += u32::from(raw);
                good += 1;
            }
            Err(e) => debug!("🔋 Battery sample {} failed: {}", sample, e),
        }
        clock.delay_ms(BATTERY_SAMPLE_DELAY_MS);
    }

    if good == 0 {
        return Err(NodeError::SensorUnavailable(
            "no battery ADC sample succeeded".to_string(),
        ));
    }

    let average = sum as f32 / good as f32;
    let voltage = raw_to_voltage(average);
    debug!(
        "🔋 Battery average raw {:.1} over {} samples -> {:.3} V",
        average, good, voltage
    );
    Ok(voltage)
}

/// Refresh the retained readings. Returns the climate error, if any, so the
/// caller can surface it; the stale values stay in place.
pub fn acquire(
    state: &mut RetentionState,
    climate: &mut dyn ClimateSensor,
    adc: &mut dyn BatteryAdc,
    clock: &mut dyn Clock,
) -> Option<NodeError> {
    let mut failure = None;

    match climate.read() {
        Ok(reading) => {
            state.last_temperature_c = reading.temperature_c;
            state.last_humidity_pct = reading.humidity_pct;
            info!(
                "🌡️ Climate: {:.1} C, {:.1} %",
                reading.temperature_c, reading.humidity_pct
            );
        }
        Err(e) => {
            warn!(
                "⚠️ {}, keeping {:.1} C / {:.1} %",
                e, state.last_temperature_c, state.last_humidity_pct
            );
            failure = Some(e);
        }
    }

    match read_battery_voltage(adc, clock) {
        Ok(voltage) => {
            state.last_battery_voltage = voltage;
            info!("🔋 Battery: {:.2} V", voltage);
        }
        Err(e) => {
            warn!("⚠️ {}, keeping {:.2} V", e, state.last_battery_voltage);
            failure.get_or_insert(e);
        }
    }

    failure
}
