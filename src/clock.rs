// Monotonic clock for the boot sequence
// Delays go through FreeRTOS so the idle task (and its watchdog) keeps running
// while the WiFi and MQTT budgets are being spent.

use embassy_time::Instant;
use esp_idf_hal::delay::FreeRtos;

use climate_node_shared::clock::Clock;

#[derive(Debug, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}
