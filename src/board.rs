// Board wiring for the climate node (ESP32-C3 class, 3.3 V logic)
// The typed pins handed out by `Peripherals` in main.rs must match these
// numbers; the raw numbers are needed for the sleep-time GPIO calls.

use climate_node_shared::WakeLine;

// Momentary push buttons to ground, internal pull-ups, active low
pub const TOGGLE_BUTTON_GPIO: i32 = 4; // Toggle OLED on/off
pub const CONFIG_BUTTON_GPIO: i32 = 5; // Enter the configuration portal

// Shared I2C bus: SSD1306 OLED at 0x3C and AHT20 at 0x38
pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;
pub const I2C_BAUDRATE_HZ: u32 = 400_000;

// Battery divider (1:2) into ADC1
pub const BATTERY_ADC_GPIO: i32 = 3;

// Button lines need a moment after the pull-up is enabled
pub const BUTTON_SETTLE_MS: u32 = 5;

pub fn wake_line_gpio(line: WakeLine) -> i32 {
    match line {
        WakeLine::ToggleDisplay => TOGGLE_BUTTON_GPIO,
        WakeLine::EnterConfig => CONFIG_BUTTON_GPIO,
    }
}
