// Power management: wake/reset causes, button sampling, deep sleep and restart
// All raw ESP-IDF sleep calls live here so the rest of the firmware deals in
// `HardwareWake`, `ButtonStates` and `SleepPlan`.

use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{Input, InputPin, OutputPin, PinDriver, Pull};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_sys::{self as sys, esp, EspError};

use log::{error, info};

use climate_node_shared::wake::{ButtonStates, HardwareWake};
use climate_node_shared::{SleepPlan, WakeLine};

use crate::board;

// How long to wait for a held button to be released before sleeping
const RELEASE_POLLS: u32 = 50;
const RELEASE_POLL_MS: u32 = 100;

/// Why the chip came out of reset, reduced to what retention cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    DeepSleep, // Timer or button wake
    Software,  // esp_restart(), e.g. after the portal
    Cold,      // Power-on, brown-out, watchdog, external reset
}

impl ResetKind {
    /// RTC memory survives deep sleep and software restarts only
    pub fn keeps_rtc_memory(self) -> bool {
        matches!(self, ResetKind::DeepSleep | ResetKind::Software)
    }
}

pub fn reset_kind() -> ResetKind {
    let reason = unsafe { sys::esp_reset_reason() };
    let kind = match reason {
        sys::esp_reset_reason_t_ESP_RST_DEEPSLEEP => ResetKind::DeepSleep,
        sys::esp_reset_reason_t_ESP_RST_SW => ResetKind::Software,
        _ => ResetKind::Cold,
    };
    info!("🔌 Reset reason {} -> {:?}", reason, kind);
    kind
}

pub fn hardware_wake() -> HardwareWake {
    let cause = unsafe { sys::esp_sleep_get_wakeup_cause() };
    match cause {
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => HardwareWake::Timer,
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO
        | sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0
        | sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT1 => HardwareWake::Gpio,
        sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => HardwareWake::Undefined,
        _ => HardwareWake::Other,
    }
}

fn pressed<'d, P: InputPin + OutputPin>(
    pin: impl Peripheral<P = P> + 'd,
) -> Result<PinDriver<'d, P, Input>, EspError> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Up)?;
    Ok(driver)
}

/// Sample both buttons once, as early in the boot as possible
pub fn sample_buttons<'d, T, C>(
    toggle: impl Peripheral<P = T> + 'd,
    config: impl Peripheral<P = C> + 'd,
) -> Result<ButtonStates, EspError>
where
    T: InputPin + OutputPin,
    C: InputPin + OutputPin,
{
    let toggle = pressed(toggle)?;
    let config = pressed(config)?;
    FreeRtos::delay_ms(board::BUTTON_SETTLE_MS);

    let states = ButtonStates {
        toggle_display: toggle.is_low(),
        enter_config: config.is_low(),
    };
    info!(
        "🔘 Buttons: toggle={} config={}",
        states.toggle_display, states.enter_config
    );
    Ok(states)
}

fn line_is_low(gpio: i32) -> bool {
    unsafe { sys::gpio_get_level(gpio) == 0 }
}

/// Wait (bounded) for the buttons to come up, then build the wake mask from
/// whatever is released by then
fn released_lines(plan: &SleepPlan) -> u64 {
    let held = |line: WakeLine| line_is_low(board::wake_line_gpio(line));
    for _ in 0..RELEASE_POLLS {
        if !plan.wake_lines.iter().any(|line| held(*line)) {
            break;
        }
        FreeRtos::delay_ms(RELEASE_POLL_MS);
    }

    plan.gpio_wake_mask(board::wake_line_gpio, held)
}

fn arm(plan: &SleepPlan) -> Result<(), EspError> {
    for line in plan.wake_lines.iter() {
        let gpio = board::wake_line_gpio(*line);
        unsafe {
            esp!(sys::gpio_set_direction(gpio, sys::gpio_mode_t_GPIO_MODE_INPUT))?;
            esp!(sys::gpio_pullup_en(gpio))?;
            esp!(sys::gpio_pulldown_dis(gpio))?;
        }
    }

    let mask = released_lines(plan);
    let micros = u64::try_from(plan.timer.as_micros()).unwrap_or(u64::MAX);
    unsafe {
        esp!(sys::esp_sleep_enable_timer_wakeup(micros))?;
        if mask != 0 {
            esp!(sys::esp_deep_sleep_enable_gpio_wakeup(
                mask,
                sys::esp_deepsleep_gpio_wake_up_mode_t_ESP_GPIO_WAKEUP_GPIO_LOW,
            ))?;
        }
    }
    info!(
        "💤 Armed timer {}s and GPIO mask {:#x}",
        plan.timer.as_secs(),
        mask
    );
    Ok(())
}

/// Arm every source in the plan and halt. Arming errors are logged; the
/// timer is the last line of defence so the chip sleeps regardless.
pub fn deep_sleep(plan: &SleepPlan) -> ! {
    if let Err(e) = arm(plan) {
        error!("❌ Failed to arm wake sources: {:?}", e);
    }
    info!("😴 Entering deep sleep");
    unsafe { sys::esp_deep_sleep_start() }
}

pub fn restart() -> ! {
    info!("🔄 Restarting device");
    FreeRtos::delay_ms(100);
    unsafe { sys::esp_restart() }
}
