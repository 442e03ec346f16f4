// Wake-cause classification
// Held buttons are read directly at boot: a line held low counts as pressed
// whether or not it was the hardware wake source.

use log::info;

/// Raw reason reported by the sleep controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareWake {
    Timer,
    Gpio,
    Undefined, // Not a deep-sleep wake (power-on, reset button, ...)
    Other,
}

/// Level of both designated input lines sampled at boot (true = held low)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonStates {
    pub toggle_display: bool,
    pub enter_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    Timer,
    ButtonToggleDisplay,
    ButtonEnterConfig,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeEvent {
    pub cause: WakeCause,
    pub buttons: ButtonStates,
    pub hardware: HardwareWake,
}

impl WakeEvent {
    /// Config entry wins over the display toggle; buttons win over the register
    pub fn classify(buttons: ButtonStates, hardware: HardwareWake) -> Self {
        let cause = if buttons.enter_config {
            WakeCause::ButtonEnterConfig
        } else if buttons.toggle_display {
            WakeCause::ButtonToggleDisplay
        } else if hardware == HardwareWake::Timer {
            WakeCause::Timer
        } else {
            WakeCause::Other
        };

        info!(
            "⏰ Wake classified as {:?} (hardware={:?}, toggle={}, config={})",
            cause, hardware, buttons.toggle_display, buttons.enter_config
        );

        Self {
            cause,
            buttons,
            hardware,
        }
    }

    pub fn enters_portal(&self) -> bool {
        self.cause == WakeCause::ButtonEnterConfig
    }
}
