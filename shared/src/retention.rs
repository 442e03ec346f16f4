// Retention Store
// State block preserved across deep sleep and software restarts. The
// firmware keeps it in RTC slow memory; any other reset starts from the
// cold-boot state.

use log::{debug, info};

/// Marker written alongside valid data; anything else means uninitialised memory
pub const RETENTION_MAGIC: u32 = 0xC11A_7E01;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionState {
    pub magic: u32,
    pub display_enabled: bool,    // Whether the OLED should be lit
    pub boot_count: u32,          // Normal-path boots since power loss
    pub last_temperature_c: f32,  // Last successful climate read
    pub last_humidity_pct: f32,   // Last successful climate read
    pub last_battery_voltage: f32, // Last battery measurement
}

impl RetentionState {
    /// Cold-boot state: every field at its zero value, display off
    pub const fn new() -> Self {
        Self {
            magic: RETENTION_MAGIC,
            display_enabled: false,
            boot_count: 0,
            last_temperature_c: 0.0,
            last_humidity_pct: 0.0,
            last_battery_voltage: 0.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == RETENTION_MAGIC
    }

    /// Return self when valid, otherwise the cold-boot state
    pub fn validated(self) -> Self {
        if self.is_valid() {
            self
        } else {
            info!("🧊 Retention block not initialised, starting from cold-boot state");
            Self::new()
        }
    }

    pub fn toggle_display(&mut self) {
        self.display_enabled = !self.display_enabled;
        debug!("🖥️ Display flag toggled to {}", self.display_enabled);
    }
}

impl Default for RetentionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage for the retention block
///
/// `load` never fails: an implementation that finds garbage returns the
/// cold-boot state.
pub trait RetentionStore {
    fn load(&mut self) -> RetentionState;
    fn store(&mut self, state: &RetentionState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_state_is_all_zero() {
        let state = RetentionState::default();
        assert!(state.is_valid());
        assert!(!state.display_enabled);
        assert_eq!(state.boot_count, 0);
        assert_eq!(state.last_temperature_c, 0.0);
        assert_eq!(state.last_humidity_pct, 0.0);
        assert_eq!(state.last_battery_voltage, 0.0);
    }

    #[test]
    fn garbage_block_is_replaced() {
        let garbage = RetentionState {
            magic: 0xDEAD_BEEF,
            display_enabled: true,
            boot_count: 991,
            last_temperature_c: -3.0,
            last_humidity_pct: 12.0,
            last_battery_voltage: 1.0,
        };
        assert_eq!(garbage.validated(), RetentionState::new());
    }

    #[test]
    fn valid_block_survives_validation() {
        let mut state = RetentionState::new();
        state.boot_count = 12;
        state.last_temperature_c = 19.5;
        assert_eq!(state.validated(), state);
    }

    #[test]
    fn double_toggle_restores_flag() {
        let mut state = RetentionState::new();
        let original = state.display_enabled;
        state.toggle_display();
        assert_ne!(state.display_enabled, original);
        state.toggle_display();
        assert_eq!(state.display_enabled, original);
    }
}
