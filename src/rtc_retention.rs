// RTC slow-memory retention block
// Lives in `.rtc_noinit`: the bootloader leaves it alone, so it survives deep
// sleep and software restarts. It is cleared on every other reset so a
// power-on never trusts leftover SRAM contents.

use core::ptr::addr_of_mut;

use log::info;

use climate_node_shared::retention::{RetentionState, RetentionStore};

use crate::power::ResetKind;

const FLAG_DISPLAY_ENABLED: u32 = 1 << 0;

/// Raw layout kept in RTC memory. Plain words so that any bit pattern left
/// behind is still a valid value of this type.
#[repr(C)]
#[derive(Clone, Copy)]
struct RawRetention {
    magic: u32,
    flags: u32,
    boot_count: u32,
    temperature_bits: u32,
    humidity_bits: u32,
    voltage_bits: u32,
    check: u32,
}

impl RawRetention {
    const ZERO: Self = Self {
        magic: 0,
        flags: 0,
        boot_count: 0,
        temperature_bits: 0,
        humidity_bits: 0,
        voltage_bits: 0,
        check: 0,
    };

    fn checksum(&self) -> u32 {
        [
            self.magic,
            self.flags,
            self.boot_count,
            self.temperature_bits,
            self.humidity_bits,
            self.voltage_bits,
        ]
        .iter()
        .fold(0x5A5A_5A5A, |acc, word| acc.rotate_left(5) ^ word)
    }

    fn from_state(state: &RetentionState) -> Self {
        let mut raw = Self {
            magic: state.magic,
            flags: if state.display_enabled {
                FLAG_DISPLAY_ENABLED
            } else {
                0
            },
            boot_count: state.boot_count,
            temperature_bits: state.last_temperature_c.to_bits(),
            humidity_bits: state.last_humidity_pct.to_bits(),
            voltage_bits: state.last_battery_voltage.to_bits(),
            check: 0,
        };
        raw.check = raw.checksum();
        raw
    }

    /// A block with a bad checksum is handed back with a zero magic so the
    /// controller discards it.
    fn to_state(self) -> RetentionState {
        RetentionState {
            magic: if self.check == self.checksum() {
                self.magic
            } else {
                0
            },
            display_enabled: self.flags & FLAG_DISPLAY_ENABLED != 0,
            boot_count: self.boot_count,
            last_temperature_c: f32::from_bits(self.temperature_bits),
            last_humidity_pct: f32::from_bits(self.humidity_bits),
            last_battery_voltage: f32::from_bits(self.voltage_bits),
        }
    }
}

#[link_section = ".rtc_noinit"]
static mut RETAINED: RawRetention = RawRetention::ZERO;

/// Handle to the retention block. Only one boot task ever touches it.
pub struct RtcRetention {
    _private: (),
}

impl RtcRetention {
    pub fn for_reset(reset: ResetKind) -> Self {
        let mut store = Self { _private: () };
        if !reset.keeps_rtc_memory() {
            info!("🧹 Cold reset, clearing retained state");
            store.write(RawRetention::ZERO);
        }
        store
    }

    fn read(&self) -> RawRetention {
        unsafe { addr_of_mut!(RETAINED).read_volatile() }
    }

    fn write(&mut self, raw: RawRetention) {
        unsafe { addr_of_mut!(RETAINED).write_volatile(raw) }
    }
}

impl RetentionStore for RtcRetention {
    fn load(&mut self) -> RetentionState {
        self.read().to_state()
    }

    fn store(&mut self, state: &RetentionState) {
        self.write(RawRetention::from_state(state));
    }
}
