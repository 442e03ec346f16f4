// Power-Cycle Controller
// One boot, start to finish: classify the wake, either run the portal (ends
// in restart) or load config, read sensors, render, sync and hand back a
// sleep plan. Every Normal path ends in a sleep plan, including display and
// network failures.

use std::time::Duration;

use log::{info, warn};

use crate::clock::Clock;
use crate::config::{load_config, ConfigStore};
use crate::display::{present, present_notice, DisplaySink};
use crate::error::NodeError;
use crate::portal::{run_portal, ConfigPortal, PORTAL_AP_SSID};
use crate::retention::{RetentionState, RetentionStore};
use crate::sensors::{acquire, BatteryAdc, ClimateSensor};
use crate::sync::{run_sync, NetworkSession, SyncReport};
use crate::wake::{ButtonStates, HardwareWake, WakeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    Boot,
    WakeClassify,
    ConfigPortal,
    LoadConfig,
    Acquire,
    Render,
    Sync,
    SkipSync,
    ArmSleep,
}

/// Input lines registered as deep-sleep wake sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeLine {
    ToggleDisplay,
    EnterConfig,
}

/// Wake sources to arm before the low-power halt. Button lines are
/// level-triggered, active low.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepPlan {
    pub timer: Duration,
    pub wake_lines: [WakeLine; 2],
}

impl SleepPlan {
    pub fn after_secs(secs: u32) -> Self {
        Self {
            timer: Duration::from_secs(u64::from(secs)),
            wake_lines: [WakeLine::ToggleDisplay, WakeLine::EnterConfig],
        }
    }

    /// GPIO wake mask for this sleep. A line that is still held sits out:
    /// an active-low source that is already low wakes the chip at once.
    pub fn gpio_wake_mask(
        &self,
        gpio_of: impl Fn(WakeLine) -> i32,
        mut held: impl FnMut(WakeLine) -> bool,
    ) -> u64 {
        self.wake_lines.iter().fold(0u64, |mask, &line| {
            let gpio = gpio_of(line);
            if held(line) {
                info!("🔘 GPIO{} still held, left out of this sleep's wake mask", gpio);
                mask
            } else {
                mask | (1u64 << gpio)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootOutcome {
    /// Portal finished; the device must restart
    Restart { persist_error: Option<NodeError> },
    /// Normal cycle finished; arm these sources and halt
    Sleep(SleepPlan),
}

/// Access to the radio in whichever role this boot needs
pub trait Radio {
    fn network(&mut self) -> &mut dyn NetworkSession;
    fn portal(&mut self) -> &mut dyn ConfigPortal;
}

/// Every collaborator the controller sequences during one boot
pub struct Collaborators<'a> {
    pub retention: &'a mut dyn RetentionStore,
    pub config_store: &'a mut dyn ConfigStore,
    pub climate: &'a mut dyn ClimateSensor,
    pub battery: &'a mut dyn BatteryAdc,
    pub display: &'a mut dyn DisplaySink,
    pub radio: &'a mut dyn Radio,
    pub clock: &'a mut dyn Clock,
}

pub struct PowerCycleController<'a> {
    io: Collaborators<'a>,
    phase: BootPhase,
}

impl<'a> PowerCycleController<'a> {
    pub fn new(io: Collaborators<'a>) -> Self {
        Self {
            io,
            phase: BootPhase::Boot,
        }
    }

    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    fn enter(&mut self, phase: BootPhase) {
        info!("🔄 {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Run one boot to completion
    pub fn run(&mut self, buttons: ButtonStates, hardware: HardwareWake) -> BootOutcome {
        self.enter(BootPhase::WakeClassify);
        let mut state = self.io.retention.load().validated();
        let wake = WakeEvent::classify(buttons, hardware);

        if wake.enters_portal() {
            return self.config_portal();
        }

        if wake.buttons.toggle_display {
            state.toggle_display();
        }
        state.boot_count = state.boot_count.saturating_add(1);
        self.io.retention.store(&state);
        info!(
            "🚀 Normal boot #{} (display {})",
            state.boot_count,
            if state.display_enabled { "on" } else { "off" }
        );

        self.enter(BootPhase::LoadConfig);
        let config = load_config(self.io.config_store);

        self.enter(BootPhase::Acquire);
        let sensor_failure = acquire(
            &mut state,
            self.io.climate,
            self.io.battery,
            self.io.clock,
        );
        let mut status = sensor_failure.as_ref().map(NodeError::status_text);

        self.enter(BootPhase::Render);
        let display_ready = match self.io.display.init(config.contrast) {
            Ok(()) => {
                self.render(&state, status);
                true
            }
            Err(e) => {
                warn!("⚠️ {}, continuing without display", e);
                false
            }
        };

        if config.send_telemetry {
            self.enter(BootPhase::Sync);
            let SyncReport {
                result,
                display_changed,
                ..
            } = run_sync(self.io.radio.network(), self.io.clock, &config, &mut state);

            if let Err(e) = &result {
                status = Some(e.status_text());
            }
            if display_ready && (display_changed || result.is_err()) {
                self.render(&state, status);
            }
        } else {
            self.enter(BootPhase::SkipSync);
        }

        self.enter(BootPhase::ArmSleep);
        self.io.retention.store(&state);
        let plan = SleepPlan::after_secs(config.sleep_interval_secs);
        info!("😴 Sleeping for {:?} (timer + both buttons)", plan.timer);
        BootOutcome::Sleep(plan)
    }

    fn render(&mut self, state: &RetentionState, status: Option<&str>) {
        if let Err(e) = present(self.io.display, state, status) {
            warn!("⚠️ Display update failed: {}", e);
        }
    }

    fn config_portal(&mut self) -> BootOutcome {
        self.enter(BootPhase::ConfigPortal);
        let current = load_config(self.io.config_store);

        let detail = format!("AP {}", PORTAL_AP_SSID);
        let shown = self
            .io
            .display
            .init(current.contrast)
            .and_then(|()| present_notice(self.io.display, "Setup", &detail));
        if let Err(e) = shown {
            warn!("⚠️ Could not show portal notice: {}", e);
        }

        let persist_error = run_portal(self.io.radio.portal(), self.io.config_store, &current);
        info!("🔁 Portal finished, restarting");
        BootOutcome::Restart { persist_error }
    }
}
