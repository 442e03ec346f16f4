// Hardware-independent core of the climate node firmware
// Everything here runs on the host; the firmware crate supplies ESP-IDF
// implementations of the collaborator traits.

pub mod clock;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod portal;
pub mod retention;
pub mod sensors;
pub mod sync;
pub mod telemetry;
pub mod wake;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{BootOutcome, Collaborators, PowerCycleController, Radio, SleepPlan, WakeLine};
pub use error::NodeError;
