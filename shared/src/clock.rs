// Time source for every bounded wait in the boot cycle
// The firmware backs this with the embassy time driver; tests use a
// manual clock so budgets are exercised without real delays.

use log::debug;

pub trait Clock {
    /// Milliseconds since boot
    fn now_ms(&self) -> u64;

    /// Block the single execution context for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);
}

/// Fixed polling budget: at most `max_polls` checks spaced `delay_ms` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub max_polls: u32,
    pub delay_ms: u32,
}

impl PollBudget {
    pub const fn new(max_polls: u32, delay_ms: u32) -> Self {
        Self {
            max_polls,
            delay_ms,
        }
    }

    /// Worst-case wall time of the budget
    pub const fn total_ms(&self) -> u64 {
        self.max_polls as u64 * self.delay_ms as u64
    }
}

/// Poll `ready` until it reports true or the budget is spent.
///
/// Returns the number of polls used on success, `None` on exhaustion.
/// The delay is taken before each poll so the first check already has
/// given the collaborator one interval to make progress.
pub fn poll_until<C, F>(clock: &mut C, budget: PollBudget, mut ready: F) -> Option<u32>
where
    C: Clock + ?Sized,
    F: FnMut() -> bool,
{
    for poll in 1..=budget.max_polls {
        clock.delay_ms(budget.delay_ms);
        if ready() {
            debug!("⏱️ Ready after {} of {} polls", poll, budget.max_polls);
            return Some(poll);
        }
    }
    None
}

/// Run `tick` exactly `ticks` times with `tick_ms` spacing
pub fn run_window<C, F>(clock: &mut C, ticks: u32, tick_ms: u32, mut tick: F)
where
    C: Clock + ?Sized,
    F: FnMut(u32),
{
    for n in 0..ticks {
        clock.delay_ms(tick_ms);
        tick(n);
    }
}
