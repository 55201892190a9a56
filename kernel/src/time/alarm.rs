//! Periodic-preemption delegation to the timer.

use core::sync::atomic::{AtomicBool, Ordering};

/// After every selection the scheduler decides whether the timer should
/// time-slice the running thread; the timer polls the flag on each tick.
/// Only L3-class work is sliced; L1/L2 threads run until they block,
/// finish, or are displaced by the preemption signal.
#[derive(Debug, Default)]
pub struct Alarm {
    periodic_preemption: AtomicBool,
}

impl Alarm {
    pub const fn new() -> Self {
        Self {
            periodic_preemption: AtomicBool::new(false),
        }
    }

    pub fn set_periodic_preemption(&self, enabled: bool) {
        self.periodic_preemption.store(enabled, Ordering::Relaxed);
    }

    pub fn periodic_preemption_enabled(&self) -> bool {
        self.periodic_preemption.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_toggles() {
        let alarm = Alarm::new();
        assert!(!alarm.periodic_preemption_enabled());
        alarm.set_periodic_preemption(true);
        assert!(alarm.periodic_preemption_enabled());
        alarm.set_periodic_preemption(false);
        assert!(!alarm.periodic_preemption_enabled());
    }
}
