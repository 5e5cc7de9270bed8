use serde::{Deserialize, Serialize};

use crate::SafetyState;

/// How the heartbeat divider behaves across SHUTDOWN/RUNNING episodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlinkPhase {
    /// Divider restarts on every entry to RUNNING; the lamp is on for the
    /// first half period after recovery.
    #[default]
    RestartOnEntry,
    /// Divider counts every tick in both states; the phase on entry is
    /// whatever it happens to be.
    FreeRunning,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOutputs {
    pub shutdown: bool,
    pub indicator: bool,
}

/// Drives the shutdown line and the status lamp from the safety state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusIndicator {
    half_period: u64,
    phase: BlinkPhase,
    divider: u64,
}

impl StatusIndicator {
    pub fn new(half_period_ticks: u32, phase: BlinkPhase) -> Self {
        Self {
            half_period: u64::from(half_period_ticks.max(1)),
            phase,
            divider: 0,
        }
    }

    pub fn reset(&mut self) {
        self.divider = 0;
    }

    /// `entered_running` is true only on the tick of a SHUTDOWN -> RUNNING
    /// transition.
    pub fn step(&mut self, state: SafetyState, entered_running: bool) -> StatusOutputs {
        if entered_running && self.phase == BlinkPhase::RestartOnEntry {
            self.divider = 0;
        }

        let out = match state {
            SafetyState::Shutdown => StatusOutputs {
                shutdown: true,
                indicator: true,
            },
            SafetyState::Running => StatusOutputs {
                shutdown: false,
                indicator: self.divider < self.half_period,
            },
        };

        let counting = match self.phase {
            BlinkPhase::RestartOnEntry => state == SafetyState::Running,
            BlinkPhase::FreeRunning => true,
        };
        if counting {
            self.divider = (self.divider + 1) % (2 * self.half_period);
        }

        out
    }

    pub fn phase(&self) -> BlinkPhase {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_on_in_shutdown() {
        let mut ind = StatusIndicator::new(2, BlinkPhase::RestartOnEntry);
        for _ in 0..10 {
            let o = ind.step(SafetyState::Shutdown, false);
            assert!(o.shutdown);
            assert!(o.indicator);
        }
    }

    #[test]
    fn blinks_from_entry_when_restarting() {
        let mut ind = StatusIndicator::new(2, BlinkPhase::RestartOnEntry);
        let mut lamp = vec![ind.step(SafetyState::Running, true).indicator];
        for _ in 0..7 {
            let o = ind.step(SafetyState::Running, false);
            assert!(!o.shutdown);
            lamp.push(o.indicator);
        }
        assert_eq!(lamp, vec![true, true, false, false, true, true, false, false]);
    }

    #[test]
    fn restart_policy_forgets_previous_episode() {
        let mut ind = StatusIndicator::new(4, BlinkPhase::RestartOnEntry);
        ind.step(SafetyState::Running, true);
        for _ in 0..5 {
            ind.step(SafetyState::Running, false);
        }
        ind.step(SafetyState::Shutdown, false);
        assert!(ind.step(SafetyState::Running, true).indicator);
    }

    #[test]
    fn free_running_keeps_counting_in_shutdown() {
        let mut ind = StatusIndicator::new(2, BlinkPhase::FreeRunning);
        assert_eq!(ind.phase(), BlinkPhase::FreeRunning);
        // Two ticks in shutdown move the divider into the "off" half.
        ind.step(SafetyState::Shutdown, false);
        ind.step(SafetyState::Shutdown, false);
        let o = ind.step(SafetyState::Running, true);
        assert!(!o.indicator);
        assert!(!o.shutdown);
    }
}
