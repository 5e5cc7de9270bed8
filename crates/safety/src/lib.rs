//! Safety supervisor for the emergency shutdown device.
//!
//! The state machine only ever sees conditioned signals: debounced E-Stop
//! levels, a one-tick acknowledgment edge and the watchdog flags. It owns the
//! SHUTDOWN/RUNNING state; everything downstream reads it.

pub mod indicator;
pub mod watchdog;

pub use indicator::{BlinkPhase, StatusIndicator, StatusOutputs};
pub use watchdog::Watchdog;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyState {
    #[default]
    Shutdown,
    Running,
}

/// Why the controller last entered SHUTDOWN.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripReason {
    EStopA,
    EStopB,
    Watchdog,
    Reset,
}

/// Conditioned inputs for one evaluation of the state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interlocks {
    pub estop_a: bool,
    pub estop_b: bool,
    pub ack_edge: bool,
    pub watchdog_expired: bool,
    pub watchdog_live: bool,
}

impl Interlocks {
    /// First active shutdown condition, in priority order.
    fn trip(&self) -> Option<TripReason> {
        if self.estop_a {
            Some(TripReason::EStopA)
        } else if self.estop_b {
            Some(TripReason::EStopB)
        } else if self.watchdog_expired {
            Some(TripReason::Watchdog)
        } else {
            None
        }
    }

    fn estops_clear(&self) -> bool {
        !self.estop_a && !self.estop_b
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Recovered,
    Tripped(TripReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafetyStateMachine {
    state: SafetyState,
    reason: Option<TripReason>,
}

impl Default for SafetyStateMachine {
    fn default() -> Self {
        Self {
            state: SafetyState::Shutdown,
            reason: Some(TripReason::Reset),
        }
    }
}

impl SafetyStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> SafetyState {
        self.state
    }

    pub fn reason(&self) -> Option<TripReason> {
        self.reason
    }

    /// Evaluate one tick. Shutdown conditions are checked before recovery,
    /// so a fault in the same tick as an acknowledgment always wins.
    pub fn evaluate(&mut self, i: &Interlocks) -> Option<Transition> {
        match self.state {
            SafetyState::Running => {
                let reason = i.trip()?;
                warn!(?reason, "shutdown");
                self.state = SafetyState::Shutdown;
                self.reason = Some(reason);
                Some(Transition::Tripped(reason))
            }
            SafetyState::Shutdown => {
                if !i.ack_edge {
                    return None;
                }
                if !i.estops_clear() {
                    debug!(
                        estop_a = i.estop_a,
                        estop_b = i.estop_b,
                        "acknowledgment ignored: e-stop asserted"
                    );
                    return None;
                }
                if !i.watchdog_live {
                    debug!("acknowledgment ignored: watchdog not being kicked");
                    return None;
                }
                info!(previous = ?self.reason, "recovered to running");
                self.state = SafetyState::Running;
                self.reason = None;
                Some(Transition::Recovered)
            }
        }
    }
}
