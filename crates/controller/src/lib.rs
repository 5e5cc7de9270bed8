//! Emergency shutdown device controller.
//!
//! [`EsdController`] composes the conditioning, watchdog, safety and
//! indicator stages and advances all of them once per [`EsdController::tick`].
//! Within a tick the stages are evaluated in dependency order and each one
//! sees the settled output of the stages before it.

pub mod config;
pub mod error;
pub mod pins;

pub use config::{EsdConfig, Timing};
pub use error::{ConfigError, ConfigResult};
pub use pins::{PinAdapter, TickInputs, TickOutputs, Wiring};

use safety::{
    Interlocks, SafetyState, SafetyStateMachine, StatusIndicator, Transition, TripReason,
    Watchdog,
};
use signal::{Debouncer, EdgeDetector, Synchronizer};
use tracing::debug;

/// Conditioned signal levels after the most recent enabled tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Conditioned {
    pub estop_a: bool,
    pub estop_b: bool,
    pub ack: bool,
    pub ack_edge: bool,
    pub kick_edge: bool,
}

#[derive(Clone, Debug)]
pub struct EsdController {
    cfg: EsdConfig,

    estop_a: Debouncer,
    estop_b: Debouncer,
    ack: Debouncer,
    ack_edge: EdgeDetector,
    kick_edge: EdgeDetector,
    sync: Synchronizer,
    watchdog: Watchdog,
    fsm: SafetyStateMachine,
    indicator: StatusIndicator,

    conditioned: Conditioned,
    outputs: TickOutputs,
    last_transition: Option<Transition>,
    ticks: u64,
}

impl EsdController {
    pub fn new(cfg: EsdConfig) -> ConfigResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            estop_a: Debouncer::new(cfg.debounce_ticks),
            estop_b: Debouncer::new(cfg.debounce_ticks),
            ack: Debouncer::new(cfg.debounce_ticks),
            ack_edge: EdgeDetector::new(),
            kick_edge: EdgeDetector::new(),
            sync: Synchronizer::new(cfg.sync_depth),
            watchdog: Watchdog::new(cfg.watchdog_timeout_ticks),
            fsm: SafetyStateMachine::new(),
            indicator: StatusIndicator::new(cfg.blink_half_period_ticks, cfg.blink_phase),
            conditioned: Conditioned::default(),
            outputs: TickOutputs::default(),
            last_transition: None,
            ticks: 0,
        })
    }

    /// Return every stage to its power-on state.
    pub fn reset(&mut self) {
        debug!(tick = self.ticks, "controller reset");
        self.estop_a.reset();
        self.estop_b.reset();
        self.ack.reset();
        self.ack_edge.reset();
        self.kick_edge.reset();
        self.sync.reset();
        self.watchdog.reset();
        self.fsm.reset();
        self.indicator.reset();
        self.conditioned = Conditioned::default();
        self.outputs = TickOutputs::default();
        self.last_transition = None;
    }

    /// Advance one clock period.
    ///
    /// Reset is applied in the tick it is sampled and the returned outputs are
    /// already the reset outputs. With `enable` low nothing advances and the
    /// previous outputs are held.
    pub fn tick(&mut self, inputs: &TickInputs) -> TickOutputs {
        self.ticks += 1;

        if inputs.reset {
            self.reset();
            return self.outputs;
        }
        if !inputs.enable {
            self.last_transition = None;
            return self.outputs;
        }

        // 1. Input conditioners.
        let estop_a = self.estop_a.step(inputs.estop_a);
        let estop_b = self.estop_b.step(inputs.estop_b);
        let ack = self.ack.step(inputs.ack);
        let ack_edge = self.ack_edge.step(ack);
        self.log_level_changes(estop_a, estop_b, ack);

        // 2. Synchronizer.
        let sync_out = self.sync.step(inputs.async_in);

        // 3. Watchdog.
        let kick_edge = self.kick_edge.step(inputs.kick);
        let expired = self.watchdog.step(kick_edge);

        // 4. Safety state machine.
        let transition = self.fsm.evaluate(&Interlocks {
            estop_a,
            estop_b,
            ack_edge,
            watchdog_expired: expired,
            watchdog_live: self.watchdog.is_live(),
        });
        if transition == Some(Transition::Recovered) {
            self.watchdog.rearm();
        }

        // 5. Status indicator.
        let status = self
            .indicator
            .step(self.fsm.state(), transition == Some(Transition::Recovered));

        self.conditioned = Conditioned {
            estop_a,
            estop_b,
            ack,
            ack_edge,
            kick_edge,
        };
        self.last_transition = transition;
        self.outputs = TickOutputs {
            shutdown: status.shutdown,
            indicator: status.indicator,
            sync_out,
        };
        self.outputs
    }

    fn log_level_changes(&self, estop_a: bool, estop_b: bool, ack: bool) {
        let prev = self.conditioned;
        if prev.estop_a != estop_a {
            debug!(tick = self.ticks, pressed = estop_a, "e-stop A debounced");
        }
        if prev.estop_b != estop_b {
            debug!(tick = self.ticks, pressed = estop_b, "e-stop B debounced");
        }
        if prev.ack != ack {
            debug!(tick = self.ticks, pressed = ack, "ack debounced");
        }
    }

    pub fn config(&self) -> &EsdConfig {
        &self.cfg
    }

    pub fn state(&self) -> SafetyState {
        self.fsm.state()
    }

    pub fn trip_reason(&self) -> Option<TripReason> {
        self.fsm.reason()
    }

    pub fn outputs(&self) -> TickOutputs {
        self.outputs
    }

    pub fn conditioned(&self) -> Conditioned {
        self.conditioned
    }

    /// Transition taken by the most recent tick, if any.
    pub fn last_transition(&self) -> Option<Transition> {
        self.last_transition
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Ticks seen since construction, including reset and disabled ones.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
