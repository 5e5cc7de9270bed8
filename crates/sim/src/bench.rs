use controller::{EsdConfig, EsdController, PinAdapter, TickOutputs, Wiring};
use controller::{ConfigResult, TickInputs};
use safety::{SafetyState, TripReason};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::source::{Bounce, ForeignClockSignal, KickSource, PushButton};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BenchConfig {
    pub esd: EsdConfig,
    pub wiring: Wiring,
    /// Clock frequency used for the trace time axis.
    pub clock_hz: u32,
    pub seed: u64,
    pub bounce: Bounce,
    pub kick_period_ticks: u32,
    /// How long `press_ack_button` holds and then releases the button.
    pub ack_hold_ticks: u32,
    /// How long `wait_for_debounce` runs.
    pub settle_ticks: u32,
}

impl BenchConfig {
    /// Bench timings scaled from the controller configuration.
    pub fn new(esd: EsdConfig) -> Self {
        let debounce = f64::from(esd.debounce_ticks);
        Self {
            esd,
            wiring: Wiring::bench(),
            clock_hz: 100_000,
            seed: 12345,
            bounce: Bounce {
                mean_ticks: debounce / 10.0,
                std_ticks: debounce / 20.0,
            },
            kick_period_ticks: (esd.watchdog_timeout_ticks / 50).max(2),
            ack_hold_ticks: esd.debounce_ticks.saturating_mul(2),
            settle_ticks: esd.debounce_ticks.saturating_mul(4),
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::new(EsdConfig::default())
    }
}

/// One sampled tick of a bench run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceRow {
    pub tick: u64,
    pub t_s: f64,
    pub ui_in: u8,
    pub rst_n: bool,
    pub ena: bool,
    pub uo_out: u8,
    pub shutdown: bool,
    pub indicator: bool,
    pub sync_out: bool,
    pub state: SafetyState,
    pub reason: Option<TripReason>,
    pub watchdog_elapsed: u32,
    pub watchdog_timeout: u32,
}

/// Result of one named assertion made during a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub tick: u64,
    pub name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

/// Drives an [`EsdController`] through its physical pin bus, with bouncing
/// contacts and a foreign-clock signal on the input side.
pub struct Bench {
    cfg: BenchConfig,
    esd: EsdController,
    adapter: PinAdapter,

    estop_a: PushButton,
    estop_b: PushButton,
    ack: PushButton,
    kick: KickSource,
    async_in: ForeignClockSignal,
    reset: bool,
    enable: bool,
    /// Ticks left before a momentary Ack press releases itself.
    ack_hold_left: u32,

    ui_in: u8,
    rst_n: bool,
    uo_out: u8,
    tick: u64,

    trace_every: Option<u64>,
    trace: Vec<TraceRow>,
    checks: Vec<Check>,
}

impl Bench {
    pub fn new(cfg: BenchConfig) -> ConfigResult<Self> {
        let esd = EsdController::new(cfg.esd)?;
        let adapter = PinAdapter::new(cfg.wiring);
        let idle = TickInputs::default();
        let (ui_in, rst_n) = adapter.encode(&idle);
        Ok(Self {
            esd,
            adapter,
            estop_a: PushButton::new(cfg.seed ^ 0xA1, cfg.bounce),
            estop_b: PushButton::new(cfg.seed ^ 0xB2, cfg.bounce),
            ack: PushButton::new(cfg.seed ^ 0xC3, cfg.bounce),
            kick: KickSource::new(cfg.kick_period_ticks),
            async_in: ForeignClockSignal::new(cfg.seed ^ 0xD4),
            reset: false,
            enable: true,
            ack_hold_left: 0,
            ui_in,
            rst_n,
            uo_out: adapter.drive(&TickOutputs::default()),
            tick: 0,
            trace_every: None,
            trace: Vec::new(),
            checks: Vec::new(),
            cfg,
        })
    }

    /// Record a trace row every `every` ticks and on every output change.
    pub fn record_trace(&mut self, every: u64) {
        self.trace_every = Some(every.max(1));
    }

    // ---- input side -------------------------------------------------------

    pub fn set_estop_a(&mut self, pressed: bool) {
        self.estop_a.set(pressed);
    }

    pub fn set_estop_b(&mut self, pressed: bool) {
        self.estop_b.set(pressed);
    }

    pub fn set_ack_button(&mut self, pressed: bool) {
        self.ack_hold_left = 0;
        self.ack.set(pressed);
    }

    /// Press Ack and let go by itself after `ticks` clock cycles.
    pub fn tap_ack_button(&mut self, ticks: u32) {
        self.ack.set(true);
        self.ack_hold_left = ticks.max(1);
    }

    /// True while a [`Bench::tap_ack_button`] press is still held.
    pub fn ack_tap_pending(&self) -> bool {
        self.ack_hold_left > 0
    }

    pub fn set_wdg_kick(&mut self, level: bool) {
        self.kick.set_manual(level);
    }

    pub fn set_auto_kick(&mut self, enabled: bool) {
        self.kick.set_auto(enabled);
    }

    pub fn set_async_in(&mut self, level: bool) {
        self.async_in.set(level);
    }

    pub fn set_async_period(&mut self, period_ticks: Option<u32>) {
        self.async_in.period_ticks = period_ticks;
    }

    pub fn set_reset(&mut self, asserted: bool) {
        self.reset = asserted;
    }

    pub fn set_enable(&mut self, enabled: bool) {
        self.enable = enabled;
    }

    /// Drive the whole physical input bus at once. Every line is interpreted
    /// through the bench wiring and commanded on the matching source.
    pub fn drive_ui_in(&mut self, ui_in: u8) {
        let i = self.adapter.decode(ui_in, self.rst_n, self.enable);
        self.estop_a.set(i.estop_a);
        self.estop_b.set(i.estop_b);
        self.ack.set(i.ack);
        self.kick.set_manual(i.kick);
        self.async_in.set(i.async_in);
    }

    // ---- clock ------------------------------------------------------------

    /// Advance the clock `n` cycles.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    pub fn step(&mut self) {
        let logical = TickInputs {
            estop_a: self.estop_a.sample(),
            estop_b: self.estop_b.sample(),
            ack: self.ack.sample(),
            kick: self.kick.sample(),
            async_in: self.async_in.sample(),
            reset: self.reset,
            enable: self.enable,
        };
        let (ui_in, rst_n) = self.adapter.encode(&logical);
        self.ui_in = ui_in;
        self.rst_n = rst_n;

        let inputs = self.adapter.decode(ui_in, rst_n, self.enable);
        let prev = self.uo_out;
        let out = self.esd.tick(&inputs);
        self.uo_out = self.adapter.drive(&out);
        self.tick += 1;

        if self.ack_hold_left > 0 {
            self.ack_hold_left -= 1;
            if self.ack_hold_left == 0 {
                self.ack.set(false);
            }
        }

        if let Some(every) = self.trace_every {
            if self.tick % every == 0 || prev != self.uo_out {
                self.trace.push(self.trace_row());
            }
        }
    }

    /// Hold reset for `n` cycles, then release it.
    pub fn apply_reset(&mut self, n: u64) {
        info!(ticks = n, "applying reset");
        self.set_reset(true);
        self.run(n);
        self.set_reset(false);
    }

    /// Press, hold, release and wait, long enough for both debounced edges.
    pub fn press_ack_button(&mut self) {
        info!(tick = self.tick, "pressing ACK button");
        let hold = u64::from(self.cfg.ack_hold_ticks);
        self.set_ack_button(true);
        self.run(hold);
        self.set_ack_button(false);
        self.run(hold);
    }

    pub fn wait_for_debounce(&mut self) {
        self.run(u64::from(self.cfg.settle_ticks));
    }

    // ---- output side ------------------------------------------------------

    pub fn uo_out(&self) -> u8 {
        self.uo_out
    }

    pub fn ui_in(&self) -> u8 {
        self.ui_in
    }

    pub fn shutdown_active(&self) -> bool {
        TickOutputs::from_bits(self.uo_out).shutdown
    }

    pub fn led_status(&self) -> bool {
        TickOutputs::from_bits(self.uo_out).indicator
    }

    pub fn sync_out(&self) -> bool {
        TickOutputs::from_bits(self.uo_out).sync_out
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn controller(&self) -> &EsdController {
        &self.esd
    }

    pub fn config(&self) -> &BenchConfig {
        &self.cfg
    }

    pub fn trace(&self) -> &[TraceRow] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<TraceRow> {
        std::mem::take(&mut self.trace)
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn take_checks(&mut self) -> Vec<Check> {
        std::mem::take(&mut self.checks)
    }

    pub fn trace_row(&self) -> TraceRow {
        let out = TickOutputs::from_bits(self.uo_out);
        TraceRow {
            tick: self.tick,
            t_s: self.tick as f64 / f64::from(self.cfg.clock_hz.max(1)),
            ui_in: self.ui_in,
            rst_n: self.rst_n,
            ena: self.enable,
            uo_out: self.uo_out,
            shutdown: out.shutdown,
            indicator: out.indicator,
            sync_out: out.sync_out,
            state: self.esd.state(),
            reason: self.esd.trip_reason(),
            watchdog_elapsed: self.esd.watchdog().elapsed(),
            watchdog_timeout: self.esd.watchdog().timeout(),
        }
    }

    // ---- assertions -------------------------------------------------------

    pub fn check(&mut self, name: &str, passed: bool, detail: Option<String>) -> bool {
        if passed {
            info!(tick = self.tick, "PASS: {name}");
        } else {
            error!(tick = self.tick, detail = detail.as_deref(), "FAIL: {name}");
        }
        self.checks.push(Check {
            tick: self.tick,
            name: name.to_string(),
            passed,
            detail,
        });
        passed
    }

    pub fn check_state(&mut self, expected_shutdown: bool, name: &str) -> bool {
        let got = self.shutdown_active();
        let detail = (got != expected_shutdown)
            .then(|| format!("expected shutdown={expected_shutdown}, got {got}"));
        self.check(name, got == expected_shutdown, detail)
    }

    /// Sample the lamp 100 times across `duration` cycles and count changes.
    pub fn check_led_blinking(&mut self, name: &str, duration: u64) -> bool {
        let mut last = self.led_status();
        let mut blinks = 0u32;
        for _ in 0..100 {
            self.run((duration / 100).max(1));
            if self.led_status() != last {
                blinks += 1;
                last = self.led_status();
            }
        }
        let detail = Some(format!("{blinks} blinks"));
        self.check(name, blinks > 0, detail)
    }

    /// Sample the lamp 50 times across `duration` cycles; it must not change
    /// and must equal `expected`.
    pub fn check_led_solid(&mut self, expected: bool, name: &str, duration: u64) -> bool {
        let initial = self.led_status();
        let mut changed = false;
        for _ in 0..50 {
            self.run((duration / 50).max(1));
            if self.led_status() != initial {
                changed = true;
                break;
            }
        }
        let ok = !changed && self.led_status() == expected;
        let detail = (!ok).then(|| format!("expected solid {expected}, got {}", self.led_status()));
        self.check(name, ok, detail)
    }
}
