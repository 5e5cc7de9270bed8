//! Scripted bench sequences.

use safety::TripReason;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bench::{Bench, Check, TraceRow};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Startup, both E-Stops, watchdog timeout and recovery, async sync.
    FullSequence,
    /// Reset into shutdown with the whole bus idle, then E-Stop A.
    BasicFunctionality,
    /// Ack chatter and simultaneous presses.
    EdgeCases,
    WatchdogTimeout,
    DualEstop,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::FullSequence,
        Scenario::BasicFunctionality,
        Scenario::EdgeCases,
        Scenario::WatchdogTimeout,
        Scenario::DualEstop,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Scenario::FullSequence => "Full sequence",
            Scenario::BasicFunctionality => "Basic functionality",
            Scenario::EdgeCases => "Edge cases",
            Scenario::WatchdogTimeout => "Watchdog timeout",
            Scenario::DualEstop => "Dual E-Stop",
        }
    }

    pub fn run(self, bench: &mut Bench) -> ScenarioReport {
        info!(scenario = self.label(), "=== starting ===");
        match self {
            Scenario::FullSequence => full_sequence(bench),
            Scenario::BasicFunctionality => basic_functionality(bench),
            Scenario::EdgeCases => edge_cases(bench),
            Scenario::WatchdogTimeout => watchdog_timeout(bench),
            Scenario::DualEstop => dual_estop(bench),
        }
        let report = ScenarioReport {
            scenario: self,
            ticks: bench.tick(),
            checks: bench.take_checks(),
            trace: bench.take_trace(),
        };
        info!(
            scenario = self.label(),
            passed = report.passed_count(),
            failed = report.failed_count(),
            "=== completed ==="
        );
        report
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub ticks: u64,
    pub checks: Vec<Check>,
    pub trace: Vec<TraceRow>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.len() - self.passed_count()
    }
}

fn power_up(b: &mut Bench) {
    b.set_estop_a(false);
    b.set_estop_b(false);
    b.set_ack_button(false);
    b.set_wdg_kick(false);
    b.set_async_in(false);
    b.apply_reset(10);
    b.run(10);
}

fn full_sequence(b: &mut Bench) {
    let timeout = u64::from(b.config().esd.watchdog_timeout_ticks);
    let half_period = u64::from(b.config().esd.blink_half_period_ticks);
    let settle = u64::from(b.config().settle_ticks);

    power_up(b);
    b.check_state(true, "initial state is shutdown");
    b.run(100);

    b.set_auto_kick(true);
    b.run(settle / 2);
    b.check_state(true, "remains shutdown without ACK");
    b.set_auto_kick(false);

    b.set_auto_kick(true);
    b.press_ack_button();
    b.wait_for_debounce();
    b.check_state(false, "running after ACK");
    b.check_led_blinking("lamp blinks while running", half_period * 4);

    b.set_estop_a(true);
    b.wait_for_debounce();
    b.check_state(true, "shutdown on E-STOP A");
    b.check_led_solid(true, "lamp solid on when shutdown", settle * 2);

    b.set_estop_a(false);
    b.wait_for_debounce();
    b.press_ack_button();
    b.wait_for_debounce();
    b.check_state(false, "recovers after E-STOP A release and ACK");

    b.set_estop_b(true);
    b.wait_for_debounce();
    b.check_state(true, "shutdown on E-STOP B");

    b.set_estop_b(false);
    b.wait_for_debounce();
    b.press_ack_button();
    b.wait_for_debounce();
    b.check_state(false, "recovers from E-STOP B");

    both_estops(b);

    b.set_auto_kick(false);
    b.run(timeout + timeout / 5);
    b.check_state(true, "shutdown on watchdog timeout");

    b.set_auto_kick(true);
    b.press_ack_button();
    b.wait_for_debounce();
    b.check_state(false, "recovers from watchdog timeout");

    async_sync(b);
    b.set_auto_kick(false);
}

fn both_estops(b: &mut Bench) {
    b.set_estop_a(true);
    b.set_estop_b(true);
    b.wait_for_debounce();
    b.check_state(true, "shutdown with both E-STOPs");

    b.set_estop_a(false);
    b.wait_for_debounce();
    b.check_state(true, "remains shutdown with one E-STOP active");

    b.set_estop_b(false);
    b.wait_for_debounce();
    b.check_state(true, "no recovery on release without ACK");
    b.press_ack_button();
    b.wait_for_debounce();
    b.check_state(false, "recovers when both E-STOPs released");
}

fn async_sync(b: &mut Bench) {
    // Clean from the second captured sample on, then `depth` ticks of lag.
    let settle = b.config().esd.sync_depth as u64 + 2;

    b.set_async_in(true);
    b.run(settle);
    let got = b.sync_out();
    b.check("async input synchronized", got, None);

    b.set_async_in(false);
    b.run(settle);
    let got = b.sync_out();
    b.check("async synchronized clear", !got, None);
}

fn basic_functionality(b: &mut Bench) {
    b.set_enable(true);
    // All lines high: E-Stops and Ack released, kick and async high.
    b.drive_ui_in(0b1_1111);
    b.apply_reset(10);
    b.run(10);
    b.check_state(true, "starts in shutdown");

    b.drive_ui_in(0b1_1110);
    b.wait_for_debounce();
    b.check_state(true, "remains shutdown on E-STOP");
    let reason = b.controller().trip_reason();
    b.check(
        "trip reason stays reset",
        reason == Some(TripReason::Reset),
        Some(format!("{reason:?}")),
    );
}

fn edge_cases(b: &mut Bench) {
    let debounce = u64::from(b.config().esd.debounce_ticks);
    let hold = u64::from(b.config().ack_hold_ticks);
    let chatter = (debounce / 2).max(1);

    power_up(b);
    b.set_auto_kick(true);

    for _ in 0..5 {
        b.set_ack_button(true);
        b.run(chatter);
        b.set_ack_button(false);
        b.run(chatter);
    }
    b.check_state(true, "presses shorter than the debounce window are ignored");

    b.set_estop_a(true);
    b.set_estop_b(true);
    b.set_ack_button(true);
    b.run(hold);
    b.check_state(true, "shutdown while E-STOPs and ACK are held together");

    b.set_estop_a(false);
    b.set_estop_b(false);
    b.set_ack_button(false);
    b.run(hold);
    b.check_state(true, "no recovery after simultaneous release");

    b.set_enable(false);
    b.press_ack_button();
    b.check_state(true, "disabled controller holds its outputs");
    b.set_enable(true);

    b.press_ack_button();
    b.check_state(false, "fresh ACK recovers");

    b.set_reset(true);
    b.run(1);
    b.check_state(true, "reset forces shutdown");
    b.set_reset(false);
    b.set_auto_kick(false);
}

fn watchdog_timeout(b: &mut Bench) {
    let timeout = u64::from(b.config().esd.watchdog_timeout_ticks);

    power_up(b);
    b.set_auto_kick(true);
    b.press_ack_button();
    b.check_state(false, "running after ACK");

    b.run(timeout * 3);
    b.check_state(false, "regular kicks keep the process running");

    b.set_auto_kick(false);
    b.run(timeout + 1);
    b.check_state(true, "shutdown after a silent timeout window");
    let reason = b.controller().trip_reason();
    b.check(
        "trip reason is watchdog",
        reason == Some(TripReason::Watchdog),
        Some(format!("{reason:?}")),
    );

    b.set_wdg_kick(true);
    b.run(1);
    b.set_wdg_kick(false);
    b.run(timeout / 10);
    b.check_state(true, "kicking alone does not recover");

    b.set_auto_kick(true);
    b.press_ack_button();
    b.check_state(false, "ACK with live kicks recovers");
    b.set_auto_kick(false);
}

fn dual_estop(b: &mut Bench) {
    power_up(b);
    b.set_auto_kick(true);
    b.press_ack_button();
    b.check_state(false, "running after ACK");
    both_estops(b);

    b.set_estop_b(true);
    b.wait_for_debounce();
    b.press_ack_button();
    b.check_state(true, "ACK while E-STOP B asserted is ignored");
    b.set_estop_b(false);
    b.wait_for_debounce();
    b.check_state(true, "still shutdown after release");
    b.set_auto_kick(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::BenchConfig;
    use controller::EsdConfig;

    fn bench() -> Bench {
        let esd = EsdConfig {
            debounce_ticks: 20,
            watchdog_timeout_ticks: 2_000,
            blink_half_period_ticks: 100,
            ..Default::default()
        };
        Bench::new(BenchConfig::new(esd)).unwrap()
    }

    #[test]
    fn every_scenario_passes_on_a_scaled_bench() {
        for s in Scenario::ALL {
            let report = s.run(&mut bench());
            let failed: Vec<_> = report.checks.iter().filter(|c| !c.passed).collect();
            assert!(failed.is_empty(), "{}: {failed:?}", s.label());
            assert!(!report.checks.is_empty());
        }
    }

    #[test]
    fn full_sequence_passes_with_bench_timing() {
        let mut b = Bench::new(BenchConfig::default()).unwrap();
        let report = Scenario::FullSequence.run(&mut b);
        assert!(report.passed(), "{:?}", report.checks);
        assert_eq!(report.failed_count(), 0);
    }
}
