use esd_controller as esd;
use proptest::prelude::*;

fn controller(debounce: u32, timeout: u32) -> esd::EsdController {
    esd::EsdController::new(esd::EsdConfig {
        debounce_ticks: debounce,
        watchdog_timeout_ticks: timeout,
        sync_depth: 2,
        blink_half_period_ticks: 4,
        ..Default::default()
    })
    .unwrap()
}

/// Inputs biased towards runs, so debounced levels actually change.
fn input_runs() -> impl Strategy<Value = Vec<esd::TickInputs>> {
    let step = (0u8..32, 1usize..12, prop::bool::weighted(0.02)).prop_map(
        |(bits, len, reset)| {
            vec![esd::TickInputs::from_bits(bits, reset, true); len]
        },
    );
    prop::collection::vec(step, 1..40).prop_map(|runs| runs.concat())
}

proptest! {
    #[test]
    fn outputs_mirror_state(inputs in input_runs(), debounce in 1u32..5, timeout in 5u32..60) {
        let mut c = controller(debounce, timeout);
        for i in &inputs {
            let out = c.tick(i);
            prop_assert_eq!(out.shutdown, c.state() == esd::SafetyState::Shutdown);
            if out.shutdown {
                prop_assert!(out.indicator);
            }
        }
    }

    #[test]
    fn never_runs_without_ack(inputs in input_runs(), debounce in 1u32..5) {
        let mut c = controller(debounce, 20);
        for i in &inputs {
            let i = esd::TickInputs { ack: false, ..*i };
            c.tick(&i);
            prop_assert_eq!(c.state(), esd::SafetyState::Shutdown);
        }
    }

    #[test]
    fn every_recovery_is_clean(inputs in input_runs(), debounce in 1u32..5) {
        let mut c = controller(debounce, 30);
        for i in &inputs {
            c.tick(i);
            if c.last_transition() == Some(esd::Transition::Recovered) {
                let k = c.conditioned();
                prop_assert!(k.ack_edge);
                prop_assert!(!k.estop_a && !k.estop_b);
                prop_assert!(!c.watchdog().expired());
            }
        }
    }

    #[test]
    fn asserted_estop_means_shutdown(inputs in input_runs(), debounce in 1u32..5) {
        let mut c = controller(debounce, 30);
        for i in &inputs {
            c.tick(i);
            if i.reset {
                continue;
            }
            let k = c.conditioned();
            if k.estop_a || k.estop_b {
                prop_assert_eq!(c.state(), esd::SafetyState::Shutdown);
            }
        }
    }

    #[test]
    fn reset_always_restores_safe_outputs(inputs in input_runs()) {
        let mut c = controller(2, 10);
        for i in &inputs {
            c.tick(i);
        }
        let out = c.tick(&esd::TickInputs { reset: true, ..Default::default() });
        prop_assert_eq!(out, esd::TickOutputs::default());
        prop_assert_eq!(c.trip_reason(), Some(esd::TripReason::Reset));
    }

    #[test]
    fn disabled_ticks_change_nothing(inputs in input_runs(), split in 0usize..100) {
        let mut c = controller(2, 10);
        let split = split.min(inputs.len());
        for i in &inputs[..split] {
            c.tick(i);
        }
        let held = c.outputs();
        let state = c.state();
        for i in &inputs[split..] {
            let i = esd::TickInputs { enable: false, reset: false, ..*i };
            prop_assert_eq!(c.tick(&i), held);
        }
        prop_assert_eq!(c.state(), state);
    }
}
