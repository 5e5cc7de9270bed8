//! Clocked input conditioning primitives.
//!
//! Everything here advances by exactly one `step` per controller tick and
//! holds its own state; there is no notion of wall-clock time.

/// Debounce filter for a push-button class input.
///
/// The stable value follows the raw input only after the raw input has
/// disagreed with it for `threshold` consecutive ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Debouncer {
    threshold: u32,
    stable: bool,
    mismatch: u32,
}

impl Debouncer {
    /// `threshold` is clamped to at least 1 (a threshold of 1 follows the
    /// input without filtering).
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            stable: false,
            mismatch: 0,
        }
    }

    pub fn reset(&mut self) {
        self.stable = false;
        self.mismatch = 0;
    }

    /// Consume one raw sample and return the stable value after it.
    pub fn step(&mut self, raw: bool) -> bool {
        if raw == self.stable {
            self.mismatch = 0;
            return self.stable;
        }

        self.mismatch += 1;
        if self.mismatch >= self.threshold {
            self.stable = raw;
            self.mismatch = 0;
        }
        self.stable
    }

    pub fn stable(&self) -> bool {
        self.stable
    }

    /// Consecutive ticks the raw input has disagreed with the stable value.
    pub fn mismatch(&self) -> u32 {
        self.mismatch
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

/// Rising-edge detector: a one-tick pulse on every false -> true transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeDetector {
    prev: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.prev = false;
    }

    pub fn step(&mut self, level: bool) -> bool {
        let rose = level && !self.prev;
        self.prev = level;
        rose
    }

    pub fn previous(&self) -> bool {
        self.prev
    }
}

/// Multi-stage synchronizer for a signal coming from a foreign clock domain.
///
/// Stored as a ring of `depth` stages; the oldest stage is the only one ever
/// exposed, so the output lags the input by exactly `depth` ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Synchronizer {
    stages: Vec<bool>,
    head: usize,
}

impl Synchronizer {
    pub const MIN_DEPTH: usize = 2;
    pub const MAX_DEPTH: usize = 16;

    /// `depth` is clamped to `MIN_DEPTH..=MAX_DEPTH`.
    pub fn new(depth: usize) -> Self {
        Self {
            stages: vec![false; depth.clamp(Self::MIN_DEPTH, Self::MAX_DEPTH)],
            head: 0,
        }
    }

    pub fn reset(&mut self) {
        self.stages.iter_mut().for_each(|s| *s = false);
        self.head = 0;
    }

    /// Shift `async_in` into the first stage and return the value falling out
    /// of the last one.
    pub fn step(&mut self, async_in: bool) -> bool {
        // `head` always points at the oldest stage.
        let out = self.stages[self.head];
        self.stages[self.head] = async_in;
        self.head = (self.head + 1) % self.stages.len();
        out
    }

    /// Value that will be emitted on the next step.
    pub fn output(&self) -> bool {
        self.stages[self.head]
    }

    pub fn depth(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_rejects_short_glitch() {
        let mut d = Debouncer::new(3);
        assert!(!d.step(true));
        assert!(!d.step(true));
        assert!(!d.step(false));
        assert_eq!(d.mismatch(), 0);
        assert!(!d.step(true));
        assert!(!d.step(false));
        assert!(!d.stable());
    }

    #[test]
    fn debounce_accepts_on_threshold_tick() {
        let mut d = Debouncer::new(3);
        assert!(!d.step(true));
        assert!(!d.step(true));
        assert!(d.step(true));
        assert_eq!(d.mismatch(), 0);

        // Release needs the same sustained window.
        assert!(d.step(false));
        assert!(d.step(false));
        assert!(!d.step(false));
    }

    #[test]
    fn debounce_threshold_one_is_transparent() {
        let mut d = Debouncer::new(0);
        assert_eq!(d.threshold(), 1);
        assert!(d.step(true));
        assert!(!d.step(false));
    }

    #[test]
    fn edge_detector_pulses_once_per_press() {
        let mut e = EdgeDetector::new();
        let seq = [false, true, true, true, false, true, false];
        let got: Vec<bool> = seq.iter().map(|&v| e.step(v)).collect();
        assert_eq!(got, vec![false, true, false, false, false, true, false]);
        assert!(!e.previous());

        e.step(true);
        e.reset();
        assert!(!e.previous());
        assert!(e.step(true));
    }

    #[test]
    fn synchronizer_lags_by_depth() {
        for depth in 2..6 {
            let mut s = Synchronizer::new(depth);
            let mut outs = Vec::new();
            for t in 0..12 {
                outs.push(s.step(t == 1));
            }
            let first_high = outs.iter().position(|&v| v).unwrap();
            assert_eq!(first_high, 1 + depth, "depth {depth}");
            assert_eq!(outs.iter().filter(|&&v| v).count(), 1);
        }
    }

    #[test]
    fn synchronizer_output_previews_next_step() {
        let mut s = Synchronizer::new(2);
        s.step(true);
        assert!(!s.output());
        s.step(false);
        assert!(s.output());
        assert!(s.step(false));
        assert!(!s.output());
    }

    #[test]
    fn synchronizer_depth_floor() {
        assert_eq!(Synchronizer::new(1).depth(), Synchronizer::MIN_DEPTH);
        assert_eq!(Synchronizer::new(usize::MAX).depth(), Synchronizer::MAX_DEPTH);
    }

    #[test]
    fn synchronizer_reset_clears_pipeline() {
        let mut s = Synchronizer::new(3);
        s.step(true);
        s.step(true);
        s.reset();
        assert!(!s.step(false));
        assert!(!s.step(false));
        assert!(!s.step(false));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn synchronizer_is_pure_delay(
                depth in 2usize..8,
                input in prop::collection::vec(any::<bool>(), 0..64),
            ) {
                let mut s = Synchronizer::new(depth);
                let out: Vec<bool> = input.iter().map(|&v| s.step(v)).collect();
                for (t, v) in out.iter().enumerate() {
                    let expected = t.checked_sub(depth).map(|i| input[i]).unwrap_or(false);
                    prop_assert_eq!(*v, expected);
                }
            }

            #[test]
            fn debounce_never_changes_on_short_runs(
                threshold in 2u32..10,
                input in prop::collection::vec(any::<bool>(), 0..128),
            ) {
                let mut d = Debouncer::new(threshold);
                let mut run = 0u32;
                let mut last = false;
                for v in input {
                    let before = d.stable();
                    let after = d.step(v);
                    run = if v == last { run + 1 } else { 1 };
                    last = v;
                    if before != after {
                        prop_assert!(run >= threshold);
                    }
                }
            }
        }
    }
}
