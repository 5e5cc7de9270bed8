use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Contact bounce model, in ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounce {
    pub mean_ticks: f64,
    pub std_ticks: f64,
}

impl Bounce {
    pub fn none() -> Self {
        Self {
            mean_ticks: 0.0,
            std_ticks: 0.0,
        }
    }
}

/// Mechanical push button or mushroom-head E-Stop, in logical polarity
/// (true = pressed).
#[derive(Clone, Debug)]
pub struct PushButton {
    pub bounce: Bounce,
    pressed: bool,
    bounce_left: u32,
    rng: StdRng,
}

impl PushButton {
    pub fn new(seed: u64, bounce: Bounce) -> Self {
        Self {
            bounce,
            pressed: false,
            bounce_left: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Command a new position. The contact chatters for a random interval
    /// after every change.
    pub fn set(&mut self, pressed: bool) {
        if pressed == self.pressed {
            return;
        }
        self.pressed = pressed;
        self.bounce_left = self.bounce_ticks();
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_bouncing(&self) -> bool {
        self.bounce_left > 0
    }

    /// Contact level seen by the input pin this tick.
    pub fn sample(&mut self) -> bool {
        if self.bounce_left > 0 {
            self.bounce_left -= 1;
            return self.rng.gen_bool(0.5);
        }
        self.pressed
    }

    fn bounce_ticks(&mut self) -> u32 {
        if self.bounce.mean_ticks <= 0.0 {
            return 0;
        }
        let ticks = match Normal::new(self.bounce.mean_ticks, self.bounce.std_ticks.max(0.0)) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => self.bounce.mean_ticks,
        };
        ticks.max(0.0).round() as u32
    }
}

/// Periodic liveness pulses from the protected process.
#[derive(Clone, Debug)]
pub struct KickSource {
    pub period_ticks: u32,
    enabled: bool,
    manual: bool,
    phase: u32,
}

impl KickSource {
    pub fn new(period_ticks: u32) -> Self {
        Self {
            period_ticks: period_ticks.max(2),
            enabled: false,
            manual: false,
            phase: 0,
        }
    }

    /// Start or stop automatic kicking. Starting kicks on the next tick.
    pub fn set_auto(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.phase = 0;
        }
        self.enabled = enabled;
    }

    pub fn is_auto(&self) -> bool {
        self.enabled
    }

    /// Level driven directly when automatic kicking is off.
    pub fn set_manual(&mut self, level: bool) {
        self.manual = level;
    }

    pub fn sample(&mut self) -> bool {
        if !self.enabled {
            return self.manual;
        }
        let level = self.phase == 0;
        self.phase = (self.phase + 1) % self.period_ticks;
        level
    }
}

/// A signal produced in a foreign clock domain.
///
/// On the tick after the source changes, the captured value is unresolved and
/// comes out as a coin flip; afterwards it reads back cleanly.
#[derive(Clone, Debug)]
pub struct ForeignClockSignal {
    /// Toggle automatically every this many ticks, if set.
    pub period_ticks: Option<u32>,
    level: bool,
    unresolved: bool,
    phase: u32,
    rng: StdRng,
}

impl ForeignClockSignal {
    pub fn new(seed: u64) -> Self {
        Self {
            period_ticks: None,
            level: false,
            unresolved: false,
            phase: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set(&mut self, level: bool) {
        if level != self.level {
            self.level = level;
            self.unresolved = true;
        }
    }

    pub fn level(&self) -> bool {
        self.level
    }

    pub fn sample(&mut self) -> bool {
        if let Some(period) = self.period_ticks.filter(|p| *p > 0) {
            self.phase += 1;
            if self.phase >= period {
                self.phase = 0;
                let next = !self.level;
                self.set(next);
            }
        }

        if self.unresolved {
            self.unresolved = false;
            return self.rng.gen_bool(0.5);
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_without_bounce_is_clean() {
        let mut b = PushButton::new(1, Bounce::none());
        b.set(true);
        assert!(b.is_pressed());
        assert!(!b.is_bouncing());
        assert!(b.sample());
    }

    #[test]
    fn button_settles_after_bounce() {
        let mut b = PushButton::new(
            7,
            Bounce {
                mean_ticks: 20.0,
                std_ticks: 5.0,
            },
        );
        b.set(true);
        for _ in 0..200 {
            b.sample();
        }
        assert!(!b.is_bouncing());
        assert!((0..50).all(|_| b.sample()));
    }

    #[test]
    fn same_seed_same_chatter() {
        let bounce = Bounce {
            mean_ticks: 30.0,
            std_ticks: 10.0,
        };
        let mut a = PushButton::new(42, bounce);
        let mut b = PushButton::new(42, bounce);
        a.set(true);
        b.set(true);
        let sa: Vec<bool> = (0..60).map(|_| a.sample()).collect();
        let sb: Vec<bool> = (0..60).map(|_| b.sample()).collect();
        assert_eq!(sa, sb);
    }

    #[test]
    fn kick_source_pulses_periodically() {
        let mut k = KickSource::new(4);
        assert!(!k.is_auto());
        k.set_auto(true);
        assert!(k.is_auto());
        let got: Vec<bool> = (0..8).map(|_| k.sample()).collect();
        assert_eq!(got, vec![true, false, false, false, true, false, false, false]);

        k.set_auto(false);
        assert!(!k.sample());
        k.set_manual(true);
        assert!(k.sample());
    }

    #[test]
    fn foreign_signal_resolves_after_one_tick() {
        let mut s = ForeignClockSignal::new(3);
        s.set(true);
        s.sample();
        assert!((0..10).all(|_| s.sample()));
    }

    #[test]
    fn foreign_signal_free_runs() {
        let mut s = ForeignClockSignal::new(3);
        s.period_ticks = Some(5);
        let mut toggles = 0;
        let mut last = s.level();
        for _ in 0..50 {
            s.sample();
            if s.level() != last {
                toggles += 1;
                last = s.level();
            }
        }
        assert_eq!(toggles, 10);
    }
}
