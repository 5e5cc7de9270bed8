use tracing::debug;

/// Liveness timer for the protected process.
///
/// `elapsed` counts ticks since the last kick edge and saturates at the
/// timeout. The expired flag latches: a kick restarts the window but only
/// [`Watchdog::rearm`] or [`Watchdog::reset`] clears a fault that already
/// happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Watchdog {
    timeout: u32,
    elapsed: u32,
    expired: bool,
}

impl Watchdog {
    /// `timeout` is clamped to at least one tick.
    pub fn new(timeout: u32) -> Self {
        Self {
            timeout: timeout.max(1),
            elapsed: 0,
            expired: false,
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0;
        self.expired = false;
    }

    /// Advance one tick. Returns the latched expired flag.
    pub fn step(&mut self, kick_edge: bool) -> bool {
        if kick_edge {
            self.elapsed = 0;
        } else if self.elapsed < self.timeout {
            self.elapsed += 1;
        }

        if self.elapsed >= self.timeout && !self.expired {
            debug!(timeout = self.timeout, "watchdog expired");
            self.expired = true;
        }
        self.expired
    }

    /// Clear the latch and start a fresh window.
    pub fn rearm(&mut self) {
        if self.expired {
            debug!("watchdog re-armed after timeout");
        }
        self.reset();
    }

    pub fn expired(&self) -> bool {
        self.expired
    }

    /// True while a kick edge has been seen within the current window,
    /// independent of the latch.
    pub fn is_live(&self) -> bool {
        self.elapsed < self.timeout
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_timeout_ticks() {
        let mut w = Watchdog::new(5);
        for _ in 0..4 {
            assert!(!w.step(false));
        }
        assert!(w.step(false));
        assert_eq!(w.elapsed(), 5);
    }

    #[test]
    fn kick_restarts_window() {
        let mut w = Watchdog::new(5);
        for _ in 0..20 {
            for _ in 0..4 {
                assert!(!w.step(false));
            }
            assert!(!w.step(true));
        }
        assert_eq!(w.elapsed(), 0);
    }

    #[test]
    fn kick_does_not_clear_latch() {
        let mut w = Watchdog::new(3);
        for _ in 0..3 {
            w.step(false);
        }
        assert!(w.expired());
        assert!(!w.is_live());

        assert!(w.step(true));
        assert!(w.is_live());
        assert!(w.expired());

        w.rearm();
        assert!(!w.expired());
        assert_eq!(w.elapsed(), 0);
    }

    #[test]
    fn elapsed_saturates() {
        let mut w = Watchdog::new(2);
        for _ in 0..1_000 {
            w.step(false);
        }
        assert_eq!(w.elapsed(), 2);
    }
}
