//! Timing configuration.
//!
//! Every threshold the controller uses is expressed in ticks. [`Timing`]
//! converts wall-clock durations for a given clock into an [`EsdConfig`].

use safety::BlinkPhase;
use serde::{Deserialize, Serialize};
use signal::Synchronizer;

use crate::error::{ConfigError, ConfigResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsdConfig {
    /// Consecutive ticks an input must disagree before the stable value flips.
    pub debounce_ticks: u32,
    /// Ticks without a kick edge before the watchdog latches.
    pub watchdog_timeout_ticks: u32,
    /// Synchronizer stages; output lags the async input by this many ticks.
    pub sync_depth: usize,
    /// Ticks per lamp level while running.
    pub blink_half_period_ticks: u32,
    pub blink_phase: BlinkPhase,
}

impl Default for EsdConfig {
    fn default() -> Self {
        // 100 kHz bench clock: 5 ms debounce, 500 ms watchdog, 2 Hz heartbeat.
        Self {
            debounce_ticks: 500,
            watchdog_timeout_ticks: 50_000,
            sync_depth: 2,
            blink_half_period_ticks: 25_000,
            blink_phase: BlinkPhase::RestartOnEntry,
        }
    }
}

impl EsdConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.debounce_ticks == 0 {
            return Err(ConfigError::ZeroDebounce);
        }
        if self.watchdog_timeout_ticks == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.blink_half_period_ticks == 0 {
            return Err(ConfigError::ZeroBlinkPeriod);
        }
        if self.sync_depth < Synchronizer::MIN_DEPTH {
            return Err(ConfigError::SyncDepthTooShallow {
                depth: self.sync_depth,
                min: Synchronizer::MIN_DEPTH,
            });
        }
        if self.sync_depth > Synchronizer::MAX_DEPTH {
            return Err(ConfigError::SyncDepthTooDeep {
                depth: self.sync_depth,
                max: Synchronizer::MAX_DEPTH,
            });
        }
        Ok(())
    }

    pub fn from_timing(t: &Timing) -> ConfigResult<Self> {
        let cfg = Self {
            debounce_ticks: t.ticks("debounce", t.debounce_ms)?,
            watchdog_timeout_ticks: t.ticks("watchdog timeout", t.watchdog_timeout_ms)?,
            sync_depth: t.sync_depth,
            blink_half_period_ticks: t.ticks("blink half period", t.blink_half_period_ms)?,
            blink_phase: t.blink_phase,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Wall-clock description of a controller build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub clock_hz: u32,
    pub debounce_ms: u32,
    pub watchdog_timeout_ms: u32,
    pub blink_half_period_ms: u32,
    pub sync_depth: usize,
    pub blink_phase: BlinkPhase,
}

impl Timing {
    /// The 100 kHz verification bench.
    pub fn bench_100khz() -> Self {
        Self {
            clock_hz: 100_000,
            debounce_ms: 5,
            watchdog_timeout_ms: 500,
            blink_half_period_ms: 250,
            sync_depth: 2,
            blink_phase: BlinkPhase::RestartOnEntry,
        }
    }

    /// The 50 MHz silicon target.
    pub fn asic_50mhz() -> Self {
        Self {
            clock_hz: 50_000_000,
            debounce_ms: 10,
            ..Self::bench_100khz()
        }
    }

    fn ticks(&self, what: &'static str, ms: u32) -> ConfigResult<u32> {
        let ticks = u64::from(self.clock_hz) * u64::from(ms) / 1000;
        if ticks == 0 {
            return Err(ConfigError::ClockTooSlow {
                what,
                ms,
                clock_hz: self.clock_hz,
            });
        }
        u32::try_from(ticks).map_err(|_| ConfigError::DurationOverflow {
            what,
            ms,
            clock_hz: self.clock_hz,
        })
    }
}
