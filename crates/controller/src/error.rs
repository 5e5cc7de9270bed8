//! Configuration errors.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Rejected controller configurations. The running controller itself has no
/// error path; faults are reported through its outputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("debounce threshold must be at least one tick")]
    ZeroDebounce,

    #[error("watchdog timeout must be at least one tick")]
    ZeroTimeout,

    #[error("blink half period must be at least one tick")]
    ZeroBlinkPeriod,

    #[error("synchronizer depth {depth} is below the minimum of {min}")]
    SyncDepthTooShallow { depth: usize, min: usize },

    #[error("synchronizer depth {depth} is above the maximum of {max}")]
    SyncDepthTooDeep { depth: usize, max: usize },

    #[error("{what} of {ms} ms is shorter than one tick at {clock_hz} Hz")]
    ClockTooSlow {
        what: &'static str,
        ms: u32,
        clock_hz: u32,
    },

    #[error("{what} of {ms} ms does not fit a 32-bit tick counter at {clock_hz} Hz")]
    DurationOverflow {
        what: &'static str,
        ms: u32,
        clock_hz: u32,
    },
}
