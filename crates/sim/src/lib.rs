//! Simulated test bench for the ESD controller.
//!
//! Models the physical side of the pins (bouncing contacts, a kicking
//! process, a foreign-clock signal) and replays the verification sequences
//! against a controller through its wiring adapter.

pub mod bench;
pub mod scenario;
pub mod source;

pub use bench::{Bench, BenchConfig, Check, TraceRow};
pub use scenario::{Scenario, ScenarioReport};
pub use source::{Bounce, ForeignClockSignal, KickSource, PushButton};
