//! Per-tick pin vectors and the physical wiring adapter.
//!
//! The controller core works in active-high logic only. [`PinAdapter`] is the
//! single place where physical polarity is undone.

use serde::{Deserialize, Serialize};

pub const ESTOP_A_BIT: u8 = 0;
pub const ESTOP_B_BIT: u8 = 1;
pub const ACK_BIT: u8 = 2;
pub const WDG_KICK_BIT: u8 = 3;
pub const ASYNC_IN_BIT: u8 = 4;

pub const SHUTDOWN_BIT: u8 = 0;
pub const INDICATOR_BIT: u8 = 1;
pub const SYNC_OUT_BIT: u8 = 2;

fn bit(v: u8, n: u8) -> bool {
    (v >> n) & 1 == 1
}

/// Logical inputs for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInputs {
    pub estop_a: bool,
    pub estop_b: bool,
    pub ack: bool,
    pub kick: bool,
    pub async_in: bool,
    pub reset: bool,
    pub enable: bool,
}

impl Default for TickInputs {
    fn default() -> Self {
        Self {
            estop_a: false,
            estop_b: false,
            ack: false,
            kick: false,
            async_in: false,
            reset: false,
            enable: true,
        }
    }
}

impl TickInputs {
    /// Decode the logical input vector (bits 0-4). Reset and enable are
    /// separate lines.
    pub fn from_bits(bits: u8, reset: bool, enable: bool) -> Self {
        Self {
            estop_a: bit(bits, ESTOP_A_BIT),
            estop_b: bit(bits, ESTOP_B_BIT),
            ack: bit(bits, ACK_BIT),
            kick: bit(bits, WDG_KICK_BIT),
            async_in: bit(bits, ASYNC_IN_BIT),
            reset,
            enable,
        }
    }

    pub fn to_bits(&self) -> u8 {
        u8::from(self.estop_a) << ESTOP_A_BIT
            | u8::from(self.estop_b) << ESTOP_B_BIT
            | u8::from(self.ack) << ACK_BIT
            | u8::from(self.kick) << WDG_KICK_BIT
            | u8::from(self.async_in) << ASYNC_IN_BIT
    }
}

/// Logical outputs for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutputs {
    pub shutdown: bool,
    pub indicator: bool,
    pub sync_out: bool,
}

impl Default for TickOutputs {
    /// The reset state: process held safe, lamp solid on.
    fn default() -> Self {
        Self {
            shutdown: true,
            indicator: true,
            sync_out: false,
        }
    }
}

impl TickOutputs {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            shutdown: bit(bits, SHUTDOWN_BIT),
            indicator: bit(bits, INDICATOR_BIT),
            sync_out: bit(bits, SYNC_OUT_BIT),
        }
    }

    /// Bits 3-7 are always driven low.
    pub fn to_bits(&self) -> u8 {
        u8::from(self.shutdown) << SHUTDOWN_BIT
            | u8::from(self.indicator) << INDICATOR_BIT
            | u8::from(self.sync_out) << SYNC_OUT_BIT
    }
}

/// Electrical polarity of every input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wiring {
    pub estop_a_active_low: bool,
    pub estop_b_active_low: bool,
    pub ack_active_low: bool,
    pub kick_active_low: bool,
    pub async_active_low: bool,
    pub reset_active_low: bool,
}

impl Wiring {
    /// Identity wiring: every line is active-high.
    pub fn logical() -> Self {
        Self {
            estop_a_active_low: false,
            estop_b_active_low: false,
            ack_active_low: false,
            kick_active_low: false,
            async_active_low: false,
            reset_active_low: false,
        }
    }

    /// Normally-closed E-Stops and Ack to ground, `rst_n` reset.
    pub fn bench() -> Self {
        Self {
            estop_a_active_low: true,
            estop_b_active_low: true,
            ack_active_low: true,
            reset_active_low: true,
            ..Self::logical()
        }
    }

    /// XOR mask that turns a physical `ui_in` byte into logical bits (and
    /// back; the mapping is its own inverse).
    fn input_mask(&self) -> u8 {
        u8::from(self.estop_a_active_low) << ESTOP_A_BIT
            | u8::from(self.estop_b_active_low) << ESTOP_B_BIT
            | u8::from(self.ack_active_low) << ACK_BIT
            | u8::from(self.kick_active_low) << WDG_KICK_BIT
            | u8::from(self.async_active_low) << ASYNC_IN_BIT
    }
}

impl Default for Wiring {
    fn default() -> Self {
        Self::bench()
    }
}

/// Converts between the physical pin bus and the logical tick vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PinAdapter {
    wiring: Wiring,
}

impl PinAdapter {
    pub fn new(wiring: Wiring) -> Self {
        Self { wiring }
    }

    pub fn wiring(&self) -> Wiring {
        self.wiring
    }

    pub fn decode(&self, ui_in: u8, rst: bool, ena: bool) -> TickInputs {
        let logical = ui_in ^ self.wiring.input_mask();
        TickInputs::from_bits(logical, rst != self.wiring.reset_active_low, ena)
    }

    /// Physical `ui_in` byte and reset line level for the given logical
    /// inputs. Bits 5-7 are left low.
    pub fn encode(&self, inputs: &TickInputs) -> (u8, bool) {
        let ui_in = inputs.to_bits() ^ self.wiring.input_mask();
        (ui_in, inputs.reset != self.wiring.reset_active_low)
    }

    pub fn drive(&self, outputs: &TickOutputs) -> u8 {
        outputs.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_idle_bus_is_all_released() {
        // All lines high on the bench means nothing pressed.
        let a = PinAdapter::new(Wiring::bench());
        let i = a.decode(0b0000_0111, true, true);
        assert!(!i.estop_a && !i.estop_b && !i.ack);
        assert!(!i.kick && !i.async_in);
        assert!(!i.reset);
        assert!(i.enable);
    }

    #[test]
    fn bench_estop_a_low_is_pressed() {
        let a = PinAdapter::new(Wiring::bench());
        let i = a.decode(0b1_1110, true, true);
        assert!(i.estop_a);
        assert!(!i.estop_b);
        assert!(i.kick && i.async_in);
    }

    #[test]
    fn bench_rst_n_low_is_reset() {
        let a = PinAdapter::default();
        assert!(a.decode(0xff, false, true).reset);
    }

    #[test]
    fn encode_inverts_decode() {
        let a = PinAdapter::new(Wiring::bench());
        let i = TickInputs {
            estop_b: true,
            kick: true,
            reset: true,
            ..Default::default()
        };
        let (ui_in, rst_n) = a.encode(&i);
        assert_eq!(ui_in, 0b0000_1101);
        assert!(!rst_n);
        assert_eq!(a.decode(ui_in, rst_n, true), i);
    }

    #[test]
    fn outputs_use_low_three_bits() {
        let o = TickOutputs {
            shutdown: true,
            indicator: false,
            sync_out: true,
        };
        assert_eq!(PinAdapter::default().drive(&o), 0b101);
        assert_eq!(TickOutputs::from_bits(0b1111_1101), o);
    }

    #[test]
    fn logical_wiring_passes_through() {
        let a = PinAdapter::new(Wiring::logical());
        assert_ne!(a.wiring(), PinAdapter::default().wiring());
        let i = a.decode(0b1_0101, true, false);
        assert!(i.estop_a && i.ack && i.async_in);
        assert!(!i.estop_b && !i.kick);
        assert!(i.reset);
        assert!(!i.enable);
    }
}
