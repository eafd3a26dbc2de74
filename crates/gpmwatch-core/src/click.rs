//! Click notifications multiplexed over a bank of real-time signals.
//!
//! The producer's out-of-band channel carries no payload, only a signal
//! number. It raises `SIGNAL_BASE + offset` where the offset packs two
//! fields:
//!
//! ```text
//!   bit  3 2   1 0
//!       [ t ] [ b ]    t = multiplicity, b = button
//! ```
//!
//! so `0b0101` is a single left click and `0b1110` a triple middle click.

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// First signal number of the bank.
pub const SIGNAL_BASE: i32 = 40;

/// Number of consecutive signals reserved for the bank.
pub const SIGNAL_BANK_SIZE: i32 = 17;

/// Which mouse button was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    None,
    Left,
    Right,
    Middle,
}

impl Button {
    /// Decode the low two bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            1 => Button::Left,
            2 => Button::Right,
            3 => Button::Middle,
            _ => Button::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Button::None => "none",
            Button::Left => "left",
            Button::Right => "right",
            Button::Middle => "middle",
        }
    }
}

impl std::fmt::Display for Button {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many clicks gpm counted for this press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    None,
    Single,
    Double,
    Triple,
}

impl Multiplicity {
    /// Decode the low two bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            1 => Multiplicity::Single,
            2 => Multiplicity::Double,
            3 => Multiplicity::Triple,
            _ => Multiplicity::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Multiplicity::None => "none",
            Multiplicity::Single => "single",
            Multiplicity::Double => "double",
            Multiplicity::Triple => "triple",
        }
    }
}

impl std::fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A click captured at the moment its signal was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickReport {
    pub multiplicity: Multiplicity,
    pub button: Button,
    /// Cursor position read when the signal arrived, if the slot was complete.
    pub position: Option<Position>,
}

/// Signal numbers of the bank, in offset order.
pub fn bank_signals() -> impl Iterator<Item = i32> {
    SIGNAL_BASE..SIGNAL_BASE + SIGNAL_BANK_SIZE
}

/// Decode a bank offset into `(multiplicity, button)`.
///
/// Offsets outside the bank yield `None`.
pub fn decode_offset(offset: i32) -> Option<(Multiplicity, Button)> {
    if !(0..SIGNAL_BANK_SIZE).contains(&offset) {
        return None;
    }
    let bits = offset as u8;
    Some((Multiplicity::from_bits(bits >> 2), Button::from_bits(bits)))
}

/// Decode an absolute signal number from the bank.
pub fn decode_signal(signo: i32) -> Option<(Multiplicity, Button)> {
    decode_offset(signo - SIGNAL_BASE)
}

/// Signal number the producer raises for a click.
pub fn encode_signal(multiplicity: Multiplicity, button: Button) -> i32 {
    SIGNAL_BASE + ((multiplicity as i32) << 2) + button as i32
}
