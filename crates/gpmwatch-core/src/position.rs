//! Shared-memory slot layout and decoding.
//!
//! The producer keeps two ASCII slots at the start of its shared page:
//!
//! | Offset | Length | Content |
//! |--------|--------|---------|
//! | 0 | 12 | `"%05d %05d\n"`: latest cursor position |
//! | 12 | up to first `\n` | `{"b": 1, "t": 1, "x": 10, "y": 20}\n`: latest click |
//!
//! The trailing newline is written last, so a slot without it is mid-write
//! and decodes to `None` rather than to a torn value.

use serde::{Deserialize, Serialize};

use crate::click::{Button, Multiplicity};

/// Byte length of the position slot.
pub const POSITION_SLOT_LEN: usize = 12;

/// Offset of the click record slot.
pub const CLICK_RECORD_OFFSET: usize = POSITION_SLOT_LEN;

/// Largest click record the decoder will look at.
pub const CLICK_RECORD_MAX_LEN: usize = 128;

/// Write-complete marker at the end of every slot.
pub const SENTINEL: u8 = b'\n';

/// Cursor coordinates as reported by gpm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Decode a position slot.
///
/// Returns `None` unless the last byte is the newline sentinel and the
/// content is exactly two whitespace-separated integers.
pub fn decode_position_slot(slot: &[u8]) -> Option<Position> {
    if slot.last() != Some(&SENTINEL) {
        return None;
    }

    let text = std::str::from_utf8(slot).ok()?;
    let mut fields = text.split_ascii_whitespace();
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some(Position { x, y })
}

/// The producer's record of its most recent button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickRecord {
    pub button: Button,
    pub multiplicity: Multiplicity,
    pub position: Position,
}

/// Wire shape of the click record slot.
#[derive(Deserialize)]
struct RawClickRecord {
    b: u8,
    t: u8,
    x: i32,
    y: i32,
}

/// Decode the click record slot.
///
/// `bytes` starts at [`CLICK_RECORD_OFFSET`]; the record ends at the first
/// newline. No newline (fresh page, or a write in progress) means no record.
pub fn decode_click_record(bytes: &[u8]) -> Option<ClickRecord> {
    let window = &bytes[..bytes.len().min(CLICK_RECORD_MAX_LEN)];
    let end = window.iter().position(|&b| b == SENTINEL)?;
    let raw: RawClickRecord = serde_json::from_slice(&window[..end]).ok()?;

    Some(ClickRecord {
        button: Button::from_bits(raw.b),
        multiplicity: Multiplicity::from_bits(raw.t),
        position: Position { x: raw.x, y: raw.y },
    })
}
