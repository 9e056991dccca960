//! LED-update frame encoding
//!
//! The source surface takes one SysEx payload that sets the color of every
//! pad at once. Colors are 8-bit per channel but SysEx data bytes are 7-bit,
//! so each channel travels as two nibble bytes.

use super::{PadState, Rgb};

/// Fixed payload header (manufacturer, device, command, length, offset)
pub const FRAME_HEADER: [u8; 6] = [0x47, 0x7F, 0x4C, 0x06, 0x00, 0x30];

/// Bytes emitted per pad
pub const BYTES_PER_PAD: usize = 6;

/// Payload length for a matrix of `pad_count` pads
pub const fn frame_len(pad_count: usize) -> usize {
    FRAME_HEADER.len() + BYTES_PER_PAD * pad_count
}

/// Split a byte into (high nibble, low nibble), both in 0-15
pub const fn split_nibbles(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

/// Inverse of [`split_nibbles`]
pub const fn join_nibbles(high: u8, low: u8) -> u8 {
    ((high & 0x0F) << 4) | (low & 0x0F)
}

impl Rgb {
    /// Nibble bytes in wire order: R_high, R_low, G_high, G_low, B_high, B_low
    pub fn to_nibbles(self) -> [u8; BYTES_PER_PAD] {
        let (r_high, r_low) = split_nibbles(self.red);
        let (g_high, g_low) = split_nibbles(self.green);
        let (b_high, b_low) = split_nibbles(self.blue);
        [r_high, r_low, g_high, g_low, b_high, b_low]
    }

    /// Rebuild a color from six nibble bytes in wire order
    pub fn from_nibbles(bytes: [u8; BYTES_PER_PAD]) -> Self {
        Rgb {
            red: join_nibbles(bytes[0], bytes[1]),
            green: join_nibbles(bytes[2], bytes[3]),
            blue: join_nibbles(bytes[4], bytes[5]),
        }
    }
}

/// Encode pad states into a LED-update payload
pub fn encode<'a>(pads: impl ExactSizeIterator<Item = &'a PadState>) -> Vec<u8> {
    let mut frame = Vec::with_capacity(frame_len(pads.len()));
    frame.extend_from_slice(&FRAME_HEADER);

    for pad in pads {
        if pad.is_lit() {
            frame.extend_from_slice(&pad.color.to_nibbles());
        } else {
            frame.extend_from_slice(&[0; BYTES_PER_PAD]);
        }
    }

    frame
}
