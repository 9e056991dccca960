//! Pad state model
//!
//! A fixed-length matrix of pad states, the cc -> pad index lookup, and the
//! actor that owns the matrix at runtime.

pub mod actor;
pub mod actor_handle;
pub mod commands;
pub mod frame;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PadConfig;

pub use actor::PadActor;
pub use actor_handle::PadMatrixHandle;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([red, green, blue]: [u8; 3]) -> Self {
        Self { red, green, blue }
    }
}

/// Runtime state of one pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadState {
    pub on: bool,
    pub color: Rgb,
    reverse: bool,
    is_static: bool,
}

impl PadState {
    /// Fresh pad in the off state
    pub fn from_config(config: &PadConfig) -> Self {
        Self {
            on: false,
            color: Rgb::from(config.rgb),
            reverse: config.reverse,
            is_static: config.is_static,
        }
    }

    /// Whether the LED shows the pad color: `on || static`, flipped by `reverse`
    pub fn is_lit(&self) -> bool {
        (self.on || self.is_static) != self.reverse
    }
}

/// Ordered, fixed-length collection of pad states
///
/// Mutators ignore out-of-range indices and report whether anything was
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadMatrix {
    pads: Vec<PadState>,
}

impl PadMatrix {
    /// Build the matrix from the configured pads, one pad per entry
    pub fn new(pads_config: &[PadConfig]) -> Self {
        Self {
            pads: pads_config.iter().map(PadState::from_config).collect(),
        }
    }

    /// Number of pads, fixed at construction
    pub fn len(&self) -> usize {
        self.pads.len()
    }

    /// True for a matrix built from an empty pad list
    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    /// Read-only view of one pad, `None` when out of range
    pub fn get(&self, index: usize) -> Option<&PadState> {
        self.pads.get(index)
    }

    /// Pads in index order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &PadState> {
        self.pads.iter()
    }

    /// Flip the `on` flag of a pad
    pub fn toggle(&mut self, index: usize) -> bool {
        match self.pads.get_mut(index) {
            Some(pad) => {
                pad.on = !pad.on;
                true
            }
            None => false,
        }
    }

    /// Set the `on` flag of a pad
    pub fn set_on(&mut self, index: usize, on: bool) -> bool {
        match self.pads.get_mut(index) {
            Some(pad) => {
                pad.on = on;
                true
            }
            None => false,
        }
    }

    /// Replace the color of a pad
    pub fn set_color(&mut self, index: usize, color: Rgb) -> bool {
        match self.pads.get_mut(index) {
            Some(pad) => {
                pad.color = color;
                true
            }
            None => false,
        }
    }

    /// Encode the whole matrix into a LED-update payload (without F0/F7)
    pub fn encode(&self) -> Vec<u8> {
        frame::encode(self.pads.iter())
    }
}

/// A pad whose cc was taken over by a later pad with the same cc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowedPad {
    pub cc: u8,
    pub shadowed: usize,
    pub winner: usize,
}

/// Immutable cc -> pad index lookup
///
/// When several pads share a cc, the one declared last wins. The overridden
/// pads are kept in `shadowed` so the loader can report them.
#[derive(Debug, Clone, Default)]
pub struct CcIndex {
    by_cc: HashMap<u8, usize>,
    shadowed: Vec<ShadowedPad>,
}

impl CcIndex {
    pub fn new(pads_config: &[PadConfig]) -> Self {
        let mut index = CcIndex::default();
        for (pad, config) in pads_config.iter().enumerate() {
            if let Some(previous) = index.by_cc.insert(config.cc, pad) {
                index.shadowed.push(ShadowedPad {
                    cc: config.cc,
                    shadowed: previous,
                    winner: pad,
                });
            }
        }
        index
    }

    /// Pad index addressed by `cc`
    pub fn get(&self, cc: u8) -> Option<usize> {
        self.by_cc.get(&cc).copied()
    }

    /// Pads whose cc is taken by a later pad, in configuration order
    pub fn shadowed(&self) -> &[ShadowedPad] {
        &self.shadowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pad(cc: u8, rgb: [u8; 3], is_static: bool, reverse: bool) -> PadConfig {
        PadConfig { cc, rgb, is_static, reverse }
    }

    fn three_pads() -> Vec<PadConfig> {
        vec![
            pad(10, [255, 0, 0], false, false),
            pad(11, [0, 255, 0], false, false),
            pad(12, [0, 0, 255], false, false),
        ]
    }

    #[test]
    fn test_new_matrix_is_off() {
        let matrix = PadMatrix::new(&three_pads());
        assert_eq!(matrix.len(), 3);
        assert!(matrix.iter().all(|p| !p.on));
        assert_eq!(matrix.get(2).unwrap().color, Rgb::new(0, 0, 255));
        assert!(matrix.get(3).is_none());
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let mut matrix = PadMatrix::new(&three_pads());
        let before = matrix.clone();

        assert!(!matrix.toggle(3));
        assert!(!matrix.set_on(99, true));
        assert!(!matrix.set_color(3, Rgb::new(1, 2, 3)));
        assert_eq!(matrix, before);
    }

    #[test]
    fn test_set_on_and_color() {
        let mut matrix = PadMatrix::new(&three_pads());
        assert!(matrix.set_on(1, true));
        assert!(matrix.set_color(1, Rgb::new(1, 2, 3)));

        let pad = matrix.get(1).unwrap();
        assert!(pad.on);
        assert_eq!(pad.color, Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_encode_lit_pad() {
        let mut matrix = PadMatrix::new(&three_pads());
        matrix.toggle(0);

        let mut expected = vec![0x47, 0x7F, 0x4C, 0x06, 0x00, 0x30];
        expected.extend_from_slice(&[0x0F, 0x0F, 0x00, 0x00, 0x00, 0x00]);
        expected.extend_from_slice(&[0; 12]);
        assert_eq!(matrix.encode(), expected);
    }

    #[test]
    fn test_static_and_reverse() {
        let pads = vec![
            pad(1, [0x12, 0x34, 0x56], true, false), // static: lit while off
            pad(2, [0x12, 0x34, 0x56], false, true), // reverse: lit while off
            pad(3, [0x12, 0x34, 0x56], true, true),  // static + reverse: never lit
        ];
        let mut matrix = PadMatrix::new(&pads);
        let color = Rgb::new(0x12, 0x34, 0x56).to_nibbles();

        let frame = matrix.encode();
        assert_eq!(&frame[6..12], &color);
        assert_eq!(&frame[12..18], &color);
        assert_eq!(&frame[18..24], &[0; 6]);

        for index in 0..3 {
            matrix.set_on(index, true);
        }
        let frame = matrix.encode();
        assert_eq!(&frame[6..12], &color);
        assert_eq!(&frame[12..18], &[0; 6]);
        assert_eq!(&frame[18..24], &[0; 6]);
    }

    #[test]
    fn test_set_color_changes_lit_frame() {
        let mut matrix = PadMatrix::new(&three_pads());
        assert!(matrix.set_on(0, true));
        assert!(matrix.set_color(0, Rgb::new(1, 2, 3)));

        let frame = matrix.encode();
        assert_eq!(&frame[6..12], &Rgb::new(1, 2, 3).to_nibbles());
        assert_eq!(&frame[6..12], &[0x00, 0x01, 0x00, 0x02, 0x00, 0x03]);

        // An unlit pad keeps its new color out of the frame
        assert!(matrix.set_color(1, Rgb::new(9, 9, 9)));
        assert_eq!(&matrix.encode()[12..18], &[0; 6]);
    }

    #[test]
    fn test_encode_is_pure() {
        let mut matrix = PadMatrix::new(&three_pads());
        matrix.toggle(2);
        assert_eq!(matrix.encode(), matrix.encode());
    }

    #[test]
    fn test_cc_index_last_wins() {
        let pads = vec![
            pad(10, [1, 1, 1], false, false),
            pad(20, [2, 2, 2], false, false),
            pad(10, [3, 3, 3], false, false),
        ];
        let index = CcIndex::new(&pads);

        assert_eq!(index.get(10), Some(2));
        assert_eq!(index.get(20), Some(1));
        assert_eq!(index.get(30), None);
        assert_eq!(
            index.shadowed(),
            &[ShadowedPad { cc: 10, shadowed: 0, winner: 2 }]
        );
    }

    proptest! {
        #[test]
        fn prop_double_toggle_restores(
            flags in proptest::collection::vec(any::<bool>(), 1..16),
            pick in any::<prop::sample::Index>(),
        ) {
            let pads: Vec<PadConfig> = (0..flags.len())
                .map(|i| pad(i as u8, [i as u8, 0, 0], false, false))
                .collect();
            let mut matrix = PadMatrix::new(&pads);
            for (i, on) in flags.iter().enumerate() {
                matrix.set_on(i, *on);
            }
            let index = pick.index(flags.len());
            let before = matrix.clone();

            matrix.toggle(index);
            matrix.toggle(index);
            prop_assert_eq!(matrix, before);
        }

        #[test]
        fn prop_frame_len(count in 0usize..64, on in any::<bool>()) {
            let pads: Vec<PadConfig> = (0..count)
                .map(|i| pad((i % 128) as u8, [200, 100, 50], false, false))
                .collect();
            let mut matrix = PadMatrix::new(&pads);
            if on && count > 0 {
                matrix.toggle(0);
            }
            prop_assert_eq!(matrix.encode().len(), frame::frame_len(count));
        }

        #[test]
        fn prop_reverse_flips_lit_only(on: bool, is_static: bool, red: u8, green: u8, blue: u8) {
            let plain = vec![pad(1, [red, green, blue], is_static, false)];
            let reversed = vec![pad(1, [red, green, blue], is_static, true)];
            let mut a = PadMatrix::new(&plain);
            let mut b = PadMatrix::new(&reversed);
            a.set_on(0, on);
            b.set_on(0, on);

            let lit = &Rgb::new(red, green, blue).to_nibbles()[..];
            let (fa, fb) = (a.encode(), b.encode());
            if a.get(0).unwrap().is_lit() {
                prop_assert_eq!(&fa[6..], lit);
                prop_assert_eq!(&fb[6..], &[0u8; 6][..]);
            } else {
                prop_assert_eq!(&fa[6..], &[0u8; 6][..]);
                prop_assert_eq!(&fb[6..], lit);
            }
        }
    }
}
