//! NES master palette.
//!
//! The emulator reports pixels as palette indices (two hex digits). The
//! upper half of the table (`0x40..0x80`) holds the darkened variants the
//! PPU produces with colour emphasis bits set.

use crate::Rgb;

pub const PALETTE_SIZE: usize = 128;

#[rustfmt::skip]
const PALETTE: [Rgb; PALETTE_SIZE] = [
    Rgb::new(116, 116, 116), Rgb::new(36, 24, 140), Rgb::new(0, 0, 168), Rgb::new(68, 0, 156),
    Rgb::new(140, 0, 116), Rgb::new(168, 0, 16), Rgb::new(164, 0, 0), Rgb::new(124, 8, 0),
    Rgb::new(64, 44, 0), Rgb::new(0, 68, 0), Rgb::new(0, 80, 0), Rgb::new(0, 60, 20),
    Rgb::new(24, 60, 92), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
    Rgb::new(188, 188, 188), Rgb::new(0, 112, 236), Rgb::new(32, 56, 236), Rgb::new(128, 0, 240),
    Rgb::new(188, 0, 188), Rgb::new(228, 0, 88), Rgb::new(216, 40, 0), Rgb::new(200, 76, 12),
    Rgb::new(136, 112, 0), Rgb::new(0, 148, 0), Rgb::new(0, 168, 0), Rgb::new(0, 144, 56),
    Rgb::new(0, 128, 136), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
    Rgb::new(252, 252, 252), Rgb::new(60, 188, 252), Rgb::new(92, 148, 252), Rgb::new(204, 136, 252),
    Rgb::new(244, 120, 252), Rgb::new(252, 116, 180), Rgb::new(252, 116, 96), Rgb::new(252, 152, 56),
    Rgb::new(240, 188, 60), Rgb::new(128, 208, 16), Rgb::new(76, 220, 72), Rgb::new(88, 248, 152),
    Rgb::new(0, 232, 216), Rgb::new(120, 120, 120), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
    Rgb::new(252, 252, 252), Rgb::new(168, 228, 252), Rgb::new(196, 212, 252), Rgb::new(212, 200, 252),
    Rgb::new(252, 196, 252), Rgb::new(252, 196, 216), Rgb::new(252, 188, 176), Rgb::new(252, 216, 168),
    Rgb::new(252, 228, 160), Rgb::new(224, 252, 160), Rgb::new(168, 240, 188), Rgb::new(176, 252, 204),
    Rgb::new(156, 252, 240), Rgb::new(196, 196, 196), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
    Rgb::new(87, 87, 87), Rgb::new(27, 18, 105), Rgb::new(0, 0, 126), Rgb::new(51, 0, 117),
    Rgb::new(105, 0, 87), Rgb::new(126, 0, 12), Rgb::new(123, 0, 0), Rgb::new(93, 6, 0),
    Rgb::new(48, 33, 0), Rgb::new(0, 51, 0), Rgb::new(0, 60, 0), Rgb::new(0, 45, 15),
    Rgb::new(18, 45, 69), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
    Rgb::new(141, 141, 141), Rgb::new(0, 84, 177), Rgb::new(24, 42, 177), Rgb::new(96, 0, 180),
    Rgb::new(141, 0, 141), Rgb::new(171, 0, 66), Rgb::new(162, 30, 0), Rgb::new(150, 57, 9),
    Rgb::new(102, 84, 0), Rgb::new(0, 111, 0), Rgb::new(0, 126, 0), Rgb::new(0, 108, 42),
    Rgb::new(0, 96, 102), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
    Rgb::new(189, 189, 189), Rgb::new(45, 141, 189), Rgb::new(69, 111, 189), Rgb::new(153, 102, 189),
    Rgb::new(183, 90, 189), Rgb::new(189, 87, 135), Rgb::new(189, 87, 72), Rgb::new(189, 114, 42),
    Rgb::new(180, 141, 45), Rgb::new(96, 156, 12), Rgb::new(57, 165, 54), Rgb::new(66, 186, 114),
    Rgb::new(0, 174, 162), Rgb::new(90, 90, 90), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
    Rgb::new(189, 189, 189), Rgb::new(126, 171, 189), Rgb::new(147, 159, 189), Rgb::new(159, 150, 189),
    Rgb::new(189, 147, 189), Rgb::new(189, 147, 162), Rgb::new(189, 141, 132), Rgb::new(189, 162, 126),
    Rgb::new(189, 171, 120), Rgb::new(168, 189, 120), Rgb::new(126, 180, 141), Rgb::new(132, 189, 153),
    Rgb::new(117, 189, 180), Rgb::new(147, 147, 147), Rgb::new(0, 0, 0), Rgb::new(0, 0, 0),
];

/// RGB value of palette entry `index`; out-of-range indices are black.
#[must_use]
pub fn rgb(index: u8) -> Rgb {
    PALETTE.get(usize::from(index)).copied().unwrap_or_default()
}

/// Looks up a palette entry written as two hex digits, case-insensitive.
#[must_use]
pub fn rgb_from_hex(code: &str) -> Rgb {
    u8::from_str_radix(code, 16).map_or(Rgb::default(), rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_entries() {
        assert_eq!(rgb(0x00), Rgb::new(116, 116, 116));
        assert_eq!(rgb_from_hex("22"), Rgb::new(92, 148, 252));
        assert_eq!(rgb_from_hex("7d"), Rgb::new(147, 147, 147));
    }

    #[test]
    fn unknown_codes_are_black() {
        assert_eq!(rgb(0x80), Rgb::default());
        assert_eq!(rgb_from_hex("zz"), Rgb::default());
    }
}
