/*
    Pokekon
    https://github.com/pokekon/pokekon

    Copyright 2024-2026 the Pokekon contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! 5×7 character generator ROM.
//!
//! Two contiguous blocks are defined: printable ASCII (0x20..=0x7E) and
//! JIS X 0201 half-width katakana (0xA1..=0xDF). A glyph is seven rows,
//! top to bottom; bit 4 is the leftmost pixel. Codes without a glyph fall
//! back to space at the text layer.

pub const GLYPH_WIDTH: usize = 5;
pub const GLYPH_HEIGHT: usize = 7;

pub type Glyph = [u8; GLYPH_HEIGHT];

const ASCII_BASE: u8 = 0x20;
const KANA_BASE: u8 = 0xA1;

#[rustfmt::skip]
const FONT_ASCII: [Glyph; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x04, 0x04, 0x04, 0x04, 0x00, 0x00, 0x04], // !
    [0x0A, 0x0A, 0x0A, 0x00, 0x00, 0x00, 0x00], // "
    [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A], // #
    [0x04, 0x0F, 0x14, 0x0E, 0x05, 0x1E, 0x04], // $
    [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03], // %
    [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D], // &
    [0x0C, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00], // '
    [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02], // (
    [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08], // )
    [0x00, 0x04, 0x15, 0x0E, 0x15, 0x04, 0x00], // *
    [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00], // +
    [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08], // ,
    [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C], // .
    [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00], // /
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E], // 0
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E], // 1
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F], // 2
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E], // 3
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02], // 4
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E], // 5
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E], // 6
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E], // 8
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C], // 9
    [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00], // :
    [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x04, 0x08], // ;
    [0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02], // <
    [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00], // =
    [0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08], // >
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04], // ?
    [0x0E, 0x11, 0x01, 0x0D, 0x15, 0x15, 0x0E], // @
    [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11], // A
    [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E], // B
    [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E], // C
    [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C], // D
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F], // E
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10], // F
    [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F], // G
    [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // H
    [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // I
    [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C], // J
    [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11], // K
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F], // L
    [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11], // M
    [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11], // N
    [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // O
    [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10], // P
    [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D], // Q
    [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11], // R
    [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E], // S
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // T
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // U
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04], // V
    [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A], // W
    [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11], // X
    [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04], // Y
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F], // Z
    [0x0E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0E], // [
    [0x00, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00], // backslash
    [0x0E, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0E], // ]
    [0x04, 0x0A, 0x11, 0x00, 0x00, 0x00, 0x00], // ^
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F], // _
    [0x08, 0x04, 0x02, 0x00, 0x00, 0x00, 0x00], // `
    [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F], // a
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E], // b
    [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E], // c
    [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F], // d
    [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E], // e
    [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08], // f
    [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E], // g
    [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11], // h
    [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E], // i
    [0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C], // j
    [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12], // k
    [0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // l
    [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11], // m
    [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11], // n
    [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E], // o
    [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10], // p
    [0x00, 0x00, 0x0D, 0x13, 0x0F, 0x01, 0x01], // q
    [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10], // r
    [0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E], // s
    [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06], // t
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D], // u
    [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04], // v
    [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A], // w
    [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11], // x
    [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E], // y
    [0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F], // z
    [0x02, 0x04, 0x04, 0x08, 0x04, 0x04, 0x02], // {
    [0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // |
    [0x08, 0x04, 0x04, 0x02, 0x04, 0x04, 0x08], // }
    [0x00, 0x00, 0x08, 0x15, 0x02, 0x00, 0x00], // ~
];

#[rustfmt::skip]
const FONT_KANA: [Glyph; 63] = [
    [0x00, 0x00, 0x00, 0x0E, 0x0A, 0x0E, 0x00], // A1 ideographic full stop
    [0x0F, 0x08, 0x08, 0x08, 0x00, 0x00, 0x00], // A2 left corner bracket
    [0x00, 0x00, 0x00, 0x02, 0x02, 0x02, 0x1E], // A3 right corner bracket
    [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08], // A4 ideographic comma
    [0x00, 0x00, 0x0C, 0x0C, 0x00, 0x00, 0x00], // A5 middle dot
    [0x1F, 0x01, 0x1F, 0x01, 0x02, 0x04, 0x08], // A6 wo
    [0x00, 0x00, 0x1F, 0x01, 0x06, 0x0A, 0x04], // A7 small a
    [0x00, 0x00, 0x02, 0x06, 0x0A, 0x02, 0x02], // A8 small i
    [0x00, 0x04, 0x1F, 0x11, 0x01, 0x02, 0x0C], // A9 small u
    [0x00, 0x00, 0x1F, 0x04, 0x04, 0x04, 0x1F], // AA small e
    [0x00, 0x04, 0x1F, 0x04, 0x0C, 0x14, 0x04], // AB small o
    [0x00, 0x08, 0x1F, 0x09, 0x0A, 0x08, 0x00], // AC small ya
    [0x00, 0x00, 0x0E, 0x02, 0x02, 0x1F, 0x00], // AD small yu
    [0x00, 0x00, 0x1F, 0x01, 0x0F, 0x01, 0x1F], // AE small yo
    [0x00, 0x00, 0x15, 0x01, 0x01, 0x02, 0x0C], // AF small tsu
    [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00], // B0 long vowel mark
    [0x1F, 0x01, 0x02, 0x06, 0x0A, 0x12, 0x04], // B1 a
    [0x01, 0x02, 0x06, 0x0A, 0x12, 0x02, 0x02], // B2 i
    [0x04, 0x1F, 0x11, 0x01, 0x02, 0x04, 0x08], // B3 u
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x1F], // B4 e
    [0x04, 0x1F, 0x04, 0x04, 0x0C, 0x14, 0x04], // B5 o
    [0x04, 0x04, 0x1F, 0x05, 0x05, 0x09, 0x12], // B6 ka
    [0x02, 0x02, 0x1F, 0x04, 0x1F, 0x08, 0x08], // B7 ki
    [0x07, 0x09, 0x11, 0x01, 0x02, 0x04, 0x08], // B8 ku
    [0x08, 0x1F, 0x09, 0x0A, 0x02, 0x02, 0x04], // B9 ke
    [0x00, 0x1F, 0x01, 0x01, 0x01, 0x1F, 0x00], // BA ko
    [0x0A, 0x1F, 0x0A, 0x0A, 0x02, 0x04, 0x08], // BB sa
    [0x12, 0x09, 0x01, 0x01, 0x02, 0x04, 0x18], // BC shi
    [0x1F, 0x01, 0x01, 0x02, 0x04, 0x0A, 0x11], // BD su
    [0x04, 0x04, 0x1F, 0x05, 0x06, 0x04, 0x03], // BE se
    [0x11, 0x12, 0x02, 0x02, 0x04, 0x04, 0x08], // BF so
    [0x07, 0x09, 0x15, 0x03, 0x02, 0x04, 0x08], // C0 ta
    [0x01, 0x1E, 0x04, 0x1F, 0x04, 0x04, 0x08], // C1 chi
    [0x15, 0x15, 0x01, 0x01, 0x02, 0x04, 0x08], // C2 tsu
    [0x0E, 0x00, 0x1F, 0x04, 0x04, 0x04, 0x08], // C3 te
    [0x08, 0x08, 0x08, 0x0C, 0x0A, 0x08, 0x08], // C4 to
    [0x04, 0x04, 0x1F, 0x04, 0x04, 0x08, 0x10], // C5 na
    [0x00, 0x0E, 0x00, 0x00, 0x00, 0x1F, 0x00], // C6 ni
    [0x1F, 0x01, 0x0A, 0x04, 0x0A, 0x10, 0x08], // C7 nu
    [0x04, 0x1F, 0x02, 0x04, 0x0E, 0x15, 0x04], // C8 ne
    [0x01, 0x01, 0x02, 0x02, 0x04, 0x08, 0x10], // C9 no
    [0x00, 0x0A, 0x0A, 0x0A, 0x11, 0x11, 0x00], // CA ha
    [0x10, 0x12, 0x14, 0x18, 0x10, 0x10, 0x0F], // CB hi
    [0x1F, 0x01, 0x01, 0x01, 0x02, 0x04, 0x08], // CC fu
    [0x00, 0x00, 0x04, 0x0A, 0x11, 0x00, 0x00], // CD he
    [0x04, 0x1F, 0x04, 0x15, 0x15, 0x04, 0x04], // CE ho
    [0x00, 0x1F, 0x01, 0x0A, 0x04, 0x02, 0x00], // CF ma
    [0x1C, 0x02, 0x00, 0x1C, 0x02, 0x00, 0x1C], // D0 mi
    [0x04, 0x04, 0x0A, 0x0A, 0x11, 0x1F, 0x01], // D1 mu
    [0x01, 0x09, 0x0A, 0x04, 0x0A, 0x12, 0x10], // D2 me
    [0x1E, 0x04, 0x1F, 0x04, 0x04, 0x04, 0x03], // D3 mo
    [0x08, 0x08, 0x1F, 0x09, 0x0A, 0x08, 0x08], // D4 ya
    [0x00, 0x0E, 0x02, 0x02, 0x02, 0x1F, 0x00], // D5 yu
    [0x1F, 0x01, 0x01, 0x0F, 0x01, 0x01, 0x1F], // D6 yo
    [0x0E, 0x00, 0x1F, 0x01, 0x02, 0x04, 0x08], // D7 ra
    [0x12, 0x12, 0x12, 0x12, 0x02, 0x04, 0x08], // D8 ri
    [0x09, 0x09, 0x09, 0x09, 0x0B, 0x15, 0x01], // D9 ru
    [0x10, 0x10, 0x10, 0x11, 0x12, 0x14, 0x18], // DA re
    [0x00, 0x1F, 0x11, 0x11, 0x11, 0x1F, 0x00], // DB ro
    [0x1F, 0x11, 0x11, 0x01, 0x02, 0x04, 0x08], // DC wa
    [0x10, 0x09, 0x01, 0x01, 0x02, 0x04, 0x18], // DD n
    [0x05, 0x05, 0x0A, 0x00, 0x00, 0x00, 0x00], // DE voiced sound mark
    [0x06, 0x09, 0x09, 0x06, 0x00, 0x00, 0x00], // DF semi-voiced sound mark
];

/// Glyph for `code`, or `None` if the character generator does not define
/// one.
pub fn glyph(code: u8) -> Option<&'static Glyph> {
    match code {
        0x20..=0x7E => Some(&FONT_ASCII[(code - ASCII_BASE) as usize]),
        0xA1..=0xDF => Some(&FONT_KANA[(code - KANA_BASE) as usize]),
        _ => None,
    }
}

#[inline]
pub fn has_glyph(code: u8) -> bool {
    glyph(code).is_some()
}

/// Glyph for `code` with the space fallback applied.
pub fn glyph_or_space(code: u8) -> &'static Glyph {
    glyph(code).unwrap_or(&FONT_ASCII[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_is_defined() {
        for code in 0x20..=0x7E {
            assert!(has_glyph(code), "no glyph for {code:#04X}");
        }
    }

    #[test]
    fn half_width_kana_is_defined() {
        for code in 0xA1..=0xDF {
            assert!(has_glyph(code), "no glyph for {code:#04X}");
        }
    }

    #[test]
    fn control_codes_are_undefined() {
        for code in 0x00..0x20 {
            assert!(glyph(code).is_none());
        }
        assert!(glyph(0x7F).is_none());
        assert!(glyph(0x80).is_none());
        assert!(glyph(0xE0).is_none());
        assert!(glyph(0xFF).is_none());
    }

    #[test]
    fn glyphs_fit_five_columns() {
        for code in 0x20..=0xDF {
            if let Some(g) = glyph(code) {
                for row in g {
                    assert_eq!(row & !0x1F, 0, "glyph {code:#04X} wider than 5 px");
                }
            }
        }
    }

    #[test]
    fn space_fallback() {
        assert_eq!(glyph_or_space(0x00), &[0u8; 7]);
        assert_eq!(glyph_or_space(0xFF), &[0u8; 7]);
        assert_ne!(glyph_or_space(b'A'), &[0u8; 7]);
    }
}
