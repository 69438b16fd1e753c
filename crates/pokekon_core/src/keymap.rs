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

//! Browser key code → keyboard matrix mapping.
//!
//! Maps the fixed set of recognized `KeyboardEvent.code` strings onto the
//! 8×8 active-low matrix, with the ASCII byte (and shifted variant) each
//! key synthesizes. Unknown codes map to `None` and are ignored by the
//! keyboard device.

/// Matrix position and ASCII synthesis for one host key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyMapping {
    pub row: u8,
    pub col: u8,
    /// Byte synthesized on press; `None` for pure modifiers.
    pub ascii: Option<u8>,
    /// Byte synthesized when a shift key is held; falls back to `ascii`.
    pub shifted: Option<u8>,
}

const fn key(row: u8, col: u8, ascii: u8, shifted: u8) -> Option<KeyMapping> {
    Some(KeyMapping {
        row,
        col,
        ascii: Some(ascii),
        shifted: Some(shifted),
    })
}

const fn bare(row: u8, col: u8, ascii: u8) -> Option<KeyMapping> {
    Some(KeyMapping {
        row,
        col,
        ascii: Some(ascii),
        shifted: None,
    })
}

const fn modifier(row: u8, col: u8) -> Option<KeyMapping> {
    Some(KeyMapping {
        row,
        col,
        ascii: None,
        shifted: None,
    })
}

/// Look up the matrix mapping for a browser key code.
#[rustfmt::skip]
pub fn map_key(code: &str) -> Option<KeyMapping> {
    match code {
        // Row 0: home-row letters
        "KeyA" => key(0, 0, b'A', b'a'),
        "KeyS" => key(0, 1, b'S', b's'),
        "KeyD" => key(0, 2, b'D', b'd'),
        "KeyF" => key(0, 3, b'F', b'f'),
        "KeyG" => key(0, 4, b'G', b'g'),
        "KeyH" => key(0, 5, b'H', b'h'),
        "KeyJ" => key(0, 6, b'J', b'j'),
        "KeyK" => key(0, 7, b'K', b'k'),

        // Row 1: top-row letters
        "KeyQ" => key(1, 0, b'Q', b'q'),
        "KeyW" => key(1, 1, b'W', b'w'),
        "KeyE" => key(1, 2, b'E', b'e'),
        "KeyR" => key(1, 3, b'R', b'r'),
        "KeyT" => key(1, 4, b'T', b't'),
        "KeyY" => key(1, 5, b'Y', b'y'),
        "KeyU" => key(1, 6, b'U', b'u'),
        "KeyI" => key(1, 7, b'I', b'i'),

        // Row 2: bottom-row letters
        "KeyZ" => key(2, 0, b'Z', b'z'),
        "KeyX" => key(2, 1, b'X', b'x'),
        "KeyC" => key(2, 2, b'C', b'c'),
        "KeyV" => key(2, 3, b'V', b'v'),
        "KeyB" => key(2, 4, b'B', b'b'),
        "KeyN" => key(2, 5, b'N', b'n'),
        "KeyM" => key(2, 6, b'M', b'm'),
        "KeyL" => key(2, 7, b'L', b'l'),

        "KeyO" => key(3, 6, b'O', b'o'),
        "KeyP" => key(3, 7, b'P', b'p'),

        // Row 3: punctuation
        "Comma" => key(3, 0, b',', b'<'),
        "Period" => key(3, 1, b'.', b'>'),
        "Slash" => key(3, 2, b'/', b'?'),
        "Semicolon" => key(3, 3, b';', b':'),
        "Quote" => key(3, 4, b'\'', b'"'),
        "BracketLeft" => key(3, 5, b'[', b'{'),

        // Row 4: digits 1-8
        "Digit1" => key(4, 0, b'1', b'!'),
        "Digit2" => key(4, 1, b'2', b'@'),
        "Digit3" => key(4, 2, b'3', b'#'),
        "Digit4" => key(4, 3, b'4', b'$'),
        "Digit5" => key(4, 4, b'5', b'%'),
        "Digit6" => key(4, 5, b'6', b'^'),
        "Digit7" => key(4, 6, b'7', b'&'),
        "Digit8" => key(4, 7, b'8', b'*'),

        // Row 5: digits 9-0, editing
        "Digit9" => key(5, 0, b'9', b'('),
        "Digit0" => key(5, 1, b'0', b')'),
        "Minus" => key(5, 2, b'-', b'_'),
        "Equal" => key(5, 3, b'=', b'+'),
        "Space" => bare(5, 4, b' '),
        "Enter" => bare(5, 5, 0x0D),
        "Backspace" => bare(5, 6, 0x08),
        "Tab" => bare(5, 7, 0x09),

        // Row 6: cursor and editing cluster
        "ArrowLeft" => bare(6, 0, 0x1D),
        "ArrowRight" => bare(6, 1, 0x1C),
        "ArrowUp" => bare(6, 2, 0x1E),
        "ArrowDown" => bare(6, 3, 0x1F),
        "Insert" => modifier(6, 4),
        "Delete" => bare(6, 5, 0x7F),
        "Escape" => bare(6, 6, 0x1B),
        "CapsLock" => modifier(6, 7),

        // Row 7: modifiers and JIS keys
        "ShiftLeft" => modifier(7, 0),
        "ShiftRight" => modifier(7, 1),
        "KanaMode" => modifier(7, 2),
        "Convert" => modifier(7, 3),
        "NonConvert" => modifier(7, 4),
        "IntlYen" => key(7, 5, 0x5C, b'|'),
        "IntlRo" => key(7, 6, 0x5F, b'_'),
        "BracketRight" => key(7, 7, b']', b'}'),

        // Numpad aliases share the matrix position of the base key.
        "Numpad0" => key(5, 1, b'0', b'0'),
        "Numpad1" => key(4, 0, b'1', b'1'),
        "Numpad2" => key(4, 1, b'2', b'2'),
        "Numpad3" => key(4, 2, b'3', b'3'),
        "Numpad4" => key(4, 3, b'4', b'4'),
        "Numpad5" => key(4, 4, b'5', b'5'),
        "Numpad6" => key(4, 5, b'6', b'6'),
        "Numpad7" => key(4, 6, b'7', b'7'),
        "Numpad8" => key(4, 7, b'8', b'8'),
        "Numpad9" => key(5, 0, b'9', b'9'),
        "NumpadAdd" => key(5, 3, b'+', b'+'),
        "NumpadSubtract" => key(5, 2, b'-', b'-'),
        "NumpadMultiply" => key(4, 7, b'*', b'*'),
        "NumpadDivide" => key(3, 2, b'/', b'/'),
        "NumpadDecimal" => key(3, 1, b'.', b'.'),
        "NumpadEnter" => bare(5, 5, 0x0D),

        _ => None,
    }
}

/// True for the two shift keys.
pub fn is_shift_key(code: &str) -> bool {
    matches!(code, "ShiftLeft" | "ShiftRight")
}

/// Lower-case latin letter for a `KeyA`..`KeyZ` code, used by the kana
/// composer.
pub fn letter_of(code: &str) -> Option<u8> {
    let rest = code.strip_prefix("Key")?;
    let mut chars = rest.bytes();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Some(c.to_ascii_lowercase()),
        _ => None,
    }
}

/// Keys that bypass romaji composition in kana mode and emit fixed
/// half-width katakana bytes.
pub fn direct_kana(code: &str) -> Option<&'static [u8]> {
    match code {
        "Minus" => Some(&[0xB0]),        // long vowel mark
        "Comma" => Some(&[0xA4]),        // ideographic comma
        "Period" => Some(&[0xA1]),       // ideographic full stop
        "Slash" => Some(&[0xA5]),        // middle dot
        "Quote" => Some(&[0xDE]),        // voiced sound mark
        "BracketLeft" => Some(&[0xDF]),  // semi-voiced sound mark
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_a_is_row0_col0() {
        let m = map_key("KeyA").unwrap();
        assert_eq!((m.row, m.col), (0, 0));
        assert_eq!(m.ascii, Some(b'A'));
        assert_eq!(m.shifted, Some(b'a'));
    }

    #[test]
    fn unknown_codes_are_ignored() {
        assert!(map_key("F13").is_none());
        assert!(map_key("MediaPlayPause").is_none());
        assert!(map_key("").is_none());
    }

    #[test]
    fn modifiers_synthesize_nothing() {
        for code in ["ShiftLeft", "ShiftRight", "KanaMode", "CapsLock"] {
            let m = map_key(code).unwrap();
            assert_eq!(m.ascii, None, "{code} should not synthesize");
        }
    }

    #[test]
    fn matrix_positions_are_in_range() {
        let codes = [
            "KeyA", "KeyZ", "KeyP", "Digit0", "Digit9", "Enter", "Space",
            "ArrowUp", "ShiftLeft", "IntlYen", "NumpadEnter",
        ];
        for code in codes {
            let m = map_key(code).unwrap();
            assert!(m.row < 8 && m.col < 8, "{code} out of matrix");
        }
    }

    #[test]
    fn letter_extraction() {
        assert_eq!(letter_of("KeyK"), Some(b'k'));
        assert_eq!(letter_of("KeyA"), Some(b'a'));
        assert_eq!(letter_of("Digit1"), None);
        assert_eq!(letter_of("Keypad"), None);
    }

    #[test]
    fn direct_kana_bytes() {
        assert_eq!(direct_kana("Minus"), Some(&[0xB0u8][..]));
        assert_eq!(direct_kana("Period"), Some(&[0xA1u8][..]));
        assert_eq!(direct_kana("KeyA"), None);
    }
}
