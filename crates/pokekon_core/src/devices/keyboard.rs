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

//! Keyboard matrix, strobe register and ASCII FIFO.
//!
//! Eight active-low rows are selected through a 16-bit strobe register
//! split across ports 0x11/0x12; a key-in read ANDs every selected row, so
//! a pressed key pulls its column bit low. Press edges additionally
//! synthesize ASCII bytes (through the kana composer when kana mode is
//! on); the machine routes those either to the BASIC line editor or into
//! the FIFO drained by reads of port 0x12.

use std::collections::VecDeque;

use fxhash::FxHashSet;

use crate::kana::KanaComposer;
use crate::keymap;

pub const MATRIX_ROWS: usize = 8;

/// Strobe bit that gates the shift sense on port 0x13.
const STROBE_SHIFT_GATE: u16 = 0x0008;

/// Strobe-low bit that raises interrupt-type bit 4 when written.
const STROBE_KEY_IRQ: u8 = 0x10;

pub struct Keyboard {
    /// Active-low row bytes; bit clear = key down.
    rows: [u8; MATRIX_ROWS],
    /// 16-bit strobe: port 0x11 is the low half, 0x12 the high half.
    strobe: u16,
    /// Host codes currently held down, for press-edge detection.
    pressed: FxHashSet<String>,
    /// Synthesized bytes awaiting a port 0x12 read (program mode).
    fifo: VecDeque<u8>,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            rows: [0xFF; MATRIX_ROWS],
            strobe: 0,
            pressed: FxHashSet::default(),
            fifo: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Apply a key press. Returns the synthesized ASCII/kana bytes for the
    /// machine to route; empty for repeats, modifiers and unknown codes.
    pub fn press(&mut self, code: &str, composer: &mut KanaComposer) -> Vec<u8> {
        let mut out = Vec::new();

        let Some(mapping) = keymap::map_key(code) else {
            log::trace!("ignoring unknown key code {code:?}");
            return out;
        };

        self.rows[mapping.row as usize] &= !(1 << mapping.col);

        // Auto-repeat: matrix already reflects the key, nothing new to
        // synthesize.
        if !self.pressed.insert(code.to_string()) {
            return out;
        }

        if keymap::is_shift_key(code) {
            return out;
        }
        if code == "KanaMode" {
            let on = !composer.kana_mode();
            composer.set_kana_mode(on, &mut out);
            return out;
        }

        if !composer.kana_mode() {
            if let Some(byte) = self.plain_byte(&mapping) {
                out.push(byte);
            }
            return out;
        }

        // Kana mode: letters feed the composer, a few punctuation keys map
        // straight to katakana, everything else forces a flush first.
        if let Some(letter) = keymap::letter_of(code) {
            composer.push_letter(letter, &mut out);
        }
        else if let Some(direct) = keymap::direct_kana(code) {
            composer.flush(true, &mut out);
            out.extend_from_slice(direct);
        }
        else {
            composer.flush(true, &mut out);
            if let Some(byte) = self.plain_byte(&mapping) {
                out.push(byte);
            }
        }
        out
    }

    /// Apply a key release.
    pub fn release(&mut self, code: &str) {
        let Some(mapping) = keymap::map_key(code) else {
            return;
        };
        self.rows[mapping.row as usize] |= 1 << mapping.col;
        self.pressed.remove(code);
    }

    fn plain_byte(&self, mapping: &keymap::KeyMapping) -> Option<u8> {
        if self.shift_down() {
            mapping.shifted.or(mapping.ascii)
        }
        else {
            mapping.ascii
        }
    }

    pub fn shift_down(&self) -> bool {
        self.pressed.contains("ShiftLeft") || self.pressed.contains("ShiftRight")
    }

    /// Port 0x10: AND of every row selected by the strobe. With no rows
    /// selected the bus floats high.
    pub fn read_rows(&self) -> u8 {
        let mut value = 0xFF;
        for (row, &bits) in self.rows.iter().enumerate() {
            if self.strobe & (1 << row) != 0 {
                value &= bits;
            }
        }
        value
    }

    /// Port 0x11 write. Returns true when the key interrupt bit must be
    /// raised in the interrupt-type register.
    pub fn write_strobe_lo(&mut self, value: u8) -> bool {
        self.strobe = (self.strobe & 0xFF00) | u16::from(value);
        value & STROBE_KEY_IRQ != 0
    }

    /// Port 0x12 write.
    pub fn write_strobe_hi(&mut self, value: u8) {
        self.strobe = (self.strobe & 0x00FF) | (u16::from(value) << 8);
    }

    pub fn strobe(&self) -> u16 {
        self.strobe
    }

    /// Port 0x13: shift sense, gated by strobe bit 3.
    pub fn read_shift(&self) -> u8 {
        if self.strobe & STROBE_SHIFT_GATE != 0 && self.shift_down() {
            0x01
        }
        else {
            0x00
        }
    }

    pub fn push_fifo(&mut self, bytes: &[u8]) {
        self.fifo.extend(bytes.iter().copied());
    }

    /// Port 0x12 read: drain one FIFO byte, 0 when empty.
    pub fn pop_fifo(&mut self) -> u8 {
        self.fifo.pop_front().unwrap_or(0)
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    pub fn clear_fifo(&mut self) {
        self.fifo.clear();
    }

    pub fn rows(&self) -> &[u8; MATRIX_ROWS] {
        &self.rows
    }

    pub fn restore_rows(&mut self, rows: &[u8; MATRIX_ROWS]) {
        self.rows = *rows;
    }

    pub fn fifo_bytes(&self) -> Vec<u8> {
        self.fifo.iter().copied().collect()
    }

    pub fn restore_fifo(&mut self, bytes: &[u8]) {
        self.fifo = bytes.iter().copied().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(kb: &mut Keyboard, composer: &mut KanaComposer, code: &str) -> Vec<u8> {
        kb.press(code, composer)
    }

    #[test]
    fn matrix_bit_clears_on_press() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        kb.write_strobe_lo(0x01);
        press(&mut kb, &mut composer, "KeyA");
        assert_eq!(kb.read_rows() & 0x01, 0);
        kb.release("KeyA");
        assert_ne!(kb.read_rows() & 0x01, 0);
    }

    #[test]
    fn unselected_rows_read_high() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        kb.write_strobe_lo(0x02); // row 1 only
        press(&mut kb, &mut composer, "KeyA"); // row 0
        assert_eq!(kb.read_rows(), 0xFF);
    }

    #[test]
    fn press_synthesizes_once() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        assert_eq!(press(&mut kb, &mut composer, "KeyP"), vec![b'P']);
        // Held key repeats do not synthesize again.
        assert_eq!(press(&mut kb, &mut composer, "KeyP"), Vec::<u8>::new());
        kb.release("KeyP");
        assert_eq!(press(&mut kb, &mut composer, "KeyP"), vec![b'P']);
    }

    #[test]
    fn shift_selects_variant() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        assert_eq!(press(&mut kb, &mut composer, "ShiftLeft"), Vec::<u8>::new());
        assert_eq!(press(&mut kb, &mut composer, "Digit1"), vec![b'!']);
        kb.release("ShiftLeft");
        kb.release("Digit1");
        assert_eq!(press(&mut kb, &mut composer, "Digit1"), vec![b'1']);
    }

    #[test]
    fn kana_letters_compose() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        composer.set_kana_mode(true, &mut Vec::new());
        assert_eq!(press(&mut kb, &mut composer, "KeyK"), Vec::<u8>::new());
        assert_eq!(press(&mut kb, &mut composer, "KeyA"), vec![0xB6]);
    }

    #[test]
    fn kana_direct_keys_flush_first() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        composer.set_kana_mode(true, &mut Vec::new());
        press(&mut kb, &mut composer, "KeyS");
        // Pending "s" forces out as a letter, then the long vowel mark.
        assert_eq!(press(&mut kb, &mut composer, "Minus"), vec![b'S', 0xB0]);
    }

    #[test]
    fn kana_other_keys_flush_then_ascii() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        composer.set_kana_mode(true, &mut Vec::new());
        press(&mut kb, &mut composer, "KeyK");
        assert_eq!(press(&mut kb, &mut composer, "Enter"), vec![b'K', 0x0D]);
    }

    #[test]
    fn kana_mode_key_toggles() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        press(&mut kb, &mut composer, "KanaMode");
        assert!(composer.kana_mode());
        kb.release("KanaMode");
        press(&mut kb, &mut composer, "KanaMode");
        assert!(!composer.kana_mode());
    }

    #[test]
    fn strobe_bit4_requests_interrupt() {
        let mut kb = Keyboard::new();
        assert!(kb.write_strobe_lo(0x10));
        assert!(!kb.write_strobe_lo(0x01));
    }

    #[test]
    fn shift_sense_gated_by_strobe() {
        let mut kb = Keyboard::new();
        let mut composer = KanaComposer::new();
        press(&mut kb, &mut composer, "ShiftLeft");
        assert_eq!(kb.read_shift(), 0);
        kb.write_strobe_lo(0x08);
        assert_eq!(kb.read_shift(), 1);
    }

    #[test]
    fn fifo_drains_to_zero() {
        let mut kb = Keyboard::new();
        kb.push_fifo(&[0x41, 0x42]);
        assert_eq!(kb.pop_fifo(), 0x41);
        assert_eq!(kb.pop_fifo(), 0x42);
        assert_eq!(kb.pop_fifo(), 0);
    }
}
