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

//! Romaji → half-width katakana composer.
//!
//! Latin letters accumulate in a small buffer and resolve to JIS X 0201
//! katakana bytes by longest match. Prefix-ambiguous input (`sh`, `ky`,
//! a lone `n`) defers until more letters arrive or a forced flush drains
//! the buffer as-is.

use fxhash::FxHashMap;
use lazy_static::lazy_static;

// Katakana bytes used by the compose algorithm itself.
const KANA_N: u8 = 0xDD; // syllabic n
const KANA_SOKUON: u8 = 0xAF; // small tsu

lazy_static! {
    /// Romaji syllable → katakana byte sequence.
    static ref ROMAJI: FxHashMap<&'static str, &'static [u8]> = {
        let entries: &[(&str, &[u8])] = &[
            ("a", &[0xB1]), ("i", &[0xB2]), ("u", &[0xB3]), ("e", &[0xB4]), ("o", &[0xB5]),
            ("ka", &[0xB6]), ("ki", &[0xB7]), ("ku", &[0xB8]), ("ke", &[0xB9]), ("ko", &[0xBA]),
            ("ga", &[0xB6, 0xDE]), ("gi", &[0xB7, 0xDE]), ("gu", &[0xB8, 0xDE]),
            ("ge", &[0xB9, 0xDE]), ("go", &[0xBA, 0xDE]),
            ("sa", &[0xBB]), ("si", &[0xBC]), ("shi", &[0xBC]), ("su", &[0xBD]),
            ("se", &[0xBE]), ("so", &[0xBF]),
            ("za", &[0xBB, 0xDE]), ("zi", &[0xBC, 0xDE]), ("ji", &[0xBC, 0xDE]),
            ("zu", &[0xBD, 0xDE]), ("ze", &[0xBE, 0xDE]), ("zo", &[0xBF, 0xDE]),
            ("ta", &[0xC0]), ("ti", &[0xC1]), ("chi", &[0xC1]), ("tu", &[0xC2]),
            ("tsu", &[0xC2]), ("te", &[0xC3]), ("to", &[0xC4]),
            ("da", &[0xC0, 0xDE]), ("di", &[0xC1, 0xDE]), ("du", &[0xC2, 0xDE]),
            ("de", &[0xC3, 0xDE]), ("do", &[0xC4, 0xDE]),
            ("na", &[0xC5]), ("ni", &[0xC6]), ("nu", &[0xC7]), ("ne", &[0xC8]), ("no", &[0xC9]),
            ("ha", &[0xCA]), ("hi", &[0xCB]), ("hu", &[0xCC]), ("fu", &[0xCC]),
            ("he", &[0xCD]), ("ho", &[0xCE]),
            ("ba", &[0xCA, 0xDE]), ("bi", &[0xCB, 0xDE]), ("bu", &[0xCC, 0xDE]),
            ("be", &[0xCD, 0xDE]), ("bo", &[0xCE, 0xDE]),
            ("pa", &[0xCA, 0xDF]), ("pi", &[0xCB, 0xDF]), ("pu", &[0xCC, 0xDF]),
            ("pe", &[0xCD, 0xDF]), ("po", &[0xCE, 0xDF]),
            ("ma", &[0xCF]), ("mi", &[0xD0]), ("mu", &[0xD1]), ("me", &[0xD2]), ("mo", &[0xD3]),
            ("ya", &[0xD4]), ("yu", &[0xD5]), ("yo", &[0xD6]),
            ("ra", &[0xD7]), ("ri", &[0xD8]), ("ru", &[0xD9]), ("re", &[0xDA]), ("ro", &[0xDB]),
            ("wa", &[0xDC]), ("wo", &[0xA6]),
            ("fa", &[0xCC, 0xA7]), ("fi", &[0xCC, 0xA8]), ("fe", &[0xCC, 0xAA]), ("fo", &[0xCC, 0xAB]),
            ("kya", &[0xB7, 0xAC]), ("kyu", &[0xB7, 0xAD]), ("kyo", &[0xB7, 0xAE]),
            ("gya", &[0xB7, 0xDE, 0xAC]), ("gyu", &[0xB7, 0xDE, 0xAD]), ("gyo", &[0xB7, 0xDE, 0xAE]),
            ("sha", &[0xBC, 0xAC]), ("shu", &[0xBC, 0xAD]), ("sho", &[0xBC, 0xAE]),
            ("sya", &[0xBC, 0xAC]), ("syu", &[0xBC, 0xAD]), ("syo", &[0xBC, 0xAE]),
            ("ja", &[0xBC, 0xDE, 0xAC]), ("ju", &[0xBC, 0xDE, 0xAD]), ("jo", &[0xBC, 0xDE, 0xAE]),
            ("zya", &[0xBC, 0xDE, 0xAC]), ("zyu", &[0xBC, 0xDE, 0xAD]), ("zyo", &[0xBC, 0xDE, 0xAE]),
            ("cha", &[0xC1, 0xAC]), ("chu", &[0xC1, 0xAD]), ("cho", &[0xC1, 0xAE]),
            ("tya", &[0xC1, 0xAC]), ("tyu", &[0xC1, 0xAD]), ("tyo", &[0xC1, 0xAE]),
            ("nya", &[0xC6, 0xAC]), ("nyu", &[0xC6, 0xAD]), ("nyo", &[0xC6, 0xAE]),
            ("hya", &[0xCB, 0xAC]), ("hyu", &[0xCB, 0xAD]), ("hyo", &[0xCB, 0xAE]),
            ("bya", &[0xCB, 0xDE, 0xAC]), ("byu", &[0xCB, 0xDE, 0xAD]), ("byo", &[0xCB, 0xDE, 0xAE]),
            ("pya", &[0xCB, 0xDF, 0xAC]), ("pyu", &[0xCB, 0xDF, 0xAD]), ("pyo", &[0xCB, 0xDF, 0xAE]),
            ("mya", &[0xD0, 0xAC]), ("myu", &[0xD0, 0xAD]), ("myo", &[0xD0, 0xAE]),
            ("rya", &[0xD8, 0xAC]), ("ryu", &[0xD8, 0xAD]), ("ryo", &[0xD8, 0xAE]),
            ("xa", &[0xA7]), ("xi", &[0xA8]), ("xu", &[0xA9]), ("xe", &[0xAA]), ("xo", &[0xAB]),
            ("la", &[0xA7]), ("li", &[0xA8]), ("lu", &[0xA9]), ("le", &[0xAA]), ("lo", &[0xAB]),
            ("xya", &[0xAC]), ("xyu", &[0xAD]), ("xyo", &[0xAE]),
            ("lya", &[0xAC]), ("lyu", &[0xAD]), ("lyo", &[0xAE]),
            ("xtu", &[0xAF]), ("xtsu", &[0xAF]), ("ltu", &[0xAF]),
        ];
        let mut m = FxHashMap::default();
        for (k, v) in entries {
            m.insert(*k, *v);
        }
        m
    };

    /// Longest key in [`ROMAJI`]; bounds the prefix search.
    static ref MAX_KEY_LEN: usize = ROMAJI.keys().map(|k| k.len()).max().unwrap_or(1);
}

fn is_sokuon_consonant(c: u8) -> bool {
    c.is_ascii_lowercase() && !matches!(c, b'a' | b'e' | b'i' | b'o' | b'u' | b'n')
}

fn is_prefix_of_any_key(s: &str) -> bool {
    ROMAJI.keys().any(|k| k.len() > s.len() && k.starts_with(s))
}

/// Pending-letter buffer plus the kana-mode flag.
#[derive(Debug, Default, Clone)]
pub struct KanaComposer {
    buffer: String,
    kana_mode: bool,
}

impl KanaComposer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn kana_mode(&self) -> bool {
        self.kana_mode
    }

    /// Enable or disable kana mode. Disabling force-flushes so no letters
    /// are stranded in the buffer.
    pub fn set_kana_mode(&mut self, on: bool, out: &mut Vec<u8>) {
        if self.kana_mode && !on {
            self.flush(true, out);
        }
        self.kana_mode = on;
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Restore the pending buffer (snapshot load).
    pub fn restore(&mut self, pending: &str, kana_mode: bool) {
        self.buffer = pending.to_string();
        self.kana_mode = kana_mode;
    }

    /// Append one latin letter and resolve whatever is unambiguous.
    pub fn push_letter(&mut self, letter: u8, out: &mut Vec<u8>) {
        self.buffer.push(letter.to_ascii_lowercase() as char);
        self.flush(false, out);
    }

    /// Resolve the buffer by longest match. With `force` set the buffer is
    /// always emptied: partial matches emit as-is (letters uppercase, a
    /// dangling `n` as syllabic n).
    pub fn flush(&mut self, force: bool, out: &mut Vec<u8>) {
        loop {
            let buf = self.buffer.as_bytes();
            if buf.is_empty() {
                return;
            }

            // Doubled n resolves to syllabic n.
            if buf.len() >= 2 && buf[0] == b'n' && buf[1] == b'n' {
                out.push(KANA_N);
                self.buffer.remove(0);
                continue;
            }

            // Doubled consonant resolves to sokuon, consuming one char.
            if buf.len() >= 2 && buf[0] == buf[1] && is_sokuon_consonant(buf[0]) {
                out.push(KANA_SOKUON);
                self.buffer.remove(0);
                continue;
            }

            // Longest table prefix.
            let max = (*MAX_KEY_LEN).min(self.buffer.len());
            let mut matched: Option<(usize, &'static [u8])> = None;
            for len in (1..=max).rev() {
                if let Some(bytes) = ROMAJI.get(&self.buffer[..len]) {
                    matched = Some((len, bytes));
                    break;
                }
            }

            if let Some((len, bytes)) = matched {
                // A strictly longer syllable may still complete; hold off
                // until forced.
                if !force && is_prefix_of_any_key(&self.buffer[..len]) && self.buffer.len() == len {
                    return;
                }
                out.extend_from_slice(bytes);
                self.buffer.drain(..len);
                continue;
            }

            if !force && (self.buffer == "n" || is_prefix_of_any_key(&self.buffer)) {
                return;
            }

            // No resolution possible: drop one char.
            let c = self.buffer.remove(0) as u8;
            if c == b'n' {
                out.push(KANA_N);
            }
            else {
                out.push(c.to_ascii_uppercase());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(letters: &str) -> Vec<u8> {
        let mut k = KanaComposer::new();
        let mut out = Vec::new();
        k.set_kana_mode(true, &mut out);
        for l in letters.bytes() {
            k.push_letter(l, &mut out);
        }
        out
    }

    fn compose_forced(letters: &str) -> Vec<u8> {
        let mut k = KanaComposer::new();
        let mut out = Vec::new();
        k.set_kana_mode(true, &mut out);
        for l in letters.bytes() {
            k.push_letter(l, &mut out);
        }
        k.flush(true, &mut out);
        out
    }

    #[test]
    fn ka_emits_single_kana() {
        assert_eq!(compose("ka"), vec![0xB6]);
    }

    #[test]
    fn sa_emits_single_kana() {
        assert_eq!(compose("sa"), vec![0xBB]);
    }

    #[test]
    fn sh_defers_until_vowel() {
        assert_eq!(compose("sh"), Vec::<u8>::new());
        assert_eq!(compose("sha"), vec![0xBC, 0xAC]);
    }

    #[test]
    fn voiced_pair() {
        assert_eq!(compose("ga"), vec![0xB6, 0xDE]);
        assert_eq!(compose("po"), vec![0xCE, 0xDF]);
    }

    #[test]
    fn doubled_consonant_is_sokuon() {
        // kka → small tsu + ka
        assert_eq!(compose("kka"), vec![0xAF, 0xB6]);
    }

    #[test]
    fn doubled_n_is_syllabic() {
        assert_eq!(compose("nn"), vec![0xDD]);
    }

    #[test]
    fn lone_n_defers_then_forces() {
        assert_eq!(compose("n"), Vec::<u8>::new());
        assert_eq!(compose_forced("n"), vec![0xDD]);
    }

    #[test]
    fn n_before_consonant_is_syllabic() {
        // "nka" → ん + ka
        assert_eq!(compose("nka"), vec![0xDD, 0xB6]);
    }

    #[test]
    fn forced_flush_uppercases_unmatched() {
        // "q" matches nothing and is not a syllable prefix by itself, but
        // "c"/"s" are; force drains them as uppercase letters.
        assert_eq!(compose_forced("c"), vec![b'C']);
        assert_eq!(compose_forced("s"), vec![b'S']);
    }

    #[test]
    fn buffer_empty_after_forced_flush() {
        let mut k = KanaComposer::new();
        let mut out = Vec::new();
        k.set_kana_mode(true, &mut out);
        for l in "shy".bytes() {
            k.push_letter(l, &mut out);
        }
        k.flush(true, &mut out);
        assert!(k.pending().is_empty());
    }

    #[test]
    fn mode_off_flushes() {
        let mut k = KanaComposer::new();
        let mut out = Vec::new();
        k.set_kana_mode(true, &mut out);
        k.push_letter(b's', &mut out);
        assert!(out.is_empty());
        k.set_kana_mode(false, &mut out);
        assert_eq!(out, vec![b'S']);
        assert!(k.pending().is_empty());
    }

    #[test]
    fn multi_syllable_word() {
        // "toukyou" → ﾄ ｳ ｷ ｮ ｳ
        assert_eq!(compose("toukyou"), vec![0xC4, 0xB3, 0xB7, 0xAE, 0xB3]);
    }
}
