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

//! Text renderings of the assembly artifacts: listing, symbol dump and
//! hex dump.

use std::fmt::Write;

use crate::symbols::SymbolTable;
use crate::ListingRecord;

/// One listing line: `AAAA: BBBBBBBB BBBBBBBB | source`, bytes in groups
/// of four.
pub fn render_lst(records: &[ListingRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let mut bytes = String::new();
        for (i, b) in record.bytes.iter().enumerate() {
            if i > 0 && i % 4 == 0 {
                bytes.push(' ');
            }
            let _ = write!(bytes, "{b:02X}");
        }
        let _ = writeln!(out, "{:04X}: {:<17} | {}", record.address, bytes, record.source);
    }
    out
}

/// Symbol dump sorted by value.
pub fn render_sym(symbols: &SymbolTable) -> String {
    let mut out = String::new();
    for symbol in symbols.sorted_by_value() {
        let _ = writeln!(out, "{:04X}  {}", symbol.value as u16, symbol.name);
    }
    out
}

/// Classic 16-bytes-per-row hex dump of the output image.
pub fn render_dump(origin: u16, binary: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in binary.chunks(16).enumerate() {
        let addr = origin as usize + row * 16;
        let _ = write!(out, "{addr:04X}:");
        for b in chunk {
            let _ = write!(out, " {b:02X}");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lst_groups_bytes() {
        let records = vec![ListingRecord {
            file: "t".into(),
            line: 1,
            address: 0x100,
            bytes: vec![0x3E, 0x01, 0x32, 0x00, 0x10],
            source: "LD A,1".into(),
        }];
        let lst = render_lst(&records);
        assert!(lst.starts_with("0100: 3E013200 10"));
        assert!(lst.contains("| LD A,1"));
    }

    #[test]
    fn dump_rows() {
        let binary: Vec<u8> = (0..20).collect();
        let dump = render_dump(0x8000, &binary);
        let mut lines = dump.lines();
        let first = lines.next().unwrap();
        assert!(first.starts_with("8000: 00 01"));
        let second = lines.next().unwrap();
        assert!(second.starts_with("8010: 10 11 12 13"));
    }
}
