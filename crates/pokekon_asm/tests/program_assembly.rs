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

//! Whole-program assembly tests.

use pokekon_asm::{assemble, AssembleOptions, Severity};

/// A small LCD banner routine using most operand families.
const BANNER: &str = r#"
; write a banner through the primary LCD controller
LCD_CMD   EQU 0x58
LCD_DATA  EQU 0x5A
HOME      EQU 0x80

        ORG 0x0100
        ENTRY MAIN

MAIN:   LD SP,0x7F00
        LD A,HOME
        OUT (LCD_CMD),A
        LD HL,MSG
        LD B,MSGLEN
LOOP:   LD A,(HL)
        OUT (LCD_DATA),A
        INC HL
        DJNZ LOOP
        HALT

MSG:    DB "HELLO, G815", 0x0D, 0x0A
MSGLEN  EQU $-MSG
        END
"#;

#[test]
fn banner_program_assembles() {
    let out = assemble(BANNER, AssembleOptions::default());
    assert!(
        out.ok,
        "diagnostics: {:?}",
        out.diagnostics.iter().map(|d| &d.message).collect::<Vec<_>>()
    );
    assert_eq!(out.origin, 0x0100);
    assert_eq!(out.entry, 0x0100);

    // MAIN: LD SP,0x7F00 → 31 00 7F
    assert_eq!(&out.binary[..3], &[0x31, 0x00, 0x7F]);
    // The message bytes sit at MSG with CR LF appended.
    let msg_offset = out
        .binary
        .windows(5)
        .position(|w| w == b"HELLO")
        .expect("message bytes present");
    assert_eq!(out.binary[msg_offset + 11], 0x0D);
    assert_eq!(out.binary[msg_offset + 12], 0x0A);

    // MSGLEN resolved from `$`.
    let msglen = out
        .symbols
        .iter()
        .find(|(name, _)| name == "MSGLEN")
        .map(|(_, v)| *v)
        .unwrap();
    assert_eq!(msglen, 13);

    // Every listing record's bytes match the flattened binary.
    for record in &out.listing {
        let start = (record.address - out.origin) as usize;
        assert_eq!(
            &out.binary[start..start + record.bytes.len()],
            record.bytes.as_slice(),
            "listing mismatch at {:04X}",
            record.address
        );
    }
}

#[test]
fn prefix_families_assemble() {
    let source = "
        ORG 0
        LD IX,0x4000
        LD (IX+3),0x7E
        BIT 5,(IY-1)
        ADD IX,DE
        SBC HL,BC
        IN E,(C)
        OUT (C),B
        RLC (HL)
        SRL D
        LD (0x2000),BC
";
    let out = assemble(source, AssembleOptions::default());
    assert!(out.ok, "{:?}", out.diagnostics.first().map(|d| &d.message));
    let expected: Vec<u8> = vec![
        0xDD, 0x21, 0x00, 0x40, // LD IX,0x4000
        0xDD, 0x36, 0x03, 0x7E, // LD (IX+3),0x7E
        0xFD, 0xCB, 0xFF, 0x6E, // BIT 5,(IY-1)
        0xDD, 0x19, // ADD IX,DE
        0xED, 0x42, // SBC HL,BC
        0xED, 0x58, // IN E,(C)
        0xED, 0x41, // OUT (C),B
        0xCB, 0x06, // RLC (HL)
        0xCB, 0x3A, // SRL D
        0xED, 0x43, 0x00, 0x20, // LD (0x2000),BC
    ];
    assert_eq!(out.binary, expected);
}

#[test]
fn error_lines_are_located() {
    let source = " NOP\n JR 0x4000\n ADD B\n";
    let out = assemble(source, AssembleOptions::default());
    assert!(!out.ok);
    let lines: Vec<usize> = out
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.line)
        .collect();
    assert!(lines.contains(&2));
    assert!(lines.contains(&3));
    // Artifacts still come back on error.
    assert!(!out.binary.is_empty());
}

#[test]
fn mixed_index_registers_rejected() {
    let out = assemble(" ADD IX,IY\n", AssembleOptions::default());
    assert!(!out.ok);
    assert!(out.diagnostics[0].message.contains("IX and IY"));
}
