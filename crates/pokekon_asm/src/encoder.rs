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

//! Instruction encoding.
//!
//! Operand strings parse into a tagged operand type; a per-mnemonic
//! encoder maps operand shapes onto opcode bytes with the DD/FD (index),
//! CB (bit/rotate) and ED (extended) prefix families. Encoded length
//! never depends on expression values, so the sizing pass and the emit
//! pass always agree.

use std::str::FromStr;

use strum_macros::EnumString;

use crate::expr::EvalCtx;

pub const PREFIX_IX: u8 = 0xDD;
pub const PREFIX_IY: u8 = 0xFD;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
    I,
    R,
}

impl Reg8 {
    fn field(self) -> Option<u8> {
        match self {
            Reg8::B => Some(0),
            Reg8::C => Some(1),
            Reg8::D => Some(2),
            Reg8::E => Some(3),
            Reg8::H => Some(4),
            Reg8::L => Some(5),
            Reg8::A => Some(7),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg16 {
    Bc,
    De,
    Hl,
    Sp,
    Af,
    AfAlt,
    Ix,
    Iy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg8(Reg8),
    Reg16(Reg16),
    /// (BC) (DE) (HL) (SP)
    IndReg(Reg16),
    /// (C), for the ED I/O group.
    IndC,
    /// (expr)
    IndImm(String),
    /// (IX+d) / (IY-d): prefix byte plus displacement expression.
    IndexedIndirect { prefix: u8, disp: String },
    /// Bare expression.
    Imm(String),
    /// Quoted string, DB only.
    Str(String),
}

/// Parse one operand string.
pub fn parse_operand(text: &str) -> Operand {
    let trimmed = text.trim();

    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return Operand::Str(trimmed[1..trimmed.len() - 1].to_string());
    }

    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        let inner = trimmed[1..trimmed.len() - 1].trim();
        let upper = inner.to_ascii_uppercase();
        match upper.as_str() {
            "BC" => return Operand::IndReg(Reg16::Bc),
            "DE" => return Operand::IndReg(Reg16::De),
            "HL" => return Operand::IndReg(Reg16::Hl),
            "SP" => return Operand::IndReg(Reg16::Sp),
            "C" => return Operand::IndC,
            "IX" => {
                return Operand::IndexedIndirect {
                    prefix: PREFIX_IX,
                    disp: "0".to_string(),
                }
            }
            "IY" => {
                return Operand::IndexedIndirect {
                    prefix: PREFIX_IY,
                    disp: "0".to_string(),
                }
            }
            _ => {}
        }
        if upper.starts_with("IX+") || upper.starts_with("IX-") {
            return Operand::IndexedIndirect {
                prefix: PREFIX_IX,
                disp: inner[2..].to_string(),
            };
        }
        if upper.starts_with("IY+") || upper.starts_with("IY-") {
            return Operand::IndexedIndirect {
                prefix: PREFIX_IY,
                disp: inner[2..].to_string(),
            };
        }
        return Operand::IndImm(inner.to_string());
    }

    match trimmed.to_ascii_uppercase().as_str() {
        "A" => Operand::Reg8(Reg8::A),
        "B" => Operand::Reg8(Reg8::B),
        "C" => Operand::Reg8(Reg8::C),
        "D" => Operand::Reg8(Reg8::D),
        "E" => Operand::Reg8(Reg8::E),
        "H" => Operand::Reg8(Reg8::H),
        "L" => Operand::Reg8(Reg8::L),
        "I" => Operand::Reg8(Reg8::I),
        "R" => Operand::Reg8(Reg8::R),
        "BC" => Operand::Reg16(Reg16::Bc),
        "DE" => Operand::Reg16(Reg16::De),
        "HL" => Operand::Reg16(Reg16::Hl),
        "SP" => Operand::Reg16(Reg16::Sp),
        "AF" => Operand::Reg16(Reg16::Af),
        "AF'" => Operand::Reg16(Reg16::AfAlt),
        "IX" => Operand::Reg16(Reg16::Ix),
        "IY" => Operand::Reg16(Reg16::Iy),
        _ => Operand::Imm(trimmed.to_string()),
    }
}

/// Condition code field for conditional jumps/calls/returns.
fn condition_field(text: &str) -> Option<u8> {
    match text.trim().to_ascii_uppercase().as_str() {
        "NZ" => Some(0),
        "Z" => Some(1),
        "NC" => Some(2),
        "C" => Some(3),
        "PO" => Some(4),
        "PE" => Some(5),
        "P" => Some(6),
        "M" => Some(7),
        _ => None,
    }
}

/// JR accepts only the first four conditions.
fn jr_condition_field(text: &str) -> Option<u8> {
    condition_field(text).filter(|&cc| cc < 4)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Mnemonic {
    Ld, Push, Pop, Ex, Exx,
    Ldi, Ldir, Ldd, Lddr, Cpi, Cpir, Cpd, Cpdr,
    Add, Adc, Sub, Sbc, And, Or, Xor, Cp,
    Inc, Dec,
    Daa, Cpl, Neg, Ccf, Scf,
    Nop, Halt, Di, Ei, Im,
    Rlca, Rla, Rrca, Rra,
    Rlc, Rl, Rrc, Rr, Sla, Sra, Sll, Srl, Rld, Rrd,
    Bit, Set, Res,
    Jp, Jr, Djnz, Call, Ret, Reti, Retn, Rst,
    In, Ini, Inir, Ind, Indr,
    Out, Outi, Otir, Outd, Otdr,
}

struct Enc<'a, 'b> {
    ctx: &'a EvalCtx<'b>,
    /// Address of the first byte of this instruction.
    addr: u16,
}

impl Enc<'_, '_> {
    fn imm8(&self, expr: &str) -> Result<u8, String> {
        let v = self.ctx.eval(expr)?;
        if !self.ctx.for_size && !(-128..=255).contains(&v) {
            return Err(format!("value {v} out of 8-bit range"));
        }
        Ok(v as u8)
    }

    fn imm16(&self, expr: &str) -> Result<[u8; 2], String> {
        let v = self.ctx.eval(expr)?;
        if !self.ctx.for_size && !(-32768..=65535).contains(&v) {
            return Err(format!("value {v} out of 16-bit range"));
        }
        Ok((v as u16).to_le_bytes())
    }

    fn disp8(&self, expr: &str) -> Result<u8, String> {
        let v = self.ctx.eval(expr)?;
        if !self.ctx.for_size && !(-128..=127).contains(&v) {
            return Err(format!("displacement {v} out of range -128..127"));
        }
        Ok(v as i8 as u8)
    }

    /// Relative branch displacement for an instruction of `len` bytes.
    fn rel8(&self, expr: &str, len: u16) -> Result<u8, String> {
        let target = self.ctx.eval(expr)?;
        let offset = target - i64::from(self.addr) - i64::from(len);
        if !self.ctx.for_size && !(-128..=127).contains(&offset) {
            return Err(format!("relative jump {offset} out of range -128..127"));
        }
        Ok(offset as i8 as u8)
    }

    /// Constant bit number 0..7 for BIT/SET/RES.
    fn bit3(&self, expr: &str) -> Result<u8, String> {
        let v = self.ctx.eval(expr)?;
        if !self.ctx.for_size && !(0..=7).contains(&v) {
            return Err(format!("bit number {v} out of range 0..7"));
        }
        Ok((v & 7) as u8)
    }
}

fn rp_field(reg: Reg16) -> Option<u8> {
    match reg {
        Reg16::Bc => Some(0),
        Reg16::De => Some(1),
        Reg16::Hl => Some(2),
        Reg16::Sp => Some(3),
        _ => None,
    }
}

fn push_field(reg: Reg16) -> Option<u8> {
    match reg {
        Reg16::Bc => Some(0),
        Reg16::De => Some(1),
        Reg16::Hl => Some(2),
        Reg16::Af => Some(3),
        _ => None,
    }
}

fn index_prefix(reg: Reg16) -> Option<u8> {
    match reg {
        Reg16::Ix => Some(PREFIX_IX),
        Reg16::Iy => Some(PREFIX_IY),
        _ => None,
    }
}

fn rotate_base(m: Mnemonic) -> u8 {
    match m {
        Mnemonic::Rlc => 0x00,
        Mnemonic::Rrc => 0x08,
        Mnemonic::Rl => 0x10,
        Mnemonic::Rr => 0x18,
        Mnemonic::Sla => 0x20,
        Mnemonic::Sra => 0x28,
        Mnemonic::Sll => 0x30,
        _ => 0x38, // SRL
    }
}

fn alu_base(m: Mnemonic) -> u8 {
    match m {
        Mnemonic::Add => 0x80,
        Mnemonic::Adc => 0x88,
        Mnemonic::Sub => 0x90,
        Mnemonic::Sbc => 0x98,
        Mnemonic::And => 0xA0,
        Mnemonic::Xor => 0xA8,
        Mnemonic::Or => 0xB0,
        _ => 0xB8, // CP
    }
}

fn mixed_index_error() -> String {
    "IX and IY cannot be combined in one instruction".to_string()
}

/// Encode one instruction. `ctx.addr` must be the instruction's start
/// address.
pub fn encode(mnemonic: &str, operands: &[String], ctx: &EvalCtx) -> Result<Vec<u8>, String> {
    let m = Mnemonic::from_str(mnemonic)
        .map_err(|_| format!("unknown mnemonic {mnemonic}"))?;
    let enc = Enc {
        ctx,
        addr: ctx.addr,
    };
    let ops: Vec<Operand> = operands.iter().map(|o| parse_operand(o)).collect();

    // Reject IX/IY mixtures up front.
    let mut prefixes = ops.iter().filter_map(|o| match o {
        Operand::IndexedIndirect { prefix, .. } => Some(*prefix),
        Operand::Reg16(r) => index_prefix(*r),
        _ => None,
    });
    if let (Some(a), Some(b)) = (prefixes.next(), prefixes.next()) {
        if a != b {
            return Err(mixed_index_error());
        }
    }

    match m {
        Mnemonic::Nop => no_operands(&ops, vec![0x00]),
        Mnemonic::Halt => no_operands(&ops, vec![0x76]),
        Mnemonic::Di => no_operands(&ops, vec![0xF3]),
        Mnemonic::Ei => no_operands(&ops, vec![0xFB]),
        Mnemonic::Daa => no_operands(&ops, vec![0x27]),
        Mnemonic::Cpl => no_operands(&ops, vec![0x2F]),
        Mnemonic::Neg => no_operands(&ops, vec![0xED, 0x44]),
        Mnemonic::Ccf => no_operands(&ops, vec![0x3F]),
        Mnemonic::Scf => no_operands(&ops, vec![0x37]),
        Mnemonic::Exx => no_operands(&ops, vec![0xD9]),
        Mnemonic::Rlca => no_operands(&ops, vec![0x07]),
        Mnemonic::Rla => no_operands(&ops, vec![0x17]),
        Mnemonic::Rrca => no_operands(&ops, vec![0x0F]),
        Mnemonic::Rra => no_operands(&ops, vec![0x1F]),
        Mnemonic::Rld => no_operands(&ops, vec![0xED, 0x6F]),
        Mnemonic::Rrd => no_operands(&ops, vec![0xED, 0x67]),
        Mnemonic::Ldi => no_operands(&ops, vec![0xED, 0xA0]),
        Mnemonic::Ldir => no_operands(&ops, vec![0xED, 0xB0]),
        Mnemonic::Ldd => no_operands(&ops, vec![0xED, 0xA8]),
        Mnemonic::Lddr => no_operands(&ops, vec![0xED, 0xB8]),
        Mnemonic::Cpi => no_operands(&ops, vec![0xED, 0xA1]),
        Mnemonic::Cpir => no_operands(&ops, vec![0xED, 0xB1]),
        Mnemonic::Cpd => no_operands(&ops, vec![0xED, 0xA9]),
        Mnemonic::Cpdr => no_operands(&ops, vec![0xED, 0xB9]),
        Mnemonic::Ini => no_operands(&ops, vec![0xED, 0xA2]),
        Mnemonic::Inir => no_operands(&ops, vec![0xED, 0xB2]),
        Mnemonic::Ind => no_operands(&ops, vec![0xED, 0xAA]),
        Mnemonic::Indr => no_operands(&ops, vec![0xED, 0xBA]),
        Mnemonic::Outi => no_operands(&ops, vec![0xED, 0xA3]),
        Mnemonic::Otir => no_operands(&ops, vec![0xED, 0xB3]),
        Mnemonic::Outd => no_operands(&ops, vec![0xED, 0xAB]),
        Mnemonic::Otdr => no_operands(&ops, vec![0xED, 0xBB]),
        Mnemonic::Reti => no_operands(&ops, vec![0xED, 0x4D]),
        Mnemonic::Retn => no_operands(&ops, vec![0xED, 0x45]),

        Mnemonic::Ld => encode_ld(&enc, &ops),
        Mnemonic::Push | Mnemonic::Pop => {
            let base = if m == Mnemonic::Push { 0xC5 } else { 0xC1 };
            match ops.as_slice() {
                [Operand::Reg16(reg)] => {
                    if let Some(qq) = push_field(*reg) {
                        Ok(vec![base | (qq << 4)])
                    }
                    else if let Some(prefix) = index_prefix(*reg) {
                        Ok(vec![prefix, base | (2 << 4)])
                    }
                    else {
                        Err(format!("cannot {mnemonic} {reg:?}"))
                    }
                }
                _ => Err(format!("bad operands for {mnemonic}")),
            }
        }
        Mnemonic::Ex => match ops.as_slice() {
            [Operand::Reg16(Reg16::De), Operand::Reg16(Reg16::Hl)] => Ok(vec![0xEB]),
            [Operand::Reg16(Reg16::Af), Operand::Reg16(Reg16::AfAlt)] => Ok(vec![0x08]),
            [Operand::IndReg(Reg16::Sp), Operand::Reg16(Reg16::Hl)] => Ok(vec![0xE3]),
            [Operand::IndReg(Reg16::Sp), Operand::Reg16(reg)] => index_prefix(*reg)
                .map(|p| vec![p, 0xE3])
                .ok_or_else(|| "bad operands for EX".to_string()),
            _ => Err("bad operands for EX".to_string()),
        },

        Mnemonic::Add | Mnemonic::Adc | Mnemonic::Sbc => encode_alu(&enc, m, &ops, false),
        Mnemonic::Sub | Mnemonic::And | Mnemonic::Or | Mnemonic::Xor | Mnemonic::Cp => {
            encode_alu(&enc, m, &ops, true)
        }

        Mnemonic::Inc | Mnemonic::Dec => encode_incdec(&enc, m, &ops),

        Mnemonic::Rlc
        | Mnemonic::Rl
        | Mnemonic::Rrc
        | Mnemonic::Rr
        | Mnemonic::Sla
        | Mnemonic::Sra
        | Mnemonic::Sll
        | Mnemonic::Srl => match ops.as_slice() {
            [Operand::Reg8(r)] => {
                let field = r.field().ok_or("bad register for rotate")?;
                Ok(vec![0xCB, rotate_base(m) | field])
            }
            [Operand::IndReg(Reg16::Hl)] => Ok(vec![0xCB, rotate_base(m) | 6]),
            [Operand::IndexedIndirect { prefix, disp }] => {
                let d = enc.disp8(disp)?;
                Ok(vec![*prefix, 0xCB, d, rotate_base(m) | 6])
            }
            _ => Err(format!("bad operands for {mnemonic}")),
        },

        Mnemonic::Bit | Mnemonic::Set | Mnemonic::Res => {
            let base = match m {
                Mnemonic::Bit => 0x40,
                Mnemonic::Res => 0x80,
                _ => 0xC0,
            };
            match ops.as_slice() {
                [Operand::Imm(bit), Operand::Reg8(r)] => {
                    let b = enc.bit3(bit)?;
                    let field = r.field().ok_or("bad register for bit op")?;
                    Ok(vec![0xCB, base | (b << 3) | field])
                }
                [Operand::Imm(bit), Operand::IndReg(Reg16::Hl)] => {
                    let b = enc.bit3(bit)?;
                    Ok(vec![0xCB, base | (b << 3) | 6])
                }
                [Operand::Imm(bit), Operand::IndexedIndirect { prefix, disp }] => {
                    let b = enc.bit3(bit)?;
                    let d = enc.disp8(disp)?;
                    Ok(vec![*prefix, 0xCB, d, base | (b << 3) | 6])
                }
                _ => Err(format!("bad operands for {mnemonic}")),
            }
        }

        Mnemonic::Jp => match ops.as_slice() {
            [Operand::IndReg(Reg16::Hl)] => Ok(vec![0xE9]),
            [Operand::IndexedIndirect { prefix, disp }] if disp.trim() == "0" => {
                Ok(vec![*prefix, 0xE9])
            }
            [Operand::Imm(target)] => {
                // `JP cc` with a missing target parses as Imm(cc).
                if condition_field(target).is_some() {
                    return Err("JP condition without target".to_string());
                }
                let nn = enc.imm16(target)?;
                Ok(vec![0xC3, nn[0], nn[1]])
            }
            [first, Operand::Imm(target)] => {
                let cc = operand_condition(first, operands.first())
                    .ok_or("bad condition for JP")?;
                let nn = enc.imm16(target)?;
                Ok(vec![0xC2 | (cc << 3), nn[0], nn[1]])
            }
            _ => Err("bad operands for JP".to_string()),
        },
        Mnemonic::Jr => match ops.as_slice() {
            [Operand::Imm(target)] => {
                let d = enc.rel8(target, 2)?;
                Ok(vec![0x18, d])
            }
            [first, Operand::Imm(target)] => {
                let cc = operand_jr_condition(first, operands.first())
                    .ok_or("bad condition for JR")?;
                let d = enc.rel8(target, 2)?;
                Ok(vec![0x20 | (cc << 3), d])
            }
            _ => Err("bad operands for JR".to_string()),
        },
        Mnemonic::Djnz => match ops.as_slice() {
            [Operand::Imm(target)] => {
                let d = enc.rel8(target, 2)?;
                Ok(vec![0x10, d])
            }
            _ => Err("bad operands for DJNZ".to_string()),
        },
        Mnemonic::Call => match ops.as_slice() {
            [Operand::Imm(target)] => {
                let nn = enc.imm16(target)?;
                Ok(vec![0xCD, nn[0], nn[1]])
            }
            [first, Operand::Imm(target)] => {
                let cc = operand_condition(first, operands.first())
                    .ok_or("bad condition for CALL")?;
                let nn = enc.imm16(target)?;
                Ok(vec![0xC4 | (cc << 3), nn[0], nn[1]])
            }
            _ => Err("bad operands for CALL".to_string()),
        },
        Mnemonic::Ret => match ops.as_slice() {
            [] => Ok(vec![0xC9]),
            [first] => {
                let cc = operand_condition(first, operands.first())
                    .ok_or("bad condition for RET")?;
                Ok(vec![0xC0 | (cc << 3)])
            }
            _ => Err("bad operands for RET".to_string()),
        },
        Mnemonic::Rst => match ops.as_slice() {
            [Operand::Imm(vector)] => {
                let v = ctx.eval(vector)?;
                if !ctx.for_size && (v & !0x38 != 0) {
                    return Err(format!("bad RST vector {v:#04X}"));
                }
                Ok(vec![0xC7 | (v as u8 & 0x38)])
            }
            _ => Err("bad operands for RST".to_string()),
        },
        Mnemonic::Im => match ops.as_slice() {
            [Operand::Imm(mode)] => match ctx.eval(mode)? {
                0 => Ok(vec![0xED, 0x46]),
                1 => Ok(vec![0xED, 0x56]),
                2 => Ok(vec![0xED, 0x5E]),
                _ if ctx.for_size => Ok(vec![0xED, 0x46]),
                other => Err(format!("bad interrupt mode {other}")),
            },
            _ => Err("bad operands for IM".to_string()),
        },
        Mnemonic::In => match ops.as_slice() {
            [Operand::Reg8(Reg8::A), Operand::IndImm(port)] => {
                let n = enc.imm8(port)?;
                Ok(vec![0xDB, n])
            }
            [Operand::Reg8(r), Operand::IndC] => {
                let field = r.field().ok_or("bad register for IN")?;
                Ok(vec![0xED, 0x40 | (field << 3)])
            }
            _ => Err("bad operands for IN".to_string()),
        },
        Mnemonic::Out => match ops.as_slice() {
            [Operand::IndImm(port), Operand::Reg8(Reg8::A)] => {
                let n = enc.imm8(port)?;
                Ok(vec![0xD3, n])
            }
            [Operand::IndC, Operand::Reg8(r)] => {
                let field = r.field().ok_or("bad register for OUT")?;
                Ok(vec![0xED, 0x41 | (field << 3)])
            }
            _ => Err("bad operands for OUT".to_string()),
        },
    }
}

fn no_operands(ops: &[Operand], bytes: Vec<u8>) -> Result<Vec<u8>, String> {
    if ops.is_empty() {
        Ok(bytes)
    }
    else {
        Err("unexpected operands".to_string())
    }
}

/// The raw text is needed to resolve the C register/condition clash.
fn operand_condition(op: &Operand, raw: Option<&String>) -> Option<u8> {
    match op {
        Operand::Reg8(_) | Operand::Imm(_) => condition_field(raw?),
        _ => None,
    }
}

fn operand_jr_condition(op: &Operand, raw: Option<&String>) -> Option<u8> {
    match op {
        Operand::Reg8(_) | Operand::Imm(_) => jr_condition_field(raw?),
        _ => None,
    }
}

fn encode_ld(enc: &Enc, ops: &[Operand]) -> Result<Vec<u8>, String> {
    match ops {
        // LD r,r'
        [Operand::Reg8(dst), Operand::Reg8(src)] => match (dst, src) {
            (Reg8::A, Reg8::I) => Ok(vec![0xED, 0x57]),
            (Reg8::A, Reg8::R) => Ok(vec![0xED, 0x5F]),
            (Reg8::I, Reg8::A) => Ok(vec![0xED, 0x47]),
            (Reg8::R, Reg8::A) => Ok(vec![0xED, 0x4F]),
            _ => {
                let d = dst.field().ok_or("bad register for LD")?;
                let s = src.field().ok_or("bad register for LD")?;
                Ok(vec![0x40 | (d << 3) | s])
            }
        },
        // LD r,(HL) / LD (HL),r
        [Operand::Reg8(dst), Operand::IndReg(Reg16::Hl)] => {
            let d = dst.field().ok_or("bad register for LD")?;
            Ok(vec![0x46 | (d << 3)])
        }
        [Operand::IndReg(Reg16::Hl), Operand::Reg8(src)] => {
            let s = src.field().ok_or("bad register for LD")?;
            Ok(vec![0x70 | s])
        }
        // LD r,(IX+d) / LD (IX+d),r
        [Operand::Reg8(dst), Operand::IndexedIndirect { prefix, disp }] => {
            let d = dst.field().ok_or("bad register for LD")?;
            let disp = enc.disp8(disp)?;
            Ok(vec![*prefix, 0x46 | (d << 3), disp])
        }
        [Operand::IndexedIndirect { prefix, disp }, Operand::Reg8(src)] => {
            let s = src.field().ok_or("bad register for LD")?;
            let disp = enc.disp8(disp)?;
            Ok(vec![*prefix, 0x70 | s, disp])
        }
        // LD A,(BC)/(DE) and stores
        [Operand::Reg8(Reg8::A), Operand::IndReg(Reg16::Bc)] => Ok(vec![0x0A]),
        [Operand::Reg8(Reg8::A), Operand::IndReg(Reg16::De)] => Ok(vec![0x1A]),
        [Operand::IndReg(Reg16::Bc), Operand::Reg8(Reg8::A)] => Ok(vec![0x02]),
        [Operand::IndReg(Reg16::De), Operand::Reg8(Reg8::A)] => Ok(vec![0x12]),
        // LD A,(nn) / LD (nn),A
        [Operand::Reg8(Reg8::A), Operand::IndImm(addr)] => {
            let nn = enc.imm16(addr)?;
            Ok(vec![0x3A, nn[0], nn[1]])
        }
        [Operand::IndImm(addr), Operand::Reg8(Reg8::A)] => {
            let nn = enc.imm16(addr)?;
            Ok(vec![0x32, nn[0], nn[1]])
        }
        // LD r,n / LD (HL),n / LD (IX+d),n
        [Operand::Reg8(dst), Operand::Imm(value)] => {
            let d = dst.field().ok_or("bad register for LD")?;
            let n = enc.imm8(value)?;
            Ok(vec![0x06 | (d << 3), n])
        }
        [Operand::IndReg(Reg16::Hl), Operand::Imm(value)] => {
            let n = enc.imm8(value)?;
            Ok(vec![0x36, n])
        }
        [Operand::IndexedIndirect { prefix, disp }, Operand::Imm(value)] => {
            let d = enc.disp8(disp)?;
            let n = enc.imm8(value)?;
            Ok(vec![*prefix, 0x36, d, n])
        }
        // LD dd,nn
        [Operand::Reg16(reg), Operand::Imm(value)] => {
            let nn = enc.imm16(value)?;
            if let Some(rp) = rp_field(*reg) {
                Ok(vec![0x01 | (rp << 4), nn[0], nn[1]])
            }
            else if let Some(prefix) = index_prefix(*reg) {
                Ok(vec![prefix, 0x21, nn[0], nn[1]])
            }
            else {
                Err("bad register for LD".to_string())
            }
        }
        // LD dd,(nn)
        [Operand::Reg16(reg), Operand::IndImm(addr)] => {
            let nn = enc.imm16(addr)?;
            match reg {
                Reg16::Hl => Ok(vec![0x2A, nn[0], nn[1]]),
                Reg16::Ix | Reg16::Iy => {
                    Ok(vec![index_prefix(*reg).unwrap(), 0x2A, nn[0], nn[1]])
                }
                _ => {
                    let rp = rp_field(*reg).ok_or("bad register for LD")?;
                    Ok(vec![0xED, 0x4B | (rp << 4), nn[0], nn[1]])
                }
            }
        }
        // LD (nn),dd
        [Operand::IndImm(addr), Operand::Reg16(reg)] => {
            let nn = enc.imm16(addr)?;
            match reg {
                Reg16::Hl => Ok(vec![0x22, nn[0], nn[1]]),
                Reg16::Ix | Reg16::Iy => {
                    Ok(vec![index_prefix(*reg).unwrap(), 0x22, nn[0], nn[1]])
                }
                _ => {
                    let rp = rp_field(*reg).ok_or("bad register for LD")?;
                    Ok(vec![0xED, 0x43 | (rp << 4), nn[0], nn[1]])
                }
            }
        }
        // LD SP,HL/IX/IY
        [Operand::Reg16(Reg16::Sp), Operand::Reg16(src)] => match src {
            Reg16::Hl => Ok(vec![0xF9]),
            Reg16::Ix | Reg16::Iy => Ok(vec![index_prefix(*src).unwrap(), 0xF9]),
            _ => Err("bad operands for LD SP".to_string()),
        },
        _ => Err("bad operands for LD".to_string()),
    }
}

fn encode_alu(
    enc: &Enc,
    m: Mnemonic,
    ops: &[Operand],
    allow_one_operand: bool,
) -> Result<Vec<u8>, String> {
    // 16-bit forms first.
    if let [Operand::Reg16(dst), Operand::Reg16(src)] = ops {
        return match m {
            Mnemonic::Add => {
                if let Some(rp) = rp_field(*src) {
                    match dst {
                        Reg16::Hl => Ok(vec![0x09 | (rp << 4)]),
                        Reg16::Ix | Reg16::Iy => {
                            Ok(vec![index_prefix(*dst).unwrap(), 0x09 | (rp << 4)])
                        }
                        _ => Err("bad operands for ADD".to_string()),
                    }
                }
                else if index_prefix(*src).is_some() && src == dst {
                    // ADD IX,IX
                    Ok(vec![index_prefix(*dst).unwrap(), 0x29])
                }
                else {
                    Err("bad operands for ADD".to_string())
                }
            }
            Mnemonic::Adc if *dst == Reg16::Hl => {
                let rp = rp_field(*src).ok_or("bad operands for ADC")?;
                Ok(vec![0xED, 0x4A | (rp << 4)])
            }
            Mnemonic::Sbc if *dst == Reg16::Hl => {
                let rp = rp_field(*src).ok_or("bad operands for SBC")?;
                Ok(vec![0xED, 0x42 | (rp << 4)])
            }
            _ => Err("bad 16-bit ALU operands".to_string()),
        };
    }

    // Normalize `OP A,src` / `OP src`.
    let src = match ops {
        [Operand::Reg8(Reg8::A), src] => src,
        [src] if allow_one_operand => src,
        [Operand::Reg8(Reg8::A)] if !allow_one_operand => {
            return Err("missing source operand".to_string())
        }
        [_one] => {
            // ADD/ADC/SBC require the explicit accumulator form.
            return Err("accumulator operand required".to_string());
        }
        _ => return Err("bad ALU operands".to_string()),
    };

    match src {
        Operand::Reg8(r) => {
            let field = r.field().ok_or("bad register for ALU op")?;
            Ok(vec![alu_base(m) | field])
        }
        Operand::IndReg(Reg16::Hl) => Ok(vec![alu_base(m) | 6]),
        Operand::IndexedIndirect { prefix, disp } => {
            let d = enc.disp8(disp)?;
            Ok(vec![*prefix, alu_base(m) | 6, d])
        }
        Operand::Imm(value) => {
            let n = enc.imm8(value)?;
            Ok(vec![alu_base(m) | 0x46, n])
        }
        _ => Err("bad ALU operand".to_string()),
    }
}

fn encode_incdec(enc: &Enc, m: Mnemonic, ops: &[Operand]) -> Result<Vec<u8>, String> {
    let inc = m == Mnemonic::Inc;
    match ops {
        [Operand::Reg8(r)] => {
            let field = r.field().ok_or("bad register for INC/DEC")?;
            let base = if inc { 0x04 } else { 0x05 };
            Ok(vec![base | (field << 3)])
        }
        [Operand::IndReg(Reg16::Hl)] => Ok(vec![if inc { 0x34 } else { 0x35 }]),
        [Operand::IndexedIndirect { prefix, disp }] => {
            let d = enc.disp8(disp)?;
            Ok(vec![*prefix, if inc { 0x34 } else { 0x35 }, d])
        }
        [Operand::Reg16(reg)] => {
            if let Some(rp) = rp_field(*reg) {
                let base = if inc { 0x03 } else { 0x0B };
                Ok(vec![base | (rp << 4)])
            }
            else if let Some(prefix) = index_prefix(*reg) {
                Ok(vec![prefix, if inc { 0x23 } else { 0x2B }])
            }
            else {
                Err("bad register for INC/DEC".to_string())
            }
        }
        _ => Err("bad operands for INC/DEC".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    fn enc(mnemonic: &str, operands: &[&str]) -> Result<Vec<u8>, String> {
        let symbols = SymbolTable::new();
        let ctx = EvalCtx {
            symbols: &symbols,
            addr: 0x0100,
            for_size: false,
        };
        let ops: Vec<String> = operands.iter().map(|s| s.to_string()).collect();
        encode(mnemonic, &ops, &ctx)
    }

    #[test]
    fn basic_loads() {
        assert_eq!(enc("LD", &["A", "0x01"]).unwrap(), vec![0x3E, 0x01]);
        assert_eq!(enc("LD", &["B", "C"]).unwrap(), vec![0x41]);
        assert_eq!(enc("LD", &["(0x1000)", "A"]).unwrap(), vec![0x32, 0x00, 0x10]);
        assert_eq!(enc("LD", &["A", "(HL)"]).unwrap(), vec![0x7E]);
        assert_eq!(enc("LD", &["HL", "0x1234"]).unwrap(), vec![0x21, 0x34, 0x12]);
        assert_eq!(enc("LD", &["SP", "HL"]).unwrap(), vec![0xF9]);
        assert_eq!(enc("LD", &["A", "I"]).unwrap(), vec![0xED, 0x57]);
    }

    #[test]
    fn indexed_loads() {
        assert_eq!(enc("LD", &["A", "(IX+5)"]).unwrap(), vec![0xDD, 0x7E, 0x05]);
        assert_eq!(enc("LD", &["(IY-2)", "B"]).unwrap(), vec![0xFD, 0x70, 0xFE]);
        assert_eq!(
            enc("LD", &["(IX+1)", "0x42"]).unwrap(),
            vec![0xDD, 0x36, 0x01, 0x42]
        );
        assert_eq!(
            enc("LD", &["IX", "0x8000"]).unwrap(),
            vec![0xDD, 0x21, 0x00, 0x80]
        );
    }

    #[test]
    fn sixteen_bit_ld_via_ed() {
        assert_eq!(
            enc("LD", &["BC", "(0x4000)"]).unwrap(),
            vec![0xED, 0x4B, 0x00, 0x40]
        );
        assert_eq!(
            enc("LD", &["(0x4000)", "DE"]).unwrap(),
            vec![0xED, 0x53, 0x00, 0x40]
        );
        assert_eq!(enc("LD", &["HL", "(0x4000)"]).unwrap(), vec![0x2A, 0x00, 0x40]);
    }

    #[test]
    fn alu_forms() {
        assert_eq!(enc("ADD", &["A", "B"]).unwrap(), vec![0x80]);
        assert_eq!(enc("ADD", &["A", "0x10"]).unwrap(), vec![0xC6, 0x10]);
        assert_eq!(enc("SUB", &["B"]).unwrap(), vec![0x90]);
        assert_eq!(enc("SUB", &["A", "B"]).unwrap(), vec![0x90]);
        assert_eq!(enc("XOR", &["A"]).unwrap(), vec![0xAF]);
        assert_eq!(enc("CP", &["(HL)"]).unwrap(), vec![0xBE]);
        assert_eq!(enc("ADC", &["A", "(IX+3)"]).unwrap(), vec![0xDD, 0x8E, 0x03]);
        assert_eq!(enc("ADD", &["HL", "DE"]).unwrap(), vec![0x19]);
        assert_eq!(enc("SBC", &["HL", "BC"]).unwrap(), vec![0xED, 0x42]);
        assert_eq!(enc("ADD", &["IX", "SP"]).unwrap(), vec![0xDD, 0x39]);
    }

    #[test]
    fn one_operand_add_is_rejected() {
        assert!(enc("ADD", &["B"]).is_err());
        assert!(enc("ADC", &["B"]).is_err());
        assert!(enc("SBC", &["B"]).is_err());
        assert!(enc("AND", &["B"]).is_ok());
        assert!(enc("OR", &["B"]).is_ok());
        assert!(enc("CP", &["B"]).is_ok());
    }

    #[test]
    fn jumps_and_calls() {
        assert_eq!(enc("JP", &["0x0000"]).unwrap(), vec![0xC3, 0x00, 0x00]);
        assert_eq!(enc("JP", &["NZ", "0x1234"]).unwrap(), vec![0xC2, 0x34, 0x12]);
        assert_eq!(enc("JP", &["C", "0x1234"]).unwrap(), vec![0xDA, 0x34, 0x12]);
        assert_eq!(enc("JP", &["(HL)"]).unwrap(), vec![0xE9]);
        assert_eq!(enc("CALL", &["0x0005"]).unwrap(), vec![0xCD, 0x05, 0x00]);
        assert_eq!(enc("CALL", &["Z", "0x0005"]).unwrap(), vec![0xCC, 0x05, 0x00]);
        assert_eq!(enc("RET", &[]).unwrap(), vec![0xC9]);
        assert_eq!(enc("RET", &["NC"]).unwrap(), vec![0xD0]);
        assert_eq!(enc("RST", &["0x38"]).unwrap(), vec![0xFF]);
    }

    #[test]
    fn relative_jumps() {
        // At 0x0100, JR 0x0100 is offset -2.
        assert_eq!(enc("JR", &["0x0100"]).unwrap(), vec![0x18, 0xFE]);
        assert_eq!(enc("JR", &["Z", "0x0104"]).unwrap(), vec![0x28, 0x02]);
        assert_eq!(enc("DJNZ", &["0x0100"]).unwrap(), vec![0x10, 0xFE]);
        // PO is not a JR condition.
        assert!(enc("JR", &["PO", "0x0104"]).is_err());
        // Out of range.
        assert!(enc("JR", &["0x0300"]).is_err());
    }

    #[test]
    fn cb_group() {
        assert_eq!(enc("RLC", &["B"]).unwrap(), vec![0xCB, 0x00]);
        assert_eq!(enc("SRL", &["(HL)"]).unwrap(), vec![0xCB, 0x3E]);
        assert_eq!(enc("BIT", &["7", "A"]).unwrap(), vec![0xCB, 0x7F]);
        assert_eq!(enc("SET", &["0", "(HL)"]).unwrap(), vec![0xCB, 0xC6]);
        assert_eq!(
            enc("RES", &["3", "(IX+2)"]).unwrap(),
            vec![0xDD, 0xCB, 0x02, 0x9E]
        );
        assert!(enc("BIT", &["8", "A"]).is_err());
    }

    #[test]
    fn io_and_misc() {
        assert_eq!(enc("IN", &["A", "(0x12)"]).unwrap(), vec![0xDB, 0x12]);
        assert_eq!(enc("IN", &["B", "(C)"]).unwrap(), vec![0xED, 0x40]);
        assert_eq!(enc("OUT", &["(0x58)", "A"]).unwrap(), vec![0xD3, 0x58]);
        assert_eq!(enc("OUT", &["(C)", "E"]).unwrap(), vec![0xED, 0x59]);
        assert_eq!(enc("IM", &["1"]).unwrap(), vec![0xED, 0x56]);
        assert_eq!(enc("PUSH", &["AF"]).unwrap(), vec![0xF5]);
        assert_eq!(enc("POP", &["IX"]).unwrap(), vec![0xDD, 0xE1]);
        assert_eq!(enc("EX", &["DE", "HL"]).unwrap(), vec![0xEB]);
        assert_eq!(enc("EX", &["AF", "AF'"]).unwrap(), vec![0x08]);
        assert_eq!(enc("EX", &["(SP)", "IY"]).unwrap(), vec![0xFD, 0xE3]);
        assert_eq!(enc("LDIR", &[]).unwrap(), vec![0xED, 0xB0]);
        assert_eq!(enc("NEG", &[]).unwrap(), vec![0xED, 0x44]);
    }

    #[test]
    fn inc_dec_forms() {
        assert_eq!(enc("INC", &["A"]).unwrap(), vec![0x3C]);
        assert_eq!(enc("DEC", &["(HL)"]).unwrap(), vec![0x35]);
        assert_eq!(enc("INC", &["SP"]).unwrap(), vec![0x33]);
        assert_eq!(enc("DEC", &["IY"]).unwrap(), vec![0xFD, 0x2B]);
        assert_eq!(enc("INC", &["(IX+0)"]).unwrap(), vec![0xDD, 0x34, 0x00]);
    }

    #[test]
    fn mixed_index_rejected() {
        assert!(enc("LD", &["IX", "IY"]).is_err());
        let err = enc("ADD", &["IX", "IY"]).unwrap_err();
        assert!(err.contains("IX and IY"));
    }

    #[test]
    fn unknown_mnemonic() {
        assert!(enc("FNORD", &[]).unwrap_err().contains("unknown mnemonic"));
    }

    #[test]
    fn sizing_pass_matches_emit_sizes() {
        let symbols = SymbolTable::new();
        let size_ctx = EvalCtx {
            symbols: &symbols,
            addr: 0,
            for_size: true,
        };
        let cases: Vec<(&str, Vec<&str>)> = vec![
            ("LD", vec!["A", "0x01"]),
            ("LD", vec!["HL", "0x1234"]),
            ("LD", vec!["(IX+1)", "2"]),
            ("JP", vec!["0"]),
            ("JR", vec!["$"]),
            ("BIT", vec!["1", "(IY+0)"]),
            ("LDIR", vec![]),
        ];
        for (m, ops) in cases {
            let ops: Vec<String> = ops.iter().map(|s| s.to_string()).collect();
            let sized = encode(m, &ops, &size_ctx).unwrap();
            let emit_ctx = EvalCtx {
                symbols: &symbols,
                addr: 0,
                for_size: false,
            };
            let emitted = encode(m, &ops, &emit_ctx).unwrap();
            assert_eq!(sized.len(), emitted.len(), "{m} size mismatch");
        }
    }
}
