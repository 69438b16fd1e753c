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

//! Instruction execution.
//!
//! Opcodes decode by the x/y/z bit fields (x = bits 7-6, y = 5-3,
//! z = 2-0). The DD/FD pages substitute IX/IY for HL, and IXH/IXL for
//! H/L except in instructions that address through (ii+d).

use super::alu;
use super::{Bus, Cpu, FLAG_C, FLAG_H, FLAG_N, FLAG_PV, FLAG_S, FLAG_X, FLAG_Y, FLAG_Z};

/// HL substitution applied by a DD/FD prefix.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Index {
    None,
    Ix,
    Iy,
}

impl Cpu {
    pub(super) fn execute_next(&mut self, bus: &mut impl Bus) -> u32 {
        let at = self.pc;
        self.bump_r();
        let opcode = self.fetch8(bus);
        self.execute_main(bus, opcode, at)
    }

    fn execute_main(&mut self, bus: &mut impl Bus, opcode: u8, at: u16) -> u32 {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;

        match x {
            0 => self.execute_x0(bus, y, z),
            1 => {
                if opcode == 0x76 {
                    self.halted = true;
                    4
                }
                else {
                    // LD r,r'
                    let v = self.get_r(bus, z, Index::None);
                    self.set_r(bus, y, Index::None, v);
                    if y == 6 || z == 6 { 7 } else { 4 }
                }
            }
            2 => {
                let v = self.get_r(bus, z, Index::None);
                self.alu_op(y, v);
                if z == 6 { 7 } else { 4 }
            }
            _ => self.execute_x3(bus, y, z, at),
        }
    }

    fn execute_x0(&mut self, bus: &mut impl Bus, y: u8, z: u8) -> u32 {
        let p = y >> 1;
        let q = y & 1;
        match z {
            0 => match y {
                0 => 4, // NOP
                1 => {
                    // EX AF,AF'
                    std::mem::swap(&mut self.a, &mut self.a_alt);
                    std::mem::swap(&mut self.f, &mut self.f_alt);
                    4
                }
                2 => {
                    // DJNZ d
                    let d = self.fetch8(bus) as i8;
                    self.b = self.b.wrapping_sub(1);
                    if self.b != 0 {
                        self.pc = self.pc.wrapping_add_signed(i16::from(d));
                        13
                    }
                    else {
                        8
                    }
                }
                3 => {
                    // JR d
                    let d = self.fetch8(bus) as i8;
                    self.pc = self.pc.wrapping_add_signed(i16::from(d));
                    12
                }
                _ => {
                    // JR cc,d
                    let d = self.fetch8(bus) as i8;
                    if self.condition(y - 4) {
                        self.pc = self.pc.wrapping_add_signed(i16::from(d));
                        12
                    }
                    else {
                        7
                    }
                }
            },
            1 => {
                if q == 0 {
                    // LD rp,nn
                    let nn = self.fetch16(bus);
                    self.set_rp(p, nn);
                    10
                }
                else {
                    // ADD HL,rp
                    let (r, f) = alu::add16(self.hl(), self.rp(p), self.f);
                    self.set_hl(r);
                    self.f = f;
                    11
                }
            }
            2 => match (q, p) {
                (0, 0) => {
                    bus.write8(self.bc(), self.a);
                    7
                }
                (0, 1) => {
                    bus.write8(self.de(), self.a);
                    7
                }
                (0, 2) => {
                    let nn = self.fetch16(bus);
                    let hl = self.hl();
                    self.write16(bus, nn, hl);
                    16
                }
                (0, _) => {
                    let nn = self.fetch16(bus);
                    bus.write8(nn, self.a);
                    13
                }
                (_, 0) => {
                    self.a = bus.read8(self.bc());
                    7
                }
                (_, 1) => {
                    self.a = bus.read8(self.de());
                    7
                }
                (_, 2) => {
                    let nn = self.fetch16(bus);
                    let v = self.read16(bus, nn);
                    self.set_hl(v);
                    16
                }
                (_, _) => {
                    let nn = self.fetch16(bus);
                    self.a = bus.read8(nn);
                    13
                }
            },
            3 => {
                if q == 0 {
                    self.set_rp(p, self.rp(p).wrapping_add(1));
                }
                else {
                    self.set_rp(p, self.rp(p).wrapping_sub(1));
                }
                6
            }
            4 => {
                // INC r
                let v = self.get_r(bus, y, Index::None);
                let (r, f) = alu::inc8(v);
                self.set_r(bus, y, Index::None, r);
                self.f = f | (self.f & FLAG_C);
                if y == 6 { 11 } else { 4 }
            }
            5 => {
                // DEC r
                let v = self.get_r(bus, y, Index::None);
                let (r, f) = alu::dec8(v);
                self.set_r(bus, y, Index::None, r);
                self.f = f | (self.f & FLAG_C);
                if y == 6 { 11 } else { 4 }
            }
            6 => {
                // LD r,n
                let n = self.fetch8(bus);
                self.set_r(bus, y, Index::None, n);
                if y == 6 { 10 } else { 7 }
            }
            _ => {
                match y {
                    0 => {
                        let (r, f) = alu::rlc(self.a);
                        self.a = r;
                        self.f = (self.f & (FLAG_S | FLAG_Z | FLAG_PV)) | (f & (FLAG_C | FLAG_Y | FLAG_X));
                    }
                    1 => {
                        let (r, f) = alu::rrc(self.a);
                        self.a = r;
                        self.f = (self.f & (FLAG_S | FLAG_Z | FLAG_PV)) | (f & (FLAG_C | FLAG_Y | FLAG_X));
                    }
                    2 => {
                        let carry = self.f & FLAG_C != 0;
                        let (r, f) = alu::rl(self.a, carry);
                        self.a = r;
                        self.f = (self.f & (FLAG_S | FLAG_Z | FLAG_PV)) | (f & (FLAG_C | FLAG_Y | FLAG_X));
                    }
                    3 => {
                        let carry = self.f & FLAG_C != 0;
                        let (r, f) = alu::rr(self.a, carry);
                        self.a = r;
                        self.f = (self.f & (FLAG_S | FLAG_Z | FLAG_PV)) | (f & (FLAG_C | FLAG_Y | FLAG_X));
                    }
                    4 => {
                        let (r, f) = alu::daa(self.a, self.f);
                        self.a = r;
                        self.f = f;
                    }
                    5 => {
                        self.a = !self.a;
                        self.f = (self.f & (FLAG_S | FLAG_Z | FLAG_PV | FLAG_C))
                            | FLAG_H
                            | FLAG_N
                            | (self.a & (FLAG_Y | FLAG_X));
                    }
                    6 => {
                        self.f = (self.f & (FLAG_S | FLAG_Z | FLAG_PV))
                            | FLAG_C
                            | (self.a & (FLAG_Y | FLAG_X));
                    }
                    _ => {
                        let carry = self.f & FLAG_C != 0;
                        let mut f = self.f & (FLAG_S | FLAG_Z | FLAG_PV);
                        if carry {
                            f |= FLAG_H;
                        }
                        else {
                            f |= FLAG_C;
                        }
                        self.f = f | (self.a & (FLAG_Y | FLAG_X));
                    }
                }
                4
            }
        }
    }

    fn execute_x3(&mut self, bus: &mut impl Bus, y: u8, z: u8, at: u16) -> u32 {
        let p = y >> 1;
        let q = y & 1;
        match z {
            0 => {
                // RET cc
                if self.condition(y) {
                    self.pc = self.pop16(bus);
                    11
                }
                else {
                    5
                }
            }
            1 => {
                if q == 0 {
                    // POP rp2
                    let v = self.pop16(bus);
                    self.set_rp2(p, v);
                    10
                }
                else {
                    match p {
                        0 => {
                            self.pc = self.pop16(bus);
                            10
                        }
                        1 => {
                            // EXX
                            std::mem::swap(&mut self.b, &mut self.b_alt);
                            std::mem::swap(&mut self.c, &mut self.c_alt);
                            std::mem::swap(&mut self.d, &mut self.d_alt);
                            std::mem::swap(&mut self.e, &mut self.e_alt);
                            std::mem::swap(&mut self.h, &mut self.h_alt);
                            std::mem::swap(&mut self.l, &mut self.l_alt);
                            4
                        }
                        2 => {
                            self.pc = self.hl();
                            4
                        }
                        _ => {
                            self.sp = self.hl();
                            6
                        }
                    }
                }
            }
            2 => {
                // JP cc,nn
                let nn = self.fetch16(bus);
                if self.condition(y) {
                    self.pc = nn;
                }
                10
            }
            3 => match y {
                0 => {
                    self.pc = self.fetch16(bus);
                    10
                }
                1 => self.execute_cb(bus),
                2 => {
                    // OUT (n),A
                    let n = self.fetch8(bus);
                    bus.out8(n, self.a);
                    11
                }
                3 => {
                    // IN A,(n)
                    let n = self.fetch8(bus);
                    self.a = bus.in8(n);
                    11
                }
                4 => {
                    // EX (SP),HL
                    let sp = self.sp;
                    let v = self.read16(bus, sp);
                    let hl = self.hl();
                    self.write16(bus, sp, hl);
                    self.set_hl(v);
                    19
                }
                5 => {
                    // EX DE,HL
                    std::mem::swap(&mut self.d, &mut self.h);
                    std::mem::swap(&mut self.e, &mut self.l);
                    4
                }
                6 => {
                    self.iff1 = false;
                    self.iff2 = false;
                    4
                }
                _ => {
                    self.ei_pending = true;
                    4
                }
            },
            4 => {
                // CALL cc,nn
                let nn = self.fetch16(bus);
                if self.condition(y) {
                    let pc = self.pc;
                    self.push16(bus, pc);
                    self.pc = nn;
                    17
                }
                else {
                    10
                }
            }
            5 => {
                if q == 0 {
                    // PUSH rp2
                    let v = self.rp2(p);
                    self.push16(bus, v);
                    11
                }
                else {
                    match p {
                        0 => {
                            let nn = self.fetch16(bus);
                            let pc = self.pc;
                            self.push16(bus, pc);
                            self.pc = nn;
                            17
                        }
                        1 => self.execute_indexed(bus, at, Index::Ix),
                        2 => self.execute_ed(bus, at),
                        _ => self.execute_indexed(bus, at, Index::Iy),
                    }
                }
            }
            6 => {
                // ALU A,n
                let n = self.fetch8(bus);
                self.alu_op(y, n);
                7
            }
            _ => {
                // RST
                let pc = self.pc;
                self.push16(bus, pc);
                self.pc = u16::from(y) * 8;
                11
            }
        }
    }

    fn execute_cb(&mut self, bus: &mut impl Bus) -> u32 {
        self.bump_r();
        let opcode = self.fetch8(bus);
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;

        match x {
            0 => {
                let v = self.get_r(bus, z, Index::None);
                let (r, f) = self.rotate_op(y, v);
                self.set_r(bus, z, Index::None, r);
                self.f = f;
                if z == 6 { 15 } else { 8 }
            }
            1 => {
                // BIT y,r
                let v = self.get_r(bus, z, Index::None);
                self.bit_flags(y, v);
                if z == 6 { 12 } else { 8 }
            }
            2 => {
                let v = self.get_r(bus, z, Index::None) & !(1 << y);
                self.set_r(bus, z, Index::None, v);
                if z == 6 { 15 } else { 8 }
            }
            _ => {
                let v = self.get_r(bus, z, Index::None) | (1 << y);
                self.set_r(bus, z, Index::None, v);
                if z == 6 { 15 } else { 8 }
            }
        }
    }

    fn execute_ed(&mut self, bus: &mut impl Bus, at: u16) -> u32 {
        self.bump_r();
        let opcode = self.fetch8(bus);
        let y = (opcode >> 3) & 7;
        let p = y >> 1;
        let q = y & 1;

        match opcode {
            // IN r,(C) / IN (C)
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let v = bus.in8(self.c);
                if y != 6 {
                    self.set_r(bus, y, Index::None, v);
                }
                self.f = (self.f & FLAG_C) | alu::sz53(v) | alu::parity(v);
                12
            }
            // OUT (C),r / OUT (C),0
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let v = if y == 6 { 0 } else { self.get_r(bus, y, Index::None) };
                bus.out8(self.c, v);
                12
            }
            // SBC HL,rp / ADC HL,rp
            0x42 | 0x52 | 0x62 | 0x72 | 0x4A | 0x5A | 0x6A | 0x7A => {
                let carry = self.f & FLAG_C != 0;
                let (r, f) = if q == 0 {
                    alu::sbc16(self.hl(), self.rp(p), carry)
                }
                else {
                    alu::adc16(self.hl(), self.rp(p), carry)
                };
                self.set_hl(r);
                self.f = f;
                15
            }
            // LD (nn),rp / LD rp,(nn)
            0x43 | 0x53 | 0x63 | 0x73 | 0x4B | 0x5B | 0x6B | 0x7B => {
                let nn = self.fetch16(bus);
                if q == 0 {
                    let v = self.rp(p);
                    self.write16(bus, nn, v);
                }
                else {
                    let v = self.read16(bus, nn);
                    self.set_rp(p, v);
                }
                20
            }
            // NEG (and mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let (r, f) = alu::sub8(0, self.a, false);
                self.a = r;
                self.f = f;
                8
            }
            // RETN / RETI
            0x45 | 0x55 | 0x65 | 0x75 | 0x4D | 0x5D | 0x6D | 0x7D => {
                self.iff1 = self.iff2;
                self.pc = self.pop16(bus);
                14
            }
            // IM 0/1/2
            0x46 | 0x4E | 0x66 | 0x6E => {
                self.im = 0;
                8
            }
            0x56 | 0x76 => {
                self.im = 1;
                8
            }
            0x5E | 0x7E => {
                self.im = 2;
                8
            }
            0x47 => {
                self.i = self.a;
                9
            }
            0x4F => {
                self.r = self.a;
                9
            }
            0x57 => {
                self.a = self.i;
                self.ir_flags();
                9
            }
            0x5F => {
                self.a = self.r;
                self.ir_flags();
                9
            }
            0x67 => {
                // RRD
                let addr = self.hl();
                let m = bus.read8(addr);
                let new_m = (self.a << 4) | (m >> 4);
                self.a = (self.a & 0xF0) | (m & 0x0F);
                bus.write8(addr, new_m);
                self.f = (self.f & FLAG_C) | alu::sz53(self.a) | alu::parity(self.a);
                18
            }
            0x6F => {
                // RLD
                let addr = self.hl();
                let m = bus.read8(addr);
                let new_m = (m << 4) | (self.a & 0x0F);
                self.a = (self.a & 0xF0) | (m >> 4);
                bus.write8(addr, new_m);
                self.f = (self.f & FLAG_C) | alu::sz53(self.a) | alu::parity(self.a);
                18
            }
            0xA0 => self.block_ld(bus, 1, false),
            0xA8 => self.block_ld(bus, -1, false),
            0xB0 => self.block_ld(bus, 1, true),
            0xB8 => self.block_ld(bus, -1, true),
            0xA1 => self.block_cp(bus, 1, false),
            0xA9 => self.block_cp(bus, -1, false),
            0xB1 => self.block_cp(bus, 1, true),
            0xB9 => self.block_cp(bus, -1, true),
            0xA2 => self.block_in(bus, 1, false),
            0xAA => self.block_in(bus, -1, false),
            0xB2 => self.block_in(bus, 1, true),
            0xBA => self.block_in(bus, -1, true),
            0xA3 => self.block_out(bus, 1, false),
            0xAB => self.block_out(bus, -1, false),
            0xB3 => self.block_out(bus, 1, true),
            0xBB => self.block_out(bus, -1, true),
            _ => self.undefined("ED ", opcode, at),
        }
    }

    fn block_ld(&mut self, bus: &mut impl Bus, dir: i16, repeat: bool) -> u32 {
        let v = bus.read8(self.hl());
        bus.write8(self.de(), v);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.set_de(self.de().wrapping_add_signed(dir));
        self.set_bc(self.bc().wrapping_sub(1));

        let n = v.wrapping_add(self.a);
        let mut f = self.f & (FLAG_S | FLAG_Z | FLAG_C);
        if n & 0x02 != 0 {
            f |= FLAG_Y;
        }
        f |= n & FLAG_X;
        if self.bc() != 0 {
            f |= FLAG_PV;
        }
        self.f = f;

        if repeat && self.bc() != 0 {
            self.pc = self.pc.wrapping_sub(2);
            21
        }
        else {
            16
        }
    }

    fn block_cp(&mut self, bus: &mut impl Bus, dir: i16, repeat: bool) -> u32 {
        let v = bus.read8(self.hl());
        let (_, cf) = alu::sub8(self.a, v, false);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.set_bc(self.bc().wrapping_sub(1));

        let mut f = (cf & (FLAG_S | FLAG_Z | FLAG_H)) | FLAG_N | (self.f & FLAG_C);
        if self.bc() != 0 {
            f |= FLAG_PV;
        }
        self.f = f;

        if repeat && self.bc() != 0 && f & FLAG_Z == 0 {
            self.pc = self.pc.wrapping_sub(2);
            21
        }
        else {
            16
        }
    }

    fn block_in(&mut self, bus: &mut impl Bus, dir: i16, repeat: bool) -> u32 {
        let v = bus.in8(self.c);
        bus.write8(self.hl(), v);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.b = self.b.wrapping_sub(1);
        self.f = alu::sz53(self.b) | FLAG_N;

        if repeat && self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
            21
        }
        else {
            16
        }
    }

    fn block_out(&mut self, bus: &mut impl Bus, dir: i16, repeat: bool) -> u32 {
        let v = bus.read8(self.hl());
        self.b = self.b.wrapping_sub(1);
        bus.out8(self.c, v);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.f = alu::sz53(self.b) | FLAG_N;

        if repeat && self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
            21
        }
        else {
            16
        }
    }

    fn execute_indexed(&mut self, bus: &mut impl Bus, at: u16, index: Index) -> u32 {
        self.bump_r();
        let opcode = self.fetch8(bus);
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;
        let p = y >> 1;

        match opcode {
            0x21 => {
                let nn = self.fetch16(bus);
                self.set_ii(index, nn);
                14
            }
            0x22 => {
                let nn = self.fetch16(bus);
                let v = self.ii(index);
                self.write16(bus, nn, v);
                20
            }
            0x2A => {
                let nn = self.fetch16(bus);
                let v = self.read16(bus, nn);
                self.set_ii(index, v);
                20
            }
            0x23 => {
                self.set_ii(index, self.ii(index).wrapping_add(1));
                10
            }
            0x2B => {
                self.set_ii(index, self.ii(index).wrapping_sub(1));
                10
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                // ADD ii,rp with ii standing in for HL.
                let rhs = match p {
                    0 => self.bc(),
                    1 => self.de(),
                    2 => self.ii(index),
                    _ => self.sp,
                };
                let (r, f) = alu::add16(self.ii(index), rhs, self.f);
                self.set_ii(index, r);
                self.f = f;
                15
            }
            0x34 | 0x35 => {
                // INC/DEC (ii+d)
                let addr = self.indexed_addr(bus, index);
                let v = bus.read8(addr);
                let (r, f) = if opcode == 0x34 { alu::inc8(v) } else { alu::dec8(v) };
                bus.write8(addr, r);
                self.f = f | (self.f & FLAG_C);
                23
            }
            0x36 => {
                // LD (ii+d),n
                let addr = self.indexed_addr(bus, index);
                let n = self.fetch8(bus);
                bus.write8(addr, n);
                19
            }
            0xE1 => {
                let v = self.pop16(bus);
                self.set_ii(index, v);
                14
            }
            0xE5 => {
                let v = self.ii(index);
                self.push16(bus, v);
                15
            }
            0xE3 => {
                let sp = self.sp;
                let v = self.read16(bus, sp);
                let ii = self.ii(index);
                self.write16(bus, sp, ii);
                self.set_ii(index, v);
                23
            }
            0xE9 => {
                self.pc = self.ii(index);
                8
            }
            0xF9 => {
                self.sp = self.ii(index);
                10
            }
            0xCB => self.execute_indexed_cb(bus, index),
            _ if x == 1 && opcode != 0x76 => {
                // LD with one (ii+d) side, or IXH/IXL substitution.
                if y == 6 {
                    let addr = self.indexed_addr(bus, index);
                    let v = self.get_r(bus, z, Index::None);
                    bus.write8(addr, v);
                    19
                }
                else if z == 6 {
                    let addr = self.indexed_addr(bus, index);
                    let v = bus.read8(addr);
                    self.set_r(bus, y, Index::None, v);
                    19
                }
                else {
                    let v = self.get_r(bus, z, index);
                    self.set_r(bus, y, index, v);
                    8
                }
            }
            _ if x == 2 => {
                if z == 6 {
                    let addr = self.indexed_addr(bus, index);
                    let v = bus.read8(addr);
                    self.alu_op(y, v);
                    19
                }
                else {
                    let v = self.get_r(bus, z, index);
                    self.alu_op(y, v);
                    8
                }
            }
            _ if x == 0 && z == 4 && (y == 4 || y == 5) => {
                // INC IXH/IXL
                let v = self.get_r(bus, y, index);
                let (r, f) = alu::inc8(v);
                self.set_r(bus, y, index, r);
                self.f = f | (self.f & FLAG_C);
                8
            }
            _ if x == 0 && z == 5 && (y == 4 || y == 5) => {
                let v = self.get_r(bus, y, index);
                let (r, f) = alu::dec8(v);
                self.set_r(bus, y, index, r);
                self.f = f | (self.f & FLAG_C);
                8
            }
            _ if x == 0 && z == 6 && (y == 4 || y == 5) => {
                // LD IXH/IXL,n
                let n = self.fetch8(bus);
                self.set_r(bus, y, index, n);
                11
            }
            _ => {
                // The prefix had no effect on this opcode; run it plain.
                4 + self.execute_main(bus, opcode, at)
            }
        }
    }

    fn execute_indexed_cb(&mut self, bus: &mut impl Bus, index: Index) -> u32 {
        // DD CB d op: displacement precedes the opcode byte.
        let d = self.fetch8(bus) as i8;
        let opcode = self.fetch8(bus);
        let addr = self.ii(index).wrapping_add_signed(i16::from(d));
        let x = opcode >> 6;
        let y = (opcode >> 3) & 7;
        let z = opcode & 7;

        let v = bus.read8(addr);
        match x {
            0 => {
                let (r, f) = self.rotate_op(y, v);
                bus.write8(addr, r);
                self.f = f;
                if z != 6 {
                    // Undocumented result copy into the register file.
                    self.set_r(bus, z, Index::None, r);
                }
                23
            }
            1 => {
                self.bit_flags(y, v);
                20
            }
            2 => {
                let r = v & !(1 << y);
                bus.write8(addr, r);
                if z != 6 {
                    self.set_r(bus, z, Index::None, r);
                }
                23
            }
            _ => {
                let r = v | (1 << y);
                bus.write8(addr, r);
                if z != 6 {
                    self.set_r(bus, z, Index::None, r);
                }
                23
            }
        }
    }

    fn indexed_addr(&mut self, bus: &mut impl Bus, index: Index) -> u16 {
        let d = self.fetch8(bus) as i8;
        self.ii(index).wrapping_add_signed(i16::from(d))
    }

    fn ii(&self, index: Index) -> u16 {
        match index {
            Index::Ix => self.ix,
            Index::Iy => self.iy,
            Index::None => self.hl(),
        }
    }

    fn set_ii(&mut self, index: Index, v: u16) {
        match index {
            Index::Ix => self.ix = v,
            Index::Iy => self.iy = v,
            Index::None => self.set_hl(v),
        }
    }

    /// Register read by decode field; H/L substitute the index halves
    /// under a DD/FD prefix.
    fn get_r(&mut self, bus: &mut impl Bus, idx: u8, index: Index) -> u8 {
        match (idx, index) {
            (0, _) => self.b,
            (1, _) => self.c,
            (2, _) => self.d,
            (3, _) => self.e,
            (4, Index::None) => self.h,
            (5, Index::None) => self.l,
            (4, Index::Ix) => (self.ix >> 8) as u8,
            (5, Index::Ix) => self.ix as u8,
            (4, Index::Iy) => (self.iy >> 8) as u8,
            (5, Index::Iy) => self.iy as u8,
            (6, _) => bus.read8(self.hl()),
            _ => self.a,
        }
    }

    fn set_r(&mut self, bus: &mut impl Bus, idx: u8, index: Index, v: u8) {
        match (idx, index) {
            (0, _) => self.b = v,
            (1, _) => self.c = v,
            (2, _) => self.d = v,
            (3, _) => self.e = v,
            (4, Index::None) => self.h = v,
            (5, Index::None) => self.l = v,
            (4, Index::Ix) => self.ix = (self.ix & 0x00FF) | (u16::from(v) << 8),
            (5, Index::Ix) => self.ix = (self.ix & 0xFF00) | u16::from(v),
            (4, Index::Iy) => self.iy = (self.iy & 0x00FF) | (u16::from(v) << 8),
            (5, Index::Iy) => self.iy = (self.iy & 0xFF00) | u16::from(v),
            (6, _) => bus.write8(self.hl(), v),
            _ => self.a = v,
        }
    }

    fn rp(&self, p: u8) -> u16 {
        match p {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    fn set_rp(&mut self, p: u8, v: u16) {
        match p {
            0 => self.set_bc(v),
            1 => self.set_de(v),
            2 => self.set_hl(v),
            _ => self.sp = v,
        }
    }

    fn rp2(&self, p: u8) -> u16 {
        match p {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.af(),
        }
    }

    fn set_rp2(&mut self, p: u8, v: u16) {
        match p {
            0 => self.set_bc(v),
            1 => self.set_de(v),
            2 => self.set_hl(v),
            _ => self.set_af(v),
        }
    }

    fn condition(&self, cc: u8) -> bool {
        match cc {
            0 => self.f & FLAG_Z == 0,
            1 => self.f & FLAG_Z != 0,
            2 => self.f & FLAG_C == 0,
            3 => self.f & FLAG_C != 0,
            4 => self.f & FLAG_PV == 0,
            5 => self.f & FLAG_PV != 0,
            6 => self.f & FLAG_S == 0,
            _ => self.f & FLAG_S != 0,
        }
    }

    fn alu_op(&mut self, op: u8, v: u8) {
        let carry = self.f & FLAG_C != 0;
        match op {
            0 => {
                let (r, f) = alu::add8(self.a, v, false);
                self.a = r;
                self.f = f;
            }
            1 => {
                let (r, f) = alu::add8(self.a, v, carry);
                self.a = r;
                self.f = f;
            }
            2 => {
                let (r, f) = alu::sub8(self.a, v, false);
                self.a = r;
                self.f = f;
            }
            3 => {
                let (r, f) = alu::sub8(self.a, v, carry);
                self.a = r;
                self.f = f;
            }
            4 => {
                let (r, f) = alu::and8(self.a, v);
                self.a = r;
                self.f = f;
            }
            5 => {
                let (r, f) = alu::xor8(self.a, v);
                self.a = r;
                self.f = f;
            }
            6 => {
                let (r, f) = alu::or8(self.a, v);
                self.a = r;
                self.f = f;
            }
            _ => {
                // CP: flags only, copy bits from the operand.
                let (_, f) = alu::sub8(self.a, v, false);
                self.f = (f & !(FLAG_Y | FLAG_X)) | (v & (FLAG_Y | FLAG_X));
            }
        }
    }

    fn rotate_op(&mut self, op: u8, v: u8) -> (u8, u8) {
        let carry = self.f & FLAG_C != 0;
        match op {
            0 => alu::rlc(v),
            1 => alu::rrc(v),
            2 => alu::rl(v, carry),
            3 => alu::rr(v, carry),
            4 => alu::sla(v),
            5 => alu::sra(v),
            6 => alu::sll(v),
            _ => alu::srl(v),
        }
    }

    fn bit_flags(&mut self, bit: u8, v: u8) {
        let tested = v & (1 << bit);
        let mut f = (self.f & FLAG_C) | FLAG_H;
        if tested == 0 {
            f |= FLAG_Z | FLAG_PV;
        }
        if tested & 0x80 != 0 {
            f |= FLAG_S;
        }
        f |= v & (FLAG_Y | FLAG_X);
        self.f = f;
    }

    fn ir_flags(&mut self) {
        let mut f = (self.f & FLAG_C) | alu::sz53(self.a);
        if self.iff2 {
            f |= FLAG_PV;
        }
        self.f = f;
    }
}
