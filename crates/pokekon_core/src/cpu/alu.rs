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

//! 8/16-bit arithmetic with Z80 flag semantics.

use super::{FLAG_C, FLAG_H, FLAG_N, FLAG_PV, FLAG_S, FLAG_X, FLAG_Y, FLAG_Z};

/// Even parity → PV set.
#[inline]
pub fn parity(v: u8) -> u8 {
    if v.count_ones() % 2 == 0 {
        FLAG_PV
    }
    else {
        0
    }
}

/// Sign, zero and the two result-copy bits.
#[inline]
pub fn sz53(v: u8) -> u8 {
    let mut f = v & (FLAG_S | FLAG_Y | FLAG_X);
    if v == 0 {
        f |= FLAG_Z;
    }
    f
}

pub fn add8(a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let c = u8::from(carry_in);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let result = wide as u8;
    let mut f = sz53(result);
    if wide > 0xFF {
        f |= FLAG_C;
    }
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        f |= FLAG_H;
    }
    // Overflow: operands agree in sign, result disagrees.
    if (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0 {
        f |= FLAG_PV;
    }
    (result, f)
}

pub fn sub8(a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let c = u8::from(carry_in);
    let wide = i32::from(a) - i32::from(b) - i32::from(c);
    let result = wide as u8;
    let mut f = sz53(result) | FLAG_N;
    if wide < 0 {
        f |= FLAG_C;
    }
    if (a & 0x0F) as i32 - (b & 0x0F) as i32 - i32::from(c) < 0 {
        f |= FLAG_H;
    }
    if (a ^ b) & 0x80 != 0 && (a ^ result) & 0x80 != 0 {
        f |= FLAG_PV;
    }
    (result, f)
}

pub fn and8(a: u8, b: u8) -> (u8, u8) {
    let result = a & b;
    (result, sz53(result) | FLAG_H | parity(result))
}

pub fn or8(a: u8, b: u8) -> (u8, u8) {
    let result = a | b;
    (result, sz53(result) | parity(result))
}

pub fn xor8(a: u8, b: u8) -> (u8, u8) {
    let result = a ^ b;
    (result, sz53(result) | parity(result))
}

/// INC r: carry is preserved by the caller.
pub fn inc8(v: u8) -> (u8, u8) {
    let result = v.wrapping_add(1);
    let mut f = sz53(result);
    if v & 0x0F == 0x0F {
        f |= FLAG_H;
    }
    if v == 0x7F {
        f |= FLAG_PV;
    }
    (result, f)
}

/// DEC r: carry is preserved by the caller.
pub fn dec8(v: u8) -> (u8, u8) {
    let result = v.wrapping_sub(1);
    let mut f = sz53(result) | FLAG_N;
    if v & 0x0F == 0 {
        f |= FLAG_H;
    }
    if v == 0x80 {
        f |= FLAG_PV;
    }
    (result, f)
}

/// ADD HL,dd: only H, N, C (and the copy bits) are affected.
pub fn add16(a: u16, b: u16, f_in: u8) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let result = wide as u16;
    let mut f = f_in & (FLAG_S | FLAG_Z | FLAG_PV);
    f |= ((result >> 8) as u8) & (FLAG_Y | FLAG_X);
    if wide > 0xFFFF {
        f |= FLAG_C;
    }
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        f |= FLAG_H;
    }
    (result, f)
}

pub fn adc16(a: u16, b: u16, carry_in: bool) -> (u16, u8) {
    let c = u16::from(carry_in);
    let wide = u32::from(a) + u32::from(b) + u32::from(c);
    let result = wide as u16;
    let mut f = ((result >> 8) as u8) & (FLAG_S | FLAG_Y | FLAG_X);
    if result == 0 {
        f |= FLAG_Z;
    }
    if wide > 0xFFFF {
        f |= FLAG_C;
    }
    if (a & 0x0FFF) + (b & 0x0FFF) + c > 0x0FFF {
        f |= FLAG_H;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0 {
        f |= FLAG_PV;
    }
    (result, f)
}

pub fn sbc16(a: u16, b: u16, carry_in: bool) -> (u16, u8) {
    let c = u32::from(carry_in);
    let wide = i64::from(a) - i64::from(b) - i64::from(c);
    let result = wide as u16;
    let mut f = (((result >> 8) as u8) & (FLAG_S | FLAG_Y | FLAG_X)) | FLAG_N;
    if result == 0 {
        f |= FLAG_Z;
    }
    if wide < 0 {
        f |= FLAG_C;
    }
    if (a & 0x0FFF) as i64 - (b & 0x0FFF) as i64 - i64::from(c) < 0 {
        f |= FLAG_H;
    }
    if (a ^ b) & 0x8000 != 0 && (a ^ result) & 0x8000 != 0 {
        f |= FLAG_PV;
    }
    (result, f)
}

// Rotates and shifts (CB page and the RLD/RRD cores). All set S/Z/P and
// clear H/N; carry comes from the shifted-out bit.

fn rot_flags(result: u8, carry: bool) -> u8 {
    sz53(result) | parity(result) | if carry { FLAG_C } else { 0 }
}

pub fn rlc(v: u8) -> (u8, u8) {
    let result = v.rotate_left(1);
    (result, rot_flags(result, v & 0x80 != 0))
}

pub fn rrc(v: u8) -> (u8, u8) {
    let result = v.rotate_right(1);
    (result, rot_flags(result, v & 0x01 != 0))
}

pub fn rl(v: u8, carry_in: bool) -> (u8, u8) {
    let result = (v << 1) | u8::from(carry_in);
    (result, rot_flags(result, v & 0x80 != 0))
}

pub fn rr(v: u8, carry_in: bool) -> (u8, u8) {
    let result = (v >> 1) | (u8::from(carry_in) << 7);
    (result, rot_flags(result, v & 0x01 != 0))
}

pub fn sla(v: u8) -> (u8, u8) {
    let result = v << 1;
    (result, rot_flags(result, v & 0x80 != 0))
}

pub fn sra(v: u8) -> (u8, u8) {
    let result = (v >> 1) | (v & 0x80);
    (result, rot_flags(result, v & 0x01 != 0))
}

/// Undocumented SLL: shifts left, bit 0 set.
pub fn sll(v: u8) -> (u8, u8) {
    let result = (v << 1) | 1;
    (result, rot_flags(result, v & 0x80 != 0))
}

pub fn srl(v: u8) -> (u8, u8) {
    let result = v >> 1;
    (result, rot_flags(result, v & 0x01 != 0))
}

/// Decimal adjust after addition or subtraction.
pub fn daa(a: u8, f: u8) -> (u8, u8) {
    let mut correction = 0u8;
    let mut carry = f & FLAG_C != 0;

    if f & FLAG_H != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }

    let n = f & FLAG_N != 0;
    let result = if n {
        a.wrapping_sub(correction)
    }
    else {
        a.wrapping_add(correction)
    };

    let mut flags = sz53(result) | parity(result) | (f & FLAG_N);
    if carry {
        flags |= FLAG_C;
    }
    // Half carry reflects the nibble adjustment actually applied.
    let h = if n {
        f & FLAG_H != 0 && a & 0x0F < 6
    }
    else {
        a & 0x0F > 9
    };
    if h {
        flags |= FLAG_H;
    }
    (result, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carry_and_half() {
        let (r, f) = add8(0x0F, 0x01, false);
        assert_eq!(r, 0x10);
        assert_ne!(f & FLAG_H, 0);
        assert_eq!(f & FLAG_C, 0);

        let (r, f) = add8(0xFF, 0x01, false);
        assert_eq!(r, 0x00);
        assert_ne!(f & FLAG_Z, 0);
        assert_ne!(f & FLAG_C, 0);
    }

    #[test]
    fn add_overflow() {
        let (r, f) = add8(0x7F, 0x01, false);
        assert_eq!(r, 0x80);
        assert_ne!(f & FLAG_PV, 0);
        assert_ne!(f & FLAG_S, 0);
    }

    #[test]
    fn sub_borrow() {
        let (r, f) = sub8(0x00, 0x01, false);
        assert_eq!(r, 0xFF);
        assert_ne!(f & FLAG_C, 0);
        assert_ne!(f & FLAG_N, 0);
    }

    #[test]
    fn logic_parity() {
        let (_, f) = and8(0x0F, 0x03); // 0x03, two bits set → even
        assert_ne!(f & FLAG_PV, 0);
        let (_, f) = or8(0x01, 0x02); // 0x03 again
        assert_ne!(f & FLAG_PV, 0);
        let (_, f) = xor8(0x01, 0x00); // one bit → odd
        assert_eq!(f & FLAG_PV, 0);
    }

    #[test]
    fn inc_dec_edges() {
        let (r, f) = inc8(0x7F);
        assert_eq!(r, 0x80);
        assert_ne!(f & FLAG_PV, 0);
        let (r, f) = dec8(0x80);
        assert_eq!(r, 0x7F);
        assert_ne!(f & FLAG_PV, 0);
        let (r, f) = dec8(0x01);
        assert_eq!(r, 0x00);
        assert_ne!(f & FLAG_Z, 0);
    }

    #[test]
    fn sixteen_bit_carries() {
        let (r, f) = add16(0x0FFF, 0x0001, 0);
        assert_eq!(r, 0x1000);
        assert_ne!(f & FLAG_H, 0);
        let (r, f) = adc16(0xFFFF, 0x0000, true);
        assert_eq!(r, 0x0000);
        assert_ne!(f & FLAG_C, 0);
        assert_ne!(f & FLAG_Z, 0);
        let (r, f) = sbc16(0x0000, 0x0001, false);
        assert_eq!(r, 0xFFFF);
        assert_ne!(f & FLAG_C, 0);
    }

    #[test]
    fn rotates() {
        let (r, f) = rlc(0x80);
        assert_eq!(r, 0x01);
        assert_ne!(f & FLAG_C, 0);
        let (r, f) = rr(0x01, false);
        assert_eq!(r, 0x00);
        assert_ne!(f & FLAG_C, 0);
        let (r, _) = sra(0x82);
        assert_eq!(r, 0xC1);
        let (r, _) = srl(0x82);
        assert_eq!(r, 0x41);
    }

    #[test]
    fn daa_bcd_addition() {
        // 15 + 27 = 42 in BCD.
        let (sum, f) = add8(0x15, 0x27, false);
        let (adj, _) = daa(sum, f);
        assert_eq!(adj, 0x42);
        // 91 + 19 = 110 → 10 with carry.
        let (sum, f) = add8(0x91, 0x19, false);
        let (adj, f2) = daa(sum, f);
        assert_eq!(adj, 0x10);
        assert_ne!(f2 & FLAG_C, 0);
    }
}
