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

//! Z80 CPU.
//!
//! Executes the documented instruction set against the four-operation
//! [`Bus`] trait. Undefined opcodes obey the machine's strict/lenient
//! policy: strict halts the CPU and records a diagnostic, lenient runs
//! them as NOP. Interrupt modes 0 and 1 vector to 0038h, mode 2 fetches
//! the vector through the I register.

mod alu;
mod execute;

/// CPU-facing bus: one memory or I/O access per call, in issue order.
pub trait Bus {
    fn read8(&mut self, addr: u16) -> u8;
    fn write8(&mut self, addr: u16, data: u8);
    fn in8(&mut self, port: u8) -> u8;
    fn out8(&mut self, port: u8, data: u8);
}

// Flag register bits.
pub const FLAG_S: u8 = 0x80;
pub const FLAG_Z: u8 = 0x40;
pub const FLAG_Y: u8 = 0x20; // undocumented copy of result bit 5
pub const FLAG_H: u8 = 0x10;
pub const FLAG_X: u8 = 0x08; // undocumented copy of result bit 3
pub const FLAG_PV: u8 = 0x04;
pub const FLAG_N: u8 = 0x02;
pub const FLAG_C: u8 = 0x01;

/// Register and interrupt state exposed to the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct CpuState {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
    /// Elapsed T-states since cold reset; maintained by the machine.
    pub t_states: u64,
}

pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,

    pub halted: bool,
    /// Maskable interrupt request line.
    pub irq: bool,
    /// EI enables interrupts after the following instruction.
    ei_pending: bool,

    /// Strict mode: undefined opcodes fault instead of running as NOP.
    strict: bool,
    /// Diagnostic from the most recent strict-mode fault.
    pub fault: Option<String>,
}

impl Cpu {
    pub fn new(strict: bool) -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            a_alt: 0,
            f_alt: 0,
            b_alt: 0,
            c_alt: 0,
            d_alt: 0,
            e_alt: 0,
            h_alt: 0,
            l_alt: 0,
            ix: 0,
            iy: 0,
            sp: 0xFFFF,
            pc: 0,
            i: 0,
            r: 0,
            iff1: false,
            iff2: false,
            im: 0,
            halted: false,
            irq: false,
            ei_pending: false,
            strict,
            fault: None,
        }
    }

    pub fn reset(&mut self) {
        let strict = self.strict;
        *self = Self::new(strict);
    }

    pub fn state(&self) -> CpuState {
        CpuState {
            a: self.a,
            f: self.f,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            h: self.h,
            l: self.l,
            a_alt: self.a_alt,
            f_alt: self.f_alt,
            b_alt: self.b_alt,
            c_alt: self.c_alt,
            d_alt: self.d_alt,
            e_alt: self.e_alt,
            h_alt: self.h_alt,
            l_alt: self.l_alt,
            ix: self.ix,
            iy: self.iy,
            sp: self.sp,
            pc: self.pc,
            i: self.i,
            r: self.r,
            iff1: self.iff1,
            iff2: self.iff2,
            im: self.im,
            halted: self.halted,
            t_states: 0,
        }
    }

    pub fn restore(&mut self, state: &CpuState) {
        self.a = state.a;
        self.f = state.f;
        self.b = state.b;
        self.c = state.c;
        self.d = state.d;
        self.e = state.e;
        self.h = state.h;
        self.l = state.l;
        self.a_alt = state.a_alt;
        self.f_alt = state.f_alt;
        self.b_alt = state.b_alt;
        self.c_alt = state.c_alt;
        self.d_alt = state.d_alt;
        self.e_alt = state.e_alt;
        self.h_alt = state.h_alt;
        self.l_alt = state.l_alt;
        self.ix = state.ix;
        self.iy = state.iy;
        self.sp = state.sp;
        self.pc = state.pc;
        self.i = state.i;
        self.r = state.r;
        self.iff1 = state.iff1;
        self.iff2 = state.iff2;
        self.im = state.im;
        self.halted = state.halted;
        self.irq = false;
        self.ei_pending = false;
        self.fault = None;
    }

    // 16-bit register pair accessors.

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    #[inline]
    pub fn set_bc(&mut self, v: u16) {
        [self.b, self.c] = v.to_be_bytes();
    }

    #[inline]
    pub fn set_de(&mut self, v: u16) {
        [self.d, self.e] = v.to_be_bytes();
    }

    #[inline]
    pub fn set_hl(&mut self, v: u16) {
        [self.h, self.l] = v.to_be_bytes();
    }

    #[inline]
    pub fn set_af(&mut self, v: u16) {
        [self.a, self.f] = v.to_be_bytes();
    }

    #[inline]
    fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    /// Execute one instruction (or service one interrupt / halted cycle).
    /// Returns the T-states consumed.
    pub fn step(&mut self, bus: &mut impl Bus) -> u32 {
        // EI takes effect after the instruction that follows it.
        let enable_after = self.ei_pending;

        if self.irq && self.iff1 && !enable_after {
            return self.accept_interrupt(bus);
        }

        if self.halted {
            // HALT executes NOPs until an interrupt or reset.
            self.bump_r();
            return 4;
        }

        let cycles = self.execute_next(bus);

        if enable_after {
            self.iff1 = true;
            self.iff2 = true;
            self.ei_pending = false;
        }
        cycles
    }

    fn accept_interrupt(&mut self, bus: &mut impl Bus) -> u32 {
        self.halted = false;
        self.iff1 = false;
        self.iff2 = false;
        self.bump_r();
        let pc = self.pc;
        self.push16(bus, pc);
        match self.im {
            2 => {
                // Vector table entry through I; the bus supplies no vector
                // byte, the line floats high.
                let ptr = (u16::from(self.i) << 8) | 0x00FF;
                let lo = bus.read8(ptr);
                let hi = bus.read8(ptr.wrapping_add(1));
                self.pc = u16::from_le_bytes([lo, hi]);
                19
            }
            _ => {
                self.pc = 0x0038;
                13
            }
        }
    }

    #[inline]
    fn bump_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    fn fetch8(&mut self, bus: &mut impl Bus) -> u8 {
        let byte = bus.read8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn read16(&mut self, bus: &mut impl Bus, addr: u16) -> u16 {
        let lo = bus.read8(addr);
        let hi = bus.read8(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write16(&mut self, bus: &mut impl Bus, addr: u16, v: u16) {
        let [lo, hi] = v.to_le_bytes();
        bus.write8(addr, lo);
        bus.write8(addr.wrapping_add(1), hi);
    }

    fn push16(&mut self, bus: &mut impl Bus, v: u16) {
        let [lo, hi] = v.to_le_bytes();
        self.sp = self.sp.wrapping_sub(1);
        bus.write8(self.sp, hi);
        self.sp = self.sp.wrapping_sub(1);
        bus.write8(self.sp, lo);
    }

    fn pop16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = bus.read8(self.sp);
        self.sp = self.sp.wrapping_add(1);
        let hi = bus.read8(self.sp);
        self.sp = self.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    /// Strict-mode policy for an undefined opcode.
    fn undefined(&mut self, prefix: &str, opcode: u8, at: u16) -> u32 {
        if self.strict {
            self.halted = true;
            let diag = format!("unsupported opcode {prefix}{opcode:02X} at {at:04X}h");
            log::warn!("CPU fault: {diag}");
            self.fault = Some(diag);
        }
        else {
            log::debug!("lenient NOP for opcode {prefix}{opcode:02X} at {at:04X}h");
        }
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) struct TestBus {
        pub mem: Vec<u8>,
        pub io: [u8; 256],
        pub out_log: Vec<(u8, u8)>,
    }

    impl TestBus {
        pub fn new(program: &[u8]) -> Self {
            let mut mem = vec![0u8; 0x10000];
            mem[..program.len()].copy_from_slice(program);
            Self {
                mem,
                io: [0; 256],
                out_log: Vec::new(),
            }
        }
    }

    impl Bus for TestBus {
        fn read8(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }
        fn write8(&mut self, addr: u16, data: u8) {
            self.mem[addr as usize] = data;
        }
        fn in8(&mut self, port: u8) -> u8 {
            self.io[port as usize]
        }
        fn out8(&mut self, port: u8, data: u8) {
            self.out_log.push((port, data));
        }
    }

    fn run(program: &[u8], steps: usize) -> (Cpu, TestBus) {
        let mut cpu = Cpu::new(true);
        let mut bus = TestBus::new(program);
        for _ in 0..steps {
            cpu.step(&mut bus);
        }
        (cpu, bus)
    }

    #[test]
    fn ld_a_immediate_and_store() {
        // LD A,01h; LD (1000h),A
        let (cpu, bus) = run(&[0x3E, 0x01, 0x32, 0x00, 0x10], 2);
        assert_eq!(cpu.a, 0x01);
        assert_eq!(bus.mem[0x1000], 0x01);
    }

    #[test]
    fn jp_loops() {
        // JP 0000h
        let (cpu, _) = run(&[0xC3, 0x00, 0x00], 3);
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn add_sets_flags() {
        // LD A,0FFh; ADD A,1
        let (cpu, _) = run(&[0x3E, 0xFF, 0xC6, 0x01], 2);
        assert_eq!(cpu.a, 0);
        assert!(cpu.flag(FLAG_Z));
        assert!(cpu.flag(FLAG_C));
        assert!(cpu.flag(FLAG_H));
        assert!(!cpu.flag(FLAG_N));
    }

    #[test]
    fn sub_sets_sign_and_n() {
        // LD A,00h; SUB 1
        let (cpu, _) = run(&[0x3E, 0x00, 0xD6, 0x01], 2);
        assert_eq!(cpu.a, 0xFF);
        assert!(cpu.flag(FLAG_S));
        assert!(cpu.flag(FLAG_N));
        assert!(cpu.flag(FLAG_C));
    }

    #[test]
    fn inc_preserves_carry() {
        // SCF; INC A
        let (cpu, _) = run(&[0x37, 0x3C], 2);
        assert_eq!(cpu.a, 1);
        assert!(cpu.flag(FLAG_C));
    }

    #[test]
    fn push_pop_round_trip() {
        // LD BC,1234h; PUSH BC; POP DE
        let (cpu, _) = run(&[0x01, 0x34, 0x12, 0xC5, 0xD1], 3);
        assert_eq!(cpu.de(), 0x1234);
    }

    #[test]
    fn call_and_ret() {
        // CALL 0005h; HALT; NOP; RET
        let program = [0xCD, 0x05, 0x00, 0x76, 0x00, 0xC9];
        let (cpu, _) = run(&program, 2);
        assert_eq!(cpu.pc, 0x0003); // returned to the HALT
    }

    #[test]
    fn djnz_counts_down() {
        // LD B,3; DJNZ -2 (self)
        let mut cpu = Cpu::new(true);
        let mut bus = TestBus::new(&[0x06, 0x03, 0x10, 0xFE, 0x76]);
        cpu.step(&mut bus); // LD B,3
        for _ in 0..3 {
            cpu.step(&mut bus);
        }
        assert_eq!(cpu.b, 0);
        assert_eq!(cpu.pc, 0x0004);
    }

    #[test]
    fn jr_conditional_taken_and_not() {
        // LD A,0; OR A; JR Z,+1; HALT; LD A,7
        let (cpu, _) = run(&[0x3E, 0x00, 0xB7, 0x28, 0x01, 0x76, 0x3E, 0x07], 4);
        assert_eq!(cpu.a, 0x07);
    }

    #[test]
    fn ex_and_exx() {
        // LD HL,1111h; EX DE,HL; EXX; LD HL,2222h; EXX
        let (cpu, _) = run(&[0x21, 0x11, 0x11, 0xEB, 0xD9, 0x21, 0x22, 0x22, 0xD9], 5);
        assert_eq!(cpu.de(), 0x1111);
        assert_eq!(cpu.h_alt, 0x22);
    }

    #[test]
    fn out_reaches_bus() {
        // LD A,5Ah; OUT (40h),A
        let (_, bus) = run(&[0x3E, 0x5A, 0xD3, 0x40], 2);
        assert_eq!(bus.out_log, vec![(0x40, 0x5A)]);
    }

    #[test]
    fn in_reads_bus() {
        let mut cpu = Cpu::new(true);
        let mut bus = TestBus::new(&[0xDB, 0x12]);
        bus.io[0x12] = 0x99;
        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x99);
    }

    #[test]
    fn cb_bit_and_set() {
        // LD A,00h; SET 3,A; BIT 3,A
        let (cpu, _) = run(&[0x3E, 0x00, 0xCB, 0xDF, 0xCB, 0x5F], 3);
        assert_eq!(cpu.a, 0x08);
        assert!(!cpu.flag(FLAG_Z));
    }

    #[test]
    fn indexed_load_store() {
        // LD IX,2000h; LD (IX+5),42h; LD B,(IX+5)
        let program = [0xDD, 0x21, 0x00, 0x20, 0xDD, 0x36, 0x05, 0x42, 0xDD, 0x46, 0x05];
        let (cpu, bus) = run(&program, 3);
        assert_eq!(bus.mem[0x2005], 0x42);
        assert_eq!(cpu.b, 0x42);
    }

    #[test]
    fn ldir_copies_block() {
        // LD HL,0010h; LD DE,0020h; LD BC,3; LDIR
        let mut program = vec![0x21, 0x10, 0x00, 0x11, 0x20, 0x00, 0x01, 0x03, 0x00, 0xED, 0xB0];
        program.resize(0x30, 0);
        program[0x10..0x13].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
        let (cpu, bus) = run(&program, 6);
        assert_eq!(&bus.mem[0x20..0x23], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(cpu.bc(), 0);
    }

    #[test]
    fn strict_mode_faults_on_undefined() {
        // ED 00 is undefined.
        let (cpu, _) = run(&[0xED, 0x00], 1);
        assert!(cpu.halted);
        assert!(cpu.fault.is_some());
    }

    #[test]
    fn lenient_mode_nops_undefined() {
        let mut cpu = Cpu::new(false);
        let mut bus = TestBus::new(&[0xED, 0x00, 0x3E, 0x07]);
        cpu.step(&mut bus);
        assert!(!cpu.halted);
        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0x07);
    }

    #[test]
    fn im1_interrupt_vectors_to_38h() {
        // EI; IM 1; HALT
        let mut cpu = Cpu::new(true);
        let mut bus = TestBus::new(&[0xFB, 0xED, 0x56, 0x76]);
        for _ in 0..3 {
            cpu.step(&mut bus);
        }
        assert!(cpu.halted);
        cpu.irq = true;
        cpu.step(&mut bus);
        assert_eq!(cpu.pc, 0x0038);
        assert!(!cpu.halted);
        assert!(!cpu.iff1);
    }

    #[test]
    fn daa_after_add() {
        // LD A,15h; ADD A,27h; DAA  → 42 BCD
        let (cpu, _) = run(&[0x3E, 0x15, 0xC6, 0x27, 0x27], 3);
        assert_eq!(cpu.a, 0x42);
    }

    #[test]
    fn rotate_accumulator() {
        // LD A,81h; RLCA
        let (cpu, _) = run(&[0x3E, 0x81, 0x07], 2);
        assert_eq!(cpu.a, 0x03);
        assert!(cpu.flag(FLAG_C));
    }
}
