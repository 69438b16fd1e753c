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

//! System bus.
//!
//! The bus owns memory and every peripheral, and implements the four
//! CPU-facing operations: memory read/write with bank decode, and I/O
//! in/out dispatched through the [`crate::hardware_map`] port registry.
//! Each call performs exactly one underlying device access, so device
//! read counts track CPU bus cycles rather than host tick counts.
//!
//! Unknown ports read the hardware quiescent byte and swallow writes;
//! writes outside RAM are dropped silently.

use crate::cpu;
use crate::devices::keyboard::Keyboard;
use crate::devices::lcd::{CommandEffect, LcdController, Panel, Target};
use crate::hardware_map::{
    self, PortId, RegionKind, BANKED_ROM_START, BANK_SIZE, NO_IO_BYTE, RAM_SIZE, ROM_BANK_COUNT,
    SYSTEM_ROM_SIZE, SYSTEM_ROM_START, WA_DISPLAY_START_LINE,
};

/// Interrupt-type register bits.
pub const INT_TIMER: u8 = 0x01;
pub const INT_KEY: u8 = 0x10;

/// T-states between increments of the free-running timer at port 0x14.
pub const TIMER_PERIOD_TSTATES: u32 = 2048;

/// Pin-11 output latch mask.
const PIN11_OUT_MASK: u8 = 0xC3;
/// Xin enable bit in port 0x15.
const XIN_ENABLE: u8 = 0x80;
/// Pin-11 input bit gated by Xin enable.
const PIN11_XIN_BIT: u8 = 0x01;

pub struct BusInterface {
    ram: Vec<u8>,
    system_rom: Vec<u8>,
    banked_rom: Vec<u8>,

    /// Banked-ROM slice select, port 0x19 bits 0-3.
    rom_bank: u8,
    /// Expansion ROM field, port 0x19 bits 4-6. Latched; no expansion
    /// module is modeled.
    ex_rom_bank: u8,
    /// RAM bank latch, port 0x1B. Bit 2 selects the expansion RAM bank,
    /// which is not fitted; both values expose the same array.
    ram_bank: u8,

    pub lcd: LcdController,
    pub keyboard: Keyboard,

    timer: u8,
    timer_accum: u32,
    xin_enable: u8,
    interrupt_type: u8,
    interrupt_mask: u8,
    pin11_out: u8,
    pin11_in: u8,
    control_1a: u8,
    control_1c: u8,
    control_1e: u8,

    t_states: u64,
}

impl BusInterface {
    /// Build the bus around a flat firmware image: the first 16 KiB seed
    /// the fixed system window, the remainder fills the banked slices.
    /// Absent bytes read 0xFF.
    pub fn new(rom_image: Option<&[u8]>) -> Self {
        let mut system_rom = vec![0xFF; SYSTEM_ROM_SIZE];
        let mut banked_rom = vec![0xFF; BANK_SIZE * ROM_BANK_COUNT];

        if let Some(image) = rom_image {
            let sys_len = image.len().min(SYSTEM_ROM_SIZE);
            system_rom[..sys_len].copy_from_slice(&image[..sys_len]);
            if image.len() > SYSTEM_ROM_SIZE {
                let rest = &image[SYSTEM_ROM_SIZE..];
                let len = rest.len().min(banked_rom.len());
                banked_rom[..len].copy_from_slice(&rest[..len]);
            }
            log::debug!(
                "seeded firmware image: {} bytes ({} banked)",
                image.len(),
                image.len().saturating_sub(SYSTEM_ROM_SIZE)
            );
        }

        Self {
            ram: vec![0; RAM_SIZE],
            system_rom,
            banked_rom,
            rom_bank: 0,
            ex_rom_bank: 0,
            ram_bank: 0,
            lcd: LcdController::new(),
            keyboard: Keyboard::new(),
            timer: 0,
            timer_accum: 0,
            xin_enable: 0,
            interrupt_type: 0,
            interrupt_mask: 0,
            pin11_out: 0,
            pin11_in: 0,
            control_1a: 0,
            control_1c: 0,
            control_1e: 0,
            t_states: 0,
        }
    }

    /// Cold reset clears RAM; warm keeps it. Both clear peripherals and
    /// control latches.
    pub fn reset(&mut self, cold: bool) {
        if cold {
            self.ram.fill(0);
            self.t_states = 0;
        }
        self.rom_bank = 0;
        self.ex_rom_bank = 0;
        self.ram_bank = 0;
        self.lcd.reset();
        self.keyboard.reset();
        self.timer = 0;
        self.timer_accum = 0;
        self.xin_enable = 0;
        self.interrupt_type = 0;
        self.interrupt_mask = 0;
        self.pin11_out = 0;
        self.control_1a = 0;
        self.control_1c = 0;
        self.control_1e = 0;
    }

    /// Account CPU execution time: advances the elapsed T-state counter
    /// and the port 0x14 timer, which raises interrupt-type bit 0 on each
    /// increment.
    pub fn advance(&mut self, t_states: u32) {
        self.t_states += u64::from(t_states);
        self.timer_accum += t_states;
        while self.timer_accum >= TIMER_PERIOD_TSTATES {
            self.timer_accum -= TIMER_PERIOD_TSTATES;
            self.timer = self.timer.wrapping_add(1);
            self.interrupt_type |= INT_TIMER;
        }
    }

    pub fn t_states(&self) -> u64 {
        self.t_states
    }

    pub fn set_t_states(&mut self, t: u64) {
        self.t_states = t;
    }

    /// Masked interrupt request state, sampled by the machine between
    /// CPU steps.
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_type & self.interrupt_mask != 0
    }

    /// Host hook for the 11-pin connector input byte.
    pub fn set_pin11_input(&mut self, value: u8) {
        self.pin11_in = value;
    }

    pub fn display_start_line(&self) -> u8 {
        self.ram[WA_DISPLAY_START_LINE as usize] & 0x1F
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    pub fn load_ram(&mut self, image: &[u8]) {
        self.ram.copy_from_slice(image);
        self.lcd.mark_dirty();
    }

    pub fn bank_registers(&self) -> (u8, u8, u8) {
        (self.rom_bank, self.ex_rom_bank, self.ram_bank)
    }

    pub fn restore_bank_registers(&mut self, rom_bank: u8, ex_rom_bank: u8, ram_bank: u8) {
        self.rom_bank = rom_bank & 0x0F;
        self.ex_rom_bank = ex_rom_bank & 0x07;
        self.ram_bank = ram_bank;
    }

    pub fn strobe(&self) -> u16 {
        self.keyboard.strobe()
    }
}

impl cpu::Bus for BusInterface {
    fn read8(&mut self, addr: u16) -> u8 {
        let region = hardware_map::region_at(addr);
        match region.kind {
            RegionKind::Ram => self.ram[addr as usize],
            RegionKind::SystemRom => self.system_rom[(addr - SYSTEM_ROM_START) as usize],
            RegionKind::BankedRom => {
                let offset = (addr - BANKED_ROM_START) as usize;
                self.banked_rom[(self.rom_bank as usize) * BANK_SIZE + offset]
            }
        }
    }

    fn write8(&mut self, addr: u16, data: u8) {
        let region = hardware_map::region_at(addr);
        if !region.writable {
            // ROM writes drop on the floor.
            return;
        }
        self.ram[addr as usize] = data;
        if addr == WA_DISPLAY_START_LINE {
            self.lcd.mark_dirty();
        }
    }

    fn in8(&mut self, port: u8) -> u8 {
        let Some(spec) = hardware_map::port_spec(port) else {
            log::trace!("read of unmapped port {port:#04X}");
            return NO_IO_BYTE;
        };
        match spec.id {
            PortId::KeyRows => self.keyboard.read_rows(),
            PortId::KeyStrobeLo => 0,
            PortId::KeyStrobeHi => self.keyboard.pop_fifo(),
            PortId::KeyShift => self.keyboard.read_shift(),
            PortId::Timer => self.timer,
            PortId::XinEnable => self.xin_enable,
            PortId::InterruptType => self.interrupt_type,
            PortId::InterruptMask => self.interrupt_mask,
            PortId::Pin11Out => self.pin11_out,
            PortId::RomBank => (self.ex_rom_bank << 4) | self.rom_bank,
            PortId::Control1A => self.control_1a,
            PortId::RamBank => self.ram_bank,
            PortId::Control1C => self.control_1c,
            PortId::Control1D => 0,
            PortId::Control1E => self.control_1e,
            PortId::Pin11In => {
                let mut value = self.pin11_in;
                if self.xin_enable & XIN_ENABLE == 0 {
                    value &= !PIN11_XIN_BIT;
                }
                value
            }
            PortId::LcdDualStatus | PortId::LcdSecStatus | PortId::LcdPriStatus => {
                self.lcd.status_read()
            }
            PortId::LcdSecRead => self.lcd.data_read(Panel::Secondary),
            PortId::LcdPriRead => self.lcd.data_read(Panel::Primary),
            _ => spec.default_read,
        }
    }

    fn out8(&mut self, port: u8, data: u8) {
        let Some(spec) = hardware_map::port_spec(port) else {
            log::trace!("write {data:#04X} to unmapped port {port:#04X}");
            return;
        };
        match spec.id {
            PortId::KeyStrobeLo => {
                if self.keyboard.write_strobe_lo(data) {
                    self.interrupt_type |= INT_KEY;
                }
            }
            PortId::KeyStrobeHi => self.keyboard.write_strobe_hi(data),
            PortId::Timer => {
                self.timer = 0;
                self.timer_accum = 0;
            }
            PortId::XinEnable => self.xin_enable = data,
            PortId::InterruptType => {
                // Write-1-to-clear.
                self.interrupt_type &= !data;
            }
            PortId::InterruptMask => self.interrupt_mask = data,
            PortId::Pin11Out => self.pin11_out = data & PIN11_OUT_MASK,
            PortId::RomBank => {
                self.ex_rom_bank = (data >> 4) & 0x07;
                self.rom_bank = data & 0x0F;
                log::trace!("ROM bank {} (ex {})", self.rom_bank, self.ex_rom_bank);
            }
            PortId::Control1A => self.control_1a = data,
            PortId::RamBank => self.ram_bank = data,
            PortId::Control1C => self.control_1c = data,
            PortId::Control1E => self.control_1e = data,
            PortId::LcdDualCmd => self.lcd_command(Target::Dual, data),
            PortId::LcdSecCmd => self.lcd_command(Target::Secondary, data),
            PortId::LcdPriCmd => self.lcd_command(Target::Primary, data),
            PortId::LcdDualData => self.lcd.data_write(Target::Dual, data),
            PortId::LcdSecData => self.lcd.data_write(Target::Secondary, data),
            PortId::LcdPriData => self.lcd.data_write(Target::Primary, data),
            _ => {}
        }
    }
}

impl BusInterface {
    fn lcd_command(&mut self, target: Target, data: u8) {
        if let CommandEffect::SetDisplayStartLine(line) = self.lcd.command(target, data) {
            let cell = &mut self.ram[WA_DISPLAY_START_LINE as usize];
            *cell = (*cell & 0xE0) | (line & 0x1F);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Bus;

    #[test]
    fn ram_reads_back_writes() {
        let mut bus = BusInterface::new(None);
        bus.write8(0x1234, 0xAB);
        assert_eq!(bus.read8(0x1234), 0xAB);
        bus.write8(0x7FFF, 0x01);
        assert_eq!(bus.read8(0x7FFF), 0x01);
    }

    #[test]
    fn rom_writes_are_dropped() {
        let mut bus = BusInterface::new(None);
        bus.write8(0x8000, 0x55);
        assert_eq!(bus.read8(0x8000), 0xFF);
        bus.write8(0xC000, 0x55);
        assert_eq!(bus.read8(0xC000), 0xFF);
    }

    #[test]
    fn rom_image_seeds_windows() {
        let mut image = vec![0u8; 0x4000 + 2 * 0x4000];
        image[0] = 0x11; // system window
        image[0x4000] = 0x22; // bank 0
        image[0x8000] = 0x33; // bank 1
        let mut bus = BusInterface::new(Some(&image));
        assert_eq!(bus.read8(0x8000), 0x11);
        assert_eq!(bus.read8(0xC000), 0x22);
        bus.out8(0x19, 0x01);
        assert_eq!(bus.read8(0xC000), 0x33);
    }

    #[test]
    fn bank_register_packs_fields() {
        let mut bus = BusInterface::new(None);
        bus.out8(0x19, 0x53);
        assert_eq!(bus.in8(0x19), 0x53);
        let (rom, ex, _) = bus.bank_registers();
        assert_eq!(rom, 0x03);
        assert_eq!(ex, 0x05);
    }

    #[test]
    fn unknown_port_reads_quiescent() {
        let mut bus = BusInterface::new(None);
        assert_eq!(bus.in8(0x20), 0x78);
        assert_eq!(bus.in8(0xFE), 0x78);
        bus.out8(0x20, 0x42); // swallowed
        assert_eq!(bus.in8(0x20), 0x78);
    }

    #[test]
    fn timer_counts_and_clears() {
        let mut bus = BusInterface::new(None);
        bus.advance(TIMER_PERIOD_TSTATES * 3);
        assert_eq!(bus.in8(0x14), 3);
        assert!(bus.interrupt_type & INT_TIMER != 0);
        bus.out8(0x14, 0);
        assert_eq!(bus.in8(0x14), 0);
    }

    #[test]
    fn interrupt_type_write_one_to_clear() {
        let mut bus = BusInterface::new(None);
        bus.advance(TIMER_PERIOD_TSTATES);
        bus.out8(0x11, 0x10); // raises key interrupt bit
        assert_eq!(bus.in8(0x16), INT_TIMER | INT_KEY);
        bus.out8(0x16, INT_TIMER);
        assert_eq!(bus.in8(0x16), INT_KEY);
    }

    #[test]
    fn interrupt_pending_respects_mask() {
        let mut bus = BusInterface::new(None);
        bus.advance(TIMER_PERIOD_TSTATES);
        assert!(!bus.interrupt_pending());
        bus.out8(0x17, INT_TIMER);
        assert!(bus.interrupt_pending());
    }

    #[test]
    fn display_start_line_write_marks_dirty() {
        let mut bus = BusInterface::new(None);
        let _ = bus.lcd.frame_buffer(0); // clear initial dirty
        assert!(!bus.lcd.is_dirty());
        bus.write8(WA_DISPLAY_START_LINE, 1);
        assert!(bus.lcd.is_dirty());
        assert_eq!(bus.display_start_line(), 1);
    }

    #[test]
    fn lcd_start_line_command_updates_work_area() {
        let mut bus = BusInterface::new(None);
        bus.out8(0x58, 0xC0 | (3 << 3));
        assert_eq!(bus.display_start_line(), 3);
    }

    #[test]
    fn pin11_ports() {
        let mut bus = BusInterface::new(None);
        bus.out8(0x18, 0xFF);
        assert_eq!(bus.in8(0x18), 0xC3);
        bus.set_pin11_input(0x03);
        assert_eq!(bus.in8(0x1F), 0x02); // Xin gated off
        bus.out8(0x15, 0x80);
        assert_eq!(bus.in8(0x1F), 0x03);
    }

    #[test]
    fn dual_write_scenario_s2() {
        let mut bus = BusInterface::new(None);
        bus.out8(0x50, 0x40);
        bus.out8(0x50, 0x80);
        bus.out8(0x52, 0x5A);
        bus.out8(0x50, 0x40);
        bus.out8(0x50, 0x80);
        assert_eq!(bus.in8(0x57), 0x00);
        assert_eq!(bus.in8(0x57), 0x5A);
        assert_eq!(bus.in8(0x5B), 0x5A);
        assert_eq!(bus.in8(0x5B), 0x00);
    }

    #[test]
    fn strobe_halves_combine() {
        let mut bus = BusInterface::new(None);
        bus.out8(0x11, 0x34);
        bus.out8(0x12, 0x12);
        assert_eq!(bus.strobe(), 0x1234);
        assert_eq!(bus.in8(0x11), 0);
    }

    #[test]
    fn warm_reset_keeps_ram() {
        let mut bus = BusInterface::new(None);
        bus.write8(0x1000, 0x77);
        bus.reset(false);
        assert_eq!(bus.read8(0x1000), 0x77);
        bus.reset(true);
        assert_eq!(bus.read8(0x1000), 0x00);
    }
}
