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

//! The machine object.
//!
//! Owns the CPU, bus (memory, banks, LCD, keyboard), kana composer and
//! BASIC runtime, and ties them together: `tick` advances the CPU by a
//! cycle budget, pumps one runtime slice and drains runtime output into
//! the LCD; key events update the matrix and route synthesized bytes to
//! either the line editor or the ASCII FIFO. Everything is deterministic
//! and headless; pacing is the host's job.

use crate::basic::{BasicRuntime, Host};
use crate::bus::BusInterface;
use crate::cpu::{Bus as _, Cpu, CpuState};
use crate::devices::lcd::{Target, FB_HEIGHT, FB_WIDTH, ICON_BYTES, LCD_ROWS, TEXT_CELLS};
use crate::error::{MachineError, SnapshotError};
use crate::hardware_map::{self, WA_DISPLAY_START_LINE};
use crate::kana::KanaComposer;
use crate::snapshot::{IoSnapshot, SnapshotV1, VramSnapshot, SNAPSHOT_VERSION};

/// Construction options.
#[derive(Default)]
pub struct MachineOptions {
    /// Flat firmware image; 0xFF-filled windows when absent.
    pub rom: Option<Vec<u8>>,
    /// Fault on undefined opcodes instead of running them as NOP.
    pub strict_cpu_opcodes: bool,
}

/// Inclusive RAM window bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RamRange {
    pub start: u16,
    pub end: u16,
}

pub struct Machine {
    bus: BusInterface,
    cpu: Cpu,
    runtime: BasicRuntime,
    composer: KanaComposer,
    /// Route synthesized input to the line editor while no program runs.
    immediate_routing: bool,
    printer: Vec<u8>,
}

/// The adapter record handed to the runtime: hardware operations over the
/// bus, with no pointer back into the machine.
struct HostAdapter<'a> {
    bus: &'a mut BusInterface,
    printer: &'a mut Vec<u8>,
}

impl Host for HostAdapter<'_> {
    fn clear_lcd(&mut self) {
        self.bus.lcd.command(Target::Dual, 0x01);
    }

    fn write_lcd_char(&mut self, code: u8) {
        self.bus.lcd.write_char(code);
    }

    fn set_text_cursor(&mut self, col: usize, row: usize) {
        self.bus.lcd.set_text_cursor(col, row);
    }

    fn set_display_start_line(&mut self, line: u8) {
        let cell = &mut self.bus.ram_mut()[WA_DISPLAY_START_LINE as usize];
        *cell = (*cell & 0xE0) | (line & 0x1F);
        self.bus.lcd.mark_dirty();
    }

    fn get_display_start_line(&mut self) -> u8 {
        self.bus.display_start_line()
    }

    fn read_key_matrix(&mut self, row: u8) -> u8 {
        self.bus.keyboard.rows()[(row & 7) as usize]
    }

    fn in8(&mut self, port: u8) -> u8 {
        self.bus.in8(port)
    }

    fn out8(&mut self, port: u8, value: u8) {
        self.bus.out8(port, value);
    }

    fn peek8(&mut self, addr: u16) -> u8 {
        self.bus.read8(addr)
    }

    fn poke8(&mut self, addr: u16, value: u8) {
        self.bus.write8(addr, value);
    }

    fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        self.bus.lcd.set_pixel(x, y, on);
    }

    fn print_to_printer(&mut self, byte: u8) {
        self.printer.push(byte);
    }
}

impl Machine {
    pub fn new(options: MachineOptions) -> Result<Self, MachineError> {
        hardware_map::validate().map_err(MachineError::InvalidHardwareMap)?;
        Ok(Self {
            bus: BusInterface::new(options.rom.as_deref()),
            cpu: Cpu::new(options.strict_cpu_opcodes),
            runtime: BasicRuntime::new(),
            composer: KanaComposer::new(),
            immediate_routing: true,
            printer: Vec::new(),
        })
    }

    /// Cold reset re-seeds RAM and zeroes the T-state clock; warm keeps
    /// RAM and the stored BASIC program. Both clear VRAM, queues, the
    /// matrix and the CPU.
    pub fn reset(&mut self, cold: bool) {
        self.bus.reset(cold);
        self.cpu.reset();
        self.composer = KanaComposer::new();
        if cold {
            self.runtime = BasicRuntime::new();
            self.printer.clear();
        }
    }

    /// Advance the machine by `n` clock cycles.
    pub fn tick(&mut self, n: u32) {
        let was_running = self.runtime.is_running();

        let mut budget = i64::from(n);
        while budget > 0 {
            self.cpu.irq = self.bus.interrupt_pending();
            let cycles = self.cpu.step(&mut self.bus);
            self.bus.advance(cycles);
            budget -= i64::from(cycles);
        }

        let mut host = HostAdapter {
            bus: &mut self.bus,
            printer: &mut self.printer,
        };
        self.runtime.pump(&mut host);

        // Runtime output lands on the LCD after CPU execution, so
        // CPU-driven writes within this tick are already visible.
        while let Some(byte) = self.runtime.pop_output() {
            host.write_lcd_char(byte);
        }

        if was_running != self.runtime.is_running() {
            // Keystrokes queued for one mode must not leak into the other.
            self.bus.keyboard.clear_fifo();
        }
    }

    /// Host key event. Unknown codes are ignored.
    pub fn set_key_state(&mut self, code: &str, pressed: bool) {
        if !pressed {
            self.bus.keyboard.release(code);
            return;
        }
        let bytes = self.bus.keyboard.press(code, &mut self.composer);
        self.route_input(&bytes);
    }

    fn route_input(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if !self.runtime.is_running() && self.immediate_routing {
            let mut host = HostAdapter {
                bus: &mut self.bus,
                printer: &mut self.printer,
            };
            for &byte in bytes {
                self.runtime.receive_char(byte, &mut host);
            }
        }
        else {
            self.bus.keyboard.push_fifo(bytes);
        }
    }

    /// When disabled, synthesized input always lands in the ASCII FIFO.
    pub fn set_immediate_input_routing(&mut self, enabled: bool) {
        self.immediate_routing = enabled;
    }

    pub fn set_kana_mode(&mut self, on: bool) {
        let mut out = Vec::new();
        self.composer.set_kana_mode(on, &mut out);
        self.route_input(&out);
    }

    pub fn get_kana_mode(&self) -> bool {
        self.composer.kana_mode()
    }

    /// 144×32 1-bpp framebuffer, rebuilt lazily.
    pub fn get_frame_buffer(&mut self) -> &[u8] {
        let start_line = self.bus.display_start_line();
        self.bus.lcd.frame_buffer(start_line)
    }

    pub fn frame_size(&self) -> (usize, usize) {
        (FB_WIDTH, FB_HEIGHT)
    }

    pub fn get_text_lines(&self) -> [String; LCD_ROWS] {
        self.bus.lcd.text_lines()
    }

    pub fn get_cpu_state(&self) -> CpuState {
        let mut state = self.cpu.state();
        state.t_states = self.bus.t_states();
        state
    }

    pub fn cpu_fault(&self) -> Option<&str> {
        self.cpu.fault.as_deref()
    }

    // Raw bus access for tests and tooling.

    pub fn read8(&mut self, addr: u16) -> u8 {
        self.bus.read8(addr)
    }

    pub fn write8(&mut self, addr: u16, data: u8) {
        self.bus.write8(addr, data);
    }

    pub fn in8(&mut self, port: u8) -> u8 {
        self.bus.in8(port)
    }

    pub fn out8(&mut self, port: u8, data: u8) {
        self.bus.out8(port, data);
    }

    /// Copy an assembled program into RAM.
    pub fn load_program(&mut self, bytes: &[u8], origin: u16) -> Result<(), MachineError> {
        let end = origin as usize + bytes.len();
        if end > hardware_map::RAM_SIZE {
            return Err(MachineError::ProgramOutOfRange {
                origin,
                len: bytes.len(),
            });
        }
        self.bus.ram_mut()[origin as usize..end].copy_from_slice(bytes);
        log::debug!("loaded {} bytes at {origin:#06X}", bytes.len());
        Ok(())
    }

    pub fn set_program_counter(&mut self, addr: u16) -> Result<(), MachineError> {
        if addr > hardware_map::RAM_END {
            return Err(MachineError::AddressOutOfRange(addr));
        }
        self.cpu.pc = addr;
        self.cpu.halted = false;
        Ok(())
    }

    pub fn set_stack_pointer(&mut self, addr: u16) {
        self.cpu.sp = addr;
    }

    pub fn get_ram_range(&self) -> RamRange {
        RamRange {
            start: hardware_map::RAM_START,
            end: hardware_map::RAM_END,
        }
    }

    pub fn is_runtime_program_running(&self) -> bool {
        self.runtime.is_running()
    }

    /// Feed one source line straight to the runtime.
    pub fn execute_line(&mut self, text: &str) {
        let mut host = HostAdapter {
            bus: &mut self.bus,
            printer: &mut self.printer,
        };
        self.runtime.execute_line(text, &mut host);
    }

    /// Next queued runtime output byte; 0 when empty.
    pub fn pop_output_char(&mut self) -> u8 {
        self.runtime.pop_output_char()
    }

    pub fn printer_output(&self) -> &[u8] {
        &self.printer
    }

    pub fn set_graphics_pixel(&mut self, x: usize, y: usize, on: bool) {
        self.bus.lcd.set_pixel(x, y, on);
    }

    pub fn clear_graphics(&mut self) {
        self.bus.lcd.clear_graphics();
    }

    pub fn set_icon_byte(&mut self, index: usize, value: u8) {
        self.bus.lcd.set_icon_byte(index, value);
    }

    /// Host hook for the 11-pin connector input.
    pub fn set_pin11_input(&mut self, value: u8) {
        self.bus.set_pin11_input(value);
    }

    pub fn create_snapshot(&mut self) -> SnapshotV1 {
        // Pending romaji letters resolve at the snapshot boundary.
        let mut flushed = Vec::new();
        self.composer.flush(true, &mut flushed);
        self.route_input(&flushed);

        SnapshotV1 {
            version: SNAPSHOT_VERSION,
            cpu: self.get_cpu_state(),
            ram: self.bus.ram().to_vec(),
            vram: VramSnapshot {
                text: self.bus.lcd.text().to_vec(),
                icons: self.bus.lcd.icons().to_vec(),
                cursor: self.bus.lcd.text_cursor() as u8,
            },
            io: IoSnapshot {
                selected_key_row: self.bus.strobe(),
                keyboard_rows: *self.bus.keyboard.rows(),
                ascii_queue: self.bus.keyboard.fifo_bytes(),
                kana_mode: self.composer.kana_mode(),
                kana_compose_buffer: self.composer.pending().to_string(),
                rom_bank_select: {
                    let (rom, ex, _) = self.bus.bank_registers();
                    (ex << 4) | rom
                },
                expansion_control: self.bus.bank_registers().2,
                runtime: self.runtime.state(),
            },
            timestamp_t_states: self.bus.t_states(),
        }
    }

    pub fn load_snapshot(&mut self, snapshot: &SnapshotV1) -> Result<(), SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        check_len("ram", snapshot.ram.len(), hardware_map::RAM_SIZE)?;
        check_len("vram.text", snapshot.vram.text.len(), TEXT_CELLS)?;
        check_len("vram.icons", snapshot.vram.icons.len(), ICON_BYTES)?;

        self.cpu.restore(&snapshot.cpu);
        self.bus.load_ram(&snapshot.ram);
        self.bus
            .lcd
            .restore_text(&snapshot.vram.text, snapshot.vram.cursor as usize);
        self.bus.lcd.restore_icons(&snapshot.vram.icons);

        self.bus.keyboard.reset();
        self.bus.keyboard.write_strobe_hi((snapshot.io.selected_key_row >> 8) as u8);
        self.bus.keyboard.write_strobe_lo(snapshot.io.selected_key_row as u8);
        self.bus.keyboard.restore_rows(&snapshot.io.keyboard_rows);
        self.bus.keyboard.restore_fifo(&snapshot.io.ascii_queue);

        self.composer
            .restore(&snapshot.io.kana_compose_buffer, snapshot.io.kana_mode);

        self.bus.restore_bank_registers(
            snapshot.io.rom_bank_select & 0x0F,
            (snapshot.io.rom_bank_select >> 4) & 0x07,
            snapshot.io.expansion_control,
        );
        self.bus.set_t_states(snapshot.timestamp_t_states);
        self.runtime.restore(&snapshot.io.runtime);
        Ok(())
    }
}

fn check_len(field: &'static str, got: usize, expected: usize) -> Result<(), SnapshotError> {
    if got == expected {
        Ok(())
    }
    else {
        Err(SnapshotError::BadFieldLength {
            field,
            got,
            expected,
        })
    }
}
