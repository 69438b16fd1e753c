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

//! Hardware adapter consumed by the BASIC runtime.
//!
//! The machine produces this interface over its own bus and LCD; the
//! runtime never stores it, every entry point takes it by `&mut dyn`.
//! That keeps the runtime free of back-pointers into the machine.

/// Operations the runtime may invoke on the hardware.
pub trait Host {
    fn clear_lcd(&mut self);
    fn write_lcd_char(&mut self, code: u8);
    fn set_text_cursor(&mut self, col: usize, row: usize);
    fn set_display_start_line(&mut self, line: u8);
    fn get_display_start_line(&mut self) -> u8;
    fn read_key_matrix(&mut self, row: u8) -> u8;
    fn in8(&mut self, port: u8) -> u8;
    fn out8(&mut self, port: u8, value: u8);
    fn peek8(&mut self, addr: u16) -> u8;
    fn poke8(&mut self, addr: u16, value: u8);

    /// Timed pause. The default wiring is a no-op so WAIT and BEEP never
    /// stall the host thread.
    fn sleep_ms(&mut self, _ms: u32) {}

    /// Graphics-plane hook for PSET/PRESET.
    fn set_pixel(&mut self, _x: usize, _y: usize, _on: bool) {}

    /// Printer hook for LPRINT.
    fn print_to_printer(&mut self, _byte: u8) {}
}

/// Inert adapter for tests and detached runtime use.
#[derive(Default)]
pub struct NullHost {
    pub memory: Vec<u8>,
    pub ports: Vec<u8>,
    pub printer: Vec<u8>,
}

impl NullHost {
    pub fn new() -> Self {
        Self {
            memory: vec![0; 0x10000],
            ports: vec![0; 256],
            printer: Vec::new(),
        }
    }
}

impl Host for NullHost {
    fn clear_lcd(&mut self) {}
    fn write_lcd_char(&mut self, _code: u8) {}
    fn set_text_cursor(&mut self, _col: usize, _row: usize) {}
    fn set_display_start_line(&mut self, _line: u8) {}
    fn get_display_start_line(&mut self) -> u8 {
        0
    }
    fn read_key_matrix(&mut self, _row: u8) -> u8 {
        0xFF
    }
    fn in8(&mut self, port: u8) -> u8 {
        self.ports[port as usize]
    }
    fn out8(&mut self, port: u8, value: u8) {
        self.ports[port as usize] = value;
    }
    fn peek8(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }
    fn poke8(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }
    fn print_to_printer(&mut self, byte: u8) {
        self.printer.push(byte);
    }
}
