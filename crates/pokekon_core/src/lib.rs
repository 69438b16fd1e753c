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

//! Sharp PC-G815 pocket computer emulator core.
//!
//! The crate exposes a single deterministic, headless [`machine::Machine`]
//! object: a Z80 wired to a banked 64 KiB address space, a dual-panel LCD
//! with a text/graphics overlay, an active-low keyboard matrix with ASCII
//! and kana input synthesis, and a firmware monitor hosting a line-numbered
//! BASIC. The host advances the machine with [`machine::Machine::tick`] and
//! reads back the 1-bpp framebuffer, text VRAM, CPU state, or a snapshot.

pub mod basic;
pub mod bus;
pub mod cpu;
pub mod devices;
pub mod error;
pub mod font;
pub mod hardware_map;
pub mod kana;
pub mod keymap;
pub mod machine;
pub mod snapshot;

pub use error::{MachineError, SnapshotError};
pub use machine::{Machine, MachineOptions};
pub use snapshot::SnapshotV1;
