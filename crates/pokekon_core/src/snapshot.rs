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

//! Snapshot v1 types.
//!
//! Plain serde-derived records; any serde format round-trips exactly
//! because every buffer is an owned `Vec`/`String`. Loading verifies
//! `version == 1` and field lengths before any state is touched.

use serde_derive::{Deserialize, Serialize};

use crate::basic::RuntimeState;
use crate::cpu::CpuState;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VramSnapshot {
    /// 24×4 text grid, row-major, 96 bytes.
    pub text: Vec<u8>,
    /// Status icon row, 32 bytes.
    pub icons: Vec<u8>,
    /// Text cursor, 0..95.
    pub cursor: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IoSnapshot {
    /// 16-bit key strobe register.
    pub selected_key_row: u16,
    /// Active-low matrix rows.
    pub keyboard_rows: [u8; 8],
    /// Pending ASCII FIFO bytes.
    pub ascii_queue: Vec<u8>,
    pub kana_mode: bool,
    /// Pending romaji letters. Empty in practice: the composer is
    /// force-flushed at the snapshot boundary.
    pub kana_compose_buffer: String,
    /// Packed port 0x19 value: ex bank bits 4-6, bank bits 0-3.
    pub rom_bank_select: u8,
    /// Port 0x1B RAM-bank latch.
    pub expansion_control: u8,
    pub runtime: RuntimeState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotV1 {
    pub version: u32,
    pub cpu: CpuState,
    /// Main RAM, 0x8000 bytes.
    pub ram: Vec<u8>,
    pub vram: VramSnapshot,
    pub io: IoSnapshot,
    /// Elapsed T-states at the moment of capture.
    pub timestamp_t_states: u64,
}
