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

//! Error types surfaced to the embedding host.
//!
//! Bus traffic itself is infallible (unknown ports read a quiescent byte,
//! writes outside RAM are dropped); errors exist only at construction,
//! program-load and snapshot boundaries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("hardware map validation failed: {}", .0.join("; "))]
    InvalidHardwareMap(Vec<String>),

    #[error("program of {len} bytes at {origin:#06X} does not fit in RAM")]
    ProgramOutOfRange { origin: u16, len: usize },

    #[error("address {0:#06X} is outside the RAM region")]
    AddressOutOfRange(u16),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {0} (expected 1)")]
    UnsupportedVersion(u32),

    #[error("snapshot field {field} has length {got}, expected {expected}")]
    BadFieldLength {
        field: &'static str,
        got: usize,
        expected: usize,
    },
}
