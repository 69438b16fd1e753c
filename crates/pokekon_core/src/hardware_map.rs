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

//! Declarative hardware map for the PC-G815.
//!
//! The memory region table, I/O port registry and work-area addresses are
//! declared here and nowhere else; every dispatch path in [`crate::bus`]
//! consults this module. A validator runs at machine construction and
//! rejects maps that do not tile the address space, repeat a port number,
//! lack evidence, or place a work-area byte outside RAM.

use fxhash::FxHashMap;
use lazy_static::lazy_static;
use strum_macros::Display;

/// Byte returned when reading a port no device drives.
pub const NO_IO_BYTE: u8 = 0x78;

/// Inclusive RAM window.
pub const RAM_START: u16 = 0x0000;
pub const RAM_END: u16 = 0x7FFF;
pub const RAM_SIZE: usize = 0x8000;

/// Inclusive fixed system ROM window.
pub const SYSTEM_ROM_START: u16 = 0x8000;
pub const SYSTEM_ROM_END: u16 = 0xBFFF;
pub const SYSTEM_ROM_SIZE: usize = 0x4000;

/// Inclusive banked ROM window. The active 16 KiB slice is selected by the
/// 4-bit bank field of port 0x19.
pub const BANKED_ROM_START: u16 = 0xC000;
pub const BANKED_ROM_END: u16 = 0xFFFF;
pub const BANK_SIZE: usize = 0x4000;
pub const ROM_BANK_COUNT: usize = 16;

/// Work-area byte: low 5 bits hold the display start line for vertical
/// scroll. Writes through the bus mark the framebuffer dirty.
pub const WA_DISPLAY_START_LINE: u16 = 0x790D;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionKind {
    Ram,
    SystemRom,
    BankedRom,
}

/// One contiguous slice of the 64 KiB address space.
#[derive(Copy, Clone, Debug)]
pub struct MemRegion {
    pub kind: RegionKind,
    pub start: u16,
    pub end: u16, // inclusive
    pub writable: bool,
    pub evidence: &'static str,
}

pub const MEM_REGIONS: [MemRegion; 3] = [
    MemRegion {
        kind: RegionKind::Ram,
        start: RAM_START,
        end: RAM_END,
        writable: true,
        evidence: "PC-G815 service manual: 32KB SRAM at 0000-7FFF",
    },
    MemRegion {
        kind: RegionKind::SystemRom,
        start: SYSTEM_ROM_START,
        end: SYSTEM_ROM_END,
        writable: false,
        evidence: "PC-G815 service manual: fixed monitor ROM at 8000-BFFF",
    },
    MemRegion {
        kind: RegionKind::BankedRom,
        start: BANKED_ROM_START,
        end: BANKED_ROM_END,
        writable: false,
        evidence: "PC-G815 service manual: banked ROM window at C000-FFFF, bank in port 19h",
    },
];

/// Work-area addresses the bus gives special treatment.
pub const WORK_AREAS: [(u16, &str); 1] = [(
    WA_DISPLAY_START_LINE,
    "monitor work area 790Dh: display start line, low 5 bits",
)];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortDirection {
    In,
    Out,
    InOut,
}

/// Coarse behavior class. The bus matches on [`PortId`] for exact
/// semantics; the tag exists so tooling can partition the map.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum PortClass {
    KeyMatrix,
    SystemControl,
    BankControl,
    Lcd,
}

/// Identity of a decoded I/O port. One variant per distinct behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum PortId {
    KeyRows,        // 0x10: AND of active-low rows selected by the strobe
    KeyStrobeLo,    // 0x11: strobe bits 0-7; bit 4 raises int-type bit 4
    KeyStrobeHi,    // 0x12: strobe bits 8-15; read drains the ASCII FIFO
    KeyShift,       // 0x13: shift row, gated by strobe bit 3
    Timer,          // 0x14: free-running timer; write clears
    XinEnable,      // 0x15: bit 7 gates the pin-11 Xin input
    InterruptType,  // 0x16: pending interrupt bits; write-1-to-clear
    InterruptMask,  // 0x17: interrupt enable mask
    Pin11Out,       // 0x18: pin-11 output latch, mask 0xC3
    RomBank,        // 0x19: ex bank bits 4-6, bank bits 0-3
    Control1A,      // 0x1A: latched, no modeled effect
    RamBank,        // 0x1B: RAM bank select, bit 2
    Control1C,      // 0x1C: latched, no modeled effect
    Control1D,      // 0x1D: reads 0
    Control1E,      // 0x1E: latched, no modeled effect
    Pin11In,        // 0x1F: pin-11 input composed per Xin gate
    LcdDualCmd,     // 0x50
    LcdDualStatus,  // 0x51
    LcdDualData,    // 0x52
    LcdDualRead,    // 0x53: reads 0; a broadcast port cannot be read back
    LcdSecCmd,      // 0x54
    LcdSecStatus,   // 0x55
    LcdSecData,     // 0x56
    LcdSecRead,     // 0x57
    LcdPriCmd,      // 0x58
    LcdPriStatus,   // 0x59
    LcdPriData,     // 0x5A
    LcdPriRead,     // 0x5B
}

/// One I/O port record.
#[derive(Copy, Clone, Debug)]
pub struct PortSpec {
    pub port: u8,
    pub id: PortId,
    pub class: PortClass,
    pub direction: PortDirection,
    pub default_read: u8,
    pub evidence: &'static str,
}

macro_rules! port {
    ($port:expr, $id:ident, $class:ident, $dir:ident, $def:expr, $ev:expr) => {
        PortSpec {
            port: $port,
            id: PortId::$id,
            class: PortClass::$class,
            direction: PortDirection::$dir,
            default_read: $def,
            evidence: $ev,
        }
    };
}

pub const PORT_SPECS: [PortSpec; 28] = [
    port!(0x10, KeyRows, KeyMatrix, In, 0xFF, "key-in port, rows selected by 11h/12h strobe"),
    port!(0x11, KeyStrobeLo, KeyMatrix, InOut, 0x00, "key strobe low byte; bit 4 also raises int-type bit 4"),
    port!(0x12, KeyStrobeHi, KeyMatrix, InOut, 0x00, "key strobe high byte; read side drains the ASCII queue"),
    port!(0x13, KeyShift, KeyMatrix, In, 0x00, "shift key sense, gated by strobe bit 3"),
    port!(0x14, Timer, SystemControl, InOut, 0x00, "free-running timer, write-to-clear"),
    port!(0x15, XinEnable, SystemControl, InOut, 0x00, "bit 7 enables Xin input on pin 11"),
    port!(0x16, InterruptType, SystemControl, InOut, 0x00, "interrupt-type register, write-1-to-clear"),
    port!(0x17, InterruptMask, SystemControl, InOut, 0x00, "interrupt mask register"),
    port!(0x18, Pin11Out, SystemControl, InOut, 0x00, "11-pin connector output latch, mask C3h"),
    port!(0x19, RomBank, BankControl, InOut, 0x00, "ROM bank: ex bank bits 4-6, bank bits 0-3"),
    port!(0x1A, Control1A, SystemControl, InOut, 0x00, "control latch, accepted and held"),
    port!(0x1B, RamBank, BankControl, InOut, 0x00, "RAM bank select, bit 2"),
    port!(0x1C, Control1C, SystemControl, InOut, 0x00, "control latch, accepted and held"),
    port!(0x1D, Control1D, SystemControl, In, 0x00, "status port, reads 0"),
    port!(0x1E, Control1E, SystemControl, InOut, 0x00, "control latch, accepted and held"),
    port!(0x1F, Pin11In, SystemControl, In, 0x00, "11-pin connector input, composed per Xin gate"),
    port!(0x50, LcdDualCmd, Lcd, Out, 0x00, "LCD command broadcast to both controllers"),
    port!(0x51, LcdDualStatus, Lcd, In, 0x00, "LCD status, busy flag always clear"),
    port!(0x52, LcdDualData, Lcd, Out, 0x00, "LCD data broadcast to both controllers"),
    port!(0x53, LcdDualRead, Lcd, In, 0x00, "broadcast readback, returns 0"),
    port!(0x54, LcdSecCmd, Lcd, Out, 0x00, "secondary LCD controller command"),
    port!(0x55, LcdSecStatus, Lcd, In, 0x00, "LCD status, busy flag always clear"),
    port!(0x56, LcdSecData, Lcd, Out, 0x00, "secondary LCD controller data write"),
    port!(0x57, LcdSecRead, Lcd, In, 0x00, "secondary LCD controller data read, dummy-first"),
    port!(0x58, LcdPriCmd, Lcd, Out, 0x00, "primary LCD controller command"),
    port!(0x59, LcdPriStatus, Lcd, In, 0x00, "LCD status, busy flag always clear"),
    port!(0x5A, LcdPriData, Lcd, Out, 0x00, "primary LCD controller data write"),
    port!(0x5B, LcdPriRead, Lcd, In, 0x00, "primary LCD controller data read, dummy-first"),
];

lazy_static! {
    /// Port number → spec, built once from [`PORT_SPECS`].
    pub static ref PORT_MAP: FxHashMap<u8, &'static PortSpec> = {
        let mut m = FxHashMap::default();
        for spec in PORT_SPECS.iter() {
            m.insert(spec.port, spec);
        }
        m
    };
}

#[inline]
pub fn port_spec(port: u8) -> Option<&'static PortSpec> {
    PORT_MAP.get(&port).copied()
}

/// Region containing `addr`. The map tiles the address space, so this
/// cannot fail once validation has passed.
#[inline]
pub fn region_at(addr: u16) -> &'static MemRegion {
    for region in MEM_REGIONS.iter() {
        if addr >= region.start && addr <= region.end {
            return region;
        }
    }
    unreachable!("memory map does not tile the address space");
}

/// Validate the static hardware map. Called once at machine construction;
/// the full error list is returned so a regression shows every violation
/// at once.
pub fn validate() -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // Regions must be well-formed and tile [0x0000, 0xFFFF] with no gaps
    // or overlaps.
    let mut next: u32 = 0;
    for region in MEM_REGIONS.iter() {
        if region.start > region.end {
            errors.push(format!(
                "region {:?}: start {:#06X} > end {:#06X}",
                region.kind, region.start, region.end
            ));
            continue;
        }
        if u32::from(region.start) != next {
            errors.push(format!(
                "region {:?} starts at {:#06X}, expected {:#06X}",
                region.kind, region.start, next
            ));
        }
        if region.evidence.is_empty() {
            errors.push(format!("region {:?} lacks evidence", region.kind));
        }
        next = u32::from(region.end) + 1;
    }
    if next != 0x1_0000 {
        errors.push(format!(
            "regions end at {:#06X}, expected 0x10000",
            next
        ));
    }

    // Port numbers must be unique and every record must carry evidence.
    let mut seen: FxHashMap<u8, PortId> = FxHashMap::default();
    for spec in PORT_SPECS.iter() {
        if let Some(prev) = seen.insert(spec.port, spec.id) {
            errors.push(format!(
                "port {:#04X} declared twice: {} and {}",
                spec.port, prev, spec.id
            ));
        }
        if spec.evidence.is_empty() {
            errors.push(format!("port {:#04X} ({}) lacks evidence", spec.port, spec.id));
        }
    }

    // Work-area bytes must live in a writable RAM region.
    for (addr, note) in WORK_AREAS.iter() {
        let region = MEM_REGIONS
            .iter()
            .find(|r| *addr >= r.start && *addr <= r.end);
        match region {
            Some(r) if r.writable => {}
            Some(r) => errors.push(format!(
                "work area {:#06X} ({}) lies in read-only region {:?}",
                addr, note, r.kind
            )),
            None => errors.push(format!(
                "work area {:#06X} ({}) lies outside all regions",
                addr, note
            )),
        }
        if note.is_empty() {
            errors.push(format!("work area {:#06X} lacks evidence", addr));
        }
    }

    if errors.is_empty() {
        Ok(())
    }
    else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_map_validates() {
        assert!(validate().is_ok());
    }

    #[test]
    fn regions_tile_address_space() {
        for addr in [0x0000u16, 0x7FFF, 0x8000, 0xBFFF, 0xC000, 0xFFFF] {
            // Must not panic.
            let _ = region_at(addr);
        }
        assert_eq!(region_at(0x0000).kind, RegionKind::Ram);
        assert_eq!(region_at(0x7FFF).kind, RegionKind::Ram);
        assert_eq!(region_at(0x8000).kind, RegionKind::SystemRom);
        assert_eq!(region_at(0xC000).kind, RegionKind::BankedRom);
    }

    #[test]
    fn display_start_line_is_in_ram() {
        assert_eq!(region_at(WA_DISPLAY_START_LINE).kind, RegionKind::Ram);
    }

    #[test]
    fn port_lookup_covers_documented_ranges() {
        for port in 0x10..=0x1F {
            assert!(port_spec(port).is_some(), "port {port:#04X} missing");
        }
        for port in 0x50..=0x5B {
            assert!(port_spec(port).is_some(), "port {port:#04X} missing");
        }
        assert!(port_spec(0x20).is_none());
        assert!(port_spec(0x78).is_none());
    }

    #[test]
    fn port_numbers_match_ids() {
        assert_eq!(port_spec(0x10).unwrap().id, PortId::KeyRows);
        assert_eq!(port_spec(0x19).unwrap().id, PortId::RomBank);
        assert_eq!(port_spec(0x52).unwrap().id, PortId::LcdDualData);
        assert_eq!(port_spec(0x5B).unwrap().id, PortId::LcdPriRead);
    }
}
