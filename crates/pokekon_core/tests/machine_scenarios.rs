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

//! End-to-end machine scenarios over the public surface.

use pokekon_core::{Machine, MachineOptions};

fn machine() -> Machine {
    Machine::new(MachineOptions::default()).expect("hardware map must validate")
}

fn lit_pixels(fb: &[u8]) -> usize {
    fb.iter().filter(|&&p| p != 0).count()
}

fn drain_output(m: &mut Machine) -> String {
    let mut bytes = Vec::new();
    loop {
        let b = m.pop_output_char();
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

// S1: a character written through the LCD ports lands in the text grid
// and the framebuffer.
#[test]
fn s1_lcd_character_via_ports() {
    let mut m = machine();
    m.out8(0x58, 0x01);
    m.out8(0x58, 0x80);
    m.out8(0x5A, 0x41);
    let lines = m.get_text_lines();
    assert_eq!(&lines[0][..1], "A");
    assert!(lit_pixels(m.get_frame_buffer()) >= 1);
}

// S2: dual-write broadcast reads back from both panels with a single
// dummy read up front.
#[test]
fn s2_dual_write_read_back() {
    let mut m = machine();
    m.out8(0x50, 0x40);
    m.out8(0x50, 0x80);
    m.out8(0x52, 0x5A);
    m.out8(0x50, 0x40);
    m.out8(0x50, 0x80);
    assert_eq!(m.in8(0x57), 0x00);
    assert_eq!(m.in8(0x57), 0x5A);
    assert_eq!(m.in8(0x5B), 0x5A);
    assert_eq!(m.in8(0x5B), 0x00);
}

// S3: the keyboard matrix is active-low behind the strobe register.
#[test]
fn s3_keyboard_matrix_read() {
    let mut m = machine();
    m.out8(0x11, 0x01);
    m.set_key_state("KeyA", true);
    assert_eq!(m.in8(0x10) & 0x01, 0);
    m.set_key_state("KeyA", false);
    assert_ne!(m.in8(0x10) & 0x01, 0);
}

// S4, FIFO side: with immediate routing disabled, synthesized codes are
// drained through port 0x12.
#[test]
fn s4_fifo_routing() {
    let mut m = machine();
    m.set_immediate_input_routing(false);
    m.set_key_state("KeyP", true);
    m.set_key_state("KeyP", false);
    assert_eq!(m.in8(0x12), 0x50);
    assert_eq!(m.in8(0x12), 0x00);
}

// S4, editor side: with immediate routing enabled the keystroke echoes
// into the text layer after the next tick.
#[test]
fn s4_immediate_echo() {
    let mut m = machine();
    m.set_key_state("KeyP", true);
    m.set_key_state("KeyP", false);
    m.tick(4);
    let lines = m.get_text_lines();
    assert_eq!(&lines[0][..1], "P");
}

// S5: RUN executes stored lines in order and IF..THEN skips the branch.
#[test]
fn s5_basic_run() {
    let mut m = machine();
    m.execute_line("10 LET A=1");
    m.execute_line("20 IF A=1 THEN 40");
    m.execute_line("30 PRINT 0");
    m.execute_line("40 PRINT 9");
    m.execute_line("RUN");
    let mut out = String::new();
    for _ in 0..100 {
        m.tick(16);
        out.push_str(&drain_output(&mut m));
        if !m.is_runtime_program_running() {
            break;
        }
    }
    // The drain in tick moves runtime output to the LCD; check the text
    // layer instead of the queue.
    let lines = m.get_text_lines();
    let all: String = lines.join("");
    assert!(all.contains('9'));
    assert!(!all.contains('0'));
}

// S6: assembler output runs on the machine it was written for.
#[test]
fn s6_assembler_round_trip() {
    let source = "ORG 0x0000\nENTRY START\nSTART: LD A,0x01\n LD (0x1000),A\n JP START\n";
    let out = pokekon_asm::assemble(source, pokekon_asm::AssembleOptions::default());
    assert!(out.ok);
    assert_eq!(
        out.binary,
        vec![0x3E, 0x01, 0x32, 0x00, 0x10, 0xC3, 0x00, 0x00]
    );
    assert_eq!(out.origin, 0);
    assert_eq!(out.entry, 0);

    let mut m = machine();
    m.load_program(&out.binary, out.origin).unwrap();
    m.set_program_counter(out.entry).unwrap();
    m.set_stack_pointer(0x7F00);
    m.tick(64);
    assert_eq!(m.read8(0x1000), 0x01);
    let state = m.get_cpu_state();
    assert!(!state.halted);
    assert!(state.t_states >= 64);
}

// S7: romaji composition fills the FIFO with half-width katakana.
#[test]
fn s7_romaji_kana() {
    let mut m = machine();
    m.set_immediate_input_routing(false);
    m.set_kana_mode(true);
    assert!(m.get_kana_mode());
    m.set_key_state("KeyK", true);
    m.set_key_state("KeyK", false);
    assert_eq!(m.in8(0x12), 0x00); // still composing
    m.set_key_state("KeyA", true);
    m.set_key_state("KeyA", false);
    assert_eq!(m.in8(0x12), 0xB6); // ｶ
}

#[test]
fn s7_kana_mode_off_then_on() {
    let mut m = machine();
    m.set_immediate_input_routing(false);

    m.set_key_state("KeyS", true);
    m.set_key_state("KeyS", false);
    m.set_key_state("KeyA", true);
    m.set_key_state("KeyA", false);
    assert_eq!(m.in8(0x12), 0x53); // 'S'
    assert_eq!(m.in8(0x12), 0x41); // 'A'

    m.set_kana_mode(true);
    m.set_key_state("KeyS", true);
    m.set_key_state("KeyS", false);
    m.set_key_state("KeyA", true);
    m.set_key_state("KeyA", false);
    assert_eq!(m.in8(0x12), 0xBB); // ｻ
}

// S8: the display-start-line work-area byte scrolls the raster without
// changing the number of lit pixels.
#[test]
fn s8_display_start_line_scroll() {
    let mut m = machine();
    for (i, b) in b"SCROLL TEST".iter().enumerate() {
        m.out8(0x58, 0x40 | (i as u8 & 0x3F));
        m.out8(0x5A, *b);
    }
    let before = m.get_frame_buffer().to_vec();
    m.write8(0x790D, 1);
    let after = m.get_frame_buffer().to_vec();
    assert_ne!(before, after);
    assert_eq!(lit_pixels(&before), lit_pixels(&after));
}

#[test]
fn snapshot_round_trip_preserves_machine() {
    let mut m = machine();
    m.execute_line("10 PRINT 123");
    m.out8(0x58, 0x80);
    m.out8(0x5A, b'Q');
    m.out8(0x19, 0x25);
    m.write8(0x4321, 0x99);
    m.set_kana_mode(true);
    m.tick(256);

    let snapshot = m.create_snapshot();
    let mut restored = machine();
    restored.load_snapshot(&snapshot).unwrap();

    assert_eq!(restored.read8(0x4321), 0x99);
    assert_eq!(restored.in8(0x19), 0x25);
    assert_eq!(restored.get_kana_mode(), m.get_kana_mode());
    assert_eq!(restored.get_cpu_state(), m.get_cpu_state());
    assert_eq!(restored.get_text_lines(), m.get_text_lines());
    assert_eq!(restored.get_frame_buffer(), m.get_frame_buffer());

    // And the serialized form itself round-trips exactly.
    let second = restored.create_snapshot();
    assert_eq!(snapshot, second);
}

#[test]
fn snapshot_version_is_checked() {
    let mut m = machine();
    let mut snapshot = m.create_snapshot();
    snapshot.version = 2;
    assert!(m.load_snapshot(&snapshot).is_err());
}

#[test]
fn memory_map_contract() {
    let mut m = machine();
    let range = m.get_ram_range();
    assert_eq!((range.start, range.end), (0x0000, 0x7FFF));

    m.write8(0x0000, 0x11);
    m.write8(0x7FFF, 0x22);
    assert_eq!(m.read8(0x0000), 0x11);
    assert_eq!(m.read8(0x7FFF), 0x22);

    // ROM windows ignore writes.
    let before = m.read8(0x9000);
    m.write8(0x9000, before.wrapping_add(1));
    assert_eq!(m.read8(0x9000), before);
}

#[test]
fn unknown_ports_read_quiescent_value() {
    let mut m = machine();
    assert_eq!(m.in8(0x00), 0x78);
    assert_eq!(m.in8(0x42), 0x78);
    assert_eq!(m.in8(0xFF), 0x78);
}

#[test]
fn strict_cpu_halts_on_undefined_opcode() {
    let mut m = Machine::new(MachineOptions {
        strict_cpu_opcodes: true,
        ..Default::default()
    })
    .unwrap();
    // ED 3F is not a documented opcode.
    m.load_program(&[0xED, 0x3F], 0).unwrap();
    m.set_program_counter(0).unwrap();
    m.tick(8);
    assert!(m.get_cpu_state().halted);
    assert!(m.cpu_fault().is_some());
    // The machine keeps servicing ticks.
    m.tick(64);
    assert!(m.get_cpu_state().halted);
}

#[test]
fn lenient_cpu_runs_undefined_as_nop() {
    let mut m = machine();
    m.load_program(&[0xED, 0x3F, 0x3E, 0x55, 0x76], 0).unwrap();
    m.set_program_counter(0).unwrap();
    m.tick(32);
    let state = m.get_cpu_state();
    assert!(state.halted); // reached HALT
    assert_eq!(state.a, 0x55);
    assert!(m.cpu_fault().is_none());
}

#[test]
fn load_program_outside_ram_is_rejected() {
    let mut m = machine();
    assert!(m.load_program(&[0x00], 0x8000).is_err());
    assert!(m.load_program(&[0u8; 0x100], 0x7FFF).is_err());
    assert!(m.set_program_counter(0x8000).is_err());
}

#[test]
fn run_transition_clears_fifo() {
    let mut m = machine();
    m.set_immediate_input_routing(false);
    m.set_key_state("KeyX", true);
    m.set_key_state("KeyX", false);
    m.execute_line("10 LET A=1");
    m.execute_line("RUN");
    assert!(m.is_runtime_program_running());
    m.tick(4);
    // The transition out of RUN flushed the queued 'X'.
    assert_eq!(m.in8(0x12), 0x00);
}

#[test]
fn warm_reset_keeps_ram_cold_reset_clears() {
    let mut m = machine();
    m.write8(0x2000, 0x5A);
    m.reset(false);
    assert_eq!(m.read8(0x2000), 0x5A);
    m.reset(true);
    assert_eq!(m.read8(0x2000), 0x00);
    assert_eq!(m.get_cpu_state().t_states, 0);
}

#[test]
fn basic_drives_hardware_through_adapter() {
    let mut m = machine();
    m.execute_line("POKE 4096,77");
    assert_eq!(m.read8(0x1000), 77);
    m.execute_line("OUT 88,128"); // LCD primary command: set Y 0
    m.execute_line("LOCATE 3,1");
    m.execute_line("PRINT \"HI\"");
    m.tick(4);
    let lines = m.get_text_lines();
    assert_eq!(&lines[1][3..5], "HI");
}

#[test]
fn timer_interrupt_wakes_halted_cpu() {
    let mut m = machine();
    // EI; IM 1; HALT at 0, handler at 0x38 stores a marker and halts.
    let program = [0xFB, 0xED, 0x56, 0x76];
    let handler = [0x3E, 0xA5, 0x32, 0x00, 0x20, 0x76]; // LD A,A5h; LD (2000h),A; HALT
    m.load_program(&program, 0).unwrap();
    m.load_program(&handler, 0x38).unwrap();
    m.set_program_counter(0).unwrap();
    m.set_stack_pointer(0x7F00);
    m.out8(0x17, 0x01); // unmask the timer interrupt
    m.tick(8192);
    assert_eq!(m.read8(0x2000), 0xA5);
}
