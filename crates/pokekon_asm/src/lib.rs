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

//! Two-pass Z80 assembler for the PC-G815 RAM window.
//!
//! `assemble` is a pure function from source text to an artifact bundle:
//! the binary image, listing, symbol dump, hex dump and a diagnostic
//! list. Diagnostics never abort the run; `ok` is false when any carries
//! error severity. Pass 1 sizes every line and binds labels, EQU
//! definitions iterate to a fixed point, pass 2 emits bytes into a sparse
//! 64 KiB image that is flattened from the first origin (or the lowest
//! written address) to the highest written address.

pub mod encoder;
pub mod expr;
pub mod lexer;
pub mod listing;
pub mod symbols;

use expr::EvalCtx;
use lexer::SourceLine;
use symbols::SymbolTable;

/// RAM window accepted by ORG.
pub const ORG_MIN: u16 = 0x0000;
pub const ORG_MAX: u16 = 0x7FFF;

const DEFAULT_FILE: &str = "<input>";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    /// 1-based source line.
    pub line: usize,
    /// 0-based column; best effort.
    pub column: usize,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct ListingRecord {
    pub file: String,
    pub line: usize,
    pub address: u16,
    pub bytes: Vec<u8>,
    pub source: String,
}

/// `fn(current_file, path) -> Option<(resolved_name, source)>`.
pub type IncludeResolver<'a> = dyn Fn(&str, &str) -> Option<(String, String)> + 'a;

#[derive(Default)]
pub struct AssembleOptions<'a> {
    pub filename: Option<String>,
    pub include_resolver: Option<&'a IncludeResolver<'a>>,
}

pub struct Assembly {
    /// No error-severity diagnostics.
    pub ok: bool,
    pub origin: u16,
    pub entry: u16,
    pub binary: Vec<u8>,
    pub dump: String,
    pub lst: String,
    pub sym: String,
    pub listing: Vec<ListingRecord>,
    /// (name, value) pairs sorted by value.
    pub symbols: Vec<(String, i64)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-line result of pass 1.
struct LinePlan {
    addr: u32,
    size: usize,
}

struct StagedEqu {
    name: String,
    expr: String,
    addr: u16,
    file: String,
    line: usize,
    column: usize,
}

struct Assembler<'a> {
    options: AssembleOptions<'a>,
    lines: Vec<SourceLine>,
    plans: Vec<LinePlan>,
    symbols: SymbolTable,
    equs: Vec<StagedEqu>,
    diagnostics: Vec<Diagnostic>,
    first_origin: Option<u16>,
    entry_expr: Option<(String, String, usize)>,
    /// Index of the line after which END stopped assembly.
    end_index: usize,
}

pub fn assemble(source: &str, options: AssembleOptions) -> Assembly {
    let root_file = options
        .filename
        .clone()
        .unwrap_or_else(|| DEFAULT_FILE.to_string());

    let mut asm = Assembler {
        options,
        lines: Vec::new(),
        plans: Vec::new(),
        symbols: SymbolTable::new(),
        equs: Vec::new(),
        diagnostics: Vec::new(),
        first_origin: None,
        entry_expr: None,
        end_index: usize::MAX,
    };

    let mut include_stack = vec![root_file.clone()];
    asm.collect(&root_file, source, &mut include_stack);
    asm.pass1();
    asm.resolve_equs();
    asm.pass2()
}

impl Assembler<'_> {
    fn error(&mut self, line: &SourceLine, column: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            file: line.file.clone(),
            line: line.line,
            column,
            message: message.into(),
        });
    }

    /// Expand includes depth-first into a flat line list.
    fn collect(&mut self, file: &str, source: &str, stack: &mut Vec<String>) {
        for line in lexer::analyze_source(file, source) {
            if line.mnemonic.as_deref() == Some("INCLUDE") {
                self.collect_include(&line, stack);
                continue;
            }
            self.lines.push(line);
        }
    }

    fn collect_include(&mut self, line: &SourceLine, stack: &mut Vec<String>) {
        let Some(resolver) = self.options.include_resolver else {
            self.error(line, 0, "INCLUDE is not available without a resolver");
            return;
        };
        let Some(raw_path) = line.operands.first() else {
            self.error(line, 0, "INCLUDE requires a path");
            return;
        };
        let path = raw_path.trim_matches('"');
        let Some((resolved, source)) = resolver(&line.file, path) else {
            self.error(line, 0, format!("cannot resolve include {path:?}"));
            return;
        };
        if stack.contains(&resolved) {
            self.error(line, 0, format!("recursive include of {resolved:?}"));
            return;
        }
        stack.push(resolved.clone());
        self.collect(&resolved, &source, stack);
        stack.pop();
    }

    /// Size every line, bind labels, stage EQUs, record origins.
    fn pass1(&mut self) {
        let mut addr: u32 = 0;

        for index in 0..self.lines.len() {
            let line = self.lines[index].clone();
            let mut size = 0usize;

            if index >= self.end_index {
                self.plans.push(LinePlan { addr, size: 0 });
                continue;
            }

            let mnemonic = line.mnemonic.clone().unwrap_or_default();

            // Labels bind to the address at line start; EQU labels bind to
            // the expression value instead.
            if let Some(label) = &line.label {
                if mnemonic != "EQU" && !self.symbols.define(label, i64::from(addr as u16)) {
                    self.error(&line, 0, format!("duplicate symbol {label}"));
                }
            }

            match mnemonic.as_str() {
                "" => {}
                "ORG" => {
                    if let Some(target) = self.eval_now(&line, line.operands.first()) {
                        if (i64::from(ORG_MIN)..=i64::from(ORG_MAX)).contains(&target) {
                            addr = target as u32;
                            if self.first_origin.is_none() {
                                self.first_origin = Some(target as u16);
                            }
                        }
                        else {
                            self.error(
                                &line,
                                0,
                                format!("ORG {target:#06X} outside RAM 0000h..7FFFh"),
                            );
                        }
                    }
                }
                "ENTRY" => {
                    if let Some(expr) = line.operands.first() {
                        self.entry_expr = Some((expr.clone(), line.file.clone(), line.line));
                    }
                    else {
                        self.error(&line, 0, "ENTRY requires an expression");
                    }
                }
                "EQU" => match (&line.label, line.operands.first()) {
                    (Some(label), Some(expr)) => self.equs.push(StagedEqu {
                        name: label.clone(),
                        expr: expr.clone(),
                        addr: addr as u16,
                        file: line.file.clone(),
                        line: line.line,
                        column: 0,
                    }),
                    _ => self.error(&line, 0, "EQU requires a label and an expression"),
                },
                "END" => {
                    self.end_index = index;
                }
                "DB" | "DEFB" => {
                    size = line
                        .operands
                        .iter()
                        .map(|op| match encoder::parse_operand(op) {
                            encoder::Operand::Str(s) => unescape(&s).len(),
                            _ => 1,
                        })
                        .sum();
                }
                "DW" | "DEFW" => {
                    size = line.operands.len() * 2;
                }
                "DS" | "DEFS" => {
                    // The reserve count must resolve in pass 1; forward
                    // references cannot size storage.
                    if let Some(count) = self.eval_now(&line, line.operands.first()) {
                        if count >= 0 {
                            size = count as usize;
                        }
                        else {
                            self.error(&line, 0, format!("negative DS count {count}"));
                        }
                    }
                }
                _ => {
                    let ctx = EvalCtx {
                        symbols: &self.symbols,
                        addr: addr as u16,
                        for_size: true,
                    };
                    match encoder::encode(&mnemonic, &line.operands, &ctx) {
                        Ok(bytes) => size = bytes.len(),
                        // Shape errors recur identically in pass 2, where
                        // they are reported with values resolved.
                        Err(_) => size = 0,
                    }
                }
            }

            self.plans.push(LinePlan { addr, size });
            addr += size as u32;
        }
    }

    /// Evaluate an expression that must resolve during pass 1.
    fn eval_now(&mut self, line: &SourceLine, expr: Option<&String>) -> Option<i64> {
        let Some(expr) = expr else {
            self.error(line, 0, "missing expression");
            return None;
        };
        let ctx = EvalCtx {
            symbols: &self.symbols,
            addr: self.plans.last().map_or(0, |p| (p.addr + p.size as u32) as u16),
            for_size: false,
        };
        match ctx.eval(expr) {
            Ok(v) => Some(v),
            Err(message) => {
                self.error(line, 0, message);
                None
            }
        }
    }

    /// Iterate EQU resolution to a fixed point, then report leftovers.
    fn resolve_equs(&mut self) {
        let mut pending: Vec<usize> = (0..self.equs.len()).collect();
        loop {
            let mut progressed = false;
            pending.retain(|&i| {
                let equ = &self.equs[i];
                let ctx = EvalCtx {
                    symbols: &self.symbols,
                    addr: equ.addr,
                    for_size: false,
                };
                match ctx.eval(&equ.expr) {
                    Ok(value) => {
                        if !self.symbols.define_equ(&equ.name, value) {
                            self.diagnostics.push(Diagnostic {
                                severity: Severity::Error,
                                file: equ.file.clone(),
                                line: equ.line,
                                column: equ.column,
                                message: format!("duplicate symbol {}", equ.name),
                            });
                        }
                        progressed = true;
                        false
                    }
                    Err(_) => true,
                }
            });
            if !progressed || pending.is_empty() {
                break;
            }
        }
        for &i in &pending {
            let equ = &self.equs[i];
            self.diagnostics.push(Diagnostic {
                severity: Severity::Error,
                file: equ.file.clone(),
                line: equ.line,
                column: equ.column,
                message: format!("unresolved EQU {} = {}", equ.name, equ.expr),
            });
        }
    }

    /// Emit bytes at the pass-1 addresses and build the artifacts.
    fn pass2(mut self) -> Assembly {
        let mut memory = vec![0u8; 0x10000];
        let mut written = vec![false; 0x10000];
        let mut min_written = usize::MAX;
        let mut max_written = 0usize;
        let mut records: Vec<ListingRecord> = Vec::new();

        for index in 0..self.lines.len().min(self.end_index) {
            let line = self.lines[index].clone();
            let addr = self.plans[index].addr;
            let planned = self.plans[index].size;
            let mnemonic = line.mnemonic.clone().unwrap_or_default();

            let mut bytes: Vec<u8> = Vec::new();
            match mnemonic.as_str() {
                "" | "ORG" | "ENTRY" | "EQU" | "END" => {}
                "DB" | "DEFB" => {
                    for op in &line.operands {
                        match encoder::parse_operand(op) {
                            encoder::Operand::Str(s) => bytes.extend(unescape(&s)),
                            _ => {
                                let ctx = self.emit_ctx(addr as u16);
                                match ctx.eval(op) {
                                    Ok(v) if (-128..=255).contains(&v) => bytes.push(v as u8),
                                    Ok(v) => {
                                        self.error(&line, 0, format!("DB value {v} out of range"));
                                        bytes.push(0);
                                    }
                                    Err(message) => {
                                        self.error(&line, 0, message);
                                        bytes.push(0);
                                    }
                                }
                            }
                        }
                    }
                }
                "DW" | "DEFW" => {
                    for op in &line.operands {
                        let ctx = self.emit_ctx(addr as u16);
                        match ctx.eval(op) {
                            Ok(v) if (-32768..=65535).contains(&v) => {
                                bytes.extend((v as u16).to_le_bytes());
                            }
                            Ok(v) => {
                                self.error(&line, 0, format!("DW value {v} out of range"));
                                bytes.extend([0, 0]);
                            }
                            Err(message) => {
                                self.error(&line, 0, message);
                                bytes.extend([0, 0]);
                            }
                        }
                    }
                }
                "DS" | "DEFS" => {
                    let fill = match line.operands.get(1) {
                        Some(expr) => {
                            let ctx = self.emit_ctx(addr as u16);
                            match ctx.eval(expr) {
                                Ok(v) => v as u8,
                                Err(message) => {
                                    self.error(&line, 0, message);
                                    0
                                }
                            }
                        }
                        None => 0,
                    };
                    bytes = vec![fill; planned];
                }
                _ => {
                    let ctx = self.emit_ctx(addr as u16);
                    match encoder::encode(&mnemonic, &line.operands, &ctx) {
                        Ok(encoded) => bytes = encoded,
                        Err(message) => {
                            let column = line.text.find(&mnemonic).unwrap_or(0);
                            self.error(&line, column, message);
                        }
                    }
                }
            }

            if bytes.is_empty() {
                continue;
            }
            if addr as usize + bytes.len() > 0x10000 {
                self.error(&line, 0, "emission past the top of the address space");
                continue;
            }
            for (offset, &b) in bytes.iter().enumerate() {
                let at = addr as usize + offset;
                memory[at] = b;
                written[at] = true;
                min_written = min_written.min(at);
                max_written = max_written.max(at);
            }
            records.push(ListingRecord {
                file: line.file.clone(),
                line: line.line,
                address: addr as u16,
                bytes,
                source: line.text.trim().to_string(),
            });
        }

        // Flatten the sparse image.
        let origin = match (self.first_origin, min_written) {
            (Some(org), usize::MAX) => org,
            (Some(org), min) => org.min(min as u16),
            (None, usize::MAX) => 0,
            (None, min) => min as u16,
        };
        let binary = if min_written == usize::MAX {
            Vec::new()
        }
        else {
            memory[origin as usize..=max_written].to_vec()
        };

        let entry = match self.entry_expr.take() {
            Some((expr, file, line_no)) => {
                let ctx = self.emit_ctx(origin);
                match ctx.eval(&expr) {
                    Ok(v) => v as u16,
                    Err(message) => {
                        self.diagnostics.push(Diagnostic {
                            severity: Severity::Error,
                            file,
                            line: line_no,
                            column: 0,
                            message,
                        });
                        origin
                    }
                }
            }
            None => origin,
        };

        let ok = !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error);
        log::debug!(
            "assembled {} bytes at {origin:04X}h, {} symbols, {} diagnostics",
            binary.len(),
            self.symbols.len(),
            self.diagnostics.len()
        );

        let symbols_sorted: Vec<(String, i64)> = self
            .symbols
            .sorted_by_value()
            .into_iter()
            .map(|s| (s.name.clone(), s.value))
            .collect();

        Assembly {
            ok,
            origin,
            entry,
            dump: listing::render_dump(origin, &binary),
            lst: listing::render_lst(&records),
            sym: listing::render_sym(&self.symbols),
            binary,
            listing: records,
            symbols: symbols_sorted,
            diagnostics: self.diagnostics,
        }
    }

    fn emit_ctx(&self, addr: u16) -> EvalCtx<'_> {
        EvalCtx {
            symbols: &self.symbols,
            addr,
            for_size: false,
        }
    }
}

/// Decode the escapes of a DB string literal.
fn unescape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'0') => out.push(0),
            Some(b'\\') => out.push(b'\\'),
            Some(b'\'') => out.push(b'\''),
            Some(b'"') => out.push(b'"'),
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }
    out
}
