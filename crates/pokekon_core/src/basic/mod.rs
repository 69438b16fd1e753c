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

//! Line-numbered BASIC runtime.
//!
//! Two modes: immediate (characters arrive in the line editor, a CR parses
//! and executes the line; a leading line number edits the stored program)
//! and program (`RUN` walks stored lines in ascending order under a hard
//! statement budget). All hardware access goes through the [`Host`]
//! adapter passed into each entry point; output is queued as bytes the
//! machine drains into the LCD each tick.

pub mod expr;
pub mod host;

use std::collections::{BTreeMap, VecDeque};

use fxhash::FxHashMap;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

pub use host::{Host, NullHost};

use expr::{tokenize, Eval, Token};

/// Statements one RUN may execute before E07 aborts it.
pub const DEFAULT_STEP_BUDGET: u32 = 10_000;

/// Statements executed per pump slice.
const PUMP_SLICE: u32 = 64;

/// Auto-dimension bound for arrays used before DIM.
const AUTO_DIM: i32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BasicError {
    #[error("SYNTAX")]
    Syntax,
    #[error("BAD LINE")]
    BadLine,
    #[error("BAD VAR")]
    BadVar,
    #[error("BAD LET")]
    BadLet,
    #[error("BAD IF")]
    BadIf,
    #[error("NO LINE {0}")]
    NoLine(u16),
    #[error("RUNAWAY")]
    Runaway,
    #[error("INPUT IN RUN")]
    InputInRun,
    #[error("RETURN W/O GOSUB")]
    ReturnWithoutGosub,
    #[error("BAD STMT")]
    BadStatement,
    #[error("UNKNOWN")]
    Unknown,
}

impl BasicError {
    pub fn code(&self) -> u8 {
        match self {
            BasicError::Syntax => 1,
            BasicError::BadLine => 2,
            BasicError::BadVar => 3,
            BasicError::BadLet => 4,
            BasicError::BadIf => 5,
            BasicError::NoLine(_) => 6,
            BasicError::Runaway => 7,
            BasicError::InputInRun => 8,
            BasicError::ReturnWithoutGosub => 9,
            BasicError::BadStatement => 10,
            BasicError::Unknown => 99,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ArrayVar {
    dims: Vec<usize>,
    data: Vec<i32>,
}

impl ArrayVar {
    fn with_dims(dims: Vec<usize>) -> Self {
        let len = dims.iter().map(|d| d + 1).product();
        Self {
            dims,
            data: vec![0; len],
        }
    }

    fn offset(&self, indices: &[i32]) -> Result<usize, BasicError> {
        if indices.len() != self.dims.len() {
            return Err(BasicError::BadVar);
        }
        let mut offset = 0usize;
        for (&index, &dim) in indices.iter().zip(self.dims.iter()) {
            if index < 0 || index as usize > dim {
                return Err(BasicError::BadVar);
            }
            offset = offset * (dim + 1) + index as usize;
        }
        Ok(offset)
    }
}

/// Scalar and array stores. Names are upper-cased at the tokenizer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Variables {
    scalars: FxHashMap<String, i32>,
    arrays: FxHashMap<String, ArrayVar>,
}

impl Variables {
    pub fn get(&self, name: &str) -> i32 {
        self.scalars.get(name).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: &str, value: i32) {
        self.scalars.insert(name.to_string(), value);
    }

    pub fn clear(&mut self) {
        self.scalars.clear();
        self.arrays.clear();
    }

    pub fn dim(&mut self, name: &str, dims: Vec<usize>) {
        self.arrays.insert(name.to_string(), ArrayVar::with_dims(dims));
    }

    fn array_entry(&mut self, name: &str, rank: usize) -> &mut ArrayVar {
        self.arrays.entry(name.to_string()).or_insert_with(|| {
            // Arrays used before DIM get the classic default bound.
            ArrayVar::with_dims(vec![AUTO_DIM as usize; rank])
        })
    }

    pub fn array_get(&mut self, name: &str, indices: &[i32]) -> Result<i32, BasicError> {
        let array = self.array_entry(name, indices.len());
        let offset = array.offset(indices)?;
        Ok(array.data[offset])
    }

    pub fn array_set(&mut self, name: &str, indices: &[i32], value: i32) -> Result<(), BasicError> {
        let array = self.array_entry(name, indices.len());
        let offset = array.offset(indices)?;
        array.data[offset] = value;
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct ForFrame {
    var: String,
    limit: i32,
    step: i32,
    /// Line index the loop body restarts at.
    body_index: usize,
}

#[derive(Clone, Debug)]
struct RunState {
    /// Sorted line numbers, fixed at RUN.
    lines: Vec<u16>,
    /// Index of the next line to execute.
    index: usize,
    steps: u32,
    for_stack: Vec<ForFrame>,
    gosub_stack: Vec<usize>,
}

/// Control-flow outcome of one statement.
enum Flow {
    Continue,
    Jump(u16),
    Halt,
    StartRun,
    For { var: String, limit: i32, step: i32 },
    Next(Option<String>),
    Gosub(u16),
    Return,
}

/// Serialized runtime state for snapshots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub program: BTreeMap<u16, String>,
    pub variables: Variables,
    pub input_line: Vec<u8>,
    pub output: Vec<u8>,
    pub last_error: Option<u8>,
}

pub struct BasicRuntime {
    program: BTreeMap<u16, String>,
    vars: Variables,
    output: VecDeque<u8>,
    input_line: Vec<u8>,
    run: Option<RunState>,
    data: Vec<i32>,
    data_cursor: usize,
    step_budget: u32,
    last_error: Option<u8>,
}

impl Default for BasicRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicRuntime {
    pub fn new() -> Self {
        Self {
            program: BTreeMap::new(),
            vars: Variables::default(),
            output: VecDeque::new(),
            input_line: Vec::new(),
            run: None,
            data: Vec::new(),
            data_cursor: 0,
            step_budget: DEFAULT_STEP_BUDGET,
            last_error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn last_error(&self) -> Option<u8> {
        self.last_error
    }

    pub fn set_step_budget(&mut self, budget: u32) {
        self.step_budget = budget;
    }

    /// Next queued output byte; 0 when the queue is empty.
    pub fn pop_output_char(&mut self) -> u8 {
        self.output.pop_front().unwrap_or(0)
    }

    pub fn pop_output(&mut self) -> Option<u8> {
        self.output.pop_front()
    }

    pub fn has_output(&self) -> bool {
        !self.output.is_empty()
    }

    /// Line-editor entry: printable bytes accumulate, backspace erases,
    /// CR/LF executes. Everything is echoed through the output queue so
    /// the display tracks the editor.
    pub fn receive_char(&mut self, byte: u8, host: &mut dyn Host) {
        match byte {
            0x0D | 0x0A => {
                self.emit(b"\r\n");
                let line: Vec<u8> = std::mem::take(&mut self.input_line);
                let text = String::from_utf8_lossy(&line).into_owned();
                self.execute_line(&text, host);
            }
            0x08 | 0x7F => {
                if self.input_line.pop().is_some() {
                    self.output.push_back(0x08);
                }
            }
            _ => {
                self.input_line.push(byte);
                self.output.push_back(byte);
            }
        }
    }

    /// Parse and act on one source line: a leading line number edits the
    /// program, anything else executes immediately.
    pub fn execute_line(&mut self, text: &str, host: &mut dyn Host) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            self.edit_program_line(trimmed);
            return;
        }

        match self.exec_statement(trimmed, host, false) {
            Ok(Flow::StartRun) => self.start_run(),
            Ok(Flow::Jump(line)) => {
                // Immediate GOTO enters program mode at the target.
                self.start_run();
                if let Some(run) = &mut self.run {
                    match run.lines.binary_search(&line) {
                        Ok(i) => run.index = i,
                        Err(_) => {
                            self.run = None;
                            self.report(BasicError::NoLine(line));
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(e) => self.report(e),
        }
    }

    fn edit_program_line(&mut self, text: &str) {
        let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
        let rest = text[digits.len()..].trim();
        let Ok(number) = digits.parse::<u16>() else {
            self.report(BasicError::BadLine);
            return;
        };

        if rest.is_empty() {
            self.program.remove(&number);
            return;
        }
        if !self.statement_parses(rest) {
            self.report(BasicError::BadLine);
            return;
        }
        self.program.insert(number, rest.to_string());
    }

    /// Cheap store-time validation: the statement keyword must be known,
    /// or the line must look like an implicit LET.
    fn statement_parses(&self, src: &str) -> bool {
        let (word, _) = split_keyword(src);
        if word.is_empty() {
            return false;
        }
        if is_keyword(&word) {
            return true;
        }
        word.starts_with(|c: char| c.is_ascii_alphabetic()) && src.contains('=')
    }

    fn start_run(&mut self) {
        self.vars.clear();
        self.collect_data();
        self.data_cursor = 0;
        self.last_error = None;
        self.run = Some(RunState {
            lines: self.program.keys().copied().collect(),
            index: 0,
            steps: 0,
            for_stack: Vec::new(),
            gosub_stack: Vec::new(),
        });
    }

    fn collect_data(&mut self) {
        self.data.clear();
        for src in self.program.values() {
            let (word, rest) = split_keyword(src);
            if word == "DATA" {
                for item in rest.split(',') {
                    if let Ok(v) = item.trim().parse::<i32>() {
                        self.data.push(v);
                    }
                }
            }
        }
    }

    /// Drive one scheduler slice of a running program. No-op when idle.
    pub fn pump(&mut self, host: &mut dyn Host) {
        for _ in 0..PUMP_SLICE {
            if self.run.is_none() {
                return;
            }

            let (line_no, src) = {
                let run = self.run.as_mut().unwrap();
                if run.index >= run.lines.len() {
                    self.run = None;
                    return;
                }
                run.steps += 1;
                if run.steps > self.step_budget {
                    self.run = None;
                    self.report(BasicError::Runaway);
                    return;
                }
                let line_no = run.lines[run.index];
                run.index += 1;
                (line_no, self.program[&line_no].clone())
            };

            let flow = self.exec_statement(&src, host, true);
            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => self.run = None,
                Ok(Flow::StartRun) => self.start_run(),
                Ok(Flow::Jump(target)) => {
                    if !self.jump_to(target) {
                        return;
                    }
                }
                Ok(Flow::Gosub(target)) => {
                    let return_index = self.run.as_ref().unwrap().index;
                    if self.jump_to(target) {
                        self.run.as_mut().unwrap().gosub_stack.push(return_index);
                    }
                    else {
                        return;
                    }
                }
                Ok(Flow::Return) => {
                    let run = self.run.as_mut().unwrap();
                    match run.gosub_stack.pop() {
                        Some(index) => run.index = index,
                        None => {
                            self.run = None;
                            self.report(BasicError::ReturnWithoutGosub);
                            return;
                        }
                    }
                }
                Ok(Flow::For { var, limit, step }) => {
                    let run = self.run.as_mut().unwrap();
                    let body_index = run.index;
                    run.for_stack.push(ForFrame {
                        var,
                        limit,
                        step,
                        body_index,
                    });
                }
                Ok(Flow::Next(var)) => {
                    if !self.apply_next(var, line_no) {
                        return;
                    }
                }
                Err(e) => {
                    self.run = None;
                    self.report(e);
                    return;
                }
            }
        }
    }

    fn jump_to(&mut self, target: u16) -> bool {
        let run = self.run.as_mut().unwrap();
        match run.lines.binary_search(&target) {
            Ok(i) => {
                run.index = i;
                true
            }
            Err(_) => {
                self.run = None;
                self.report(BasicError::NoLine(target));
                false
            }
        }
    }

    fn apply_next(&mut self, var: Option<String>, at_line: u16) -> bool {
        let frame = {
            let run = self.run.as_mut().unwrap();
            let frame_pos = match &var {
                Some(name) => run.for_stack.iter().rposition(|f| &f.var == name),
                None => run.for_stack.len().checked_sub(1),
            };
            match frame_pos {
                Some(pos) => {
                    // NEXT with a name unwinds inner loops.
                    run.for_stack.truncate(pos + 1);
                    Some(run.for_stack[pos].clone())
                }
                None => None,
            }
        };
        let Some(frame) = frame else {
            self.run = None;
            log::debug!("NEXT without FOR at line {at_line}");
            self.report(BasicError::BadStatement);
            return false;
        };

        let value = self.vars.get(&frame.var).wrapping_add(frame.step);
        self.vars.set(&frame.var, value);
        let keep_going = if frame.step >= 0 {
            value <= frame.limit
        }
        else {
            value >= frame.limit
        };
        let run = self.run.as_mut().unwrap();
        if keep_going {
            run.index = frame.body_index;
        }
        else {
            run.for_stack.pop();
        }
        true
    }

    fn exec_statement(
        &mut self,
        src: &str,
        host: &mut dyn Host,
        in_run: bool,
    ) -> Result<Flow, BasicError> {
        let (word, rest) = split_keyword(src);

        match word.as_str() {
            "REM" | "DATA" => Ok(Flow::Continue),
            "NEW" => {
                self.program.clear();
                self.vars.clear();
                self.run = None;
                Ok(Flow::Continue)
            }
            "CLEAR" => {
                self.vars.clear();
                Ok(Flow::Continue)
            }
            "LIST" => {
                for (number, text) in &self.program {
                    let line = format!("{number} {text}\r\n");
                    self.output.extend(line.bytes());
                }
                Ok(Flow::Continue)
            }
            "RUN" => Ok(Flow::StartRun),
            "END" | "STOP" => Ok(Flow::Halt),
            "CLS" => {
                host.clear_lcd();
                Ok(Flow::Continue)
            }
            "RESTORE" => {
                self.data_cursor = 0;
                Ok(Flow::Continue)
            }
            "RETURN" => {
                if in_run {
                    Ok(Flow::Return)
                }
                else {
                    Err(BasicError::ReturnWithoutGosub)
                }
            }
            "GOTO" => {
                let target = self.line_operand(rest, host)?;
                Ok(Flow::Jump(target))
            }
            "GOSUB" => {
                if !in_run {
                    return Err(BasicError::BadStatement);
                }
                let target = self.line_operand(rest, host)?;
                Ok(Flow::Gosub(target))
            }
            "IF" => self.stmt_if(rest, host),
            "PRINT" => {
                self.stmt_print(rest, host, false)?;
                Ok(Flow::Continue)
            }
            "LPRINT" => {
                self.stmt_print(rest, host, true)?;
                Ok(Flow::Continue)
            }
            "LET" => {
                self.stmt_let(rest, host).map_err(|e| match e {
                    BasicError::Syntax => BasicError::BadLet,
                    other => other,
                })?;
                Ok(Flow::Continue)
            }
            "INPUT" => self.stmt_input(rest, host, in_run),
            "FOR" => {
                if !in_run {
                    return Err(BasicError::BadStatement);
                }
                self.stmt_for(rest, host)
            }
            "NEXT" => {
                if !in_run {
                    return Err(BasicError::BadStatement);
                }
                let var = {
                    let rest = rest.trim();
                    if rest.is_empty() {
                        None
                    }
                    else {
                        Some(rest.to_ascii_uppercase())
                    }
                };
                Ok(Flow::Next(var))
            }
            "DIM" => {
                self.stmt_dim(rest, host)?;
                Ok(Flow::Continue)
            }
            "READ" => {
                self.stmt_read(rest, host)?;
                Ok(Flow::Continue)
            }
            "POKE" => {
                let (addr, value) = self.two_operands(rest, host)?;
                host.poke8(addr as u16, value as u8);
                Ok(Flow::Continue)
            }
            "OUT" => {
                let (port, value) = self.two_operands(rest, host)?;
                host.out8(port as u8, value as u8);
                Ok(Flow::Continue)
            }
            "LOCATE" => {
                let (col, row) = self.two_operands(rest, host)?;
                host.set_text_cursor(col.max(0) as usize, row.max(0) as usize);
                Ok(Flow::Continue)
            }
            "PSET" => {
                let (x, y) = self.two_operands(rest, host)?;
                host.set_pixel(x.max(0) as usize, y.max(0) as usize, true);
                Ok(Flow::Continue)
            }
            "PRESET" => {
                let (x, y) = self.two_operands(rest, host)?;
                host.set_pixel(x.max(0) as usize, y.max(0) as usize, false);
                Ok(Flow::Continue)
            }
            "BEEP" => {
                self.stmt_beep(rest, host)?;
                Ok(Flow::Continue)
            }
            "WAIT" => {
                self.stmt_wait(rest, host)?;
                Ok(Flow::Continue)
            }
            _ => {
                // Implicit LET.
                if word.starts_with(|c: char| c.is_ascii_alphabetic()) && src.contains('=') {
                    self.stmt_let(src, host).map_err(|e| match e {
                        BasicError::Syntax => BasicError::BadLet,
                        other => other,
                    })?;
                    Ok(Flow::Continue)
                }
                else if word.is_empty() {
                    Err(BasicError::Syntax)
                }
                else {
                    Err(BasicError::BadStatement)
                }
            }
        }
    }

    fn line_operand(&mut self, rest: &str, host: &mut dyn Host) -> Result<u16, BasicError> {
        let tokens = tokenize(rest)?;
        let mut eval = Eval::new(&tokens, &mut self.vars, host);
        let value = eval.expression()?;
        if !eval.at_end() || !(0..=0xFFFF).contains(&value) {
            return Err(BasicError::Syntax);
        }
        Ok(value as u16)
    }

    fn two_operands(&mut self, rest: &str, host: &mut dyn Host) -> Result<(i32, i32), BasicError> {
        let tokens = tokenize(rest)?;
        let mut eval = Eval::new(&tokens, &mut self.vars, host);
        let a = eval.expression()?;
        eval.expect(&Token::Comma)?;
        let b = eval.expression()?;
        if !eval.at_end() {
            return Err(BasicError::Syntax);
        }
        Ok((a, b))
    }

    fn stmt_if(&mut self, rest: &str, host: &mut dyn Host) -> Result<Flow, BasicError> {
        let tokens = tokenize(rest).map_err(|_| BasicError::BadIf)?;
        let mut eval = Eval::new(&tokens, &mut self.vars, host);
        let condition = eval.expression().map_err(|_| BasicError::BadIf)?;
        match eval.next().cloned() {
            Some(Token::Ident(word)) if word == "THEN" => {}
            _ => return Err(BasicError::BadIf),
        }
        let target = match eval.next().cloned() {
            Some(Token::Number(n)) if (0..=0xFFFF).contains(&n) => n as u16,
            _ => return Err(BasicError::BadIf),
        };
        if !eval.at_end() {
            return Err(BasicError::BadIf);
        }
        if condition != 0 {
            Ok(Flow::Jump(target))
        }
        else {
            Ok(Flow::Continue)
        }
    }

    fn stmt_print(
        &mut self,
        rest: &str,
        host: &mut dyn Host,
        to_printer: bool,
    ) -> Result<(), BasicError> {
        let tokens = tokenize(rest)?;
        let mut pieces: Vec<u8> = Vec::new();
        let mut newline = true;
        {
            let mut eval = Eval::new(&tokens, &mut self.vars, host);
            while !eval.at_end() {
                match eval.peek().cloned() {
                    Some(Token::Str(s)) => {
                        eval.next();
                        pieces.extend(s.bytes());
                    }
                    Some(Token::Semicolon) => {
                        // Joins items; trailing form suppresses the newline.
                        eval.next();
                        if eval.at_end() {
                            newline = false;
                        }
                    }
                    Some(Token::Comma) => {
                        eval.next();
                        if eval.at_end() {
                            newline = false;
                        }
                        else {
                            pieces.push(b' ');
                        }
                    }
                    _ => {
                        let value = eval.expression()?;
                        pieces.extend(value.to_string().bytes());
                    }
                }
            }
        }
        if newline {
            pieces.extend(b"\r\n");
        }
        if to_printer {
            for byte in pieces {
                host.print_to_printer(byte);
            }
        }
        else {
            self.output.extend(pieces);
        }
        Ok(())
    }

    fn stmt_let(&mut self, src: &str, host: &mut dyn Host) -> Result<(), BasicError> {
        let tokens = tokenize(src)?;
        let mut eval = Eval::new(&tokens, &mut self.vars, host);

        let name = match eval.next().cloned() {
            Some(Token::Ident(name)) if name.starts_with(|c: char| c.is_ascii_alphabetic()) => name,
            _ => return Err(BasicError::BadVar),
        };

        if eval.eat(&Token::LParen) {
            let indices = eval.index_list()?;
            eval.expect(&Token::Eq)?;
            let value = eval.expression()?;
            if !eval.at_end() {
                return Err(BasicError::Syntax);
            }
            self.vars.array_set(&name, &indices, value)
        }
        else {
            eval.expect(&Token::Eq)?;
            let value = eval.expression()?;
            if !eval.at_end() {
                return Err(BasicError::Syntax);
            }
            self.vars.set(&name, value);
            Ok(())
        }
    }

    fn stmt_input(
        &mut self,
        rest: &str,
        host: &mut dyn Host,
        in_run: bool,
    ) -> Result<Flow, BasicError> {
        if in_run {
            return Err(BasicError::InputInRun);
        }
        // The immediate-mode editor has no second input channel; prompt
        // and bind zero.
        let tokens = tokenize(rest)?;
        let mut eval = Eval::new(&tokens, &mut self.vars, host);
        let name = match eval.next().cloned() {
            Some(Token::Ident(name)) => name,
            _ => return Err(BasicError::BadVar),
        };
        self.emit(b"? \r\n");
        self.vars.set(&name, 0);
        Ok(Flow::Continue)
    }

    fn stmt_for(&mut self, rest: &str, host: &mut dyn Host) -> Result<Flow, BasicError> {
        let tokens = tokenize(rest)?;
        let mut eval = Eval::new(&tokens, &mut self.vars, host);
        let var = match eval.next().cloned() {
            Some(Token::Ident(name)) if name.starts_with(|c: char| c.is_ascii_alphabetic()) => name,
            _ => return Err(BasicError::BadVar),
        };
        eval.expect(&Token::Eq)?;
        let start = eval.expression()?;
        match eval.next().cloned() {
            Some(Token::Ident(word)) if word == "TO" => {}
            _ => return Err(BasicError::Syntax),
        }
        let limit = eval.expression()?;
        let step = match eval.next().cloned() {
            None => 1,
            Some(Token::Ident(word)) if word == "STEP" => {
                let s = eval.expression()?;
                if !eval.at_end() {
                    return Err(BasicError::Syntax);
                }
                s
            }
            _ => return Err(BasicError::Syntax),
        };
        self.vars.set(&var, start);
        Ok(Flow::For { var, limit, step })
    }

    fn stmt_dim(&mut self, rest: &str, host: &mut dyn Host) -> Result<(), BasicError> {
        let tokens = tokenize(rest)?;
        let mut declarations: Vec<(String, Vec<usize>)> = Vec::new();
        {
            let mut eval = Eval::new(&tokens, &mut self.vars, host);
            loop {
                let name = match eval.next().cloned() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(BasicError::BadVar),
                };
                eval.expect(&Token::LParen)?;
                let bounds = eval.index_list()?;
                let mut dims = Vec::with_capacity(bounds.len());
                for bound in bounds {
                    if bound < 0 {
                        return Err(BasicError::BadVar);
                    }
                    dims.push(bound as usize);
                }
                declarations.push((name, dims));
                if !eval.eat(&Token::Comma) {
                    break;
                }
            }
            if !eval.at_end() {
                return Err(BasicError::Syntax);
            }
        }
        for (name, dims) in declarations {
            self.vars.dim(&name, dims);
        }
        Ok(())
    }

    fn stmt_read(&mut self, rest: &str, host: &mut dyn Host) -> Result<(), BasicError> {
        let tokens = tokenize(rest)?;
        let mut names: Vec<(String, Option<Vec<i32>>)> = Vec::new();
        {
            let mut eval = Eval::new(&tokens, &mut self.vars, host);
            loop {
                let name = match eval.next().cloned() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(BasicError::BadVar),
                };
                let indices = if eval.eat(&Token::LParen) {
                    Some(eval.index_list()?)
                }
                else {
                    None
                };
                names.push((name, indices));
                if !eval.eat(&Token::Comma) {
                    break;
                }
            }
            if !eval.at_end() {
                return Err(BasicError::Syntax);
            }
        }
        for (name, indices) in names {
            let Some(&value) = self.data.get(self.data_cursor) else {
                return Err(BasicError::Unknown);
            };
            self.data_cursor += 1;
            match indices {
                Some(idx) => self.vars.array_set(&name, &idx, value)?,
                None => self.vars.set(&name, value),
            }
        }
        Ok(())
    }

    fn stmt_beep(&mut self, rest: &str, host: &mut dyn Host) -> Result<(), BasicError> {
        let rest = rest.trim();
        let mut j = 1;
        let mut n = 0;
        if !rest.is_empty() {
            let tokens = tokenize(rest)?;
            let mut eval = Eval::new(&tokens, &mut self.vars, host);
            j = eval.expression()?;
            if eval.eat(&Token::Comma) {
                let _k = eval.expression()?;
                if eval.eat(&Token::Comma) {
                    n = eval.expression()?;
                }
            }
            if !eval.at_end() {
                return Err(BasicError::Syntax);
            }
        }
        let duration = (125i64 * i64::from(n + 1) * i64::from(j)).clamp(1000, 3000) as u32;
        host.sleep_ms(duration);
        Ok(())
    }

    fn stmt_wait(&mut self, rest: &str, host: &mut dyn Host) -> Result<(), BasicError> {
        let rest = rest.trim();
        if rest.is_empty() {
            host.sleep_ms(1000);
            return Ok(());
        }
        let tokens = tokenize(rest)?;
        let mut eval = Eval::new(&tokens, &mut self.vars, host);
        let n = eval.expression()?;
        if !eval.at_end() {
            return Err(BasicError::Syntax);
        }
        if n > 0 {
            host.sleep_ms((n as u32).saturating_mul(1000) / 64);
        }
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.output.extend(bytes.iter().copied());
    }

    /// Print `ERR <message> (E<code>)` through the output queue.
    fn report(&mut self, error: BasicError) {
        self.last_error = Some(error.code());
        let line = format!("ERR {} (E{:02})\r\n", error, error.code());
        log::debug!("BASIC error: {}", line.trim_end());
        self.emit(line.as_bytes());
    }

    pub fn state(&self) -> RuntimeState {
        RuntimeState {
            program: self.program.clone(),
            variables: self.vars.clone(),
            input_line: self.input_line.clone(),
            output: self.output.iter().copied().collect(),
            last_error: self.last_error,
        }
    }

    pub fn restore(&mut self, state: &RuntimeState) {
        self.program = state.program.clone();
        self.vars = state.variables.clone();
        self.input_line = state.input_line.clone();
        self.output = state.output.iter().copied().collect();
        self.last_error = state.last_error;
        self.run = None;
        self.data.clear();
        self.data_cursor = 0;
    }
}

/// Leading keyword (upper-cased) and the remainder of the statement.
fn split_keyword(src: &str) -> (String, &str) {
    let trimmed = src.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(trimmed.len());
    let word = trimmed[..end].to_ascii_uppercase();
    (word, trimmed[end..].trim_start())
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "NEW" | "LIST" | "RUN" | "PRINT" | "LPRINT" | "LET" | "INPUT" | "GOTO" | "GOSUB"
            | "RETURN" | "IF" | "END" | "STOP" | "CLS" | "REM" | "FOR" | "NEXT" | "DIM"
            | "DATA" | "READ" | "RESTORE" | "POKE" | "OUT" | "BEEP" | "WAIT" | "LOCATE"
            | "PSET" | "PRESET" | "CLEAR"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rt: &mut BasicRuntime) -> String {
        let mut out = Vec::new();
        while let Some(b) = rt.pop_output() {
            out.push(b);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    fn run_program(lines: &[&str]) -> (BasicRuntime, String) {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        for line in lines {
            rt.execute_line(line, &mut host);
        }
        rt.execute_line("RUN", &mut host);
        while rt.is_running() {
            rt.pump(&mut host);
        }
        let out = drain(&mut rt);
        (rt, out)
    }

    #[test]
    fn print_string_and_number() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("PRINT \"HI\"", &mut host);
        rt.execute_line("PRINT 2+3", &mut host);
        assert_eq!(drain(&mut rt), "HI\r\n5\r\n");
    }

    #[test]
    fn implicit_and_explicit_let() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("LET A=5", &mut host);
        rt.execute_line("B=A*2", &mut host);
        rt.execute_line("PRINT B", &mut host);
        assert_eq!(drain(&mut rt), "10\r\n");
    }

    #[test]
    fn program_edit_and_list() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("20 PRINT 2", &mut host);
        rt.execute_line("10 PRINT 1", &mut host);
        rt.execute_line("LIST", &mut host);
        assert_eq!(drain(&mut rt), "10 PRINT 1\r\n20 PRINT 2\r\n");
        // Empty statement deletes the line.
        rt.execute_line("10", &mut host);
        rt.execute_line("LIST", &mut host);
        assert_eq!(drain(&mut rt), "20 PRINT 2\r\n");
    }

    #[test]
    fn run_in_line_order() {
        let (_, out) = run_program(&["20 PRINT 2", "10 PRINT 1"]);
        assert_eq!(out, "1\r\n2\r\n");
    }

    #[test]
    fn if_then_skips_branch() {
        // Scenario S5 from the machine contract.
        let (_, out) = run_program(&[
            "10 LET A=1",
            "20 IF A=1 THEN 40",
            "30 PRINT 0",
            "40 PRINT 9",
        ]);
        assert!(out.contains('9'));
        assert!(!out.contains("0\r\n"));
    }

    #[test]
    fn goto_and_no_line_error() {
        let (rt, out) = run_program(&["10 GOTO 100"]);
        assert!(out.contains("ERR NO LINE 100 (E06)"));
        assert_eq!(rt.last_error(), Some(6));
    }

    #[test]
    fn gosub_return() {
        let (_, out) = run_program(&[
            "10 GOSUB 100",
            "20 PRINT 2",
            "30 END",
            "100 PRINT 1",
            "110 RETURN",
        ]);
        assert_eq!(out, "1\r\n2\r\n");
    }

    #[test]
    fn return_without_gosub() {
        let (_, out) = run_program(&["10 RETURN"]);
        assert!(out.contains("(E09)"));
    }

    #[test]
    fn for_next_loop() {
        let (_, out) = run_program(&["10 FOR I=1 TO 3", "20 PRINT I", "30 NEXT I"]);
        assert_eq!(out, "1\r\n2\r\n3\r\n");
    }

    #[test]
    fn for_with_step() {
        let (_, out) = run_program(&["10 FOR I=4 TO 0 STEP -2", "20 PRINT I", "30 NEXT"]);
        assert_eq!(out, "4\r\n2\r\n0\r\n");
    }

    #[test]
    fn runaway_budget() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.set_step_budget(100);
        rt.execute_line("10 GOTO 10", &mut host);
        rt.execute_line("RUN", &mut host);
        while rt.is_running() {
            rt.pump(&mut host);
        }
        let out = drain(&mut rt);
        assert!(out.contains("ERR RUNAWAY (E07)"));
    }

    #[test]
    fn dim_read_data_restore() {
        let (_, out) = run_program(&[
            "10 DIM A(5)",
            "20 DATA 7,8,9",
            "30 READ A(0),A(1)",
            "40 PRINT A(0)+A(1)",
            "50 RESTORE",
            "60 READ B",
            "70 PRINT B",
        ]);
        assert_eq!(out, "15\r\n7\r\n");
    }

    #[test]
    fn poke_peek_out_inp_via_host() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("POKE 100,42", &mut host);
        rt.execute_line("PRINT PEEK(100)", &mut host);
        rt.execute_line("OUT 16,7", &mut host);
        rt.execute_line("PRINT INP(16)", &mut host);
        assert_eq!(drain(&mut rt), "42\r\n7\r\n");
        assert_eq!(host.memory[100], 42);
        assert_eq!(host.ports[16], 7);
    }

    #[test]
    fn input_in_run_is_error() {
        let (_, out) = run_program(&["10 INPUT A"]);
        assert!(out.contains("(E08)"));
    }

    #[test]
    fn bad_statement_reports_e10() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("FROBNICATE", &mut host);
        assert!(drain(&mut rt).contains("(E10)"));
    }

    #[test]
    fn storing_garbage_line_reports_e02() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("10 %%%", &mut host);
        assert!(drain(&mut rt).contains("(E02)"));
    }

    #[test]
    fn line_editor_executes_on_cr() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        for b in b"PRINT 5" {
            rt.receive_char(*b, &mut host);
        }
        rt.receive_char(0x0D, &mut host);
        let out = drain(&mut rt);
        // Echo, then newline, then the result.
        assert_eq!(out, "PRINT 5\r\n5\r\n");
    }

    #[test]
    fn backspace_edits_line() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        for b in b"PRINT 7X" {
            rt.receive_char(*b, &mut host);
        }
        rt.receive_char(0x08, &mut host);
        rt.receive_char(0x0D, &mut host);
        let out = drain(&mut rt);
        assert!(out.ends_with("7\r\n"));
    }

    #[test]
    fn lprint_goes_to_printer() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("LPRINT \"OK\"", &mut host);
        assert_eq!(host.printer, b"OK\r\n");
        assert_eq!(drain(&mut rt), "");
    }

    #[test]
    fn arrays_two_dimensional() {
        let (_, out) = run_program(&[
            "10 DIM M(2,2)",
            "20 M(1,2)=9",
            "30 PRINT M(1,2)",
            "40 PRINT M(0,0)",
        ]);
        assert_eq!(out, "9\r\n0\r\n");
    }

    #[test]
    fn state_round_trip() {
        let mut rt = BasicRuntime::new();
        let mut host = NullHost::new();
        rt.execute_line("10 PRINT 1", &mut host);
        rt.execute_line("A=7", &mut host);
        let state = rt.state();
        let mut other = BasicRuntime::new();
        other.restore(&state);
        other.execute_line("PRINT A", &mut host);
        other.execute_line("LIST", &mut host);
        let out = drain(&mut other);
        assert!(out.contains("7\r\n"));
        assert!(out.contains("10 PRINT 1"));
    }
}
