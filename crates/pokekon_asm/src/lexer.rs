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

//! Source-line analysis.
//!
//! Splits source text into records of label / mnemonic / operands. The
//! comment stripper and operand splitter respect quotes and parentheses,
//! so `LD A,';'` and `LD HL,(TAB,X)`-style operands survive intact.

/// One analyzed source line.
#[derive(Clone, Debug, Default)]
pub struct SourceLine {
    pub file: String,
    /// 1-based line number within `file`.
    pub line: usize,
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub operands: Vec<String>,
    /// Original text with the comment removed, for listings.
    pub text: String,
}

/// Strip a `;` comment that sits outside any quote.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b';' if !in_single && !in_double => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split an operand field on commas, respecting parentheses and quotes.
pub fn split_operands(field: &str) -> Vec<String> {
    let mut operands = Vec::new();
    let mut depth = 0i32;
    let mut in_single = false;
    let mut in_double = false;
    let mut current = String::new();

    for c in field.chars() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '(' if !in_single && !in_double => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_single && !in_double => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 && !in_single && !in_double => {
                operands.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        operands.push(current.trim().to_string());
    }
    operands
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn is_label_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

/// Analyze one physical line.
///
/// Labels are recognized as `NAME:` or as `NAME EQU …`; everything after
/// the label splits into mnemonic + operand list.
pub fn analyze_line(file: &str, line_no: usize, raw: &str) -> SourceLine {
    let text = strip_comment(raw);
    let mut out = SourceLine {
        file: file.to_string(),
        line: line_no,
        text: text.trim_end().to_string(),
        ..Default::default()
    };

    let mut rest = text.trim_start();

    // `NAME:` label form.
    if let Some(colon) = rest.find(':') {
        let candidate = &rest[..colon];
        if !candidate.is_empty()
            && candidate.chars().next().is_some_and(is_label_start)
            && candidate.chars().all(is_label_char)
        {
            out.label = Some(candidate.to_string());
            rest = rest[colon + 1..].trim_start();
        }
    }

    // `NAME EQU expr` label form.
    if out.label.is_none() {
        let mut words = rest.splitn(2, char::is_whitespace);
        if let (Some(first), Some(tail)) = (words.next(), words.next()) {
            let tail_trim = tail.trim_start();
            let second_word: String = tail_trim
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .collect();
            if second_word.eq_ignore_ascii_case("EQU")
                && first.chars().next().is_some_and(is_label_start)
                && first.chars().all(is_label_char)
            {
                out.label = Some(first.to_string());
                rest = tail_trim;
            }
        }
    }

    let rest = rest.trim();
    if rest.is_empty() {
        return out;
    }

    let split_at = rest
        .find(char::is_whitespace)
        .unwrap_or(rest.len());
    out.mnemonic = Some(rest[..split_at].to_ascii_uppercase());
    let operand_field = rest[split_at..].trim();
    if !operand_field.is_empty() {
        out.operands = split_operands(operand_field);
    }
    out
}

/// Split source into analyzed lines, accepting LF and CRLF endings.
pub fn analyze_source(file: &str, source: &str) -> Vec<SourceLine> {
    source
        .split('\n')
        .enumerate()
        .map(|(i, raw)| analyze_line(file, i + 1, raw.trim_end_matches('\r')))
        .collect()
}
