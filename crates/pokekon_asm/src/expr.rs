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

//! Assembler expression grammar.
//!
//! Precedence (low to high): `|`, `^`, `&`, `<< >>`, `+ -`, `* / %`,
//! unary `+ - ~`, primary. Primaries are number literals in decimal,
//! `0x…`/`…H`/`$…` hex, `0b…`/`…B` binary, `0o…` octal, `'c'` character
//! (with the usual escapes), identifiers, `$` for the current address,
//! and parenthesized subexpressions. Symbols are case-insensitive.
//!
//! During the sizing pass every expression short-circuits to zero so the
//! instruction sizes never depend on symbol resolution.

use crate::symbols::SymbolTable;

/// Evaluation context for one expression.
pub struct EvalCtx<'a> {
    pub symbols: &'a SymbolTable,
    /// Value of `$`.
    pub addr: u16,
    /// Sizing pass: all expressions are 0 and nothing is undefined.
    pub for_size: bool,
}

impl EvalCtx<'_> {
    pub fn eval(&self, text: &str) -> Result<i64, String> {
        if self.for_size {
            return Ok(0);
        }
        let mut parser = Parser {
            bytes: text.as_bytes(),
            pos: 0,
            ctx: self,
        };
        let value = parser.bit_or()?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(format!("trailing input in expression `{text}`"));
        }
        Ok(value)
    }
}

struct Parser<'a, 'b> {
    bytes: &'a [u8],
    pos: usize,
    ctx: &'a EvalCtx<'b>,
}

impl Parser<'_, '_> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && (self.bytes[self.pos] as char).is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        }
        else {
            false
        }
    }

    fn eat2(&mut self, a: u8, b: u8) -> bool {
        self.skip_ws();
        if self.bytes.get(self.pos) == Some(&a) && self.bytes.get(self.pos + 1) == Some(&b) {
            self.pos += 2;
            true
        }
        else {
            false
        }
    }

    fn bit_or(&mut self) -> Result<i64, String> {
        let mut acc = self.bit_xor()?;
        while self.peek() == Some(b'|') {
            self.pos += 1;
            acc |= self.bit_xor()?;
        }
        Ok(acc)
    }

    fn bit_xor(&mut self) -> Result<i64, String> {
        let mut acc = self.bit_and()?;
        while self.peek() == Some(b'^') {
            self.pos += 1;
            acc ^= self.bit_and()?;
        }
        Ok(acc)
    }

    fn bit_and(&mut self) -> Result<i64, String> {
        let mut acc = self.shift()?;
        while self.peek() == Some(b'&') {
            self.pos += 1;
            acc &= self.shift()?;
        }
        Ok(acc)
    }

    fn shift(&mut self) -> Result<i64, String> {
        let mut acc = self.additive()?;
        loop {
            if self.eat2(b'<', b'<') {
                let rhs = self.additive()?;
                acc = acc.wrapping_shl(rhs as u32 & 63);
            }
            else if self.eat2(b'>', b'>') {
                let rhs = self.additive()?;
                acc = acc.wrapping_shr(rhs as u32 & 63);
            }
            else {
                return Ok(acc);
            }
        }
    }

    fn additive(&mut self) -> Result<i64, String> {
        let mut acc = self.term()?;
        loop {
            if self.eat(b'+') {
                acc = acc.wrapping_add(self.term()?);
            }
            else if self.eat(b'-') {
                acc = acc.wrapping_sub(self.term()?);
            }
            else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<i64, String> {
        let mut acc = self.unary()?;
        loop {
            if self.eat(b'*') {
                acc = acc.wrapping_mul(self.unary()?);
            }
            else if self.eat(b'/') {
                let rhs = self.unary()?;
                if rhs == 0 {
                    return Err("division by zero".to_string());
                }
                acc = acc.wrapping_div(rhs);
            }
            else if self.eat(b'%') {
                let rhs = self.unary()?;
                if rhs == 0 {
                    return Err("modulo by zero".to_string());
                }
                acc = acc.wrapping_rem(rhs);
            }
            else {
                return Ok(acc);
            }
        }
    }

    fn unary(&mut self) -> Result<i64, String> {
        if self.eat(b'-') {
            return Ok(self.unary()?.wrapping_neg());
        }
        if self.eat(b'+') {
            return self.unary();
        }
        if self.eat(b'~') {
            return Ok(!self.unary()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i64, String> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let v = self.bit_or()?;
                if !self.eat(b')') {
                    return Err("missing `)` in expression".to_string());
                }
                Ok(v)
            }
            Some(b'\'') => self.char_literal(),
            Some(b'$') => {
                self.pos += 1;
                // `$…` hex literal, or bare `$` = current address.
                if self
                    .bytes
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_hexdigit())
                {
                    let start = self.pos;
                    while self
                        .bytes
                        .get(self.pos)
                        .is_some_and(|b| b.is_ascii_hexdigit())
                    {
                        self.pos += 1;
                    }
                    let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
                    i64::from_str_radix(text, 16).map_err(|_| format!("bad hex literal ${text}"))
                }
                else {
                    Ok(i64::from(self.ctx.addr))
                }
            }
            Some(b) if b.is_ascii_digit() => self.number(),
            Some(b) if b.is_ascii_alphabetic() || b == b'_' || b == b'.' => self.identifier(),
            _ => Err("expected expression".to_string()),
        }
    }

    fn char_literal(&mut self) -> Result<i64, String> {
        // Opening quote already peeked.
        self.pos += 1;
        let c = match self.bytes.get(self.pos).copied() {
            Some(b'\\') => {
                self.pos += 1;
                let escaped = self.bytes.get(self.pos).copied().ok_or("unterminated char literal")?;
                self.pos += 1;
                match escaped {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'0' => 0,
                    b'\\' => b'\\',
                    b'\'' => b'\'',
                    b'"' => b'"',
                    other => return Err(format!("unknown escape \\{}", other as char)),
                }
            }
            Some(c) => {
                self.pos += 1;
                c
            }
            None => return Err("unterminated char literal".to_string()),
        };
        if self.bytes.get(self.pos) != Some(&b'\'') {
            return Err("unterminated char literal".to_string());
        }
        self.pos += 1;
        Ok(i64::from(c))
    }

    fn number(&mut self) -> Result<i64, String> {
        let start = self.pos;
        // Prefixed bases.
        if self.bytes[self.pos] == b'0' && self.pos + 1 < self.bytes.len() {
            let radix = match self.bytes[self.pos + 1] {
                b'x' | b'X' => Some(16),
                b'b' | b'B' => Some(2),
                b'o' | b'O' => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                // `0b` is also a legal hex-suffix number (“0BH”); only take
                // the prefix form when a digit of that base follows.
                let digits_start = self.pos + 2;
                let mut end = digits_start;
                while self
                    .bytes
                    .get(end)
                    .is_some_and(|b| (*b as char).is_digit(radix))
                {
                    end += 1;
                }
                let followed_by_suffix = self
                    .bytes
                    .get(end)
                    .is_some_and(|b| b.is_ascii_alphanumeric());
                if end > digits_start && !followed_by_suffix {
                    let text = std::str::from_utf8(&self.bytes[digits_start..end]).unwrap_or("");
                    self.pos = end;
                    return i64::from_str_radix(text, radix as u32)
                        .map_err(|_| format!("bad number literal {text}"));
                }
            }
        }

        // Run of alphanumerics: decimal, trailing-H hex, or trailing-B
        // binary.
        let mut end = start;
        while self
            .bytes
            .get(end)
            .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            end += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..end]).unwrap_or("");
        self.pos = end;

        if let Some(hex) = text.strip_suffix(['H', 'h']) {
            if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return i64::from_str_radix(hex, 16).map_err(|_| format!("bad hex literal {text}"));
            }
        }
        if let Some(bin) = text.strip_suffix(['B', 'b']) {
            if !bin.is_empty() && bin.bytes().all(|b| b == b'0' || b == b'1') {
                return i64::from_str_radix(bin, 2).map_err(|_| format!("bad binary literal {text}"));
            }
        }
        text.parse::<i64>()
            .map_err(|_| format!("bad number literal {text}"))
    }

    fn identifier(&mut self) -> Result<i64, String> {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'.')
        {
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        self.ctx
            .symbols
            .get(name)
            .ok_or_else(|| format!("undefined symbol {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    fn eval(text: &str) -> Result<i64, String> {
        let symbols = SymbolTable::new();
        EvalCtx {
            symbols: &symbols,
            addr: 0x1234,
            for_size: false,
        }
        .eval(text)
    }

    #[test]
    fn literal_bases() {
        assert_eq!(eval("10").unwrap(), 10);
        assert_eq!(eval("0x1F").unwrap(), 31);
        assert_eq!(eval("1Fh").unwrap(), 31);
        assert_eq!(eval("0FFH").unwrap(), 255);
        assert_eq!(eval("$FF").unwrap(), 255);
        assert_eq!(eval("0b101").unwrap(), 5);
        assert_eq!(eval("101B").unwrap(), 5);
        assert_eq!(eval("0o17").unwrap(), 15);
        assert_eq!(eval("'A'").unwrap(), 65);
        assert_eq!(eval("'\\n'").unwrap(), 10);
        assert_eq!(eval("'\\0'").unwrap(), 0);
    }

    #[test]
    fn current_address() {
        assert_eq!(eval("$").unwrap(), 0x1234);
        assert_eq!(eval("$+2").unwrap(), 0x1236);
    }

    #[test]
    fn precedence_chain() {
        assert_eq!(eval("1+2*3").unwrap(), 7);
        assert_eq!(eval("1|2^3&2").unwrap(), 1 | (2 ^ (3 & 2)));
        assert_eq!(eval("1<<4+1").unwrap(), 32); // shift binds looser than +
        assert_eq!(eval("~0&0xFF").unwrap(), 0xFF);
        assert_eq!(eval("7%4").unwrap(), 3);
        assert_eq!(eval("-(2+3)").unwrap(), -5);
    }

    #[test]
    fn division_by_zero_is_error() {
        assert!(eval("1/0").is_err());
        assert!(eval("1%0").is_err());
    }

    #[test]
    fn symbols_case_insensitive() {
        let mut symbols = SymbolTable::new();
        symbols.define("Start", 0x100);
        let ctx = EvalCtx {
            symbols: &symbols,
            addr: 0,
            for_size: false,
        };
        assert_eq!(ctx.eval("START+1").unwrap(), 0x101);
        assert_eq!(ctx.eval("start*2").unwrap(), 0x200);
    }

    #[test]
    fn undefined_symbol_reports() {
        let err = eval("NOWHERE").unwrap_err();
        assert!(err.contains("NOWHERE"));
    }

    #[test]
    fn size_pass_short_circuits() {
        let symbols = SymbolTable::new();
        let ctx = EvalCtx {
            symbols: &symbols,
            addr: 0,
            for_size: true,
        };
        assert_eq!(ctx.eval("UNDEFINED/0").unwrap(), 0);
    }
}
