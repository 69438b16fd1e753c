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

//! BASIC tokenizer and integer expression evaluator.
//!
//! Arithmetic is integer-truncating and division by zero yields zero;
//! comparisons produce 1/0. Identifiers start with a letter and may carry
//! a digit tail; `A(i[,j])` indexes an array; `PEEK(a)` and `INP(p)`
//! delegate through the host adapter.

use super::host::Host;
use super::{BasicError, Variables};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Number(i32),
    Ident(String),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LParen,
    RParen,
    Comma,
    Semicolon,
}

/// Split a statement tail into tokens. Keywords come out as `Ident` in
/// upper case; the caller decides what is a keyword.
pub fn tokenize(src: &str) -> Result<Vec<Token>, BasicError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' => i += 1,
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let value: i64 = src[start..i].parse().map_err(|_| BasicError::Syntax)?;
                tokens.push(Token::Number(value as i32));
            }
            b'A'..=b'Z' | b'a'..=b'z' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                tokens.push(Token::Ident(src[start..i].to_ascii_uppercase()));
            }
            b'"' => {
                i += 1;
                let start = i;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
                if i == bytes.len() {
                    return Err(BasicError::Syntax);
                }
                tokens.push(Token::Str(src[start..i].to_string()));
                i += 1;
            }
            b'+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            b'<' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'>' {
                    tokens.push(Token::Ne);
                    i += 2;
                }
                else if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    tokens.push(Token::Le);
                    i += 2;
                }
                else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            b'>' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    tokens.push(Token::Ge);
                    i += 2;
                }
                else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            _ => return Err(BasicError::Syntax),
        }
    }
    Ok(tokens)
}

/// Cursor over a token slice with the variable store and host adapter in
/// scope for evaluation.
pub struct Eval<'a> {
    pub tokens: &'a [Token],
    pub pos: usize,
    pub vars: &'a mut Variables,
    pub host: &'a mut dyn Host,
}

impl<'a> Eval<'a> {
    pub fn new(tokens: &'a [Token], vars: &'a mut Variables, host: &'a mut dyn Host) -> Self {
        Self {
            tokens,
            pos: 0,
            vars,
            host,
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn next(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    pub fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        }
        else {
            false
        }
    }

    pub fn expect(&mut self, tok: &Token) -> Result<(), BasicError> {
        if self.eat(tok) {
            Ok(())
        }
        else {
            Err(BasicError::Syntax)
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Full expression: comparison level.
    pub fn expression(&mut self) -> Result<i32, BasicError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => Token::Eq,
            Some(Token::Ne) => Token::Ne,
            Some(Token::Lt) => Token::Lt,
            Some(Token::Gt) => Token::Gt,
            Some(Token::Le) => Token::Le,
            Some(Token::Ge) => Token::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        let truth = match op {
            Token::Eq => lhs == rhs,
            Token::Ne => lhs != rhs,
            Token::Lt => lhs < rhs,
            Token::Gt => lhs > rhs,
            Token::Le => lhs <= rhs,
            _ => lhs >= rhs,
        };
        Ok(i32::from(truth))
    }

    fn additive(&mut self) -> Result<i32, BasicError> {
        let mut acc = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                acc = acc.wrapping_add(self.term()?);
            }
            else if self.eat(&Token::Minus) {
                acc = acc.wrapping_sub(self.term()?);
            }
            else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<i32, BasicError> {
        let mut acc = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                acc = acc.wrapping_mul(self.unary()?);
            }
            else if self.eat(&Token::Slash) {
                let rhs = self.unary()?;
                // Division by zero yields zero rather than an error.
                acc = if rhs == 0 { 0 } else { acc.wrapping_div(rhs) };
            }
            else {
                return Ok(acc);
            }
        }
    }

    fn unary(&mut self) -> Result<i32, BasicError> {
        if self.eat(&Token::Minus) {
            return Ok(self.unary()?.wrapping_neg());
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i32, BasicError> {
        match self.next().cloned() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let v = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(v)
            }
            Some(Token::Ident(name)) => self.ident_value(&name),
            _ => Err(BasicError::Syntax),
        }
    }

    fn ident_value(&mut self, name: &str) -> Result<i32, BasicError> {
        match name {
            "PEEK" => {
                let addr = self.single_arg()?;
                Ok(i32::from(self.host.peek8(addr as u16)))
            }
            "INP" => {
                let port = self.single_arg()?;
                Ok(i32::from(self.host.in8(port as u8)))
            }
            _ => {
                if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                    return Err(BasicError::BadVar);
                }
                if self.eat(&Token::LParen) {
                    let indices = self.index_list()?;
                    self.vars.array_get(name, &indices)
                }
                else {
                    Ok(self.vars.get(name))
                }
            }
        }
    }

    fn single_arg(&mut self) -> Result<i32, BasicError> {
        self.expect(&Token::LParen)?;
        let v = self.expression()?;
        self.expect(&Token::RParen)?;
        Ok(v)
    }

    /// `i[,j]` with the closing parenthesis consumed.
    pub fn index_list(&mut self) -> Result<Vec<i32>, BasicError> {
        let mut indices = vec![self.expression()?];
        while self.eat(&Token::Comma) {
            indices.push(self.expression()?);
        }
        self.expect(&Token::RParen)?;
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::host::NullHost;

    fn eval(src: &str) -> i32 {
        let tokens = tokenize(src).unwrap();
        let mut vars = Variables::default();
        let mut host = NullHost::new();
        Eval::new(&tokens, &mut vars, &mut host).expression().unwrap()
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("1+2*3"), 7);
        assert_eq!(eval("(1+2)*3"), 9);
        assert_eq!(eval("10-4-3"), 3);
    }

    #[test]
    fn integer_truncation_and_zero_division() {
        assert_eq!(eval("7/2"), 3);
        assert_eq!(eval("-7/2"), -3);
        assert_eq!(eval("5/0"), 0);
    }

    #[test]
    fn comparisons_produce_unit() {
        assert_eq!(eval("1=1"), 1);
        assert_eq!(eval("1=2"), 0);
        assert_eq!(eval("3<>4"), 1);
        assert_eq!(eval("2<=2"), 1);
        assert_eq!(eval("5>9"), 0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(eval("-5+3"), -2);
        assert_eq!(eval("2*-3"), -6);
    }

    #[test]
    fn variables_default_to_zero() {
        assert_eq!(eval("Q+1"), 1);
    }

    #[test]
    fn variable_lookup() {
        let tokens = tokenize("A1*2").unwrap();
        let mut vars = Variables::default();
        vars.set("A1", 21);
        let mut host = NullHost::new();
        let v = Eval::new(&tokens, &mut vars, &mut host).expression().unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn peek_delegates_to_host() {
        let tokens = tokenize("PEEK(100)").unwrap();
        let mut vars = Variables::default();
        let mut host = NullHost::new();
        host.memory[100] = 77;
        let v = Eval::new(&tokens, &mut vars, &mut host).expression().unwrap();
        assert_eq!(v, 77);
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        assert!(tokenize("PRINT \"abc").is_err());
    }
}
