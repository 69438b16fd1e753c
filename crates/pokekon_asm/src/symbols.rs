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

//! Case-insensitive symbol table.
//!
//! Labels bind to addresses during pass 1; EQU definitions may reference
//! symbols defined later and are iterated to a fixed point before pass 2.

use fxhash::FxHashMap;

/// Where a symbol's value came from; kept for the symbol dump.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Equ,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    /// Name in original case, for listings.
    pub name: String,
    pub value: i64,
    pub kind: SymbolKind,
}

#[derive(Default)]
pub struct SymbolTable {
    by_key: FxHashMap<String, Symbol>,
}

fn key_of(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl SymbolTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.by_key.get(&key_of(name)).map(|s| s.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_key.contains_key(&key_of(name))
    }

    /// Define or redefine a label-kind symbol. Returns false when the name
    /// was already bound (duplicate label).
    pub fn define(&mut self, name: &str, value: i64) -> bool {
        self.insert(name, value, SymbolKind::Label)
    }

    pub fn define_equ(&mut self, name: &str, value: i64) -> bool {
        self.insert(name, value, SymbolKind::Equ)
    }

    fn insert(&mut self, name: &str, value: i64, kind: SymbolKind) -> bool {
        let key = key_of(name);
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.by_key.insert(
            key,
            Symbol {
                name: name.to_string(),
                value,
                kind,
            },
        );
        true
    }

    /// All symbols sorted by value, then name.
    pub fn sorted_by_value(&self) -> Vec<&Symbol> {
        let mut all: Vec<&Symbol> = self.by_key.values().collect();
        all.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.name.cmp(&b.name)));
        all
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let mut t = SymbolTable::new();
        assert!(t.define("Loop", 0x20));
        assert_eq!(t.get("LOOP"), Some(0x20));
        assert_eq!(t.get("loop"), Some(0x20));
        assert!(t.contains("lOoP"));
    }

    #[test]
    fn duplicates_rejected() {
        let mut t = SymbolTable::new();
        assert!(t.define("X", 1));
        assert!(!t.define("x", 2));
        assert_eq!(t.get("X"), Some(1));
    }

    #[test]
    fn sorted_dump() {
        let mut t = SymbolTable::new();
        t.define("B", 5);
        t.define("A", 5);
        t.define_equ("C", 1);
        let names: Vec<&str> = t.sorted_by_value().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }
}
