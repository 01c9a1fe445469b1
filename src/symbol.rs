use std::collections::HashMap;

use crate::value::SymbolId;

/// Interned symbol table. Each unique byte string maps to a unique SymbolId,
/// so symbol equality is handle equality.
///
/// Names are stored as raw bytes: string literals are interned verbatim and
/// need not be valid UTF-8.
pub struct SymbolTable {
    name_to_id: HashMap<Box<[u8]>, SymbolId>,
    id_to_name: Vec<Box<[u8]>>,
}

/// Well-known symbol IDs, pre-interned at startup.
/// These must match the order of interning in SymbolTable::new().
pub mod sym {
    use crate::value::SymbolId;

    pub const TRUE: SymbolId = SymbolId(0);
    pub const FALSE: SymbolId = SymbolId(1);
    pub const DOT: SymbolId = SymbolId(2);
    pub const QUOTE: SymbolId = SymbolId(3);
    // Condition kinds handed to rescue handlers
    pub const UNBOUND_VARIABLE: SymbolId = SymbolId(4);
    pub const INVALID_APPLICATION: SymbolId = SymbolId(5);
    pub const MALFORMED_SYNTAX: SymbolId = SymbolId(6);
    pub const TYPE_ERROR: SymbolId = SymbolId(7);
    pub const ARITY_ERROR: SymbolId = SymbolId(8);
    pub const DIVISION_BY_ZERO: SymbolId = SymbolId(9);
    // Type names returned by `type`
    pub const NIL: SymbolId = SymbolId(10);
    pub const INTEGER: SymbolId = SymbolId(11);
    pub const SYMBOL: SymbolId = SymbolId(12);
    pub const PAIR: SymbolId = SymbolId(13);
    pub const FORM: SymbolId = SymbolId(14);
    pub const PROCEDURE: SymbolId = SymbolId(15);
    pub const LAMBDA: SymbolId = SymbolId(16);
    pub const MACRO: SymbolId = SymbolId(17);
    pub const CONTINUATION: SymbolId = SymbolId(18);
}

impl SymbolTable {
    /// Create a new symbol table with all well-known symbols pre-interned.
    /// The order MUST match the constants in the `sym` module above.
    pub fn new() -> Self {
        let names: [&str; 19] = [
            "#t", "#f", ".", "quote",
            "unbound-variable", "invalid-application", "malformed-syntax",
            "type-error", "arity-error", "division-by-zero",
            "nil", "integer", "symbol", "pair", "form", "procedure",
            "lambda", "macro", "continuation",
        ];

        let mut table = SymbolTable {
            name_to_id: HashMap::with_capacity(256),
            id_to_name: Vec::with_capacity(256),
        };
        for name in names {
            table.intern(name);
        }
        table
    }

    /// Intern a symbol name. Returns the existing ID if already interned,
    /// or creates a new one.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.intern_bytes(name.as_bytes())
    }

    pub fn intern_bytes(&mut self, name: &[u8]) -> SymbolId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = SymbolId(self.id_to_name.len() as u32);
        self.name_to_id.insert(name.into(), id);
        self.id_to_name.push(name.into());
        id
    }

    /// The raw bytes of a symbol's name.
    pub fn bytes(&self, id: SymbolId) -> &[u8] {
        &self.id_to_name[id.0 as usize]
    }

    /// The name of a symbol, lossily decoded for display.
    pub fn name(&self, id: SymbolId) -> String {
        String::from_utf8_lossy(self.bytes(id)).into_owned()
    }

    /// Look up a symbol ID by name, without interning.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.name_to_id.get(name.as_bytes()).copied()
    }

    /// Total number of interned symbols.
    pub fn count(&self) -> usize {
        self.id_to_name.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn well_known_symbols_match_their_names() {
        let table = SymbolTable::new();
        assert_eq!(table.lookup("#t"), Some(sym::TRUE));
        assert_eq!(table.lookup("#f"), Some(sym::FALSE));
        assert_eq!(table.lookup("quote"), Some(sym::QUOTE));
        assert_eq!(table.lookup("division-by-zero"), Some(sym::DIVISION_BY_ZERO));
        assert_eq!(table.lookup("continuation"), Some(sym::CONTINUATION));
        assert_eq!(table.count(), 19);
    }

    #[test]
    fn non_utf8_names_intern_by_bytes() {
        let mut table = SymbolTable::new();
        let a = table.intern_bytes(&[0xff, 0x00, b'x']);
        let b = table.intern_bytes(&[0xff, 0x00, b'x']);
        assert_eq!(a, b);
        assert_eq!(table.bytes(a), &[0xff, 0x00, b'x']);
    }

    proptest! {
        #[test]
        fn interning_is_idempotent(s in ".*") {
            let mut table = SymbolTable::new();
            let a = table.intern(&s);
            let b = table.intern(&s);
            prop_assert_eq!(a, b);
            prop_assert_eq!(table.bytes(a), s.as_bytes());
        }

        #[test]
        fn distinct_names_get_distinct_ids(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let mut table = SymbolTable::new();
            let ia = table.intern(&a);
            let ib = table.intern(&b);
            prop_assert_eq!(ia == ib, a == b);
        }
    }
}
