use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::host::Port;
use crate::symbol::{sym, SymbolTable};
use crate::value::Value;

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\n' | b'\t' | 0x0b | b'\r' | 0x08)
}

/// Recursive-descent reader: parses bytes from a [`Port`] into heap values.
///
/// `prefixes` is the interpreter's prefix table, a list of `(key . handler)`
/// pairs. A byte matching the first byte of a key makes the reader read one more
/// expression `x` and return `(handler x)`.
pub struct Reader<'a> {
    port: &'a mut Port,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
    prefixes: Value,
}

impl<'a> Reader<'a> {
    pub fn new(
        port: &'a mut Port,
        heap: &'a mut Heap,
        symbols: &'a mut SymbolTable,
        prefixes: Value,
    ) -> Self {
        Reader {
            port,
            heap,
            symbols,
            prefixes,
        }
    }

    /// Read one expression. Returns None at end of input.
    pub fn read(&mut self) -> Result<Option<Value>> {
        loop {
            let Some(c) = self.port.getc() else {
                return Ok(None);
            };
            match c {
                c if is_space(c) => continue,
                b';' => self.skip_line(),
                b'(' => return self.read_list().map(Some),
                b')' => return Err(Error::Malformed("unexpected `)`".into())),
                b'"' => return Ok(Some(self.read_string())),
                b'0'..=b'9' => return Ok(Some(self.read_integer(c))),
                _ => {
                    if let Some(handler) = self.prefix_handler(c) {
                        let Some(sub) = self.read()? else {
                            return Err(Error::Malformed("end of input after prefix".into()));
                        };
                        return self.heap.list(&[handler, sub]).map(Some);
                    }
                    return Ok(Some(self.read_symbol(c)));
                }
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.port.getc() {
            if c == b'\n' {
                break;
            }
        }
    }

    /// Next byte that is neither whitespace nor inside a comment.
    fn next_significant(&mut self) -> Option<u8> {
        loop {
            match self.port.getc()? {
                c if is_space(c) => continue,
                b';' => self.skip_line(),
                c => return Some(c),
            }
        }
    }

    fn read_list(&mut self) -> Result<Value> {
        let unterminated = || Error::Malformed("unterminated list".into());
        let mut items: Vec<Value> = Vec::new();
        loop {
            let c = self.next_significant().ok_or_else(unterminated)?;
            match c {
                b')' => return self.heap.list(&items),
                b'.' if self.dot_ends_here() => {
                    let tail = self.read()?.ok_or_else(unterminated)?;
                    match self.next_significant() {
                        Some(b')') => return self.heap.list_with_tail(&items, tail),
                        Some(d) => {
                            // Dotted tail not followed by `)`: keep the dot as a plain symbol.
                            self.port.putback(d);
                            items.push(Value::Symbol(sym::DOT));
                            items.push(tail);
                        }
                        None => return Err(unterminated()),
                    }
                }
                b'.' => items.push(self.read_symbol(b'.')),
                c => {
                    self.port.putback(c);
                    items.push(self.read()?.ok_or_else(unterminated)?);
                }
            }
        }
    }

    /// After a `.`, check whether it stands alone. The peeked byte is put back.
    fn dot_ends_here(&mut self) -> bool {
        match self.port.getc() {
            Some(d) => {
                self.port.putback(d);
                is_space(d) || d == b'(' || d == b')'
            }
            None => true,
        }
    }

    /// Bytes up to the closing quote, verbatim. End of input closes the literal.
    fn read_string(&mut self) -> Value {
        let mut buf = Vec::new();
        while let Some(c) = self.port.getc() {
            if c == b'"' {
                break;
            }
            buf.push(c);
        }
        Value::Symbol(self.symbols.intern_bytes(&buf))
    }

    /// Unsigned decimal digits. Overflow wraps.
    fn read_integer(&mut self, first: u8) -> Value {
        let mut n = i64::from(first - b'0');
        while let Some(c) = self.port.getc() {
            if !c.is_ascii_digit() {
                self.port.putback(c);
                break;
            }
            n = n.wrapping_mul(10).wrapping_add(i64::from(c - b'0'));
        }
        Value::Int(n)
    }

    fn read_symbol(&mut self, first: u8) -> Value {
        let mut buf = vec![first];
        while let Some(c) = self.port.getc() {
            match c {
                c if is_space(c) => break,
                b'(' | b')' => {
                    self.port.putback(c);
                    break;
                }
                c => buf.push(c),
            }
        }
        Value::Symbol(self.symbols.intern_bytes(&buf))
    }

    fn prefix_handler(&self, c: u8) -> Option<Value> {
        let mut current = self.prefixes;
        while let Value::Pair(id) = current {
            if let Value::Pair(entry) = self.heap.car(id) {
                if let Value::Symbol(key) = self.heap.car(entry) {
                    if self.symbols.bytes(key).first() == Some(&c) {
                        return Some(self.heap.cdr(entry));
                    }
                }
            }
            current = self.heap.cdr(id);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{SystemAllocator, DEFAULT_GC_EVENTS};
    use crate::host::BufferIo;

    struct Fixture {
        heap: Heap,
        symbols: SymbolTable,
        prefixes: Value,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                heap: Heap::new(Box::new(SystemAllocator::new()), DEFAULT_GC_EVENTS, 64),
                symbols: SymbolTable::new(),
                prefixes: Value::Nil,
            }
        }

        fn read_all(&mut self, src: &str) -> Result<Vec<Value>> {
            let mut port = Port::new(Box::new(BufferIo::new(src)));
            let mut reader = Reader::new(&mut port, &mut self.heap, &mut self.symbols, self.prefixes);
            let mut out = Vec::new();
            while let Some(v) = reader.read()? {
                out.push(v);
            }
            Ok(out)
        }

        fn read_one(&mut self, src: &str) -> Value {
            let values = self.read_all(src).unwrap();
            assert_eq!(values.len(), 1, "expected one datum in {:?}", src);
            values[0]
        }

        fn sym(&mut self, name: &str) -> Value {
            Value::Symbol(self.symbols.intern(name))
        }
    }

    #[test]
    fn reads_proper_list_of_integers() {
        let mut f = Fixture::new();
        let v = f.read_one("(1 2 3)");
        assert_eq!(
            f.heap.list_to_vec(v).unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn reads_dotted_pair() {
        let mut f = Fixture::new();
        let v = f.read_one("(1 . 2)");
        let id = v.as_pair().unwrap();
        assert_eq!(f.heap.car(id), Value::Int(1));
        assert_eq!(f.heap.cdr(id), Value::Int(2));
    }

    #[test]
    fn string_literal_is_interned_symbol() {
        let mut f = Fixture::new();
        let v = f.read_one("\"abc\"");
        assert_eq!(v, f.sym("abc"));
        let spaced = f.read_one("\"a b (c)\"");
        assert_eq!(spaced, f.sym("a b (c)"));
    }

    #[test]
    fn symbols_end_at_parens_and_whitespace() {
        let mut f = Fixture::new();
        let v = f.read_one("(foo(bar)baz)");
        let items = f.heap.list_to_vec(v).unwrap();
        assert_eq!(items[0], f.sym("foo"));
        assert!(items[1].is_pair());
        assert_eq!(items[2], f.sym("baz"));
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let mut f = Fixture::new();
        let values = f.read_all("; leading\n\t(a ; inner\n b)\x0b\r\x08 7 ; trailing").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(f.heap.list_to_vec(values[0]).unwrap().len(), 2);
        assert_eq!(values[1], Value::Int(7));
    }

    #[test]
    fn empty_input_is_end_of_input_not_empty_list() {
        let mut f = Fixture::new();
        assert!(f.read_all("   ; nothing\n").unwrap().is_empty());
        assert_eq!(f.read_one("()"), Value::Nil);
    }

    #[test]
    fn token_at_end_of_input_is_finalized() {
        let mut f = Fixture::new();
        let v = f.read_one("hello");
        assert_eq!(v, f.sym("hello"));
        assert_eq!(f.read_one("42"), Value::Int(42));
    }

    #[test]
    fn digits_followed_by_letters_split() {
        let mut f = Fixture::new();
        let values = f.read_all("12abc").unwrap();
        assert_eq!(values[0], Value::Int(12));
        assert_eq!(values[1], f.sym("abc"));
    }

    #[test]
    fn integer_overflow_wraps() {
        let mut f = Fixture::new();
        let v = f.read_one("9223372036854775808");
        assert_eq!(v, Value::Int(i64::MIN));
    }

    #[test]
    fn misplaced_dot_is_kept_as_symbol() {
        let mut f = Fixture::new();
        let v = f.read_one("(1 . 2 3)");
        let items = f.heap.list_to_vec(v).unwrap();
        assert_eq!(
            items,
            vec![Value::Int(1), Value::Symbol(sym::DOT), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn dot_inside_symbol_is_not_a_tail_marker() {
        let mut f = Fixture::new();
        let v = f.read_one("(a .b)");
        let items = f.heap.list_to_vec(v).unwrap();
        assert_eq!(items[1], f.sym(".b"));
    }

    #[test]
    fn unterminated_list_is_malformed() {
        let mut f = Fixture::new();
        assert!(matches!(f.read_all("(1 2"), Err(Error::Malformed(_))));
        assert!(matches!(f.read_all(")"), Err(Error::Malformed(_))));
    }

    #[test]
    fn prefix_table_wraps_following_expression() {
        let mut f = Fixture::new();
        let key = f.sym("'");
        let quote = Value::Symbol(sym::QUOTE);
        let entry = f.heap.cons(key, quote).unwrap();
        f.prefixes = f.heap.list(&[entry]).unwrap();

        let v = f.read_one("'(a b)");
        let items = f.heap.list_to_vec(v).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], quote);
        assert_eq!(f.heap.list_to_vec(items[1]).unwrap().len(), 2);

        let nested = f.read_one("''x");
        let outer = f.heap.list_to_vec(nested).unwrap();
        let inner = f.heap.list_to_vec(outer[1]).unwrap();
        assert_eq!(inner[1], f.sym("x"));
    }
}
