use crate::heap::Heap;
use crate::primitives::Native;
use crate::symbol::SymbolTable;
use crate::value::{ClosureKind, Value};

const MAX_DEPTH: usize = 1000;
const MAX_ITEMS: usize = 100_000;

/// Render a value as bytes. Symbols are written verbatim, without quoting.
pub fn print_bytes(val: Value, heap: &Heap, symbols: &SymbolTable, natives: &[Native]) -> Vec<u8> {
    let mut out = Vec::new();
    print_inner(val, heap, symbols, natives, &mut out, 0);
    out
}

/// Render a value to a string (lossy for non-UTF-8 symbol names).
pub fn print_val(val: Value, heap: &Heap, symbols: &SymbolTable, natives: &[Native]) -> String {
    String::from_utf8_lossy(&print_bytes(val, heap, symbols, natives)).into_owned()
}

fn native_name<'a>(natives: &[Native], symbols: &'a SymbolTable, index: u32) -> &'a [u8] {
    natives
        .get(index as usize)
        .map_or(b"?".as_slice(), |n| symbols.bytes(n.name))
}

fn print_inner(
    val: Value,
    heap: &Heap,
    symbols: &SymbolTable,
    natives: &[Native],
    out: &mut Vec<u8>,
    depth: usize,
) {
    if depth > MAX_DEPTH {
        out.extend_from_slice(b"...");
        return;
    }

    match val {
        Value::Nil => out.extend_from_slice(b"()"),
        Value::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::Symbol(id) => out.extend_from_slice(symbols.bytes(id)),
        Value::Form(id) => {
            out.extend_from_slice(b"#<form ");
            out.extend_from_slice(native_name(natives, symbols, id.0));
            out.push(b'>');
        }
        Value::Proc(id) => {
            out.extend_from_slice(b"#<procedure ");
            out.extend_from_slice(native_name(natives, symbols, id.0));
            out.push(b'>');
        }
        Value::Closure(id) => match heap.closure(id).map(|c| c.kind) {
            Some(ClosureKind::Macro) => out.extend_from_slice(b"#<macro>"),
            _ => out.extend_from_slice(b"#<lambda>"),
        },
        Value::Cont(_) => out.extend_from_slice(b"#<continuation>"),
        Value::Pair(id) => {
            out.push(b'(');
            print_inner(heap.car(id), heap, symbols, natives, out, depth + 1);

            let mut current = heap.cdr(id);
            let mut count = 1;
            loop {
                match current {
                    Value::Nil => break,
                    Value::Pair(pid) => {
                        if count >= MAX_ITEMS {
                            out.extend_from_slice(b" ...");
                            break;
                        }
                        out.push(b' ');
                        print_inner(heap.car(pid), heap, symbols, natives, out, depth + 1);
                        current = heap.cdr(pid);
                        count += 1;
                    }
                    other => {
                        out.extend_from_slice(b" . ");
                        print_inner(other, heap, symbols, natives, out, depth + 1);
                        break;
                    }
                }
            }
            out.push(b')');
        }
    }
}
