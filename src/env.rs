//! Environments: a list of frames, innermost first, each frame an association
//! list of `(symbol . value)` bindings, most recent first.
//!
//! Both levels are ordinary heap pairs, so environments are collected like any
//! other data. The last frame of every chain is the interpreter's global frame.

use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::value::{ObjId, SymbolId, Value};

/// Prepend `(name . val)` to a frame, returning the new frame.
pub fn frame_set(heap: &mut Heap, frame: Value, name: SymbolId, val: Value) -> Result<Value> {
    let binding = heap.cons(Value::Symbol(name), val)?;
    heap.cons(binding, frame)
}

/// Push `frame` onto `env` as its new innermost scope.
pub fn extend(heap: &mut Heap, env: Value, frame: Value) -> Result<Value> {
    heap.cons(frame, env)
}

/// Find the binding cell for `name` within a single frame.
fn frame_lookup(heap: &Heap, frame: Value, name: SymbolId) -> Option<ObjId> {
    let mut current = frame;
    while let Value::Pair(id) = current {
        if let Value::Pair(bid) = heap.car(id) {
            if heap.car(bid) == Value::Symbol(name) {
                return Some(bid);
            }
        }
        current = heap.cdr(id);
    }
    None
}

/// Look up a binding, scanning frames innermost to outermost.
/// Returns the `(name . value)` cell if found.
pub fn lookup(heap: &Heap, env: Value, name: SymbolId) -> Option<ObjId> {
    let mut current = env;
    while let Value::Pair(id) = current {
        if let Some(cell) = frame_lookup(heap, heap.car(id), name) {
            return Some(cell);
        }
        current = heap.cdr(id);
    }
    None
}

pub fn get(heap: &Heap, env: Value, name: SymbolId) -> Option<Value> {
    lookup(heap, env, name).map(|cell| heap.cdr(cell))
}

/// Add a binding to the innermost frame of `env`, shadowing any earlier one.
pub fn define(heap: &mut Heap, env: Value, name: SymbolId, val: Value) -> Result<()> {
    let Value::Pair(id) = env else {
        return Err(Error::Internal("define in an empty environment".into()));
    };
    let frame = heap.car(id);
    let frame = frame_set(heap, frame, name, val)?;
    heap.set_car(id, frame);
    Ok(())
}

/// Mutate the nearest existing binding of `name`. Returns false if unbound.
pub fn rebind(heap: &mut Heap, env: Value, name: SymbolId, val: Value) -> bool {
    match lookup(heap, env, name) {
        Some(cell) => {
            heap.set_cdr(cell, val);
            true
        }
        None => false,
    }
}

/// Match a parameter pattern against an argument list, prepending bindings to `frame`.
///
/// `params` is a proper list of symbols, a dotted list whose tail symbol collects
/// the remaining arguments, or a lone symbol collecting all of them.
pub fn bind_params(
    heap: &mut Heap,
    params: Value,
    args: Value,
    mut frame: Value,
    what: &str,
) -> Result<Value> {
    let mut pat = params;
    let mut rest = args;
    loop {
        match pat {
            Value::Nil => {
                if !rest.is_nil() {
                    return Err(Error::Arity(what.to_string()));
                }
                return Ok(frame);
            }
            Value::Symbol(name) => return frame_set(heap, frame, name, rest),
            Value::Pair(pid) => {
                let Value::Symbol(name) = heap.car(pid) else {
                    return Err(Error::Malformed(format!("{what}: parameter is not a symbol")));
                };
                let Value::Pair(aid) = rest else {
                    return Err(Error::Arity(what.to_string()));
                };
                let arg = heap.car(aid);
                frame = frame_set(heap, frame, name, arg)?;
                pat = heap.cdr(pid);
                rest = heap.cdr(aid);
            }
            _ => return Err(Error::Malformed(format!("{what}: bad parameter list"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{SystemAllocator, DEFAULT_GC_EVENTS};
    use crate::value::SymbolId;

    const X: SymbolId = SymbolId(100);
    const Y: SymbolId = SymbolId(101);

    fn setup() -> (Heap, Value) {
        let mut heap = Heap::new(Box::new(SystemAllocator::new()), DEFAULT_GC_EVENTS, 64);
        let global = frame_set(&mut heap, Value::Nil, X, Value::Int(1)).unwrap();
        let env = extend(&mut heap, Value::Nil, global).unwrap();
        (heap, env)
    }

    #[test]
    fn inner_frames_shadow_outer() {
        let (mut heap, global) = setup();
        let inner = frame_set(&mut heap, Value::Nil, X, Value::Int(2)).unwrap();
        let env = extend(&mut heap, global, inner).unwrap();
        assert_eq!(get(&heap, env, X), Some(Value::Int(2)));
        assert_eq!(get(&heap, global, X), Some(Value::Int(1)));
        assert_eq!(get(&heap, env, Y), None);
    }

    #[test]
    fn define_prepends_to_innermost_frame() {
        let (mut heap, env) = setup();
        define(&mut heap, env, X, Value::Int(7)).unwrap();
        assert_eq!(get(&heap, env, X), Some(Value::Int(7)));
        let frame = heap.car_val(env).unwrap();
        assert_eq!(heap.list_to_vec(frame).unwrap().len(), 2);
    }

    #[test]
    fn rebind_mutates_the_frame_where_found() {
        let (mut heap, global) = setup();
        let inner = frame_set(&mut heap, Value::Nil, Y, Value::Int(5)).unwrap();
        let env = extend(&mut heap, global, inner).unwrap();
        assert!(rebind(&mut heap, env, X, Value::Int(9)));
        assert_eq!(get(&heap, global, X), Some(Value::Int(9)));
        assert_eq!(get(&heap, env, Y), Some(Value::Int(5)));
        assert!(!rebind(&mut heap, env, SymbolId(200), Value::Nil));
    }

    #[test]
    fn rest_parameters_collect_remaining_arguments() {
        let (mut heap, _) = setup();
        let params = heap.cons(Value::Symbol(X), Value::Symbol(Y)).unwrap();
        let args = heap.list(&[Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap();
        let frame = bind_params(&mut heap, params, args, Value::Nil, "lambda").unwrap();
        let env = extend(&mut heap, Value::Nil, frame).unwrap();
        assert_eq!(get(&heap, env, X), Some(Value::Int(1)));
        let rest = get(&heap, env, Y).unwrap();
        assert_eq!(heap.list_to_vec(rest).unwrap(), vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let (mut heap, _) = setup();
        let params = heap.list(&[Value::Symbol(X), Value::Symbol(Y)]).unwrap();
        let one = heap.list(&[Value::Int(1)]).unwrap();
        assert!(matches!(
            bind_params(&mut heap, params, one, Value::Nil, "lambda"),
            Err(Error::Arity(_))
        ));
    }
}
