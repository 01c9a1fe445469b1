use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::eval::{Interp, Step};
use crate::heap::HeapObject;
use crate::printer;
use crate::reader::Reader;
use crate::symbol::sym;
use crate::value::{Closure, ClosureKind, Frame, SymbolId, Value};

/// Bumped whenever a builtin is added, removed or changes meaning.
pub const BUILTINS_VERSION: u32 = 1;

/// A special form: receives the unevaluated argument list and the caller's environment.
pub type FormFn = fn(&mut Interp, Value, Value) -> Result<Step>;
/// A procedure: receives the evaluated argument list.
pub type ProcFn = fn(&mut Interp, Value) -> Result<Step>;

#[derive(Clone, Copy)]
pub enum Handler {
    Form(FormFn),
    Proc(ProcFn),
}

/// A registered builtin. Values refer to it by index.
#[derive(Clone, Copy)]
pub struct Native {
    pub name: SymbolId,
    pub handler: Handler,
}

/// Install the builtin special forms and procedures into the global frame.
pub fn install(interp: &mut Interp) -> Result<()> {
    let t = interp.true_;
    let f = interp.false_;
    interp.define("#t", t)?;
    interp.define("#f", f)?;

    let forms: &[(&str, FormFn)] = &[
        ("quote", form_quote),
        ("lambda", form_lambda),
        ("macro", form_macro),
        ("define", form_define),
        ("set!", form_set),
        ("if", form_if),
        ("prefix", form_prefix),
        ("rescue", form_rescue),
    ];
    for &(name, handler) in forms {
        interp.define_form(name, handler)?;
    }

    let procs: &[(&str, ProcFn)] = &[
        ("display", proc_display),
        ("error", proc_error),
        ("env", proc_env),
        ("top-env", proc_top_env),
        ("type", proc_type),
        ("cons", proc_cons),
        ("car", proc_car),
        ("cdr", proc_cdr),
        ("null?", proc_null),
        ("list", proc_list),
        ("concat", proc_concat),
        ("length", proc_length),
        ("ord", proc_ord),
        ("chr", proc_chr),
        ("readc", proc_readc),
        ("putbackc", proc_putbackc),
        ("writec", proc_writec),
        ("+", proc_add),
        ("-", proc_sub),
        ("*", proc_mul),
        ("/", proc_div),
        ("%", proc_mod),
        ("=", proc_eq),
        ("<", proc_less),
        ("nand", proc_nand),
        ("eval-in&", proc_eval_in),
        ("call-with-current-continuation", proc_call_cc),
        ("apply", proc_apply),
        ("read", proc_read),
        ("gc", proc_gc),
        ("load-mod", proc_load_mod),
    ];
    for &(name, handler) in procs {
        interp.define_proc(name, handler)?;
    }
    if let Some(call_cc) = interp.lookup("call-with-current-continuation") {
        interp.define("call/cc", call_cc)?;
    }

    debug!(forms = forms.len(), procs = procs.len(), "builtins installed");
    Ok(())
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Exactly `N` arguments.
fn fixed<const N: usize>(interp: &Interp, args: Value, name: &str) -> Result<[Value; N]> {
    let items = interp
        .heap
        .list_to_vec(args)
        .ok_or_else(|| Error::Malformed(format!("{name}: improper argument list")))?;
    items
        .try_into()
        .map_err(|_| Error::Arity(name.to_string()))
}

/// At least `min` arguments.
fn at_least(interp: &Interp, args: Value, min: usize, name: &str) -> Result<Vec<Value>> {
    let items = interp
        .heap
        .list_to_vec(args)
        .ok_or_else(|| Error::Malformed(format!("{name}: improper argument list")))?;
    if items.len() < min {
        return Err(Error::Arity(name.to_string()));
    }
    Ok(items)
}

fn int_arg(interp: &Interp, v: Value, name: &str) -> Result<i64> {
    v.as_int()
        .ok_or_else(|| Error::Type(format!("{name}: expected integer, got {}", interp.render(v))))
}

fn symbol_arg(interp: &Interp, v: Value, name: &str) -> Result<SymbolId> {
    v.as_symbol()
        .ok_or_else(|| Error::Type(format!("{name}: expected symbol, got {}", interp.render(v))))
}

fn first_byte(interp: &Interp, v: Value, name: &str) -> Result<u8> {
    let id = symbol_arg(interp, v, name)?;
    interp
        .symbols
        .bytes(id)
        .first()
        .copied()
        .ok_or_else(|| Error::Type(format!("{name}: empty symbol")))
}

fn byte_symbol(interp: &mut Interp, byte: u8) -> Value {
    Value::Symbol(interp.symbols.intern_bytes(&[byte]))
}

// ============================================================================
// Special forms
// ============================================================================

/// (quote x)
fn form_quote(interp: &mut Interp, args: Value, _env: Value) -> Result<Step> {
    let [x] = fixed::<1>(interp, args, "quote")?;
    Ok(Step::Value(x))
}

fn make_closure(interp: &mut Interp, closure: Closure) -> Result<Step> {
    let id = interp.heap.alloc(HeapObject::Closure(closure))?;
    Ok(Step::Value(Value::Closure(id)))
}

/// (lambda params body...)
fn form_lambda(interp: &mut Interp, args: Value, env: Value) -> Result<Step> {
    let Value::Pair(id) = args else {
        return Err(Error::Malformed("lambda: missing parameter list".into()));
    };
    let params = interp.heap.car(id);
    let body = interp.heap.cdr(id);
    make_closure(
        interp,
        Closure {
            kind: ClosureKind::Lambda,
            params,
            env_name: None,
            body,
            env,
        },
    )
}

/// (macro params env-name body...)
///
/// `env-name` is bound to the caller's environment while the body runs; `()`
/// leaves it unbound. The body's value is evaluated again in the caller's
/// environment.
fn form_macro(interp: &mut Interp, args: Value, env: Value) -> Result<Step> {
    let items = at_least(interp, args, 2, "macro")?;
    let env_name = match items[1] {
        Value::Nil => None,
        Value::Symbol(name) => Some(name),
        _ => return Err(Error::Malformed("macro: environment name is not a symbol".into())),
    };
    let body = interp.heap.cdr_val(interp.heap.cdr_val(args)?)?;
    make_closure(
        interp,
        Closure {
            kind: ClosureKind::Macro,
            params: items[0],
            env_name,
            body,
            env,
        },
    )
}

/// (define name expr): binds in the innermost frame and returns the value.
fn form_define(interp: &mut Interp, args: Value, env: Value) -> Result<Step> {
    let [name, expr] = fixed::<2>(interp, args, "define")?;
    let Value::Symbol(name) = name else {
        return Err(Error::Malformed("define: name is not a symbol".into()));
    };
    interp.push_frame(Frame::Define { name, env })?;
    interp.push_frame(Frame::Eval { expr, env })?;
    Ok(Step::Pushed)
}

/// (set! name expr): rebinds the nearest existing binding.
fn form_set(interp: &mut Interp, args: Value, env: Value) -> Result<Step> {
    let [name, expr] = fixed::<2>(interp, args, "set!")?;
    let Value::Symbol(name) = name else {
        return Err(Error::Malformed("set!: name is not a symbol".into()));
    };
    interp.push_frame(Frame::Assign { name, env })?;
    interp.push_frame(Frame::Eval { expr, env })?;
    Ok(Step::Pushed)
}

/// (if test then [else])
fn form_if(interp: &mut Interp, args: Value, env: Value) -> Result<Step> {
    let items = at_least(interp, args, 2, "if")?;
    if items.len() > 3 {
        return Err(Error::Arity("if".into()));
    }
    let otherwise = items.get(2).copied().unwrap_or(Value::Nil);
    interp.push_frame(Frame::Branch {
        then: items[1],
        otherwise,
        env,
    })?;
    interp.push_frame(Frame::Eval {
        expr: items[0],
        env,
    })?;
    Ok(Step::Pushed)
}

/// (prefix key handler): when the reader meets the first byte of `key` it
/// reads one more expression `x` and produces `(handler x)`. Newer entries
/// take precedence over older ones for the same byte.
fn form_prefix(interp: &mut Interp, args: Value, _env: Value) -> Result<Step> {
    let [key, handler] = fixed::<2>(interp, args, "prefix")?;
    first_byte(interp, key, "prefix")?;
    let entry = interp.heap.cons(key, handler)?;
    interp.prefixes = interp.heap.cons(entry, interp.prefixes)?;
    debug!(key = %interp.render(key), "reader prefix registered");
    Ok(Step::Value(key))
}

/// (rescue handler body...): runs `body`; if a recoverable error escapes it,
/// control unwinds to this point and the result is `(handler condition)`.
fn form_rescue(interp: &mut Interp, args: Value, env: Value) -> Result<Step> {
    let Value::Pair(id) = args else {
        return Err(Error::Malformed("rescue: missing handler".into()));
    };
    let handler = interp.heap.car(id);
    let body = interp.heap.cdr(id);
    interp.push_frame(Frame::Guard { body, env })?;
    interp.push_frame(Frame::Eval {
        expr: handler,
        env,
    })?;
    Ok(Step::Pushed)
}

// ============================================================================
// Procedures
// ============================================================================

/// (display x...): writes each value, separated by spaces, then a newline.
fn proc_display(interp: &mut Interp, args: Value) -> Result<Step> {
    let items = at_least(interp, args, 0, "display")?;
    let mut out = Vec::new();
    for (i, &v) in items.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        out.extend(printer::print_bytes(
            v,
            &interp.heap,
            &interp.symbols,
            &interp.natives,
        ));
    }
    out.push(b'\n');
    interp.port.write_all(&out);
    interp.port.flush();
    Ok(Step::Value(Value::Nil))
}

/// (error x): raise `x`. With several arguments the list of them is raised.
fn proc_error(interp: &mut Interp, args: Value) -> Result<Step> {
    let items = at_least(interp, args, 1, "error")?;
    let raised = if items.len() == 1 { items[0] } else { args };
    Err(Error::Raised(raised))
}

/// (env): the environment of the call site.
fn proc_env(interp: &mut Interp, args: Value) -> Result<Step> {
    let [] = fixed::<0>(interp, args, "env")?;
    Ok(Step::Value(interp.env))
}

fn proc_top_env(interp: &mut Interp, args: Value) -> Result<Step> {
    let [] = fixed::<0>(interp, args, "top-env")?;
    Ok(Step::Value(interp.top_env))
}

/// (type x): a symbol naming the variant of `x`.
fn proc_type(interp: &mut Interp, args: Value) -> Result<Step> {
    let [x] = fixed::<1>(interp, args, "type")?;
    let name = match x {
        Value::Nil => sym::NIL,
        Value::Int(_) => sym::INTEGER,
        Value::Symbol(_) => sym::SYMBOL,
        Value::Pair(_) => sym::PAIR,
        Value::Form(_) => sym::FORM,
        Value::Proc(_) => sym::PROCEDURE,
        Value::Closure(id) => match interp.heap.closure(id).map(|c| c.kind) {
            Some(ClosureKind::Macro) => sym::MACRO,
            _ => sym::LAMBDA,
        },
        Value::Cont(_) => sym::CONTINUATION,
    };
    Ok(Step::Value(Value::Symbol(name)))
}

fn proc_cons(interp: &mut Interp, args: Value) -> Result<Step> {
    let [a, b] = fixed::<2>(interp, args, "cons")?;
    Ok(Step::Value(interp.heap.cons(a, b)?))
}

/// (car p): type error on anything but a pair.
fn proc_car(interp: &mut Interp, args: Value) -> Result<Step> {
    let [p] = fixed::<1>(interp, args, "car")?;
    Ok(Step::Value(interp.heap.car_val(p)?))
}

fn proc_cdr(interp: &mut Interp, args: Value) -> Result<Step> {
    let [p] = fixed::<1>(interp, args, "cdr")?;
    Ok(Step::Value(interp.heap.cdr_val(p)?))
}

fn proc_null(interp: &mut Interp, args: Value) -> Result<Step> {
    let [x] = fixed::<1>(interp, args, "null?")?;
    Ok(Step::Value(interp.bool_value(x.is_nil())))
}

fn proc_list(_interp: &mut Interp, args: Value) -> Result<Step> {
    Ok(Step::Value(args))
}

/// (concat x...): a symbol whose name joins the names of symbols and the
/// decimal text of integers.
fn proc_concat(interp: &mut Interp, args: Value) -> Result<Step> {
    let items = at_least(interp, args, 0, "concat")?;
    let mut buf = Vec::new();
    for v in items {
        match v {
            Value::Symbol(id) => buf.extend_from_slice(interp.symbols.bytes(id)),
            Value::Int(n) => buf.extend_from_slice(n.to_string().as_bytes()),
            Value::Nil => {}
            other => {
                return Err(Error::Type(format!(
                    "concat: expected symbol or integer, got {}",
                    interp.render(other)
                )))
            }
        }
    }
    Ok(Step::Value(Value::Symbol(interp.symbols.intern_bytes(&buf))))
}

/// (length x): byte length of a symbol, or element count of a proper list.
fn proc_length(interp: &mut Interp, args: Value) -> Result<Step> {
    let [x] = fixed::<1>(interp, args, "length")?;
    let len = match x {
        Value::Symbol(id) => interp.symbols.bytes(id).len(),
        Value::Nil | Value::Pair(_) => interp
            .heap
            .list_to_vec(x)
            .ok_or_else(|| Error::Type("length: improper list".into()))?
            .len(),
        other => {
            return Err(Error::Type(format!(
                "length: expected symbol or list, got {}",
                interp.render(other)
            )))
        }
    };
    Ok(Step::Value(Value::Int(len as i64)))
}

/// (ord c): the first byte of symbol `c`.
fn proc_ord(interp: &mut Interp, args: Value) -> Result<Step> {
    let [c] = fixed::<1>(interp, args, "ord")?;
    let byte = first_byte(interp, c, "ord")?;
    Ok(Step::Value(Value::Int(i64::from(byte))))
}

/// (chr n): the one-byte symbol for `n`, which must fit in a byte.
fn proc_chr(interp: &mut Interp, args: Value) -> Result<Step> {
    let [n] = fixed::<1>(interp, args, "chr")?;
    let n = int_arg(interp, n, "chr")?;
    let byte = u8::try_from(n).map_err(|_| Error::Type(format!("chr: {n} is not a byte")))?;
    Ok(Step::Value(byte_symbol(interp, byte)))
}

/// (readc): the next input byte as a one-byte symbol, or `()` at end of input.
fn proc_readc(interp: &mut Interp, args: Value) -> Result<Step> {
    let [] = fixed::<0>(interp, args, "readc")?;
    match interp.port.getc() {
        Some(byte) => Ok(Step::Value(byte_symbol(interp, byte))),
        None => Ok(Step::Value(Value::Nil)),
    }
}

fn proc_putbackc(interp: &mut Interp, args: Value) -> Result<Step> {
    let [c] = fixed::<1>(interp, args, "putbackc")?;
    let byte = first_byte(interp, c, "putbackc")?;
    interp.port.putback(byte);
    Ok(Step::Value(c))
}

fn proc_writec(interp: &mut Interp, args: Value) -> Result<Step> {
    let [c] = fixed::<1>(interp, args, "writec")?;
    let byte = first_byte(interp, c, "writec")?;
    interp.port.putc(byte);
    Ok(Step::Value(c))
}

/// Left fold over integer arguments. Arithmetic wraps on overflow.
fn fold_ints(
    interp: &Interp,
    args: Value,
    name: &str,
    op: fn(i64, i64) -> Result<i64>,
) -> Result<i64> {
    let items = at_least(interp, args, 1, name)?;
    let mut acc = int_arg(interp, items[0], name)?;
    for &v in &items[1..] {
        acc = op(acc, int_arg(interp, v, name)?)?;
    }
    Ok(acc)
}

/// (+ n...): zero with no arguments.
fn proc_add(interp: &mut Interp, args: Value) -> Result<Step> {
    if args.is_nil() {
        return Ok(Step::Value(Value::Int(0)));
    }
    let sum = fold_ints(interp, args, "+", |a, b| Ok(a.wrapping_add(b)))?;
    Ok(Step::Value(Value::Int(sum)))
}

/// (- n...): negation with one argument.
fn proc_sub(interp: &mut Interp, args: Value) -> Result<Step> {
    let items = at_least(interp, args, 1, "-")?;
    if items.len() == 1 {
        let n = int_arg(interp, items[0], "-")?;
        return Ok(Step::Value(Value::Int(n.wrapping_neg())));
    }
    let diff = fold_ints(interp, args, "-", |a, b| Ok(a.wrapping_sub(b)))?;
    Ok(Step::Value(Value::Int(diff)))
}

/// (* n...): one with no arguments.
fn proc_mul(interp: &mut Interp, args: Value) -> Result<Step> {
    if args.is_nil() {
        return Ok(Step::Value(Value::Int(1)));
    }
    let product = fold_ints(interp, args, "*", |a, b| Ok(a.wrapping_mul(b)))?;
    Ok(Step::Value(Value::Int(product)))
}

/// (/ n d...): truncating division.
fn proc_div(interp: &mut Interp, args: Value) -> Result<Step> {
    at_least(interp, args, 2, "/")?;
    let quotient = fold_ints(interp, args, "/", |a, b| {
        if b == 0 {
            Err(Error::DivisionByZero)
        } else {
            Ok(a.wrapping_div(b))
        }
    })?;
    Ok(Step::Value(Value::Int(quotient)))
}

/// (% n d...): remainder with the sign of the dividend.
fn proc_mod(interp: &mut Interp, args: Value) -> Result<Step> {
    at_least(interp, args, 2, "%")?;
    let rem = fold_ints(interp, args, "%", |a, b| {
        if b == 0 {
            Err(Error::DivisionByZero)
        } else {
            Ok(a.wrapping_rem(b))
        }
    })?;
    Ok(Step::Value(Value::Int(rem)))
}

/// (= a b...): integers compare by value, everything else by identity.
fn proc_eq(interp: &mut Interp, args: Value) -> Result<Step> {
    let items = at_least(interp, args, 2, "=")?;
    let equal = items.windows(2).all(|w| w[0] == w[1]);
    Ok(Step::Value(interp.bool_value(equal)))
}

/// (< a b...): strictly increasing integers.
fn proc_less(interp: &mut Interp, args: Value) -> Result<Step> {
    let items = at_least(interp, args, 2, "<")?;
    let mut ints = Vec::with_capacity(items.len());
    for &v in &items {
        ints.push(int_arg(interp, v, "<")?);
    }
    let increasing = ints.windows(2).all(|w| w[0] < w[1]);
    Ok(Step::Value(interp.bool_value(increasing)))
}

/// (nand x...): false only when every argument is true.
fn proc_nand(interp: &mut Interp, args: Value) -> Result<Step> {
    let items = at_least(interp, args, 1, "nand")?;
    let all = items.iter().all(|&v| interp.is_true(v));
    Ok(Step::Value(interp.bool_value(!all)))
}

/// (eval-in& env expr): evaluate `expr` in `env`, in tail position.
fn proc_eval_in(interp: &mut Interp, args: Value) -> Result<Step> {
    let [env, expr] = fixed::<2>(interp, args, "eval-in&")?;
    if !env.is_pair() {
        return Err(Error::Type(format!(
            "eval-in&: expected environment, got {}",
            interp.render(env)
        )));
    }
    Ok(Step::Eval { expr, env })
}

/// (call-with-current-continuation f): apply `f` to the continuation of this call.
fn proc_call_cc(interp: &mut Interp, args: Value) -> Result<Step> {
    let [f] = fixed::<1>(interp, args, "call-with-current-continuation")?;
    if !f.is_applicable() {
        return Err(Error::InvalidApplication(interp.render(f)));
    }
    let k = interp.capture()?;
    let args = interp.heap.list(&[k])?;
    Ok(Step::Apply { op: f, args })
}

/// (apply f args)
fn proc_apply(interp: &mut Interp, args: Value) -> Result<Step> {
    let [op, list] = fixed::<2>(interp, args, "apply")?;
    if !interp.heap.is_proper_list(list) {
        return Err(Error::Type("apply: arguments are not a proper list".into()));
    }
    if !op.is_applicable() {
        return Err(Error::InvalidApplication(interp.render(op)));
    }
    Ok(Step::Apply { op, args: list })
}

/// (read): `(datum)` for the next expression on the input, `()` at end of input.
fn proc_read(interp: &mut Interp, args: Value) -> Result<Step> {
    let [] = fixed::<0>(interp, args, "read")?;
    let datum = Reader::new(
        &mut interp.port,
        &mut interp.heap,
        &mut interp.symbols,
        interp.prefixes,
    )
    .read()?;
    match datum {
        Some(v) => Ok(Step::Value(interp.heap.list(&[v])?)),
        None => Ok(Step::Value(Value::Nil)),
    }
}

/// (gc): collect at the next safe point.
fn proc_gc(interp: &mut Interp, args: Value) -> Result<Step> {
    let [] = fixed::<0>(interp, args, "gc")?;
    interp.gc_requested = true;
    trace!("collection requested");
    Ok(Step::Value(Value::Nil))
}

/// (load-mod name): ask the host to load a module. True on success.
fn proc_load_mod(interp: &mut Interp, args: Value) -> Result<Step> {
    let [name] = fixed::<1>(interp, args, "load-mod")?;
    let id = symbol_arg(interp, name, "load-mod")?;
    let module = interp.symbols.name(id);
    let loaded = interp.loader.load(&module);
    debug!(module = %module, loaded, "module load");
    Ok(Step::Value(interp.bool_value(loaded)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::BufferIo;

    fn interp() -> Interp {
        let mut lisp = Interp::with_io(Config::default(), Box::new(BufferIo::new(""))).unwrap();
        lisp.eval_str("(prefix ' quote)").unwrap();
        lisp
    }

    fn eval(lisp: &mut Interp, src: &str) -> String {
        let v = lisp.eval_str(src).unwrap();
        lisp.render(v)
    }

    #[test]
    fn arithmetic_folds_left() {
        let mut lisp = interp();
        assert_eq!(eval(&mut lisp, "(+)"), "0");
        assert_eq!(eval(&mut lisp, "(+ 1 2 3)"), "6");
        assert_eq!(eval(&mut lisp, "(- 10 3 2)"), "5");
        assert_eq!(eval(&mut lisp, "(- 4)"), "-4");
        assert_eq!(eval(&mut lisp, "(* 2 3 4)"), "24");
        assert_eq!(eval(&mut lisp, "(/ 100 5 2)"), "10");
        assert_eq!(eval(&mut lisp, "(% 17 5)"), "2");
    }

    #[test]
    fn arithmetic_wraps_on_overflow() {
        let mut lisp = interp();
        assert_eq!(
            eval(&mut lisp, "(+ 9223372036854775807 1)"),
            i64::MIN.to_string()
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut lisp = interp();
        assert!(matches!(lisp.eval_str("(/ 1 0)"), Err(Error::DivisionByZero)));
        assert!(matches!(lisp.eval_str("(% 1 0)"), Err(Error::DivisionByZero)));
    }

    #[test]
    fn comparison_and_logic() {
        let mut lisp = interp();
        assert_eq!(eval(&mut lisp, "(= 3 3)"), "#t");
        assert_eq!(eval(&mut lisp, "(= 'a 'a)"), "#t");
        assert_eq!(eval(&mut lisp, "(= 'a 'b)"), "#f");
        assert_eq!(eval(&mut lisp, "(< 1 2 3)"), "#t");
        assert_eq!(eval(&mut lisp, "(< 1 3 2)"), "#f");
        assert_eq!(eval(&mut lisp, "(nand #t #t)"), "#f");
        assert_eq!(eval(&mut lisp, "(nand #t #f)"), "#t");
        assert_eq!(eval(&mut lisp, "(nand ())"), "#t");
    }

    #[test]
    fn list_operations() {
        let mut lisp = interp();
        assert_eq!(eval(&mut lisp, "(cons 1 2)"), "(1 . 2)");
        assert_eq!(eval(&mut lisp, "(car '(a b))"), "a");
        assert_eq!(eval(&mut lisp, "(cdr '(a b))"), "(b)");
        assert_eq!(eval(&mut lisp, "(null? ())"), "#t");
        assert_eq!(eval(&mut lisp, "(null? '(1))"), "#f");
        assert_eq!(eval(&mut lisp, "(list 1 (+ 1 1) 3)"), "(1 2 3)");
        assert!(matches!(lisp.eval_str("(car 5)"), Err(Error::Type(_))));
    }

    #[test]
    fn symbol_operations() {
        let mut lisp = interp();
        assert_eq!(eval(&mut lisp, "(concat 'foo '- 42)"), "foo-42");
        assert_eq!(eval(&mut lisp, "(length 'hello)"), "5");
        assert_eq!(eval(&mut lisp, "(length '(1 2 3))"), "3");
        assert_eq!(eval(&mut lisp, "(ord 'A)"), "65");
        assert_eq!(eval(&mut lisp, "(chr 97)"), "a");
        assert!(matches!(lisp.eval_str("(chr 300)"), Err(Error::Type(_))));
    }

    #[test]
    fn type_names_each_variant() {
        let mut lisp = interp();
        assert_eq!(eval(&mut lisp, "(type ())"), "nil");
        assert_eq!(eval(&mut lisp, "(type 1)"), "integer");
        assert_eq!(eval(&mut lisp, "(type 'x)"), "symbol");
        assert_eq!(eval(&mut lisp, "(type '(1))"), "pair");
        assert_eq!(eval(&mut lisp, "(type if)"), "form");
        assert_eq!(eval(&mut lisp, "(type car)"), "procedure");
        assert_eq!(eval(&mut lisp, "(type (lambda (x) x))"), "lambda");
        assert_eq!(eval(&mut lisp, "(type (macro (x) () x))"), "macro");
        assert_eq!(eval(&mut lisp, "(type (call/cc (lambda (k) k)))"), "continuation");
    }

    #[test]
    fn arity_is_checked() {
        let mut lisp = interp();
        assert!(matches!(lisp.eval_str("(cons 1)"), Err(Error::Arity(_))));
        assert!(matches!(lisp.eval_str("(quote a b)"), Err(Error::Arity(_))));
        assert!(matches!(lisp.eval_str("((lambda (x) x))"), Err(Error::Arity(_))));
    }

    #[test]
    fn display_and_writec_reach_the_host() {
        let io = BufferIo::new("");
        let out = io.output();
        let mut lisp = Interp::with_io(Config::default(), Box::new(io)).unwrap();
        lisp.eval_str("(display 1 (cons 2 3) (quote hi))").unwrap();
        lisp.eval_str("(writec (quote x))").unwrap();
        assert_eq!(String::from_utf8_lossy(&out.borrow()), "1 (2 . 3) hi\nx");
    }

    #[test]
    fn readc_and_read_consume_host_input() {
        let mut lisp =
            Interp::with_io(Config::default(), Box::new(BufferIo::new("ab (1 2)"))).unwrap();
        assert_eq!(eval(&mut lisp, "(readc)"), "a");
        assert_eq!(eval(&mut lisp, "(putbackc (quote z))"), "z");
        assert_eq!(eval(&mut lisp, "(readc)"), "z");
        assert_eq!(eval(&mut lisp, "(readc)"), "b");
        assert_eq!(eval(&mut lisp, "(read)"), "((1 2))");
        assert_eq!(eval(&mut lisp, "(read)"), "()");
        assert_eq!(eval(&mut lisp, "(readc)"), "()");
    }

    #[test]
    fn apply_and_eval_in() {
        let mut lisp = interp();
        assert_eq!(eval(&mut lisp, "(apply + '(1 2 3))"), "6");
        assert_eq!(eval(&mut lisp, "(apply (lambda x x) '(1 2))"), "(1 2)");
        assert_eq!(eval(&mut lisp, "(eval-in& (top-env) '(+ 1 2))"), "3");
        assert_eq!(
            eval(&mut lisp, "((lambda (y) (eval-in& (env) 'y)) 7)"),
            "7"
        );
    }

    #[test]
    fn load_mod_consults_the_host_loader() {
        struct Only(&'static str);
        impl crate::host::ModuleLoader for Only {
            fn load(&mut self, name: &str) -> bool {
                name == self.0
            }
        }
        let mut lisp = interp();
        assert_eq!(eval(&mut lisp, "(load-mod 'math)"), "#f");
        lisp.set_loader(Box::new(Only("math")));
        assert_eq!(eval(&mut lisp, "(load-mod 'math)"), "#t");
    }
}
