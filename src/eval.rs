//! The evaluator: an explicit state machine over heap-allocated control state.
//!
//! Nothing about a pending computation lives on the Rust call stack. The
//! continuation stack is a linked list of immutable [`Frame`] objects and the
//! value stack is a list of pairs that are never mutated, so capturing a
//! continuation is just copying three handles and invoking one is replacing
//! them. Collection only runs between steps, when every live value is
//! reachable from the interpreter's fields.

use tracing::{debug, trace};

use crate::config::Config;
use crate::env;
use crate::error::{Error, Result};
use crate::heap::{Allocator, Heap, HeapObject, HeapStats, SystemAllocator, Trace};
use crate::host::{BufferIo, Io, ModuleLoader, NoModules, Port, StdIo};
use crate::primitives::{self, FormFn, Handler, Native, ProcFn};
use crate::printer;
use crate::reader::Reader;
use crate::symbol::{sym, SymbolTable};
use crate::value::{
    Closure, ClosureKind, Frame, NativeId, ObjId, Rescue, Snapshot, SymbolId, Value,
};

/// What a builtin wants the evaluator to do next.
#[derive(Clone, Copy, Debug)]
pub enum Step {
    /// The builtin produced its result.
    Value(Value),
    /// The result is the value of `expr` in `env` (evaluated in tail position).
    Eval { expr: Value, env: Value },
    /// The result is `op` applied to the already-evaluated `args`.
    Apply { op: Value, args: Value },
    /// The builtin scheduled its own frames. Only used by built-in special forms.
    Pushed,
}

/// An interpreter instance: heap, symbols, environments and control state.
/// Instances share nothing; handles from one are meaningless in another.
pub struct Interp {
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub(crate) natives: Vec<Native>,
    pub(crate) port: Port,
    pub(crate) loader: Box<dyn ModuleLoader>,

    /// The environment holding the global frame. Never changes.
    pub top_env: Value,
    /// Environment of the expression most recently evaluated or applied.
    pub(crate) env: Value,

    conts: Option<ObjId>,
    values: Value,
    rescues: Option<ObjId>,

    /// Reader prefix table: list of `(key . handler)`.
    pub(crate) prefixes: Value,
    /// The condition that last escaped to the host, or Nil.
    error: Value,
    pub true_: Value,
    pub false_: Value,

    /// Host-held values kept alive across evaluations.
    pins: Vec<Value>,
    pub(crate) gc_requested: bool,
}

impl Interp {
    /// An interpreter on stdin/stdout with default settings.
    pub fn new() -> Result<Self> {
        Self::with_io(Config::default(), Box::new(StdIo))
    }

    /// An interpreter on the given I/O, using the default allocator.
    pub fn with_io(config: Config, io: Box<dyn Io>) -> Result<Self> {
        let allocator: Box<dyn Allocator> = match config.heap_limit {
            Some(limit) => Box::new(SystemAllocator::with_limit(limit)),
            None => Box::new(SystemAllocator::new()),
        };
        Self::with_host(config, io, allocator)
    }

    /// An interpreter on fully host-supplied callbacks.
    pub fn with_host(config: Config, io: Box<dyn Io>, allocator: Box<dyn Allocator>) -> Result<Self> {
        let mut heap = Heap::new(allocator, config.gc_events, config.alloc_batch);
        let top_env = env::extend(&mut heap, Value::Nil, Value::Nil)?;

        let mut interp = Interp {
            heap,
            symbols: SymbolTable::new(),
            natives: Vec::new(),
            port: Port::new(io),
            loader: Box::new(NoModules),
            top_env,
            env: top_env,
            conts: None,
            values: Value::Nil,
            rescues: None,
            prefixes: Value::Nil,
            error: Value::Nil,
            true_: Value::Symbol(sym::TRUE),
            false_: Value::Symbol(sym::FALSE),
            pins: Vec::new(),
            gc_requested: false,
        };
        primitives::install(&mut interp)?;
        debug!(
            builtins = interp.natives.len(),
            version = primitives::BUILTINS_VERSION,
            "interpreter initialized"
        );
        Ok(interp)
    }

    pub fn set_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = loader;
    }

    // ========================================================================
    // Host-facing API
    // ========================================================================

    /// Intern `name` and return it as a symbol value.
    pub fn intern(&mut self, name: &str) -> Value {
        Value::Symbol(self.symbols.intern(name))
    }

    /// Bind `name` in the global frame.
    pub fn define(&mut self, name: &str, val: Value) -> Result<()> {
        let id = self.symbols.intern(name);
        env::define(&mut self.heap, self.top_env, id, val)
    }

    /// Look up `name` in the global environment.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let id = self.symbols.lookup(name)?;
        env::get(&self.heap, self.top_env, id)
    }

    /// Register a special form receiving unevaluated arguments and the environment.
    pub fn define_form(&mut self, name: &str, handler: FormFn) -> Result<Value> {
        let id = self.add_native(name, Handler::Form(handler));
        let val = Value::Form(id);
        self.define(name, val)?;
        Ok(val)
    }

    /// Register a procedure receiving evaluated arguments.
    pub fn define_proc(&mut self, name: &str, handler: ProcFn) -> Result<Value> {
        let id = self.add_native(name, Handler::Proc(handler));
        let val = Value::Proc(id);
        self.define(name, val)?;
        Ok(val)
    }

    fn add_native(&mut self, name: &str, handler: Handler) -> NativeId {
        let name = self.symbols.intern(name);
        let id = NativeId(self.natives.len() as u32);
        self.natives.push(Native { name, handler });
        id
    }

    /// Read one expression from the interpreter's input. None at end of input.
    pub fn read(&mut self) -> Result<Option<Value>> {
        let result =
            Reader::new(&mut self.port, &mut self.heap, &mut self.symbols, self.prefixes).read();
        result.map_err(|e| self.fail(e))
    }

    /// Evaluate an expression in the global environment.
    pub fn eval(&mut self, expr: Value) -> Result<Value> {
        let env = self.top_env;
        self.eval_in(expr, env)
    }

    /// Evaluate an expression in `env`.
    pub fn eval_in(&mut self, expr: Value, env: Value) -> Result<Value> {
        self.abort();
        self.error = Value::Nil;
        if let Err(err) = self.push_frame(Frame::Eval { expr, env }) {
            return Err(self.fail(err));
        }
        self.run()
    }

    /// Read and evaluate every expression in `src`, returning the last result.
    /// Prefixes registered by earlier expressions apply to later ones.
    pub fn eval_str(&mut self, src: &str) -> Result<Value> {
        let mut port = Port::new(Box::new(BufferIo::new(src)));
        let mut last = Value::Nil;
        loop {
            let expr =
                Reader::new(&mut port, &mut self.heap, &mut self.symbols, self.prefixes).read();
            let Some(expr) = expr.map_err(|e| self.fail(e))? else {
                return Ok(last);
            };
            last = self.eval(expr)?;
        }
    }

    /// The condition that aborted the last evaluation, if any.
    pub fn last_error(&self) -> Option<Value> {
        (!self.error.is_nil()).then_some(self.error)
    }

    /// Keep `val` alive across collections until unpinned.
    pub fn pin(&mut self, val: Value) {
        self.pins.push(val);
    }

    pub fn unpin(&mut self, val: Value) {
        if let Some(pos) = self.pins.iter().rposition(|&v| v == val) {
            self.pins.remove(pos);
        }
    }

    /// Run a full collection now. Returns the number of slots reclaimed.
    pub fn collect(&mut self) -> usize {
        let mut roots = Vec::new();
        self.trace(&mut roots);
        self.gc_requested = false;
        self.heap.collect(&roots)
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub fn render(&self, val: Value) -> String {
        printer::print_val(val, &self.heap, &self.symbols, &self.natives)
    }

    pub fn is_true(&self, val: Value) -> bool {
        val != self.false_ && !val.is_nil()
    }

    pub fn bool_value(&self, b: bool) -> Value {
        if b {
            self.true_
        } else {
            self.false_
        }
    }

    // ========================================================================
    // The main loop
    // ========================================================================

    fn run(&mut self) -> Result<Value> {
        loop {
            if self.gc_requested || self.heap.should_collect() {
                self.collect();
            }

            let Some(id) = self.conts else {
                let result = self.pop_value()?;
                self.values = Value::Nil;
                return Ok(result);
            };
            let (frame, next) = self.frame_at(id)?;
            self.conts = next;

            if let Err(err) = self.step(frame) {
                self.signal(err)?;
            }
        }
    }

    fn step(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Eval { expr, env } => self.eval_expr(expr, env),
            Frame::Call { args, env } => {
                let op = self.pop_value()?;
                self.call(op, args, env)
            }
            Frame::Apply { op, argc, env } => {
                let args = self.pop_args(argc)?;
                self.env = env;
                self.apply(op, args)
            }
            Frame::Seq { body, env } => {
                self.pop_value()?;
                self.push_body(body, env)
            }
            Frame::Branch {
                then,
                otherwise,
                env,
            } => {
                let test = self.pop_value()?;
                let expr = if self.is_true(test) { then } else { otherwise };
                self.push_frame(Frame::Eval { expr, env })
            }
            Frame::Define { name, env } => {
                let val = self.top_value()?;
                env::define(&mut self.heap, env, name, val)
            }
            Frame::Assign { name, env } => {
                let val = self.top_value()?;
                if env::rebind(&mut self.heap, env, name, val) {
                    Ok(())
                } else {
                    Err(Error::Unbound(self.symbols.name(name)))
                }
            }
            Frame::Expand { env } => {
                let expr = self.pop_value()?;
                self.push_frame(Frame::Eval { expr, env })
            }
            Frame::Guard { body, env } => {
                let handler = self.pop_value()?;
                let rescue = Rescue {
                    handler,
                    resume: self.snapshot(),
                };
                let id = self.heap.alloc(HeapObject::Rescue {
                    rescue,
                    next: self.rescues,
                })?;
                self.rescues = Some(id);
                self.push_frame(Frame::Unguard)?;
                self.push_body(body, env)
            }
            Frame::Unguard => {
                if let Some(id) = self.rescues {
                    self.rescues = self.rescue_at(id)?.1;
                }
                Ok(())
            }
        }
    }

    fn eval_expr(&mut self, expr: Value, env: Value) -> Result<()> {
        self.env = env;
        match expr {
            Value::Symbol(name) => {
                let val = self.lookup_in(env, name)?;
                self.push_value(val)
            }
            Value::Pair(id) => {
                let op = self.heap.car(id);
                let args = self.heap.cdr(id);
                if let Value::Symbol(name) = op {
                    let f = self.lookup_in(env, name)?;
                    self.call(f, args, env)
                } else {
                    self.push_frame(Frame::Call { args, env })?;
                    self.push_frame(Frame::Eval { expr: op, env })
                }
            }
            other => self.push_value(other),
        }
    }

    fn lookup_in(&self, env: Value, name: SymbolId) -> Result<Value> {
        env::get(&self.heap, env, name).ok_or_else(|| Error::Unbound(self.symbols.name(name)))
    }

    /// Dispatch on an evaluated operator with its raw argument expressions.
    fn call(&mut self, op: Value, args: Value, env: Value) -> Result<()> {
        match op {
            Value::Form(id) => {
                let Handler::Form(handler) = self.native(id)?.handler else {
                    return Err(Error::Internal("form handle names a procedure".into()));
                };
                let step = handler(self, args, env)?;
                self.finish(step)
            }
            Value::Closure(id) => {
                let clo = self.closure_at(id)?;
                match clo.kind {
                    ClosureKind::Macro => self.expand(clo, args, env),
                    ClosureKind::Lambda => self.eval_args(op, args, env),
                }
            }
            Value::Proc(_) | Value::Cont(_) => self.eval_args(op, args, env),
            other => Err(Error::InvalidApplication(self.render(other))),
        }
    }

    /// Schedule evaluation of each argument, left to right, then the application.
    fn eval_args(&mut self, op: Value, args: Value, env: Value) -> Result<()> {
        let exprs = self
            .heap
            .list_to_vec(args)
            .ok_or_else(|| Error::Malformed("argument list is not a proper list".into()))?;
        if exprs.is_empty() {
            self.env = env;
            return self.apply(op, Value::Nil);
        }
        self.push_frame(Frame::Apply {
            op,
            argc: exprs.len(),
            env,
        })?;
        for &expr in exprs.iter().rev() {
            self.push_frame(Frame::Eval { expr, env })?;
        }
        Ok(())
    }

    /// Apply an operator to evaluated arguments.
    pub(crate) fn apply(&mut self, op: Value, args: Value) -> Result<()> {
        match op {
            Value::Proc(id) => {
                let Handler::Proc(handler) = self.native(id)?.handler else {
                    return Err(Error::Internal("procedure handle names a form".into()));
                };
                let step = handler(self, args)?;
                self.finish(step)
            }
            Value::Closure(id) => {
                let clo = self.closure_at(id)?;
                if clo.kind == ClosureKind::Macro {
                    return Err(Error::InvalidApplication(self.render(op)));
                }
                let frame = env::bind_params(&mut self.heap, clo.params, args, Value::Nil, "lambda")?;
                let env = env::extend(&mut self.heap, clo.env, frame)?;
                self.push_body(clo.body, env)
            }
            Value::Cont(id) => {
                let snap = self
                    .heap
                    .continuation(id)
                    .ok_or_else(|| Error::Internal("stale continuation handle".into()))?;
                let val = match self.heap.list_to_vec(args).as_deref() {
                    Some([]) => Value::Nil,
                    Some([v]) => *v,
                    _ => return Err(Error::Arity("continuation".into())),
                };
                trace!(?id, "continuation invoked");
                self.restore(snap);
                self.push_value(val)
            }
            other => Err(Error::InvalidApplication(self.render(other))),
        }
    }

    /// Bind a macro's parameters to unevaluated arguments, run its body, and
    /// schedule the expansion for evaluation in the caller's environment.
    fn expand(&mut self, mac: Closure, args: Value, caller_env: Value) -> Result<()> {
        let mut frame = env::bind_params(&mut self.heap, mac.params, args, Value::Nil, "macro")?;
        if let Some(name) = mac.env_name {
            frame = env::frame_set(&mut self.heap, frame, name, caller_env)?;
        }
        let env = env::extend(&mut self.heap, mac.env, frame)?;
        self.push_frame(Frame::Expand { env: caller_env })?;
        self.push_body(mac.body, env)
    }

    fn finish(&mut self, step: Step) -> Result<()> {
        match step {
            Step::Value(v) => self.push_value(v),
            Step::Eval { expr, env } => self.push_frame(Frame::Eval { expr, env }),
            Step::Apply { op, args } => self.apply(op, args),
            Step::Pushed => Ok(()),
        }
    }

    /// Schedule a body: every expression in order, the last one's value kept.
    pub(crate) fn push_body(&mut self, body: Value, env: Value) -> Result<()> {
        match body {
            Value::Nil => self.push_value(Value::Nil),
            Value::Pair(id) => {
                let first = self.heap.car(id);
                let rest = self.heap.cdr(id);
                if !rest.is_nil() {
                    self.push_frame(Frame::Seq { body: rest, env })?;
                }
                self.push_frame(Frame::Eval { expr: first, env })
            }
            _ => Err(Error::Malformed("body is not a list".into())),
        }
    }

    // ========================================================================
    // Continuations and rescue
    // ========================================================================

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            conts: self.conts,
            values: self.values,
            rescues: self.rescues,
            env: self.env,
        }
    }

    fn restore(&mut self, snap: Snapshot) {
        self.conts = snap.conts;
        self.values = snap.values;
        self.rescues = snap.rescues;
        self.env = snap.env;
    }

    /// Reify the pending control state as a continuation value.
    pub(crate) fn capture(&mut self) -> Result<Value> {
        let snap = self.snapshot();
        let id = self.heap.alloc(HeapObject::Continuation(snap))?;
        trace!(?id, "continuation captured");
        Ok(Value::Cont(id))
    }

    /// Route a failed step to the nearest rescue handler, or out to the host.
    fn signal(&mut self, mut err: Error) -> Result<()> {
        loop {
            if err.is_fatal() {
                return Err(self.fail(err));
            }
            let condition = match self.condition_value(&err) {
                Ok(v) => v,
                Err(fatal) => return Err(self.fail(fatal)),
            };
            let Some(id) = self.rescues else {
                self.error = condition;
                self.abort();
                return Err(self.surface(err));
            };
            let (rescue, _) = self.rescue_at(id)?;
            debug!(error = %err, "unwinding to rescue handler");
            self.restore(rescue.resume);
            let handled = self
                .heap
                .list(&[condition])
                .and_then(|args| self.apply(rescue.handler, args));
            match handled {
                Ok(()) => return Ok(()),
                Err(next) => err = next,
            }
        }
    }

    /// The value a rescue handler receives for `err`: `(kind detail)`, or the
    /// raised value itself for user errors.
    fn condition_value(&mut self, err: &Error) -> Result<Value> {
        let (kind, detail) = match err {
            Error::Raised(v) => return Ok(*v),
            Error::Unbound(name) => (sym::UNBOUND_VARIABLE, Some(name.as_str())),
            Error::InvalidApplication(what) => (sym::INVALID_APPLICATION, Some(what.as_str())),
            Error::Malformed(msg) => (sym::MALFORMED_SYNTAX, Some(msg.as_str())),
            Error::Type(msg) | Error::Uncaught(msg) => (sym::TYPE_ERROR, Some(msg.as_str())),
            Error::Arity(name) => (sym::ARITY_ERROR, Some(name.as_str())),
            Error::DivisionByZero => (sym::DIVISION_BY_ZERO, None),
            Error::OutOfMemory { .. } | Error::Internal(_) => return Err(err.clone()),
        };
        let kind = Value::Symbol(kind);
        match detail {
            Some(text) => {
                let detail = Value::Symbol(self.symbols.intern(text));
                self.heap.list(&[kind, detail])
            }
            None => self.heap.list(&[kind]),
        }
    }

    fn surface(&self, err: Error) -> Error {
        match err {
            Error::Raised(v) => Error::Uncaught(self.render(v)),
            other => other,
        }
    }

    /// Abandon the current evaluation. After a fatal error the pending state is
    /// garbage, so collect it while nothing on the Rust side holds handles.
    fn fail(&mut self, err: Error) -> Error {
        self.abort();
        if err.is_fatal() {
            self.collect();
        }
        err
    }

    /// Drop all pending control state.
    fn abort(&mut self) {
        self.conts = None;
        self.values = Value::Nil;
        self.rescues = None;
    }

    // ========================================================================
    // Stack helpers
    // ========================================================================

    pub(crate) fn push_frame(&mut self, frame: Frame) -> Result<()> {
        let id = self.heap.alloc(HeapObject::Frame {
            frame,
            next: self.conts,
        })?;
        self.conts = Some(id);
        Ok(())
    }

    fn frame_at(&self, id: ObjId) -> Result<(Frame, Option<ObjId>)> {
        match self.heap.get(id) {
            HeapObject::Frame { frame, next } => Ok((*frame, *next)),
            other => Err(Error::Internal(format!("expected frame, found {:?}", other))),
        }
    }

    fn rescue_at(&self, id: ObjId) -> Result<(Rescue, Option<ObjId>)> {
        match self.heap.get(id) {
            HeapObject::Rescue { rescue, next } => Ok((*rescue, *next)),
            other => Err(Error::Internal(format!("expected rescue, found {:?}", other))),
        }
    }

    fn closure_at(&self, id: ObjId) -> Result<Closure> {
        self.heap
            .closure(id)
            .ok_or_else(|| Error::Internal("stale closure handle".into()))
    }

    fn native(&self, id: NativeId) -> Result<Native> {
        self.natives
            .get(id.0 as usize)
            .copied()
            .ok_or_else(|| Error::Internal(format!("unknown native {:?}", id)))
    }

    fn push_value(&mut self, val: Value) -> Result<()> {
        self.values = self.heap.cons(val, self.values)?;
        Ok(())
    }

    fn top_value(&self) -> Result<Value> {
        match self.values {
            Value::Pair(id) => Ok(self.heap.car(id)),
            _ => Err(Error::Internal("value stack underflow".into())),
        }
    }

    fn pop_value(&mut self) -> Result<Value> {
        match self.values {
            Value::Pair(id) => {
                self.values = self.heap.cdr(id);
                Ok(self.heap.car(id))
            }
            _ => Err(Error::Internal("value stack underflow".into())),
        }
    }

    /// Pop `argc` values into a list, first-evaluated first.
    fn pop_args(&mut self, argc: usize) -> Result<Value> {
        let mut args = Value::Nil;
        for _ in 0..argc {
            let v = self.pop_value()?;
            args = self.heap.cons(v, args)?;
        }
        Ok(args)
    }
}

impl Trace for Interp {
    fn trace(&self, out: &mut Vec<ObjId>) {
        self.top_env.trace(out);
        self.env.trace(out);
        self.conts.trace(out);
        self.values.trace(out);
        self.rescues.trace(out);
        self.prefixes.trace(out);
        self.error.trace(out);
        self.true_.trace(out);
        self.false_.trace(out);
        for pin in &self.pins {
            pin.trace(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn interp() -> Interp {
        Interp::with_io(Config::default(), Box::new(BufferIo::new(""))).unwrap()
    }

    #[test]
    fn self_evaluating_values() {
        let mut lisp = interp();
        assert_eq!(lisp.eval_str("42").unwrap(), Value::Int(42));
        assert_eq!(lisp.eval_str("()").unwrap(), Value::Nil);
        assert_eq!(lisp.eval_str("#t").unwrap(), lisp.true_);
    }

    #[test]
    fn unbound_symbol_is_reported_and_recorded() {
        let mut lisp = interp();
        let err = lisp.eval_str("nope").unwrap_err();
        assert!(matches!(err, Error::Unbound(ref name) if name == "nope"));
        let cond = lisp.last_error().unwrap();
        assert_eq!(lisp.render(cond), "(unbound-variable nope)");
    }

    #[test]
    fn interpreter_is_usable_after_an_error() {
        let mut lisp = interp();
        assert!(lisp.eval_str("(car 1)").is_err());
        assert_eq!(lisp.eval_str("(+ 1 2)").unwrap(), Value::Int(3));
        assert!(lisp.last_error().is_none());
    }

    #[test]
    fn non_callable_operator_is_invalid_application() {
        let mut lisp = interp();
        assert!(matches!(lisp.eval_str("(1 2)"), Err(Error::InvalidApplication(_))));
    }

    #[test]
    fn tail_calls_do_not_grow_the_control_stack() {
        let mut lisp = Interp::with_io(
            Config {
                gc_events: 4096,
                ..Config::default()
            },
            Box::new(BufferIo::new("")),
        )
        .unwrap();
        lisp.eval_str("(prefix ' quote)").unwrap();
        lisp.eval_str("(define loop (lambda (n) (if (= n 0) 'done (loop (- n 1)))))")
            .unwrap();
        let v = lisp.eval_str("(loop 20000)").unwrap();
        assert_eq!(lisp.render(v), "done");
        assert!(lisp.heap_stats().collections > 0);
        assert!(lisp.heap_stats().live < 4096 * 2);
    }

    #[test]
    fn host_registered_natives_are_callable() {
        fn twice(interp: &mut Interp, args: Value) -> Result<Step> {
            let n = interp.heap.car_val(args)?.as_int().unwrap_or(0);
            Ok(Step::Value(Value::Int(n * 2)))
        }
        fn first_raw(_: &mut Interp, args: Value, _env: Value) -> Result<Step> {
            Ok(Step::Value(args))
        }
        let mut lisp = interp();
        lisp.define_proc("twice", twice).unwrap();
        lisp.define_form("raw", first_raw).unwrap();
        assert_eq!(lisp.eval_str("(twice 21)").unwrap(), Value::Int(42));
        let v = lisp.eval_str("(raw undefined-name (x))").unwrap();
        assert_eq!(lisp.render(v), "(undefined-name (x))");
    }

    #[test]
    fn continuations_remember_the_capturing_environment() {
        let mut lisp = interp();
        lisp.eval_str("(define k ())").unwrap();
        lisp.eval_str("((lambda (a) (call/cc (lambda (c) (set! k c) a))) 1)")
            .unwrap();
        let k = lisp.lookup("k").and_then(|k| k.obj_id()).unwrap();
        let snap = lisp.heap.continuation(k).unwrap();
        let a = lisp.symbols.lookup("a").unwrap();
        assert_eq!(env::get(&lisp.heap, snap.env, a), Some(Value::Int(1)));

        assert_eq!(lisp.eval_str("(k 2)").unwrap(), Value::Int(2));
        assert_eq!(env::get(&lisp.heap, lisp.env, a), Some(Value::Int(1)));
    }

    #[test]
    fn pinned_values_survive_collection() {
        let mut lisp = interp();
        let v = lisp.eval_str("(cons 1 (cons 2 ()))").unwrap();
        lisp.pin(v);
        lisp.collect();
        assert_eq!(lisp.render(v), "(1 2)");
        lisp.unpin(v);
        lisp.collect();
        assert!(!lisp.heap.is_live(v.obj_id().unwrap()));
    }
}
