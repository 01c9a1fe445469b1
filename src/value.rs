use std::fmt;

/// Unique identifier for an interned symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Index into the object arena. This is the GC handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub u32);

/// Index into the interpreter's table of native builtins.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

/// The fundamental runtime value. Copy; composite data lives in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// The empty list. Never allocated.
    Nil,
    Int(i64),
    Symbol(SymbolId),
    Pair(ObjId),
    /// Builtin receiving unevaluated arguments plus the calling environment.
    Form(NativeId),
    /// Builtin receiving already-evaluated arguments.
    Proc(NativeId),
    /// A `lambda` or `macro` closure.
    Closure(ObjId),
    /// A captured continuation.
    Cont(ObjId),
}

impl Value {
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn as_pair(self) -> Option<ObjId> {
        match self {
            Value::Pair(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_symbol(self) -> Option<SymbolId> {
        match self {
            Value::Symbol(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// The heap object this value refers to, if any.
    pub fn obj_id(self) -> Option<ObjId> {
        match self {
            Value::Pair(id) | Value::Closure(id) | Value::Cont(id) => Some(id),
            _ => None,
        }
    }

    /// True for anything the evaluator can apply to a list of evaluated arguments.
    pub fn is_applicable(self) -> bool {
        matches!(self, Value::Proc(_) | Value::Closure(_) | Value::Cont(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClosureKind {
    Lambda,
    Macro,
}

/// A user-defined procedure or macro: parameter pattern, body, captured environment.
#[derive(Clone, Copy, Debug)]
pub struct Closure {
    pub kind: ClosureKind,
    /// A symbol (rest list), a proper list of symbols, or a dotted list ending in a symbol.
    pub params: Value,
    /// Macros only: the name bound to the caller's environment during expansion.
    pub env_name: Option<SymbolId>,
    pub body: Value,
    pub env: Value,
}

/// The evaluator's control state at a point in time.
///
/// Every field points at persistent structure (frames and value cells are never
/// mutated once pushed), so a snapshot can be restored any number of times.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    pub conts: Option<ObjId>,
    pub values: Value,
    pub rescues: Option<ObjId>,
    /// Environment current at capture; `(env)` reports it again after a resume.
    pub env: Value,
}

/// One entry on the rescue stack: the handler and the state to unwind to.
#[derive(Clone, Copy, Debug)]
pub struct Rescue {
    pub handler: Value,
    pub resume: Snapshot,
}

/// A pending operation on the continuation stack.
#[derive(Clone, Copy, Debug)]
pub enum Frame {
    /// Evaluate `expr` in `env` and push the result.
    Eval { expr: Value, env: Value },
    /// The operator is on the value stack; dispatch on it with raw `args`.
    Call { args: Value, env: Value },
    /// Pop `argc` evaluated arguments and apply `op` to them.
    Apply { op: Value, argc: usize, env: Value },
    /// Discard the top value, then evaluate the remaining `body` expressions.
    Seq { body: Value, env: Value },
    /// Pick a branch based on the top value.
    Branch { then: Value, otherwise: Value, env: Value },
    /// Bind the top value to `name` in the innermost frame of `env`.
    Define { name: SymbolId, env: Value },
    /// Rebind the nearest existing `name` in `env` to the top value.
    Assign { name: SymbolId, env: Value },
    /// Evaluate the macro expansion on top of the value stack in `env`.
    Expand { env: Value },
    /// The handler is on the value stack; install it and run `body`.
    Guard { body: Value, env: Value },
    /// Normal exit from a guarded body: drop the innermost rescue.
    Unguard,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Symbol(id) => write!(f, "Sym({})", id.0),
            Value::Pair(id) => write!(f, "Pair({})", id.0),
            Value::Form(id) => write!(f, "Form({})", id.0),
            Value::Proc(id) => write!(f, "Proc({})", id.0),
            Value::Closure(id) => write!(f, "Closure({})", id.0),
            Value::Cont(id) => write!(f, "Cont({})", id.0),
        }
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

impl fmt::Debug for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjId({})", self.0)
    }
}

impl fmt::Debug for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeId({})", self.0)
    }
}
