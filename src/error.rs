use thiserror::Error;

use crate::value::Value;

/// Errors that can occur in the interpreter at the Rust level.
///
/// Everything except [`Error::OutOfMemory`] and [`Error::Internal`] is a
/// recoverable condition: while a rescue handler is installed the evaluator
/// turns it into a value and hands it to the handler instead of returning it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Symbol lookup or `set!` target not found in any frame.
    #[error("unbound variable `{0}`")]
    Unbound(String),

    /// Operator position evaluated to something that cannot be called.
    #[error("cannot apply `{0}`")]
    InvalidApplication(String),

    /// Structural defect in source text or in a special form.
    #[error("malformed syntax: {0}")]
    Malformed(String),

    /// A builtin received an argument of the wrong variant.
    #[error("type error: {0}")]
    Type(String),

    /// Wrong number of arguments to a builtin, closure or continuation.
    #[error("wrong number of arguments to `{0}`")]
    Arity(String),

    #[error("division by zero")]
    DivisionByZero,

    /// Raised by the `error` builtin. Carries the raised value while unwinding.
    #[error("error raised: {0:?}")]
    Raised(Value),

    /// A raised value that reached the host with no rescue installed.
    #[error("uncaught error: {0}")]
    Uncaught(String),

    /// The host allocator refused to grow the heap. Never rescued.
    #[error("heap exhausted: host allocator refused {requested} slots")]
    OutOfMemory { requested: usize },

    /// Interpreter invariant violation (should not happen in correct code).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Fatal conditions bypass the rescue stack entirely.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::OutOfMemory { .. } | Error::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
