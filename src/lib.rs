//! An embeddable interpreter for a minimal LISP dialect.
//!
//! One [`Interp`] owns its heap, symbol table and environments. The host
//! supplies byte I/O ([`host::Io`]), optionally a heap allocator
//! ([`heap::Allocator`]) and a module loader ([`host::ModuleLoader`]).

pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod heap;
pub mod host;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod symbol;
pub mod value;

pub use config::Config;
pub use error::{Error, Result};
pub use eval::{Interp, Step};
pub use value::Value;
