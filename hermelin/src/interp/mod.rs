//! Tree-walking interpreter
//!
//! The evaluator runs syntax trees directly against an explicit [`Context`].
//! Control flow (`return`, `break`, `continue`) travels through ordinary
//! return values as [`Flow`]; only hard failures use `Err`.

mod context;
mod error;
mod eval;
mod module;
mod scope;
mod value;

pub use context::{
    ARGS_SYMBOL, Context, IMPLICIT_RET_SYMBOL, INTERACTIVE_FN, ITER_SYMBOL, Output,
};
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use eval::Flow;
pub use module::ModuleCache;
pub use scope::{Binding, Lookup, ScopeStack, SymbolTable};
pub use value::{MapKey, Symbol, Value, ValueType};
