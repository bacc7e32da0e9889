//! hermelin scripting language
//!
//! Execution core of a small dynamically typed scripting language for batch
//! analysis and curve fitting of MIEZE data: a tree-walking evaluator over a
//! shared-slot value model, a registry of native functions, and module
//! loading, plus the lexer, parser and REPL around them.

pub mod ast;
pub mod builtins;
pub mod config;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod util;

pub use ast::Span;
pub use config::Config;
pub use error::{CompileError, Result, ScriptError};
pub use interp::{Context, RuntimeError, Value};
