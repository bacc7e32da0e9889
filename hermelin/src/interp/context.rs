//! Execution context: everything one running script shares
//!
//! A context is built once per embedding and threaded through every
//! evaluation. Values are reference counted without atomics, so a context is
//! confined to the thread that created it; hosts running scripts in parallel
//! create one context per thread, each with its own traceback.

use super::module::ModuleCache;
use super::scope::ScopeStack;
use super::value::Symbol;
use crate::ast::FunctionDef;
use crate::builtins::{self, NativeFn, Registry};
use crate::config::Config;
use std::io::Write;
use std::rc::Rc;

/// Reserved name of the argument array handed to `main`
pub const ARGS_SYMBOL: &str = "<args>";
/// Reserved name of the innermost ranged-for iteration index
pub const ITER_SYMBOL: &str = "<iter>";
/// Reserved name of the implicit return slot used by interactive commands
pub const IMPLICIT_RET_SYMBOL: &str = "<ret>";
/// Name of the pseudo-function interactive commands run under
pub const INTERACTIVE_FN: &str = "<interactive>";

/// Where `print` and friends write
#[derive(Debug)]
pub enum Output {
    Stdout,
    /// Collect output in memory (tests, embedding hosts)
    Capture(String),
}

pub struct Context {
    pub(crate) scopes: ScopeStack,
    pub(crate) functions: Vec<Rc<FunctionDef>>,
    pub(crate) registry: Registry,
    pub(crate) modules: ModuleCache,
    pub(crate) traceback: Vec<String>,
    pub(crate) call_depth: usize,
    /// Frame depth of the interactive pseudo-function, when one is running
    pub(crate) implicit_frame: Option<usize>,
    pub(crate) config: Config,
    output: Output,
}

impl Context {
    /// Context with the default configuration and every built-in registered
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mut registry = Registry::new();
        builtins::register_all(&mut registry);
        Context {
            scopes: ScopeStack::new(),
            functions: Vec::new(),
            registry,
            modules: ModuleCache::default(),
            traceback: Vec::new(),
            call_depth: 0,
            implicit_frame: None,
            config,
            output: Output::Stdout,
        }
    }

    /// Redirect script output into an in-memory buffer
    pub fn capture_output(mut self) -> Self {
        self.output = Output::Capture(String::new());
        self
    }

    /// Take everything captured so far (empty when writing to stdout)
    pub fn take_output(&mut self) -> String {
        match &mut self.output {
            Output::Capture(buf) => std::mem::take(buf),
            Output::Stdout => String::new(),
        }
    }

    pub(crate) fn write_str(&mut self, text: &str) -> std::io::Result<()> {
        match &mut self.output {
            Output::Capture(buf) => {
                buf.push_str(text);
                Ok(())
            }
            Output::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Merge an additional batch of native functions
    pub fn register(&mut self, batch: &[(&str, NativeFn)]) {
        self.registry.register(batch);
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }

    /// Global binding by name
    pub fn global(&self, name: &str) -> Option<Symbol> {
        self.scopes.global().lookup(name)
    }

    /// Append a user function; earlier definitions of a name keep precedence
    pub fn define_function(&mut self, def: Rc<FunctionDef>) {
        if self.find_function(&def.name).is_some() {
            tracing::warn!(function = %def.name, line = def.line, "function already defined, the earlier definition wins");
        }
        self.functions.push(def);
    }

    /// First user function with this name
    pub fn find_function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.iter().find(|f| f.name == name).cloned()
    }

    /// Call sites of the active user calls, outermost first
    pub fn traceback(&self) -> &[String] {
        &self.traceback
    }

    /// `name = value` lines for every global, sorted by name
    pub fn dump_globals(&self) -> Vec<String> {
        self.scopes
            .global()
            .entries()
            .into_iter()
            .map(|(name, sym)| {
                let value = sym.borrow();
                format!("{name} = {value} ({})", value.type_name())
            })
            .collect()
    }

    /// User-defined function names in definition order
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn builtin_names(&self) -> Vec<&str> {
        self.registry.names()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
