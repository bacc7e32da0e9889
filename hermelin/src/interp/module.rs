//! Module loading and the per-context module cache

use super::context::Context;
use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use crate::ast::{Node, optimize};
use crate::error::{CompileError, ScriptError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Loaded modules, keyed by canonical path
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: HashMap<PathBuf, Rc<Node>>,
}

impl ModuleCache {
    pub fn contains(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<Rc<Node>> {
        self.modules.get(path).cloned()
    }

    pub fn insert(&mut self, path: PathBuf, root: Rc<Node>) {
        self.modules.insert(path, root);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Loaded paths, sorted
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.modules.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }
}

/// Cache key for a module path; falls back to the path as given when it
/// cannot be canonicalized
fn cache_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl Context {
    /// Load and evaluate a script file at global scope, at most once.
    ///
    /// A path that is already loaded is a no-op. Read and parse failures
    /// are hard [`Import`](super::ErrorKind::Import) errors.
    #[tracing::instrument(level = "debug", skip(self, path), fields(path = %path.display()))]
    pub fn import(&mut self, path: &Path) -> InterpResult<()> {
        let key = cache_key(path);
        if self.modules.contains(&key) {
            tracing::warn!("module already loaded");
            return Ok(());
        }

        let display = path.display().to_string();
        let source = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::import(&display, &e.to_string()))?;
        let root = crate::parser::parse_source(&display, &source)
            .map_err(|e| RuntimeError::import(&display, &e.to_string()))?;
        self.load_module(key, root)
    }

    /// Cache an already parsed module and evaluate it at global scope
    pub fn load_module(&mut self, path: PathBuf, root: Node) -> InterpResult<()> {
        let root = self.prepare(path, root);

        let frames = self.scopes.suspend_frames();
        let implicit = self.implicit_frame.take();
        let result = self.eval(&root);
        self.implicit_frame = implicit;
        self.scopes.restore_frames(frames);
        result.map(|_| ())
    }

    /// Read, parse and run a program file, then call its `main`.
    ///
    /// The root module is cached like any import, so a script importing
    /// itself is a no-op.
    pub fn run_file(&mut self, path: &Path, args: &[String]) -> Result<Option<Value>, ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            CompileError::io_error(format!("cannot read {}: {e}", path.display()))
        })?;
        self.run_source(path, &source, args)
    }

    /// Like [`run_file`](Self::run_file) for source text the host already read
    pub fn run_source(
        &mut self,
        path: &Path,
        source: &str,
        args: &[String],
    ) -> Result<Option<Value>, ScriptError> {
        let root = crate::parser::parse_source(&path.display().to_string(), source)?;
        let root = self.prepare(cache_key(path), root);
        Ok(self.run_program(&root, args)?)
    }

    fn prepare(&mut self, path: PathBuf, root: Node) -> Rc<Node> {
        let root = if self.config.optimize {
            optimize(root)
        } else {
            root
        };
        tracing::debug!(path = %path.display(), "module loaded");
        let root = Rc::new(root);
        self.modules.insert(path, Rc::clone(&root));
        root
    }

    /// Paths of every module loaded so far, sorted
    pub fn loaded_modules(&self) -> Vec<&Path> {
        self.modules.paths()
    }
}
