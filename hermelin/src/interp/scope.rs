//! Symbol tables and the two-level scope stack
//!
//! The language has exactly two table levels visible at any time: the global
//! table and the local table of the innermost active call. Tables of outer
//! calls stay on the stack but are never searched.

use super::value::Symbol;
use std::collections::HashMap;

/// Name -> symbol mapping owned by one scope
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing (and releasing) any previous binding
    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.symbols.insert(name.into(), symbol);
    }

    /// Look up `name` in this table only
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Remove the binding and release the table's reference to it
    pub fn remove_owning(&mut self, name: &str) -> bool {
        self.symbols.remove(name).is_some()
    }

    /// Remove the binding and hand the symbol back to the caller
    pub fn remove_non_owning(&mut self, name: &str) -> Option<Symbol> {
        self.symbols.remove(name)
    }

    /// Identity membership test
    pub fn contains_symbol(&self, symbol: &Symbol) -> bool {
        self.symbols.values().any(|s| s.ptr_eq(symbol))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Bindings sorted by name
    pub fn entries(&self) -> Vec<(&str, &Symbol)> {
        let mut entries: Vec<_> = self
            .symbols
            .iter()
            .map(|(name, sym)| (name.as_str(), sym))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Result of resolving an identifier
#[derive(Debug)]
pub enum Lookup {
    /// Found in exactly one of the visible tables
    Found(Symbol),
    /// Found locally while a global of the same name exists; the local wins
    Shadowed(Symbol),
    Missing,
}

/// Where an assignment to a bare identifier lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Local,
    Global,
    /// Assigned from inside a call to a name that only exists globally
    GlobalFromLocal,
}

/// Global table plus a stack of per-call local tables
#[derive(Debug, Default)]
pub struct ScopeStack {
    global: SymbolTable,
    frames: Vec<SymbolTable>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a call with its own local table
    pub fn push_frame(&mut self, table: SymbolTable) {
        self.frames.push(table);
    }

    /// Leave the innermost call, returning its table
    pub fn pop_frame(&mut self) -> Option<SymbolTable> {
        self.frames.pop()
    }

    /// Number of active local frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True when the current scope is the global table itself
    pub fn is_global_scope(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn global(&self) -> &SymbolTable {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut SymbolTable {
        &mut self.global
    }

    /// The innermost local table, or the global table at top level
    pub fn current(&self) -> &SymbolTable {
        self.frames.last().unwrap_or(&self.global)
    }

    pub fn current_mut(&mut self) -> &mut SymbolTable {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.global,
        }
    }

    /// Detach every local frame so code can run at global scope
    pub fn suspend_frames(&mut self) -> Vec<SymbolTable> {
        std::mem::take(&mut self.frames)
    }

    pub fn restore_frames(&mut self, frames: Vec<SymbolTable>) {
        self.frames = frames;
    }

    /// Resolve `name`: local table first, then global
    pub fn lookup(&self, name: &str) -> Lookup {
        let global = self.global.lookup(name);
        let Some(frame) = self.frames.last() else {
            return global.map_or(Lookup::Missing, Lookup::Found);
        };
        match (frame.lookup(name), global) {
            (Some(local), Some(_)) => Lookup::Shadowed(local),
            (Some(local), None) => Lookup::Found(local),
            (None, Some(global)) => Lookup::Found(global),
            (None, None) => Lookup::Missing,
        }
    }

    /// Bind `name` for an assignment and report which table received it
    pub fn assign(&mut self, name: &str, symbol: Symbol) -> Binding {
        let Some(frame) = self.frames.last_mut() else {
            self.global.insert(name, symbol);
            return Binding::Global;
        };
        if !frame.contains(name) && self.global.contains(name) {
            self.global.insert(name, symbol);
            Binding::GlobalFromLocal
        } else {
            frame.insert(name, symbol);
            Binding::Local
        }
    }

    /// Every name visible from the current scope
    pub fn visible_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.global.names().collect();
        if let Some(frame) = self.frames.last() {
            names.extend(frame.names());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Value;

    fn sym(n: i64) -> Symbol {
        Symbol::new(Value::Int(n))
    }

    #[test]
    fn test_table_insert_overwrites() {
        let mut table = SymbolTable::new();
        table.insert("x", sym(1));
        table.insert("x", sym(2));
        assert_eq!(table.len(), 1);
        assert_eq!(*table.lookup("x").unwrap().borrow(), Value::Int(2));
    }

    #[test]
    fn test_remove_owning_releases() {
        let mut table = SymbolTable::new();
        table.insert("x", sym(1));
        assert!(table.remove_owning("x"));
        assert!(!table.remove_owning("x"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_non_owning_hands_back() {
        let outer = sym(7);
        let mut table = SymbolTable::new();
        table.insert("arg", outer.clone());
        let back = table.remove_non_owning("arg").unwrap();
        assert!(back.ptr_eq(&outer));
        assert!(!table.contains("arg"));
    }

    #[test]
    fn test_contains_symbol_by_identity() {
        let a = sym(1);
        let equal_but_distinct = sym(1);
        let mut table = SymbolTable::new();
        table.insert("a", a.clone());
        assert!(table.contains_symbol(&a));
        assert!(!table.contains_symbol(&equal_but_distinct));
    }

    #[test]
    fn test_lookup_local_then_global() {
        let mut scopes = ScopeStack::new();
        scopes.global_mut().insert("g", sym(1));
        scopes.push_frame(SymbolTable::new());
        scopes.current_mut().insert("l", sym(2));

        assert!(matches!(scopes.lookup("g"), Lookup::Found(_)));
        assert!(matches!(scopes.lookup("l"), Lookup::Found(_)));
        assert!(matches!(scopes.lookup("nope"), Lookup::Missing));
    }

    #[test]
    fn test_lookup_shadowed_prefers_local() {
        let mut scopes = ScopeStack::new();
        scopes.global_mut().insert("x", sym(1));
        scopes.push_frame(SymbolTable::new());
        scopes.current_mut().insert("x", sym(2));

        match scopes.lookup("x") {
            Lookup::Shadowed(s) => assert_eq!(*s.borrow(), Value::Int(2)),
            other => panic!("expected shadowed local, got {other:?}"),
        }
    }

    #[test]
    fn test_outer_frames_are_not_searched() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame(SymbolTable::new());
        scopes.current_mut().insert("outer", sym(1));
        scopes.push_frame(SymbolTable::new());
        assert!(matches!(scopes.lookup("outer"), Lookup::Missing));
        scopes.pop_frame();
        assert!(matches!(scopes.lookup("outer"), Lookup::Found(_)));
    }

    #[test]
    fn test_assign_targets() {
        let mut scopes = ScopeStack::new();
        assert_eq!(scopes.assign("g", sym(1)), Binding::Global);

        scopes.push_frame(SymbolTable::new());
        assert_eq!(scopes.assign("g", sym(2)), Binding::GlobalFromLocal);
        assert_eq!(scopes.assign("l", sym(3)), Binding::Local);
        assert!(!scopes.current().contains("g"));
        assert_eq!(*scopes.global().lookup("g").unwrap().borrow(), Value::Int(2));

        let frame = scopes.pop_frame().unwrap();
        assert!(frame.contains("l"));
        assert!(!scopes.global().contains("l"));
    }

    #[test]
    fn test_suspend_and_restore_frames() {
        let mut scopes = ScopeStack::new();
        scopes.push_frame(SymbolTable::new());
        scopes.current_mut().insert("x", sym(1));

        let saved = scopes.suspend_frames();
        assert!(scopes.is_global_scope());
        scopes.current_mut().insert("y", sym(2));
        scopes.restore_frames(saved);

        assert_eq!(scopes.depth(), 1);
        assert!(scopes.global().contains("y"));
        assert!(scopes.current().contains("x"));
    }

    #[test]
    fn test_entries_sorted() {
        let mut table = SymbolTable::new();
        table.insert("b", sym(2));
        table.insert("a", sym(1));
        let names: Vec<&str> = table.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
