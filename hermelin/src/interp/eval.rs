//! Tree-walking evaluator

use super::context::{ARGS_SYMBOL, Context, IMPLICIT_RET_SYMBOL, INTERACTIVE_FN, ITER_SYMBOL};
use super::error::{InterpResult, RuntimeError};
use super::scope::{Binding, Lookup, SymbolTable};
use super::value::{Symbol, Value};
use crate::ast::{BinOp, FunctionDef, Node, UnOp};
use crate::util::{find_similar_name, format_suggestion_hint};
use std::rc::Rc;

/// Stack growth parameters for deep recursion
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Maximum edit distance for "did you mean" hints
const SUGGESTION_DISTANCE: usize = 2;

/// Outcome of evaluating a node
#[derive(Debug)]
pub enum Flow {
    /// Evaluation finished; the node may or may not have produced a value
    Normal(Option<Symbol>),
    /// A `return` is unwinding to the enclosing call
    Return(Option<Symbol>),
    /// A `break` is unwinding to the enclosing loop
    Break,
    /// A `continue` is unwinding to the enclosing loop
    Continue,
}

impl Flow {
    pub fn value(self) -> Option<Symbol> {
        match self {
            Flow::Normal(value) | Flow::Return(value) => value,
            Flow::Break | Flow::Continue => None,
        }
    }
}

impl Context {
    /// Evaluate a node against the current scope, with automatic stack growth
    pub fn eval(&mut self, node: &Node) -> InterpResult<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(node))
    }

    fn eval_inner(&mut self, node: &Node) -> InterpResult<Flow> {
        match node {
            Node::Int(n) => Ok(Flow::Normal(Some(Symbol::new(Value::Int(*n))))),
            Node::Real(x) => Ok(Flow::Normal(Some(Symbol::new(Value::Real(*x))))),
            Node::Str(s) => Ok(Flow::Normal(Some(Symbol::new(Value::Str(s.clone()))))),

            Node::Ident(name) => Ok(Flow::Normal(self.lookup_ident(name))),

            Node::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match self.eval_expr(item)? {
                        Some(value) => elements.push(value.deep_clone()),
                        None => {
                            tracing::error!(element = i, "array element has no value, storing 0");
                            elements.push(Symbol::new(Value::zero()));
                        }
                    }
                }
                Ok(Flow::Normal(Some(Symbol::new(Value::Array(elements)))))
            }

            Node::Index { name, indices } => {
                let keys = self.eval_indices(name, indices)?;
                Ok(Flow::Normal(self.element_at(name, &keys)?))
            }

            Node::Unary { op, expr } => self.eval_unary(*op, expr),

            Node::Binary { op, left, right } => match op {
                BinOp::Assign => self.eval_assign(left, right),
                BinOp::And | BinOp::Or => self.eval_logical(*op, left, right),
                _ => {
                    let lhs = self.eval_expr(left)?;
                    let rhs = self.eval_expr(right)?;
                    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
                        tracing::error!(op = %op, "operand has no value");
                        return Ok(Flow::Normal(None));
                    };
                    let result = Value::binary_op(*op, &lhs.borrow(), &rhs.borrow())?;
                    Ok(Flow::Normal(Some(Symbol::new(result))))
                }
            },

            Node::Call { name, args, line } => {
                let mut argv = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    match self.eval_expr(arg)? {
                        Some(value) => argv.push(value),
                        None => {
                            tracing::error!(function = %name, argument = i + 1, line, "argument has no value, call skipped");
                            return Ok(Flow::Normal(None));
                        }
                    }
                }
                Ok(Flow::Normal(self.call(name, argv, *line)?))
            }

            Node::Function(def) => {
                self.define_function(Rc::clone(def));
                Ok(Flow::Normal(None))
            }

            Node::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(cond)? {
                    self.eval(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.eval(else_branch)
                } else {
                    Ok(Flow::Normal(None))
                }
            }

            Node::While { cond, body } => {
                while self.eval_condition(cond)? {
                    match self.eval(body)? {
                        Flow::Normal(_) | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(None))
            }

            Node::For { var, iter, body } => self.eval_for(var, iter, body),

            Node::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr)?.map(|v| v.deep_clone()),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            Node::Break => Ok(Flow::Break),
            Node::Continue => Ok(Flow::Continue),

            Node::Block(stmts) => {
                for stmt in stmts {
                    match self.eval(stmt)? {
                        Flow::Normal(_) => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(None))
            }

            Node::Module(items) => {
                for item in items {
                    if let Node::Function(def) = item {
                        self.define_function(Rc::clone(def));
                    }
                }
                for item in items.iter().filter(|item| !matches!(item, Node::Function(_))) {
                    match self.eval(item)? {
                        Flow::Normal(_) => {}
                        Flow::Return(_) => break,
                        Flow::Break | Flow::Continue => {
                            tracing::warn!("break or continue outside of a loop ignored");
                        }
                    }
                }
                Ok(Flow::Normal(None))
            }
        }
    }

    /// Evaluate in expression position.
    ///
    /// Calls absorb `return`, so control flow never escapes an expression;
    /// a stray one is dropped.
    fn eval_expr(&mut self, node: &Node) -> InterpResult<Option<Symbol>> {
        match self.eval(node)? {
            Flow::Normal(value) => Ok(value),
            flow => {
                tracing::debug!(?flow, "control flow in expression position dropped");
                Ok(None)
            }
        }
    }

    fn eval_condition(&mut self, cond: &Node) -> InterpResult<bool> {
        match self.eval_expr(cond)? {
            Some(value) => Ok(value.borrow().is_truthy()),
            None => {
                tracing::error!("condition has no value, treating it as false");
                Ok(false)
            }
        }
    }

    /// Resolve an identifier: local table first, then global
    fn lookup_ident(&self, name: &str) -> Option<Symbol> {
        match self.scopes.lookup(name) {
            Lookup::Found(symbol) => Some(symbol),
            Lookup::Shadowed(symbol) => {
                tracing::warn!(variable = name, "local variable shadows a global of the same name");
                Some(symbol)
            }
            Lookup::Missing => {
                let candidates = self.scopes.visible_names();
                let hint = format_suggestion_hint(find_similar_name(
                    name,
                    &candidates,
                    SUGGESTION_DISTANCE,
                ));
                tracing::error!("unknown identifier `{name}`{hint}");
                None
            }
        }
    }

    fn eval_unary(&mut self, op: UnOp, expr: &Node) -> InterpResult<Flow> {
        if op == UnOp::Stmt {
            return match self.eval(expr)? {
                Flow::Normal(value) => {
                    if let Some(value) = &value {
                        self.record_implicit(value);
                    }
                    Ok(Flow::Normal(None))
                }
                flow => Ok(flow),
            };
        }

        let Some(operand) = self.eval_expr(expr)? else {
            tracing::error!(?op, "operand has no value");
            return Ok(Flow::Normal(None));
        };
        let result = match op {
            UnOp::Neg => operand.borrow().negate()?,
            _ => Value::from(!operand.borrow().is_truthy()),
        };
        Ok(Flow::Normal(Some(Symbol::new(result))))
    }

    fn eval_logical(&mut self, op: BinOp, left: &Node, right: &Node) -> InterpResult<Flow> {
        let Some(lhs) = self.eval_expr(left)? else {
            tracing::error!(op = %op, "operand has no value");
            return Ok(Flow::Normal(None));
        };
        let lhs = lhs.borrow().is_truthy();
        let short_circuit = match op {
            BinOp::And => !lhs,
            _ => lhs,
        };
        if short_circuit {
            return Ok(Flow::Normal(Some(Symbol::new(Value::from(lhs)))));
        }
        let Some(rhs) = self.eval_expr(right)? else {
            tracing::error!(op = %op, "operand has no value");
            return Ok(Flow::Normal(None));
        };
        let rhs = rhs.borrow().is_truthy();
        Ok(Flow::Normal(Some(Symbol::new(Value::from(rhs)))))
    }

    fn eval_assign(&mut self, target: &Node, rhs: &Node) -> InterpResult<Flow> {
        match target {
            Node::Ident(name) => {
                let Some(value) = self.eval_expr(rhs)? else {
                    tracing::error!(variable = %name, "right-hand side of assignment has no value");
                    return Ok(Flow::Normal(None));
                };
                let copy = value.deep_clone();
                if self.scopes.assign(name, copy.clone()) == Binding::GlobalFromLocal {
                    tracing::warn!(variable = %name, "assignment inside a function overwrites a global");
                }
                self.record_implicit(&copy);
                Ok(Flow::Normal(Some(copy)))
            }

            Node::Index { name, indices } => {
                let keys = self.eval_indices(name, indices)?;
                let Some(slot) = self.element_at(name, &keys)? else {
                    return Ok(Flow::Normal(None));
                };
                let Some(value) = self.eval_expr(rhs)? else {
                    tracing::error!(variable = %name, "right-hand side of assignment has no value");
                    return Ok(Flow::Normal(None));
                };
                let value = value.get();

                let current = self.element_at(name, &keys)?;
                if !current.is_some_and(|current| current.ptr_eq(&slot)) {
                    return Err(RuntimeError::index(format!(
                        "element of `{name}` moved while its new value was computed"
                    )));
                }
                slot.set(value);
                self.record_implicit(&slot);
                Ok(Flow::Normal(Some(slot)))
            }

            other => Err(RuntimeError::type_error(
                "identifier or element as assignment target",
                node_kind(other),
            )),
        }
    }

    /// Evaluate every index expression of an element access, left to right
    fn eval_indices(&mut self, name: &str, indices: &[Node]) -> InterpResult<Vec<Value>> {
        let mut keys = Vec::with_capacity(indices.len());
        for index in indices {
            let Some(key) = self.eval_expr(index)? else {
                return Err(RuntimeError::index(format!(
                    "index into `{name}` has no value"
                )));
            };
            keys.push(key.get());
        }
        Ok(keys)
    }

    /// Walk `name[k0][k1]...` and return the element slot.
    ///
    /// Arrays grow to cover out-of-range indices and maps gain missing keys,
    /// both filled with real zero.
    fn element_at(&mut self, name: &str, keys: &[Value]) -> InterpResult<Option<Symbol>> {
        let Some(mut current) = self.lookup_ident(name) else {
            return Ok(None);
        };
        let limit = self.config.max_array_len;
        for key in keys {
            let next = {
                let mut container = current.borrow_mut();
                match &mut *container {
                    Value::Array(items) => {
                        let Value::Int(index) = key else {
                            return Err(RuntimeError::type_error(
                                "integer index",
                                key.type_name(),
                            ));
                        };
                        let index = usize::try_from(*index).map_err(|_| {
                            RuntimeError::index(format!("negative index {index} into `{name}`"))
                        })?;
                        if index >= items.len() {
                            if index >= limit {
                                return Err(RuntimeError::index(format!(
                                    "index {index} into `{name}` exceeds the array length limit of {limit}"
                                )));
                            }
                            items.resize_with(index + 1, || Symbol::new(Value::zero()));
                        }
                        items[index].clone()
                    }
                    Value::Map(map) => map
                        .entry(key.to_key()?)
                        .or_insert_with(|| Symbol::new(Value::zero()))
                        .clone(),
                    other => {
                        return Err(RuntimeError::type_error(
                            &format!("array or map to index `{name}`"),
                            other.type_name(),
                        ));
                    }
                }
            };
            current = next;
        }
        Ok(Some(current))
    }

    fn eval_for(&mut self, var: &str, iter: &Node, body: &Node) -> InterpResult<Flow> {
        let Some(sequence) = self.eval_expr(iter)? else {
            tracing::error!(var, "loop sequence has no value");
            return Ok(Flow::Normal(None));
        };
        let items = match &*sequence.borrow() {
            Value::Array(items) => items.clone(),
            other => {
                return Err(RuntimeError::type_error(
                    "array to iterate over",
                    other.type_name(),
                ));
            }
        };

        let outer_iter = self.scopes.current_mut().remove_non_owning(ITER_SYMBOL);
        let result = self.run_loop(var, items, body);
        let table = self.scopes.current_mut();
        match outer_iter {
            Some(outer) => table.insert(ITER_SYMBOL, outer),
            None => {
                table.remove_owning(ITER_SYMBOL);
            }
        }
        result
    }

    fn run_loop(&mut self, var: &str, items: Vec<Symbol>, body: &Node) -> InterpResult<Flow> {
        for (i, item) in items.into_iter().enumerate() {
            let table = self.scopes.current_mut();
            table.insert(ITER_SYMBOL, Symbol::new(Value::Int(i as i64)));
            table.insert(var, item);
            match self.eval(body)? {
                Flow::Normal(_) | Flow::Continue => {}
                Flow::Break => break,
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal(None))
    }

    /// Store `value` in the implicit return slot when the interactive
    /// pseudo-function's own frame is the current one
    fn record_implicit(&mut self, value: &Symbol) {
        if self.implicit_frame == Some(self.scopes.depth()) {
            self.scopes
                .current_mut()
                .insert(IMPLICIT_RET_SYMBOL, value.deep_clone());
        }
    }

    /// Call a function by name with already-evaluated arguments.
    ///
    /// User functions shadow native ones. An unknown name is logged and
    /// yields no value.
    pub fn call(&mut self, name: &str, args: Vec<Symbol>, line: usize) -> InterpResult<Option<Symbol>> {
        if let Some(def) = self.find_function(name) {
            return self.call_user(&def, args, line);
        }
        if let Some(native) = self.registry.get(name) {
            tracing::trace!(function = name, args = args.len(), "native call");
            return Ok(native(&args, self)?.map(Symbol::new));
        }

        let mut candidates = self.function_names();
        candidates.extend(self.builtin_names());
        let hint = format_suggestion_hint(find_similar_name(name, &candidates, SUGGESTION_DISTANCE));
        tracing::error!(line, "unknown function `{name}`{hint}");
        Ok(None)
    }

    /// Call a function with plain values; convenience for hosts
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> InterpResult<Option<Value>> {
        let args = args.into_iter().map(Symbol::new).collect();
        Ok(self.call(name, args, 0)?.map(|result| result.get()))
    }

    fn call_user(&mut self, def: &FunctionDef, args: Vec<Symbol>, line: usize) -> InterpResult<Option<Symbol>> {
        if def.params.len() != args.len() {
            tracing::error!(
                function = %def.name,
                line,
                "expected {} argument(s), got {}; call skipped",
                def.params.len(),
                args.len()
            );
            return Ok(None);
        }
        let limit = self.config.max_recursion_depth;
        if self.call_depth >= limit {
            return Err(RuntimeError::stack_overflow(limit).with_traceback(&self.traceback));
        }

        let mut locals = SymbolTable::new();
        for (param, arg) in def.params.iter().zip(&args) {
            locals.insert(param.as_str(), arg.deep_clone());
        }
        tracing::debug!(function = %def.name, line, depth = self.call_depth + 1, "call");
        let (result, _) = self.invoke(&def.name, &def.body, locals, line, false);
        result
    }

    /// Run `body` as the body of a call with its own local table.
    ///
    /// The table is handed back so callers that supplied it can keep it.
    fn invoke(
        &mut self,
        name: &str,
        body: &Node,
        mut locals: SymbolTable,
        line: usize,
        implicit: bool,
    ) -> (InterpResult<Option<Symbol>>, SymbolTable) {
        if implicit {
            locals.remove_non_owning(IMPLICIT_RET_SYMBOL);
        }
        self.scopes.push_frame(locals);
        self.traceback.push(format!("{name} (line {line})"));
        self.call_depth += 1;
        let outer_implicit = self.implicit_frame;
        if implicit {
            self.implicit_frame = Some(self.scopes.depth());
        }

        let result = match self.eval(body) {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(Flow::Normal(_)) => Ok(None),
            Ok(Flow::Break | Flow::Continue) => {
                tracing::warn!(function = name, "break or continue outside of a loop ignored");
                Ok(None)
            }
            Err(err) => Err(err.with_traceback(&self.traceback)),
        };

        self.implicit_frame = outer_implicit;
        self.call_depth -= 1;
        self.traceback.pop();
        let mut table = self.scopes.pop_frame().unwrap_or_default();
        let recorded = if implicit {
            table.remove_non_owning(IMPLICIT_RET_SYMBOL)
        } else {
            None
        };
        let result = match result {
            Ok(None) => Ok(recorded),
            result => result,
        };
        (result, table)
    }

    /// Evaluate a loaded program: run the root module, bind `args` to the
    /// reserved argument array and call `main`.
    ///
    /// `main` may take no parameters or a single one receiving the array.
    pub fn run_program(&mut self, root: &Node, args: &[String]) -> InterpResult<Option<Value>> {
        let argv: Vec<Value> = args.iter().map(|arg| Value::from(arg.as_str())).collect();
        let argv = Symbol::new(Value::from(argv));
        self.scopes.global_mut().insert(ARGS_SYMBOL, argv.clone());

        self.eval(root)?;

        let Some(main) = self.find_function("main") else {
            return Err(RuntimeError::missing_main());
        };
        let main_args = if main.params.len() == 1 {
            vec![argv]
        } else {
            Vec::new()
        };
        Ok(self.call_user(&main, main_args, main.line)?.map(|result| result.get()))
    }

    /// Evaluate one statement as the body of the interactive pseudo-function.
    ///
    /// `locals` serves as the local table for the duration and is handed
    /// back afterwards, so consecutive commands share their variables. The
    /// result is the explicit return value, or else the last value assigned
    /// or computed at statement level.
    pub fn eval_interactive(
        &mut self,
        stmt: &Node,
        locals: SymbolTable,
    ) -> (InterpResult<Option<Value>>, SymbolTable) {
        let (result, locals) = self.invoke(INTERACTIVE_FN, stmt, locals, 0, true);
        (result.map(|value| value.map(|v| v.get())), locals)
    }
}

fn node_kind(node: &Node) -> &'static str {
    match node {
        Node::Int(_) | Node::Real(_) | Node::Str(_) => "literal",
        Node::Ident(_) => "identifier",
        Node::Array(_) => "array literal",
        Node::Index { .. } => "element access",
        Node::Unary { .. } | Node::Binary { .. } => "operator expression",
        Node::Call { .. } => "function call",
        Node::Function(_) => "function definition",
        _ => "statement",
    }
}
