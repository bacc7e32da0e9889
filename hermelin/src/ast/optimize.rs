//! One-time rewrite pass run on a freshly parsed tree

use super::{FunctionDef, Node, UnOp};
use crate::interp::Value;
use std::rc::Rc;

/// Fold constant subtrees.
///
/// Operators applied to literal operands are computed with the same routines
/// the evaluator uses, so folding never changes a result. Operations that
/// would raise an error (e.g. integer division by zero) are left in place and
/// fail at run time as usual.
pub fn optimize(node: Node) -> Node {
    match node {
        Node::Unary { op, expr } => {
            let expr = optimize(*expr);
            if op != UnOp::Stmt
                && let Some(value) = literal_value(&expr)
            {
                let folded = match op {
                    UnOp::Neg => value.negate().ok(),
                    UnOp::Not => Some(Value::Int(i64::from(!value.is_truthy()))),
                    UnOp::Stmt => None,
                };
                if let Some(node) = folded.and_then(value_literal) {
                    return node;
                }
            }
            Node::Unary {
                op,
                expr: Box::new(expr),
            }
        }
        Node::Binary { op, left, right } => {
            let left = optimize(*left);
            let right = optimize(*right);
            if (op.is_arithmetic() || op.is_comparison())
                && let (Some(l), Some(r)) = (literal_value(&left), literal_value(&right))
                && let Some(node) = Value::binary_op(op, &l, &r).ok().and_then(value_literal)
            {
                return node;
            }
            Node::binary(op, left, right)
        }
        Node::Array(items) => Node::Array(items.into_iter().map(optimize).collect()),
        Node::Index { name, indices } => Node::Index {
            name,
            indices: indices.into_iter().map(optimize).collect(),
        },
        Node::Call { name, args, line } => Node::Call {
            name,
            args: args.into_iter().map(optimize).collect(),
            line,
        },
        Node::Function(def) => {
            let def = Rc::unwrap_or_clone(def);
            Node::Function(Rc::new(FunctionDef {
                body: optimize(def.body),
                ..def
            }))
        }
        Node::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = optimize(*cond);
            let then_branch = optimize(*then_branch);
            let else_branch = else_branch.map(|e| optimize(*e));
            if let Some(value) = literal_value(&cond) {
                return if value.is_truthy() {
                    then_branch
                } else {
                    else_branch.unwrap_or(Node::Block(Vec::new()))
                };
            }
            Node::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            }
        }
        Node::While { cond, body } => {
            let cond = optimize(*cond);
            if let Some(value) = literal_value(&cond)
                && !value.is_truthy()
            {
                return Node::Block(Vec::new());
            }
            Node::While {
                cond: Box::new(cond),
                body: Box::new(optimize(*body)),
            }
        }
        Node::For { var, iter, body } => Node::For {
            var,
            iter: Box::new(optimize(*iter)),
            body: Box::new(optimize(*body)),
        },
        Node::Return(expr) => Node::Return(expr.map(|e| Box::new(optimize(*e)))),
        Node::Block(stmts) => {
            let mut flat = Vec::with_capacity(stmts.len());
            for stmt in stmts {
                match optimize(stmt) {
                    Node::Block(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            Node::Block(flat)
        }
        Node::Module(items) => Node::Module(items.into_iter().map(optimize).collect()),
        leaf => leaf,
    }
}

fn literal_value(node: &Node) -> Option<Value> {
    match node {
        Node::Int(n) => Some(Value::Int(*n)),
        Node::Real(x) => Some(Value::Real(*x)),
        Node::Str(s) => Some(Value::Str(s.clone())),
        _ => None,
    }
}

fn value_literal(value: Value) -> Option<Node> {
    match value {
        Value::Int(n) => Some(Node::Int(n)),
        Value::Real(x) => Some(Node::Real(x)),
        Value::Str(s) => Some(Node::Str(s)),
        Value::Array(_) | Value::Map(_) => None,
    }
}
