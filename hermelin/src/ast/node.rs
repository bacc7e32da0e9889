//! Syntax tree nodes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// A node of the syntax tree
///
/// Trees are built once by the parser, optionally rewritten once by
/// [`optimize`](super::optimize), and then only read by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Integer literal
    Int(i64),
    /// Real literal
    Real(f64),
    /// String literal
    Str(String),

    /// Identifier reference
    Ident(String),

    /// Array literal: `[a, b, c]`
    Array(Vec<Node>),

    /// Element access: `name[i][j]`
    Index { name: String, indices: Vec<Node> },

    /// Unary operation
    Unary { op: UnOp, expr: Box<Node> },

    /// Binary operation
    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// Function call: `name(args)`
    Call {
        name: String,
        args: Vec<Node>,
        line: usize,
    },

    /// Function definition
    Function(Rc<FunctionDef>),

    /// `if cond { .. } else { .. }`
    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },

    /// `while cond { .. }`
    While { cond: Box<Node>, body: Box<Node> },

    /// Ranged for: `for var : iter { .. }`
    For {
        var: String,
        iter: Box<Node>,
        body: Box<Node>,
    },

    /// `return [expr]`
    Return(Option<Box<Node>>),
    Break,
    Continue,

    /// Statement sequence, evaluated in order
    Block(Vec<Node>),

    /// Top level of a script file: function definitions and statements
    Module(Vec<Node>),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Numeric negation (-)
    Neg,
    /// Logical not (!)
    Not,
    /// Expression evaluated as a statement; its value is discarded
    Stmt,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Assign,

    Add,
    Sub,
    Mul,
    Div,
    Pow,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Assign => "=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{s}")
    }
}

/// User-defined function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Node,
    pub line: usize,
}

impl Node {
    /// Wrap an expression so it is evaluated for its side effects only
    pub fn stmt(expr: Node) -> Node {
        Node::Unary {
            op: UnOp::Stmt,
            expr: Box::new(expr),
        }
    }

    pub fn binary(op: BinOp, left: Node, right: Node) -> Node {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Int(_) | Node::Real(_) | Node::Str(_))
    }
}
