//! Runtime values for the interpreter

use super::error::{InterpResult, RuntimeError};
use crate::ast::BinOp;
use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Runtime value
///
/// `clone()` is always a deep copy: cloning an array clones every element
/// into a fresh [`Symbol`], so the copy shares nothing with the original.
#[derive(Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
    /// Ordered, growable array of element slots
    Array(Vec<Symbol>),
    /// Key -> value map; iteration order is unspecified
    Map(HashMap<MapKey, Symbol>),
}

/// Concrete type tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Real,
    Str,
    Array,
    Map,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Real => "real",
            ValueType::Str => "string",
            ValueType::Array => "array",
            ValueType::Map => "map",
        }
    }
}

/// A shared slot holding a [`Value`].
///
/// Table entries, array elements and map entries are all symbols. Cloning the
/// handle aliases the slot; use [`Symbol::deep_clone`] for an independent copy.
/// A slot is released once nothing refers to it any more.
#[derive(Clone)]
pub struct Symbol(Rc<RefCell<Value>>);

impl Symbol {
    pub fn new(value: Value) -> Self {
        Symbol(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, Value> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Value> {
        self.0.borrow_mut()
    }

    /// Replace the held value in place; every alias sees the new value
    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = value;
    }

    /// Independent copy of the held value
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    pub fn deep_clone(&self) -> Symbol {
        Symbol::new(self.get())
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn value_type(&self) -> ValueType {
        self.0.borrow().value_type()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.0.borrow())
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

impl From<Value> for Symbol {
    fn from(value: Value) -> Self {
        Symbol::new(value)
    }
}

/// Hashable form of a scalar used as a map key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    /// Bit pattern of the real, with `-0.0` folded into `0.0`
    Real(u64),
    Str(String),
}

impl MapKey {
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(n) => Value::Int(*n),
            MapKey::Real(bits) => Value::Real(f64::from_bits(*bits)),
            MapKey::Str(s) => Value::Str(s.clone()),
        }
    }

    /// Ordering used for stable printing: numbers first, then strings
    pub fn display_cmp(&self, other: &MapKey) -> Ordering {
        match (self, other) {
            (MapKey::Str(a), MapKey::Str(b)) => a.cmp(b),
            (MapKey::Str(_), _) => Ordering::Greater,
            (_, MapKey::Str(_)) => Ordering::Less,
            (a, b) => {
                let (a, b) = (a.to_value(), b.to_value());
                let (a, b) = (a.as_real().unwrap_or(0.0), b.as_real().unwrap_or(0.0));
                a.total_cmp(&b)
            }
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// Numeric view of a scalar, after coercion
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    fn real(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Real(x) => x,
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Int(n) => Value::Int(*n),
            Value::Real(x) => Value::Real(*x),
            Value::Str(s) => Value::Str(s.clone()),
            Value::Array(items) => Value::Array(items.iter().map(Symbol::deep_clone).collect()),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect(),
            ),
        }
    }
}

impl Value {
    /// The neutral value used to fill auto-extended array slots
    pub fn zero() -> Self {
        Value::Real(0.0)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Real(_) => ValueType::Real,
            Value::Str(_) => ValueType::Str,
            Value::Array(_) => ValueType::Array,
            Value::Map(_) => ValueType::Map,
        }
    }

    /// Get type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Zero, the empty string and empty containers are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Real(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Coerce a scalar to an integer.
    ///
    /// Reals are truncated toward zero; strings are parsed after trimming.
    /// Returns `None` for non-numeric strings, containers and reals that are
    /// not finite or fall outside the `i64` range.
    pub fn as_int(&self) -> Option<i64> {
        match self.to_number()? {
            Number::Int(n) => Some(n),
            Number::Real(x) => {
                let x = x.trunc();
                // 2^63 is exact in f64; NaN fails both comparisons
                (x >= -9_223_372_036_854_775_808.0 && x < 9_223_372_036_854_775_808.0)
                    .then_some(x as i64)
            }
        }
    }

    /// Coerce a scalar to a real. Returns `None` for non-numeric strings
    /// and containers.
    pub fn as_real(&self) -> Option<f64> {
        self.to_number().map(Number::real)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn to_number(&self) -> Option<Number> {
        match self {
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Real(x) => Some(Number::Real(*x)),
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::Int)
                    .or_else(|_| s.parse::<f64>().map(Number::Real))
                    .ok()
            }
            Value::Array(_) | Value::Map(_) => None,
        }
    }

    fn expect_number(&self) -> InterpResult<Number> {
        self.to_number()
            .ok_or_else(|| RuntimeError::type_error("number", &self.describe()))
    }

    /// Type name, plus the content for strings that failed to parse
    fn describe(&self) -> String {
        match self {
            Value::Str(s) => format!("non-numeric string {s:?}"),
            other => other.type_name().to_string(),
        }
    }

    /// Map key for this value; containers cannot be keys
    pub fn to_key(&self) -> InterpResult<MapKey> {
        match self {
            Value::Int(n) => Ok(MapKey::Int(*n)),
            Value::Real(x) => {
                let x = if *x == 0.0 { 0.0 } else { *x };
                Ok(MapKey::Real(x.to_bits()))
            }
            Value::Str(s) => Ok(MapKey::Str(s.clone())),
            other => Err(RuntimeError::type_error("int, real or string key", other.type_name())),
        }
    }

    pub fn negate(&self) -> InterpResult<Value> {
        match self.expect_number()? {
            Number::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            Number::Real(x) => Ok(Value::Real(-x)),
        }
    }

    /// Apply an arithmetic, comparison or (non short-circuiting) logical
    /// operator to two values.
    pub fn binary_op(op: BinOp, left: &Value, right: &Value) -> InterpResult<Value> {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow => {
                Self::arithmetic(op, left, right)
            }
            BinOp::Eq => Ok(Value::from(left.loose_eq(right))),
            BinOp::Ne => Ok(Value::from(!left.loose_eq(right))),
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let ord = left.compare(right)?;
                let result = match op {
                    BinOp::Lt => ord == Some(Ordering::Less),
                    BinOp::Gt => ord == Some(Ordering::Greater),
                    BinOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                    _ => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
                };
                Ok(Value::from(result))
            }
            BinOp::And => Ok(Value::from(left.is_truthy() && right.is_truthy())),
            BinOp::Or => Ok(Value::from(left.is_truthy() || right.is_truthy())),
            BinOp::Assign => Err(RuntimeError::type_error("value operator", "assignment")),
        }
    }

    fn arithmetic(op: BinOp, left: &Value, right: &Value) -> InterpResult<Value> {
        // string concatenation wins over numeric coercion
        if op == BinOp::Add
            && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)))
        {
            return Ok(Value::Str(format!("{left}{right}")));
        }

        let (a, b) = (left.expect_number()?, right.expect_number()?);
        match (a, b) {
            (Number::Int(a), Number::Int(b)) => match op {
                BinOp::Add => Ok(Value::Int(a.wrapping_add(b))),
                BinOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
                BinOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
                BinOp::Div => {
                    if b == 0 {
                        Err(RuntimeError::division_by_zero())
                    } else {
                        Ok(Value::Int(a.wrapping_div(b)))
                    }
                }
                _ => {
                    if b < 0 {
                        return Ok(Value::Real((a as f64).powf(b as f64)));
                    }
                    u32::try_from(b)
                        .ok()
                        .and_then(|exp| a.checked_pow(exp))
                        .map(Value::Int)
                        .ok_or_else(|| RuntimeError::overflow("power"))
                }
            },
            (a, b) => {
                let (a, b) = (a.real(), b.real());
                let x = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    _ => a.powf(b),
                };
                Ok(Value::Real(x))
            }
        }
    }

    /// `==` semantics: numbers compare numerically across int/real, strings
    /// by content, containers structurally
    fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(_) | Value::Map(_), _) | (_, Value::Array(_) | Value::Map(_)) => {
                self == other
            }
            _ => matches!(self.compare(other), Ok(Some(Ordering::Equal))),
        }
    }

    /// Ordering for `< > <= >=`; `None` when a NaN is involved
    fn compare(&self, other: &Value) -> InterpResult<Option<Ordering>> {
        if let (Value::Str(a), Value::Str(b)) = (self, other) {
            return Ok(Some(a.cmp(b)));
        }
        match (self.expect_number()?, other.expect_number()?) {
            (Number::Int(a), Number::Int(b)) => Ok(Some(a.cmp(&b))),
            (a, b) => Ok(a.real().partial_cmp(&b.real())),
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.borrow().fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.display_cmp(b.0));
                write!(f, "{{")?;
                for (i, (key, value)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    key.to_value().fmt_nested(f)?;
                    write!(f, ": ")?;
                    value.borrow().fmt_nested(f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items.into_iter().map(Symbol::new).collect())
    }
}
