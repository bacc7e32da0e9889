//! Native function registry
//!
//! Feature areas (generic, math, fitting) each expose a batch of
//! `(name, function)` pairs that is merged into the context's [`Registry`]
//! at startup. Scripts cannot unregister or replace a native function, but a
//! user-defined function of the same name takes precedence at call time.

pub mod fit;
pub mod generic;
pub mod math;

use crate::interp::{Context, ErrorKind, InterpResult, RuntimeError, Symbol, Value, ValueType};
use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt;

/// Native function signature.
///
/// Arguments are the caller's symbols, not copies: a native function may
/// read or mutate them in place but must deep-clone anything it stores.
pub type NativeFn = fn(&[Symbol], &mut Context) -> InterpResult<Option<Value>>;

/// Name -> native function table
#[derive(Default)]
pub struct Registry {
    functions: HashMap<String, NativeFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of native functions.
    ///
    /// A name that is already registered keeps its first registration.
    pub fn register(&mut self, batch: &[(&str, NativeFn)]) {
        for &(name, func) in batch {
            if self.functions.contains_key(name) {
                tracing::warn!(function = name, "native function already registered, keeping the first");
                continue;
            }
            self.functions.insert(name.to_string(), func);
        }
    }

    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.functions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("functions", &self.names()).finish()
    }
}

/// Register every built-in feature batch
pub fn register_all(registry: &mut Registry) {
    registry.register(generic::FUNCTIONS);
    registry.register(math::FUNCTIONS);
    registry.register(fit::FUNCTIONS);
}

bitflags! {
    /// Set of value types accepted for one argument position
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeSet: u8 {
        const INT = 1;
        const REAL = 1 << 1;
        const STR = 1 << 2;
        const ARRAY = 1 << 3;
        const MAP = 1 << 4;

        const NUMERIC = Self::INT.bits() | Self::REAL.bits();
        const SCALAR = Self::NUMERIC.bits() | Self::STR.bits();
        const ANY = Self::SCALAR.bits() | Self::ARRAY.bits() | Self::MAP.bits();
    }
}

const ALL_TYPES: [ValueType; 5] = [
    ValueType::Int,
    ValueType::Real,
    ValueType::Str,
    ValueType::Array,
    ValueType::Map,
];

impl TypeSet {
    pub fn of(ty: ValueType) -> TypeSet {
        match ty {
            ValueType::Int => TypeSet::INT,
            ValueType::Real => TypeSet::REAL,
            ValueType::Str => TypeSet::STR,
            ValueType::Array => TypeSet::ARRAY,
            ValueType::Map => TypeSet::MAP,
        }
    }

    pub fn accepts(self, ty: ValueType) -> bool {
        self.contains(TypeSet::of(ty))
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = ALL_TYPES
            .iter()
            .filter(|ty| self.accepts(**ty))
            .map(|ty| ty.name())
            .collect();
        write!(f, "{}", names.join(" or "))
    }
}

/// Declared shape of one argument position
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub types: TypeSet,
    pub optional: bool,
}

impl ArgSpec {
    pub const fn required(types: TypeSet) -> Self {
        ArgSpec {
            types,
            optional: false,
        }
    }

    pub const fn optional(types: TypeSet) -> Self {
        ArgSpec {
            types,
            optional: true,
        }
    }
}

/// Validate an argument list against the declared positions.
pub fn check_args(name: &str, args: &[Symbol], specs: &[ArgSpec]) -> InterpResult<()> {
    let required = specs.iter().filter(|s| !s.optional).count();
    if args.len() < required {
        let expected = if required == specs.len() {
            format!("{required}")
        } else {
            format!("at least {required}")
        };
        return Err(RuntimeError::new(
            ErrorKind::Argument,
            format!(
                "{name}: expected {expected} argument(s), got {}",
                args.len()
            ),
        ));
    }
    if args.len() > specs.len() {
        return Err(RuntimeError::new(
            ErrorKind::Argument,
            format!(
                "{name}: expected at most {} argument(s), got {}",
                specs.len(),
                args.len()
            ),
        ));
    }
    for (i, (arg, spec)) in args.iter().zip(specs).enumerate() {
        check_type(name, i, arg, spec.types)?;
    }
    Ok(())
}

/// Validate a variadic argument list: at least `min` arguments, all of `types`.
pub fn check_variadic(name: &str, args: &[Symbol], min: usize, types: TypeSet) -> InterpResult<()> {
    if args.len() < min {
        return Err(RuntimeError::new(
            ErrorKind::Argument,
            format!(
                "{name}: expected at least {min} argument(s), got {}",
                args.len()
            ),
        ));
    }
    for (i, arg) in args.iter().enumerate() {
        check_type(name, i, arg, types)?;
    }
    Ok(())
}

fn check_type(name: &str, idx: usize, arg: &Symbol, types: TypeSet) -> InterpResult<()> {
    let ty = arg.value_type();
    if types.accepts(ty) {
        return Ok(());
    }
    Err(RuntimeError::new(
        ErrorKind::TypeError,
        format!(
            "{name}: argument {} must be {types}, got {}",
            idx + 1,
            ty.name()
        ),
    ))
}

/// Numeric argument at `idx`; `check_args` must have accepted it as numeric
pub(crate) fn real_arg(name: &str, args: &[Symbol], idx: usize) -> InterpResult<f64> {
    let value = args[idx].borrow();
    value
        .as_real()
        .ok_or_else(|| RuntimeError::type_error(&format!("number for {name}"), value.type_name()))
}

/// Elements of an array argument coerced to reals
pub(crate) fn real_array_arg(name: &str, args: &[Symbol], idx: usize) -> InterpResult<Vec<f64>> {
    let value = args[idx].borrow();
    let Value::Array(items) = &*value else {
        return Err(RuntimeError::type_error(
            &format!("array for {name}"),
            value.type_name(),
        ));
    };
    items
        .iter()
        .map(|item| {
            let item = item.borrow();
            item.as_real().ok_or_else(|| {
                RuntimeError::type_error(&format!("numeric array for {name}"), item.type_name())
            })
        })
        .collect()
}

/// Build an array value from reals
pub(crate) fn real_array(values: impl IntoIterator<Item = f64>) -> Value {
    Value::Array(values.into_iter().map(|x| Symbol::new(Value::Real(x))).collect())
}
