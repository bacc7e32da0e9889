//! Numeric built-ins
//!
//! Unary functions apply element-wise when given an array. Reductions take a
//! single numeric array.

use super::{ArgSpec, NativeFn, TypeSet, check_args, real_arg, real_array, real_array_arg};
use crate::interp::{Context, ErrorKind, InterpResult, RuntimeError, Symbol, Value};

pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("abs", builtin_abs),
    ("sqrt", builtin_sqrt),
    ("exp", builtin_exp),
    ("log", builtin_log),
    ("sin", builtin_sin),
    ("cos", builtin_cos),
    ("tan", builtin_tan),
    ("pow", builtin_pow),
    ("floor", builtin_floor),
    ("ceil", builtin_ceil),
    ("round", builtin_round),
    ("min", builtin_min),
    ("max", builtin_max),
    ("sum", builtin_sum),
    ("mean", builtin_mean),
    ("stddev", builtin_stddev),
    ("linspace", builtin_linspace),
];

const NUMBER_OR_ARRAY: &[ArgSpec] = &[ArgSpec::required(TypeSet::NUMERIC.union(TypeSet::ARRAY))];
const NUMERIC_ARRAY: &[ArgSpec] = &[ArgSpec::required(TypeSet::ARRAY)];

/// Apply `f` to a number, or to every element of a numeric array
fn map_real(name: &str, args: &[Symbol], f: fn(f64) -> f64) -> InterpResult<Option<Value>> {
    check_args(name, args, NUMBER_OR_ARRAY)?;
    if matches!(*args[0].borrow(), Value::Array(_)) {
        let values = real_array_arg(name, args, 0)?;
        return Ok(Some(real_array(values.into_iter().map(f))));
    }
    Ok(Some(Value::Real(f(real_arg(name, args, 0)?))))
}

/// abs keeps integers integral
fn builtin_abs(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    if let [arg] = args
        && let Value::Int(n) = *arg.borrow()
    {
        return Ok(Some(Value::Int(n.wrapping_abs())));
    }
    map_real("abs", args, f64::abs)
}

fn builtin_sqrt(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("sqrt", args, f64::sqrt)
}

fn builtin_exp(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("exp", args, f64::exp)
}

/// Natural logarithm
fn builtin_log(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("log", args, f64::ln)
}

fn builtin_sin(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("sin", args, f64::sin)
}

fn builtin_cos(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("cos", args, f64::cos)
}

fn builtin_tan(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("tan", args, f64::tan)
}

fn builtin_floor(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("floor", args, f64::floor)
}

fn builtin_ceil(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("ceil", args, f64::ceil)
}

fn builtin_round(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    map_real("round", args, f64::round)
}

/// pow(x, y) is always real, unlike the `^` operator
fn builtin_pow(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "pow",
        args,
        &[
            ArgSpec::required(TypeSet::NUMERIC),
            ArgSpec::required(TypeSet::NUMERIC),
        ],
    )?;
    let base = real_arg("pow", args, 0)?;
    let exp = real_arg("pow", args, 1)?;
    Ok(Some(Value::Real(base.powf(exp))))
}

/// Values compared by `min`/`max`: one array argument, or the arguments
/// themselves
fn extremum_candidates(name: &str, args: &[Symbol]) -> InterpResult<Vec<Value>> {
    let values: Vec<Value> = match args {
        [single] if matches!(*single.borrow(), Value::Array(_)) => match single.get() {
            Value::Array(items) => items.iter().map(Symbol::get).collect(),
            _ => Vec::new(),
        },
        _ => args.iter().map(Symbol::get).collect(),
    };
    if values.is_empty() {
        return Err(RuntimeError::new(
            ErrorKind::Argument,
            format!("{name}: expected at least 1 value, got 0"),
        ));
    }
    for value in &values {
        if value.as_real().is_none() {
            return Err(RuntimeError::type_error(
                &format!("number for {name}"),
                value.type_name(),
            ));
        }
    }
    Ok(values)
}

fn extremum(name: &str, args: &[Symbol], want_greater: bool) -> InterpResult<Option<Value>> {
    let mut values = extremum_candidates(name, args)?.into_iter();
    let Some(mut best) = values.next() else {
        return Ok(None);
    };
    for value in values {
        let x = value.as_real().unwrap_or(f64::NAN);
        let b = best.as_real().unwrap_or(f64::NAN);
        if (want_greater && x > b) || (!want_greater && x < b) {
            best = value;
        }
    }
    Ok(Some(best))
}

/// min(a, b, ...) or min(array); the winning value keeps its type
fn builtin_min(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    extremum("min", args, false)
}

fn builtin_max(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    extremum("max", args, true)
}

/// sum(array) stays integral when every element is an integer
fn builtin_sum(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("sum", args, NUMERIC_ARRAY)?;
    let all_ints = match &*args[0].borrow() {
        Value::Array(items) => items
            .iter()
            .all(|item| matches!(*item.borrow(), Value::Int(_))),
        _ => false,
    };
    if all_ints {
        let total = match &*args[0].borrow() {
            Value::Array(items) => items.iter().fold(0i64, |acc, item| match *item.borrow() {
                Value::Int(n) => acc.wrapping_add(n),
                _ => acc,
            }),
            _ => 0,
        };
        return Ok(Some(Value::Int(total)));
    }
    let values = real_array_arg("sum", args, 0)?;
    Ok(Some(Value::Real(values.iter().sum())))
}

fn builtin_mean(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("mean", args, NUMERIC_ARRAY)?;
    let values = real_array_arg("mean", args, 0)?;
    if values.is_empty() {
        return Err(RuntimeError::new(
            ErrorKind::Argument,
            "mean: array is empty",
        ));
    }
    Ok(Some(Value::Real(mean(&values))))
}

/// Sample standard deviation (n - 1 in the denominator)
fn builtin_stddev(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("stddev", args, NUMERIC_ARRAY)?;
    let values = real_array_arg("stddev", args, 0)?;
    if values.len() < 2 {
        return Err(RuntimeError::new(
            ErrorKind::Argument,
            format!("stddev: expected at least 2 values, got {}", values.len()),
        ));
    }
    let m = mean(&values);
    let variance =
        values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Ok(Some(Value::Real(variance.sqrt())))
}

/// linspace(start, stop, n): `n` evenly spaced reals including both ends
fn builtin_linspace(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "linspace",
        args,
        &[
            ArgSpec::required(TypeSet::NUMERIC),
            ArgSpec::required(TypeSet::NUMERIC),
            ArgSpec::required(TypeSet::INT),
        ],
    )?;
    let start = real_arg("linspace", args, 0)?;
    let stop = real_arg("linspace", args, 1)?;
    let n = match *args[2].borrow() {
        Value::Int(n) => n,
        _ => 0,
    };
    let limit = ctx.config().max_array_len;
    let n = usize::try_from(n)
        .ok()
        .filter(|n| (1..=limit).contains(n))
        .ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::Argument,
                format!("linspace: point count {n} is outside 1..={limit}"),
            )
        })?;
    if n == 1 {
        return Ok(Some(real_array([start])));
    }
    let step = (stop - start) / (n - 1) as f64;
    Ok(Some(real_array((0..n).map(|i| {
        if i == n - 1 { stop } else { start + step * i as f64 }
    }))))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
