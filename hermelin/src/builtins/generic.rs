//! Generic built-ins: output, conversion, containers, introspection

use super::{ArgSpec, NativeFn, TypeSet, check_args, check_variadic};
use crate::interp::{
    ARGS_SYMBOL, Context, ErrorKind, ITER_SYMBOL, InterpResult, Lookup, RuntimeError, Symbol,
    Value,
};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("print", builtin_print),
    ("str", builtin_str),
    ("int", builtin_int),
    ("real", builtin_real),
    ("typeof", builtin_typeof),
    ("length", builtin_length),
    ("vec", builtin_vec),
    ("map", builtin_map),
    ("append", builtin_append),
    ("has_key", builtin_has_key),
    ("keys", builtin_keys),
    ("cur_iter", builtin_cur_iter),
    ("args", builtin_args),
    ("import", builtin_import),
    ("sleep", builtin_sleep),
    ("traceback", builtin_traceback),
    ("has_var", builtin_has_var),
];

/// print(values...) prints its arguments separated by spaces
fn builtin_print(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&arg.borrow().to_string());
    }
    line.push('\n');
    ctx.write_str(&line)
        .map_err(|e| RuntimeError::io_error(&e.to_string()))?;
    Ok(None)
}

fn builtin_str(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("str", args, &[ArgSpec::required(TypeSet::ANY)])?;
    Ok(Some(Value::Str(args[0].borrow().to_string())))
}

/// int(x) truncates reals and parses strings
fn builtin_int(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("int", args, &[ArgSpec::required(TypeSet::SCALAR)])?;
    let value = args[0].borrow();
    value.as_int().map(|n| Some(Value::Int(n))).ok_or_else(|| {
        RuntimeError::new(
            ErrorKind::TypeError,
            format!("int: cannot convert {:?} to an integer", value.to_string()),
        )
    })
}

fn builtin_real(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("real", args, &[ArgSpec::required(TypeSet::SCALAR)])?;
    let value = args[0].borrow();
    value.as_real().map(|x| Some(Value::Real(x))).ok_or_else(|| {
        RuntimeError::new(
            ErrorKind::TypeError,
            format!("real: cannot convert {:?} to a real", value.to_string()),
        )
    })
}

fn builtin_typeof(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("typeof", args, &[ArgSpec::required(TypeSet::ANY)])?;
    Ok(Some(Value::from(args[0].borrow().type_name())))
}

/// length(x): elements of an array or map, characters of a string
fn builtin_length(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "length",
        args,
        &[ArgSpec::required(TypeSet::STR | TypeSet::ARRAY | TypeSet::MAP)],
    )?;
    let len = match &*args[0].borrow() {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::Int(_) | Value::Real(_) => 0,
    };
    Ok(Some(Value::Int(len as i64)))
}

/// vec([n[, fill]]) builds an array of `n` (default 0) copies of `fill`
/// (default 0)
fn builtin_vec(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "vec",
        args,
        &[
            ArgSpec::optional(TypeSet::INT),
            ArgSpec::optional(TypeSet::ANY),
        ],
    )?;
    let len = match args.first().map(|n| n.get()) {
        Some(Value::Int(n)) => n,
        _ => 0,
    };
    let limit = ctx.config().max_array_len;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= limit)
        .ok_or_else(|| {
            RuntimeError::new(
                ErrorKind::Argument,
                format!("vec: length {len} is outside 0..={limit}"),
            )
        })?;
    let fill = args.get(1).map_or_else(Value::zero, Symbol::get);
    Ok(Some(Value::Array(
        (0..len).map(|_| Symbol::new(fill.clone())).collect(),
    )))
}

fn builtin_map(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("map", args, &[])?;
    Ok(Some(Value::Map(HashMap::new())))
}

/// append(array, value) pushes a copy of `value` onto `array` in place
fn builtin_append(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "append",
        args,
        &[
            ArgSpec::required(TypeSet::ARRAY),
            ArgSpec::required(TypeSet::ANY),
        ],
    )?;
    let item = args[1].deep_clone();
    let limit = ctx.config().max_array_len;
    if let Value::Array(items) = &mut *args[0].borrow_mut() {
        if items.len() >= limit {
            return Err(RuntimeError::index(format!(
                "append: array already holds the maximum of {limit} elements"
            )));
        }
        items.push(item);
    }
    Ok(None)
}

fn builtin_has_key(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args(
        "has_key",
        args,
        &[
            ArgSpec::required(TypeSet::MAP),
            ArgSpec::required(TypeSet::SCALAR),
        ],
    )?;
    let key = args[1].borrow().to_key()?;
    let found = match &*args[0].borrow() {
        Value::Map(map) => map.contains_key(&key),
        _ => false,
    };
    Ok(Some(Value::from(found)))
}

/// keys(map) returns the keys in printing order
fn builtin_keys(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("keys", args, &[ArgSpec::required(TypeSet::MAP)])?;
    let value = args[0].borrow();
    let Value::Map(map) = &*value else {
        return Ok(None);
    };
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort_by(|a, b| a.display_cmp(b));
    Ok(Some(Value::from(
        keys.into_iter().map(|k| k.to_value()).collect::<Vec<_>>(),
    )))
}

/// cur_iter() is the index of the innermost running ranged-for iteration
fn builtin_cur_iter(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("cur_iter", args, &[])?;
    match ctx.scopes().lookup(ITER_SYMBOL) {
        Lookup::Found(iter) | Lookup::Shadowed(iter) => Ok(Some(iter.get())),
        Lookup::Missing => {
            tracing::error!("cur_iter called outside of a ranged for loop");
            Ok(None)
        }
    }
}

/// args() is a copy of the program arguments handed to `main`
fn builtin_args(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("args", args, &[])?;
    Ok(Some(
        ctx.global(ARGS_SYMBOL)
            .map_or_else(|| Value::Array(Vec::new()), |argv| argv.get()),
    ))
}

/// import(paths...) loads each script at most once
fn builtin_import(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_variadic("import", args, 1, TypeSet::STR)?;
    for arg in args {
        let path = arg.borrow().as_str().map(str::to_owned).unwrap_or_default();
        ctx.import(Path::new(&path))?;
    }
    Ok(None)
}

/// sleep(seconds) blocks the running script
fn builtin_sleep(args: &[Symbol], _ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("sleep", args, &[ArgSpec::required(TypeSet::NUMERIC)])?;
    let seconds = super::real_arg("sleep", args, 0)?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        RuntimeError::new(
            ErrorKind::Argument,
            format!("sleep: invalid duration {seconds}"),
        )
    })?;
    std::thread::sleep(duration);
    Ok(None)
}

/// traceback() lists the active user calls, outermost first
fn builtin_traceback(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("traceback", args, &[])?;
    let frames: Vec<Value> = ctx
        .traceback()
        .iter()
        .map(|frame| Value::from(frame.as_str()))
        .collect();
    Ok(Some(Value::from(frames)))
}

/// has_var(name) tests whether an identifier is visible from the caller
fn builtin_has_var(args: &[Symbol], ctx: &mut Context) -> InterpResult<Option<Value>> {
    check_args("has_var", args, &[ArgSpec::required(TypeSet::STR)])?;
    let name = args[0].borrow();
    let found = name
        .as_str()
        .is_some_and(|name| !matches!(ctx.scopes().lookup(name), Lookup::Missing));
    Ok(Some(Value::from(found)))
}
