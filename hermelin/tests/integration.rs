//! Integration tests for the hermelin interpreter
//!
//! Whole scripts are parsed and run through the public API:
//! - program execution (`run_program`, `run_file`)
//! - interactive sessions
//! - module imports
//! - soft errors reported through logging

use hermelin::ast::Node;
use hermelin::config::Config;
use hermelin::interp::{Context, ErrorKind, RuntimeError, Value};
use hermelin::parser::parse_source;
use hermelin::repl::Session;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Run a program with captured output; returns `main`'s result and the output
fn run_with(ctx: &mut Context, source: &str, args: &[&str]) -> Result<(Option<Value>, String), RuntimeError> {
    let root = parse_source("test.hms", source).expect("program should parse");
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let result = ctx.run_program(&root, &args)?;
    Ok((result, ctx.take_output()))
}

fn run(source: &str) -> (Option<Value>, String) {
    let mut ctx = Context::new().capture_output();
    run_with(&mut ctx, source, &[]).expect("program should run")
}

fn run_err(source: &str) -> RuntimeError {
    let mut ctx = Context::new().capture_output();
    run_with(&mut ctx, source, &[]).expect_err("program should fail")
}

fn output(source: &str) -> String {
    run(source).1
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with warnings and errors collected into a string
fn with_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    (result, logs)
}

// ============================================
// Literals and values
// ============================================

#[test]
fn test_literals_evaluate_to_themselves() {
    let mut ctx = Context::new();
    for (node, expected) in [
        (Node::Int(-7), Value::Int(-7)),
        (Node::Real(2.5), Value::Real(2.5)),
        (Node::Str("a b".into()), Value::from("a b")),
    ] {
        let value = ctx.eval(&node).unwrap().value().map(|s| s.get());
        assert_eq!(value, Some(expected));
    }
}

#[test]
fn test_literal_in_loop_is_never_mutated() {
    let out = output(
        "main() {\n  for i : [0, 1] {\n    a = [1, 2];\n    print(a);\n    a[0] = 9;\n  }\n}\n",
    );
    insta::assert_snapshot!(out.trim_end(), @r"
    [1, 2]
    [1, 2]
    ");
}

#[test]
fn test_nested_array_copy_is_not_aliased() {
    let out = output(
        "main() {\n  a = [[1, 2], [3, 4]];\n  b = a;\n  b[0][1] = 9;\n  print(a);\n  print(b);\n}\n",
    );
    insta::assert_snapshot!(out.trim_end(), @r"
    [[1, 2], [3, 4]]
    [[1, 9], [3, 4]]
    ");
}

#[test]
fn test_function_parameters_are_copies() {
    let out = output(
        "touch(v) { v[0] = 100; return v; }\nmain() {\n  a = [1];\n  b = touch(a);\n  print(a, b);\n}\n",
    );
    assert_eq!(out, "[1] [100]\n");
}

// ============================================
// Control flow
// ============================================

#[test]
fn test_return_from_nested_if() {
    let (result, _) = run("f() { x = 1; if(x) { return 2; } return 3; }\nmain() { return f(); }\n");
    assert_eq!(result, Some(Value::Int(2)));
}

#[test]
fn test_return_stops_only_current_function() {
    let out = output(
        r#"
f() {
  i = 0;
  while 1 {
    if i == 2 { return i; }
    i = i + 1;
  }
  print("unreachable");
}

main() {
  r = f();
  print("after", r);
}
"#,
    );
    assert_eq!(out, "after 2\n");
}

#[test]
fn test_for_binds_iteration_index() {
    let out = output("main() {\n  for v : [1, 2, 3] {\n    print(cur_iter(), v);\n  }\n}\n");
    insta::assert_snapshot!(out.trim_end(), @r"
    0 1
    1 2
    2 3
    ");
}

#[test]
fn test_nested_for_restores_outer_index() {
    let out = output(
        "main() {\n  for a : [10, 20] {\n    for b : [1, 2, 3] { }\n    print(cur_iter());\n  }\n}\n",
    );
    assert_eq!(out, "0\n1\n");
}

#[test]
fn test_loop_variable_aliases_element() {
    let out = output("main() {\n  xs = [[1], [2]];\n  for x : xs { x[0] = x[0] * 10; }\n  print(xs);\n}\n");
    assert_eq!(out, "[[10], [20]]\n");
}

#[test]
fn test_break_and_continue() {
    let out = output(
        r#"
main() {
  i = 0;
  total = 0;
  while i < 10 {
    i = i + 1;
    if i == 3 { continue; }
    if i == 6 { break; }
    total = total + i;
  }
  print(i, total);
}
"#,
    );
    // 1 + 2 + 4 + 5
    assert_eq!(out, "6 12\n");
}

#[test]
fn test_else_if_chain() {
    let out = output(
        r#"
sign(x) {
  if x < 0 { return "neg"; } else if x == 0 { return "zero"; } else { return "pos"; }
}
main() { print(sign(-3), sign(0), sign(5)); }
"#,
    );
    assert_eq!(out, "neg zero pos\n");
}

#[test]
fn test_recursion() {
    let (result, _) = run(
        "fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); }\nmain() { return fact(20); }\n",
    );
    assert_eq!(result, Some(Value::Int(2_432_902_008_176_640_000)));
}

#[test]
fn test_recursion_limit() {
    let config = Config {
        max_recursion_depth: 64,
        ..Config::default()
    };
    let mut ctx = Context::with_config(config).capture_output();
    let err = run_with(&mut ctx, "down(n) { return down(n + 1); }\nmain() { down(0); }\n", &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert_eq!(err.traceback.len(), 64);
    assert_eq!(err.traceback[0], "main (line 2)");
    assert_eq!(err.traceback[1], "down (line 2)");
}

// ============================================
// Scoping
// ============================================

#[test]
fn test_local_shadows_global_with_warning() {
    let ((result, _), logs) =
        with_logs(|| run("x = 10;\nf(x) { return x; }\nmain() { return f(3); }\n"));
    assert_eq!(result, Some(Value::Int(3)));
    assert!(logs.contains("local variable shadows a global of the same name"), "{logs}");
}

#[test]
fn test_assignment_to_global_from_function() {
    let ((result, _), logs) =
        with_logs(|| run("count = 0;\nbump() { count = count + 1; }\nmain() { bump(); bump(); return count; }\n"));
    assert_eq!(result, Some(Value::Int(2)));
    assert!(logs.contains("assignment inside a function overwrites a global"), "{logs}");
}

#[test]
fn test_function_locals_are_dropped() {
    let (result, _) = run("f() { tmp = 5; return tmp; }\nmain() { f(); return has_var(\"tmp\"); }\n");
    assert_eq!(result, Some(Value::Int(0)));
}

#[test]
fn test_user_function_overrides_builtin() {
    let mut ctx = Context::new().capture_output();
    let (result, out) = run_with(
        &mut ctx,
        "calls = 0;\nprint(x) { calls = calls + 1; }\nmain() { print(\"hi\"); print(2); return calls; }\n",
        &[],
    )
    .unwrap();
    assert_eq!(result, Some(Value::Int(2)));
    assert_eq!(out, "");
}

// ============================================
// Soft errors
// ============================================

#[test]
fn test_unknown_function_is_soft() {
    let ((result, out), logs) = with_logs(|| {
        run("main() {\n  prnt(1);\n  print(\"still here\");\n  return 1;\n}\n")
    });
    assert_eq!(result, Some(Value::Int(1)));
    assert_eq!(out, "still here\n");
    assert!(logs.contains("unknown function `prnt` (did you mean `print`?)"), "{logs}");
}

#[test]
fn test_argument_without_value_skips_call() {
    let ((result, out), logs) = with_logs(|| {
        run("f(x) { print(\"called\"); return 1; }\nmain() {\n  r = f(print(\"a\"));\n  return has_var(\"r\");\n}\n")
    });
    assert_eq!(result, Some(Value::Int(0)));
    assert_eq!(out, "a\n");
    assert!(logs.contains("argument has no value, call skipped"), "{logs}");
}

#[test]
fn test_unknown_identifier_is_soft() {
    let ((result, _), logs) = with_logs(|| run("main() { y = undefined_thing; return 5; }\n"));
    assert_eq!(result, Some(Value::Int(5)));
    assert!(logs.contains("unknown identifier `undefined_thing`"), "{logs}");
}

#[test]
fn test_arity_mismatch_is_soft() {
    let ((result, _), logs) = with_logs(|| run("two(a, b) { return a + b; }\nmain() { two(1); return 7; }\n"));
    assert_eq!(result, Some(Value::Int(7)));
    assert!(logs.contains("two"), "{logs}");
}

// ============================================
// Hard errors
// ============================================

#[test]
fn test_check_args_reports_counts() {
    let err = run_err("main() { return sqrt(); }\n");
    assert_eq!(err.kind, ErrorKind::Argument);
    assert_eq!(err.message, "sqrt: expected 1 argument(s), got 0");
    assert_eq!(err.traceback, vec!["main (line 1)".to_string()]);
}

#[test]
fn test_missing_main() {
    let err = run_err("x = 1;\n");
    assert_eq!(err.kind, ErrorKind::MissingMain);
    assert_eq!(err.code(), 9);
}

#[test]
fn test_type_error_in_arithmetic() {
    let err = run_err("main() { return [1] * 2; }\n");
    assert_eq!(err.kind, ErrorKind::TypeError);
}

// ============================================
// Numeric edge cases
// ============================================

#[test]
fn test_numeric_edge_cases() {
    let out = output(
        "main() {\n  print(1.0 / 0, -1.0 / 0, (-8) ^ 0.5, 2 ^ 10, 2 ^ -1, 9223372036854775807 + 1, 7 / 2);\n}\n",
    );
    assert_eq!(out, "inf -inf NaN 1024 0.5 -9223372036854775808 3\n");
}

#[test]
fn test_integer_division_by_zero() {
    let err = run_err("main() { z = 0; return 1 / z; }\n");
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
}

#[test]
fn test_integer_power_overflow() {
    let err = run_err("main() { e = 63; return 2 ^ e; }\n");
    assert_eq!(err.kind, ErrorKind::Overflow);
}

#[test]
fn test_int_of_out_of_range_real_is_type_error() {
    let err = run_err("main() { return int(1e300); }\n");
    assert_eq!(err.kind, ErrorKind::TypeError);
    let err = run_err("main() { return int(\"-1e30\"); }\n");
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(run("main() { return int(-2.5e3); }\n").0, Some(Value::Int(-2500)));
}

#[test]
fn test_string_coercion() {
    let out = output("main() { print(\"2\" * 3, \" 1.5 \" + 0, \"n=\" + 4); }\n");
    // `+` with a string operand concatenates
    assert_eq!(out, "6  1.5 0 n=4\n");
    let err = run_err("main() { return \"abc\" * 2; }\n");
    assert_eq!(err.kind, ErrorKind::TypeError);
}

// ============================================
// Arrays and maps
// ============================================

#[test]
fn test_auto_extend() {
    let out = output(
        "main() {\n  a = vec();\n  a[3] = 5.0;\n  print(length(a), a[0] == a[1], a[1] == a[2], a[2] == 0.0, a[3] == 5.0);\n  print(a);\n}\n",
    );
    insta::assert_snapshot!(out.trim_end(), @r"
    4 1 1 1 1
    [0, 0, 0, 5]
    ");
}

#[test]
fn test_auto_extend_limit() {
    let config = Config {
        max_array_len: 8,
        ..Config::default()
    };
    let mut ctx = Context::with_config(config).capture_output();
    let (_, out) = run_with(&mut ctx, "main() { a = []; a[7] = 1; print(length(a)); }\n", &[]).unwrap();
    assert_eq!(out, "8\n");

    let mut ctx = Context::with_config(Config {
        max_array_len: 8,
        ..Config::default()
    });
    let err = run_with(&mut ctx, "main() { a = []; a[8] = 1; }\n", &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Index);
}

#[test]
fn test_negative_index() {
    let err = run_err("main() { a = [1]; return a[-1]; }\n");
    assert_eq!(err.kind, ErrorKind::Index);
}

#[test]
fn test_map_indexing() {
    let out = output(
        r#"
main() {
  m = map();
  m["a"] = 1;
  m["b"] = m["a"] + 1;
  print(m);
  print(m["c"], length(m), has_key(m, "c"));
  print(keys(m));
}
"#,
    );
    insta::assert_snapshot!(out.trim_end(), @r#"
    {"a": 1, "b": 2}
    0 3 1
    ["a", "b", "c"]
    "#);
}

#[test]
fn test_append_and_length() {
    let out = output("main() { a = []; append(a, 1); append(a, \"x\"); print(length(a), a); }\n");
    assert_eq!(out, "2 [1, \"x\"]\n");
}

// ============================================
// Built-ins
// ============================================

#[test]
fn test_math_builtins() {
    let out = output(
        "main() { print(abs(-3), sqrt(16), min(3, 1, 2), max([1, 5, 2]), sum([1, 2, 3]), mean([1, 2, 3])); }\n",
    );
    assert_eq!(out, "3 4 1 5 6 2\n");
}

#[test]
fn test_fit_linear_script() {
    let out = output(
        "main() {\n  r = fit_linear([0, 1, 2, 3], [1, 3, 5, 7]);\n  print(r[\"slope\"], r[\"offset\"], r[\"chi2\"]);\n  print(polyval([2, 1], [0, 1, 2]));\n}\n",
    );
    assert_eq!(out, "2 1 0\n[1, 3, 5]\n");
}

#[test]
fn test_main_receives_arguments() {
    let mut ctx = Context::new().capture_output();
    let (_, out) = run_with(
        &mut ctx,
        "main(argv) { print(length(argv), argv[1]); print(args()); }\n",
        &["a", "b"],
    )
    .unwrap();
    insta::assert_snapshot!(out.trim_end(), @r#"
    2 b
    ["a", "b"]
    "#);
}

#[test]
fn test_host_calls_script_function() {
    let mut ctx = Context::new();
    let root = parse_source("lib.hms", "scale(x, k) { return x * k; }\n").unwrap();
    ctx.eval(&root).unwrap();
    let result = ctx
        .call_function("scale", vec![Value::Real(1.5), Value::Int(4)])
        .unwrap();
    assert_eq!(result, Some(Value::Real(6.0)));
}

// ============================================
// Modules
// ============================================

fn script_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".hms").tempfile().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_import_is_memoized() {
    let lib = script_file("loads = loads + 1;\nhelper() { return 5; }\n");
    let path = lib.path().display().to_string();
    let source = format!(
        "loads = 0;\nimport(\"{path}\");\nimport(\"{path}\");\nmain() {{ return helper() * 10 + loads; }}\n"
    );
    let ((result, _), logs) = with_logs(|| run(&source));
    assert_eq!(result, Some(Value::Int(51)));
    assert!(logs.contains("module already loaded"), "{logs}");
}

#[test]
fn test_import_from_inside_function_runs_at_global_scope() {
    let lib = script_file("shared = 42;\n");
    let path = lib.path().display().to_string();
    let source = format!(
        "load() {{ local_only = 1; import(\"{path}\"); }}\nmain() {{ load(); return shared; }}\n"
    );
    let (result, _) = run(&source);
    assert_eq!(result, Some(Value::Int(42)));
}

#[test]
fn test_import_failure_is_hard_error() {
    let err = run_err("main() { import(\"/nonexistent/dir/lib.hms\"); }\n");
    assert_eq!(err.kind, ErrorKind::Import);
}

#[test]
fn test_run_file() {
    let prog = script_file("main() { print(\"file\"); return 3; }\n");
    let mut ctx = Context::new().capture_output();
    assert_eq!(ctx.run_file(prog.path(), &[]).unwrap(), Some(Value::Int(3)));
    assert_eq!(ctx.take_output(), "file\n");
    assert_eq!(ctx.loaded_modules().len(), 1);
}

#[test]
fn test_run_file_parse_error() {
    let prog = script_file("main() { x = ; }\n");
    let mut ctx = Context::new();
    let err = ctx.run_file(prog.path(), &[]).unwrap_err();
    assert!(matches!(err, hermelin::ScriptError::Compile(_)));
}

// ============================================
// Interactive sessions
// ============================================

#[test]
fn test_implicit_return_in_session() {
    let mut session = Session::new(Context::new().capture_output());
    assert_eq!(session.eval_line("a = 4; b = a * a").unwrap(), Some(Value::Int(16)));
    session.eval_line("f() { return 1; }").unwrap();
    assert_eq!(session.eval_line("f(); z = 2").unwrap(), Some(Value::Int(2)));
    assert_eq!(session.eval_line("print(b)").unwrap(), None);
    assert_eq!(session.context_mut().take_output(), "16\n");
}

#[test]
fn test_implicit_return_not_recorded_by_callee() {
    let mut session = Session::new(Context::new());
    session.eval_line("g() { inner = 99; }").unwrap();
    assert_eq!(session.eval_line("g()").unwrap(), None);
}

// ============================================
// Concurrency
// ============================================

#[test]
fn test_contexts_are_isolated_per_thread() {
    let handles: Vec<_> = (0..4)
        .map(|n| {
            std::thread::spawn(move || {
                let source = format!("main() {{ total = 0; for v : linspace(1, {n} + 1, {n} + 1) {{ total = total + v; }} return total; }}\n");
                let (result, _) = run(&source);
                result
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![
            Some(Value::Real(1.0)),
            Some(Value::Real(3.0)),
            Some(Value::Real(6.0)),
            Some(Value::Real(10.0)),
        ]
    );
}
