use ripple::{
    diagnostics::{DiagnosticKind, RippleError, SourceSpan},
    environment::Environment,
    events::EventRuntime,
    runtime::Interpreter,
    value::{Value, ValueKind},
};

fn interpreter() -> Interpreter {
    let runtime = EventRuntime::new();
    Interpreter::new(runtime.handle())
}

fn eval(source: &str) -> Value {
    interpreter()
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> RippleError {
    match interpreter().eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn expect_number(value: &Value) -> f64 {
    match value.0.as_ref() {
        ValueKind::Number(n) => *n,
        _ => panic!("expected Number, found {}", value.type_name()),
    }
}

fn expect_string(value: &Value) -> &str {
    match value.0.as_ref() {
        ValueKind::String(s) => s,
        _ => panic!("expected String, found {}", value.type_name()),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value.0.as_ref() {
        ValueKind::Bool(b) => *b,
        _ => panic!("expected Bool, found {}", value.type_name()),
    }
}

fn expect_list(value: &Value) -> &[Value] {
    match value.0.as_ref() {
        ValueKind::List(values) => values,
        _ => panic!("expected Array, found {}", value.type_name()),
    }
}

fn expect_kind(err: &RippleError, kind: DiagnosticKind) {
    assert_eq!(err.kind(), Some(kind), "{err}");
}

#[test]
fn evaluates_basic_arithmetic() {
    assert_eq!(expect_number(&eval("2 + 2")), 4.0);
    assert_eq!(expect_number(&eval("(1 + 2) * 3")), 9.0);
    assert_eq!(expect_number(&eval("10 - 4 / 2")), 8.0);
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(expect_number(&eval("1 / 0")), f64::INFINITY);
    assert!(expect_number(&eval("0 / 0")).is_nan());
}

#[test]
fn environment_defines_and_reads_in_same_frame() {
    let span = SourceSpan::new(0, 0);
    let env = Environment::new();
    env.lock().define("answer".into(), Value::number(42.0));
    let value = Environment::get(&env, "answer", span).expect("defined name");
    assert_eq!(expect_number(&value), 42.0);
}

#[test]
fn child_frame_reads_and_assigns_through_to_parent() {
    let span = SourceSpan::new(0, 0);
    let parent = Environment::new();
    parent.lock().define("n".into(), Value::number(1.0));
    let child = Environment::with_parent(parent.clone());

    let seen = Environment::get(&child, "n", span).expect("visible in child");
    assert_eq!(expect_number(&seen), 1.0);

    Environment::assign(&child, "n", Value::number(2.0), span).expect("assign through chain");
    let updated = Environment::get(&parent, "n", span).expect("still defined in parent");
    assert_eq!(expect_number(&updated), 2.0);
}

#[test]
fn define_shadows_without_touching_parent() {
    let span = SourceSpan::new(0, 0);
    let parent = Environment::new();
    parent.lock().define("n".into(), Value::number(1.0));
    let child = Environment::with_parent(parent.clone());
    child.lock().define("n".into(), Value::number(9.0));

    let in_child = Environment::get(&child, "n", span).expect("shadowed");
    assert_eq!(expect_number(&in_child), 9.0);
    let in_parent = Environment::get(&parent, "n", span).expect("untouched");
    assert_eq!(expect_number(&in_parent), 1.0);
}

#[test]
fn unknown_names_fail_on_read_and_assign() {
    let span = SourceSpan::new(0, 0);
    let env = Environment::new();
    let read = Environment::get(&env, "ghost", span).expect_err("read should fail");
    expect_kind(&read, DiagnosticKind::UndefinedVariable);
    let write =
        Environment::assign(&env, "ghost", Value::null(), span).expect_err("assign should fail");
    expect_kind(&write, DiagnosticKind::UndefinedVariable);

    expect_kind(&eval_error("ghost"), DiagnosticKind::UndefinedVariable);
    expect_kind(&eval_error("ghost = 1"), DiagnosticKind::UndefinedVariable);
}

#[test]
fn assignment_is_an_expression() {
    assert_eq!(expect_number(&eval("var x = 1  x = 5")), 5.0);
}

#[test]
fn block_scopes_shadow_and_restore() {
    let value = eval(
        r#"
        var x = 1
        {
            var x = 2
            x = x + 1
        }
        x
        "#,
    );
    assert_eq!(expect_number(&value), 1.0);
}

#[test]
fn range_produces_half_open_interval() {
    let value = eval("1..5");
    let items = expect_list(&value);
    assert_eq!(items.len(), 4);
    assert_eq!(expect_number(&items[0]), 1.0);
    assert_eq!(expect_number(&items[3]), 4.0);

    assert!(expect_list(&eval("2..2")).is_empty());
    assert!(expect_list(&eval("5..2")).is_empty());
    expect_kind(&eval_error(r#""a".."b""#), DiagnosticKind::TypeError);
}

#[test]
fn plus_is_overloaded_per_kind() {
    assert_eq!(expect_number(&eval("1 + 2")), 3.0);
    assert_eq!(expect_string(&eval(r#""foo" + "bar""#)), "foobar");

    let value = eval("[1, 2] + [3]");
    let items = expect_list(&value);
    assert_eq!(items.len(), 3);
    assert_eq!(expect_number(&items[2]), 3.0);

    for source in [r#"1 + "a""#, r#""a" + 1"#, "[1] + 1", "true + true"] {
        let err = eval_error(source);
        expect_kind(&err, DiagnosticKind::TypeError);
        assert!(
            err.to_string()
                .contains("Operands must be two numbers, strings or arrays."),
            "{err}"
        );
    }
}

#[test]
fn list_concat_leaves_inputs_untouched() {
    let value = eval(
        r#"
        var a = [1]
        var b = [2]
        var c = a + b
        len(a) + len(b) + len(c)
        "#,
    );
    assert_eq!(expect_number(&value), 4.0);
}

#[test]
fn ordering_requires_numbers() {
    assert!(expect_bool(&eval("2 > 1")));
    assert!(expect_bool(&eval("1 <= 1")));
    let err = eval_error(r#""a" < "b""#);
    expect_kind(&err, DiagnosticKind::TypeError);
    assert!(err.to_string().contains("Operands must be numbers."), "{err}");
}

#[test]
fn unary_operators() {
    assert_eq!(expect_number(&eval("-(1 + 2)")), -3.0);
    assert!(expect_bool(&eval("!null")));
    assert!(!expect_bool(&eval("!0")));
    let err = eval_error(r#"-"a""#);
    expect_kind(&err, DiagnosticKind::TypeError);
    assert!(err.to_string().contains("Operand must be a number."), "{err}");
}

#[test]
fn equality_is_structural_and_never_errors() {
    assert!(expect_bool(&eval("null == null")));
    assert!(!expect_bool(&eval("null == 0")));
    assert!(!expect_bool(&eval(r#"1 == "1""#)));
    assert!(expect_bool(&eval("[1, [2]] == [1, [2]]")));
    assert!(expect_bool(&eval(
        r#"
        var d1 = { "a": 1 }
        var d2 = { "a": 1 }
        d1 == d2
        "#
    )));
    assert!(expect_bool(&eval("1 != 2")));
}

#[test]
fn logical_operators_short_circuit_and_return_operands() {
    assert_eq!(expect_number(&eval("null or 3")), 3.0);
    assert_eq!(expect_number(&eval("false or 2")), 2.0);
    assert_eq!(expect_number(&eval("0 and 2")), 2.0);
    assert!(matches!(&*eval("null and 2").0, ValueKind::Null));

    // the right side is never evaluated once the left decides
    assert_eq!(expect_number(&eval("var x = 1  true or (x = 2)  x")), 1.0);
    assert_eq!(expect_number(&eval("var x = 1  null and (x = 3)  x")), 1.0);
}

#[test]
fn empty_collections_are_truthy() {
    assert_eq!(expect_number(&eval(r#""" and 1"#)), 1.0);
    assert_eq!(expect_number(&eval("[] and 2")), 2.0);
}

#[test]
fn named_binding_is_callable_directly() {
    let value = eval(
        r#"
        tick -> double(n) { return n * 2 }
        double(21)
        "#,
    );
    assert_eq!(expect_number(&value), 42.0);
}

#[test]
fn explicit_calls_enforce_arity() {
    let err = eval_error(
        r#"
        tick -> double(n) { return n * 2 }
        double(1, 2)
        "#,
    );
    expect_kind(&err, DiagnosticKind::Arity);
    assert!(
        err.to_string().contains("Expected 1 arguments but got 2."),
        "{err}"
    );
}

#[test]
fn only_functions_are_callable() {
    let err = eval_error("var x = 1  x(2)");
    expect_kind(&err, DiagnosticKind::TypeError);
    assert!(err.to_string().contains("Can only call functions."), "{err}");
}

#[test]
fn return_unwinds_nested_statements() {
    let value = eval(
        r#"
        tick -> first_over(limit) {
            var i = 0
            while true {
                if i > limit {
                    return i
                }
                i = i + 1
            }
            return -1
        }
        first_over(2)
        "#,
    );
    assert_eq!(expect_number(&value), 3.0);
}

#[test]
fn function_without_return_yields_null() {
    let value = eval(
        r#"
        tick -> noop(n) { n + 1 }
        noop(1)
        "#,
    );
    assert!(matches!(&*value.0, ValueKind::Null));
}

#[test]
fn top_level_return_is_rejected() {
    let err = eval_error("return 1");
    expect_kind(&err, DiagnosticKind::Runtime);
    assert!(
        err.to_string().contains("Cannot return from top-level code."),
        "{err}"
    );
}

#[test]
fn closures_capture_their_defining_scope() {
    let value = eval(
        r#"
        var count = 0
        tick -> bump(n) {
            count = count + n
            return count
        }
        bump(2)
        bump(3)
        "#,
    );
    assert_eq!(expect_number(&value), 5.0);
}

#[test]
fn recursive_function_evaluates() {
    let value = eval(
        r#"
        tick -> fib(n) {
            if n <= 1 {
                return n
            }
            return fib(n - 1) + fib(n - 2)
        }
        fib(6)
        "#,
    );
    assert_eq!(expect_number(&value), 8.0);
}

#[test]
fn for_loop_walks_any_list() {
    let value = eval(
        r#"
        var sum = 0
        for i in 1..4 {
            sum = sum + i
        }
        sum
        "#,
    );
    assert_eq!(expect_number(&value), 6.0);

    let joined = eval(
        r#"
        var out = ""
        for s in ["a", "b", "c"] {
            out = out + s
        }
        out
        "#,
    );
    assert_eq!(expect_string(&joined), "abc");
}

#[test]
fn for_loop_variable_is_scoped_to_the_body() {
    let err = eval_error("for i in 0..3 { }  i");
    expect_kind(&err, DiagnosticKind::UndefinedVariable);
}

#[test]
fn for_requires_a_list() {
    expect_kind(&eval_error("for i in 5 { }"), DiagnosticKind::TypeError);
}

#[test]
fn prelude_helpers() {
    assert_eq!(expect_number(&eval(r#"len("hello")"#)), 5.0);
    assert_eq!(expect_number(&eval("len([1, 2, 3])")), 3.0);
    assert_eq!(expect_number(&eval(r#"len({ "a": 1, "b": 2 })"#)), 2.0);
    assert_eq!(expect_string(&eval("str(42)")), "42");
    assert_eq!(expect_string(&eval("str([1, 2])")), "[1, 2]");
    assert!(expect_number(&eval("clock()")) > 0.0);
}
