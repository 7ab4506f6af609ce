use std::thread;

use ripple::{
    diagnostics::DiagnosticKind,
    events::{Event, EventRuntime},
    runtime::Interpreter,
    value::{Value, ValueKind},
};

fn setup(source: &str) -> (EventRuntime, Interpreter) {
    let runtime = EventRuntime::new();
    let mut interpreter = Interpreter::new(runtime.handle());
    interpreter
        .eval_source(source)
        .expect("program should interpret");
    (runtime, interpreter)
}

fn number_of(interpreter: &mut Interpreter, name: &str) -> f64 {
    let value = interpreter.eval_source(name).expect("variable should read");
    match &*value.0 {
        ValueKind::Number(n) => *n,
        _ => panic!("expected Number, found {}", value.type_name()),
    }
}

#[test]
fn serial_dispatch_accumulates_state() {
    let (runtime, mut interpreter) = setup(
        r#"
        var x = 1
        inc -> bump(n) { x = x + n }
        "#,
    );
    runtime.handle().emit(Event::new("inc", Value::number(5.0)));
    runtime.handle().emit(Event::new("inc", Value::number(5.0)));
    runtime
        .run_until_idle(&mut interpreter)
        .expect("dispatch should succeed");
    assert_eq!(number_of(&mut interpreter, "x"), 11.0);
}

#[test]
fn handlers_run_in_registration_order() {
    let (runtime, mut interpreter) = setup(
        r#"
        var log = ""
        step -> first(p) { log = log + "a" }
        step -> second(p) { log = log + "b" }
        "#,
    );
    runtime.handle().emit(Event::new("step", Value::null()));
    runtime
        .run_until_idle(&mut interpreter)
        .expect("dispatch should succeed");
    let value = interpreter.eval_source("log").expect("read log");
    match &*value.0 {
        ValueKind::String(s) => assert_eq!(s, "ab"),
        _ => panic!("expected String"),
    }
}

#[test]
fn emit_enqueues_without_running_inline() {
    let (runtime, mut interpreter) = setup(
        r#"
        var seen = 0
        ping -> _(p) { seen = seen + 1 }
        emit ping
        "#,
    );
    // interpretation only enqueued; nothing dispatched yet
    assert_eq!(number_of(&mut interpreter, "seen"), 0.0);
    runtime
        .run_until_idle(&mut interpreter)
        .expect("dispatch should succeed");
    assert_eq!(number_of(&mut interpreter, "seen"), 1.0);
}

#[test]
fn reemission_is_observed_on_later_iterations_only() {
    let (runtime, mut interpreter) = setup(
        r#"
        var depth = 0
        var deepest = 0
        var fired = 0
        pulse -> track(p) {
            depth = depth + 1
            if depth > deepest { deepest = depth }
            if fired < 3 {
                fired = fired + 1
                emit pulse
            }
            depth = depth - 1
        }
        "#,
    );
    runtime.handle().emit(Event::new("pulse", Value::null()));
    runtime
        .run_until_idle(&mut interpreter)
        .expect("dispatch should succeed");
    assert_eq!(number_of(&mut interpreter, "fired"), 3.0);
    assert_eq!(number_of(&mut interpreter, "deepest"), 1.0);
}

#[test]
fn unbound_events_are_discarded_silently() {
    let (runtime, mut interpreter) = setup("var x = 1");
    runtime
        .handle()
        .emit(Event::new("nobody-listens", Value::number(7.0)));
    runtime
        .run_until_idle(&mut interpreter)
        .expect("discard is not an error");
    assert_eq!(number_of(&mut interpreter, "x"), 1.0);
}

#[test]
fn dispatch_pads_and_truncates_handler_parameters() {
    let (runtime, mut interpreter) = setup(
        r#"
        var zero_ran = false
        var padded = false
        zero -> _() { zero_ran = true }
        wide -> _(a, b) {
            if a == 7 and b == null { padded = true }
        }
        "#,
    );
    runtime.handle().emit(Event::new("zero", Value::number(42.0)));
    runtime.handle().emit(Event::new("wide", Value::number(7.0)));
    runtime
        .run_until_idle(&mut interpreter)
        .expect("dispatch should succeed");
    let zero_ran = interpreter.eval_source("zero_ran").expect("read");
    let padded = interpreter.eval_source("padded").expect("read");
    assert!(zero_ran.is_truthy());
    assert!(padded.is_truthy());
}

#[test]
fn anonymous_handlers_define_no_name() {
    let (_runtime, mut interpreter) = setup("tock -> _(p) { }");
    let err = interpreter
        .eval_source("_")
        .expect_err("`_` should stay undefined");
    assert_eq!(err.kind(), Some(DiagnosticKind::UndefinedVariable));
}

#[test]
fn handler_errors_surface_from_run_until_idle() {
    let (runtime, mut interpreter) = setup("boom -> _(p) { missing = 1 }");
    runtime.handle().emit(Event::new("boom", Value::null()));
    let err = runtime
        .run_until_idle(&mut interpreter)
        .expect_err("handler error should propagate");
    assert_eq!(err.kind(), Some(DiagnosticKind::UndefinedVariable));
}

#[test]
fn interpreter_recovers_after_handler_error() {
    let (runtime, mut interpreter) = setup(
        r#"
        var ok = 0
        boom -> _(p) { missing = 1 }
        fine -> _(p) { ok = ok + 1 }
        "#,
    );
    runtime.handle().emit(Event::new("boom", Value::null()));
    runtime
        .run_until_idle(&mut interpreter)
        .expect_err("first drain fails");
    // the failed dispatch must not leave the evaluator in a dead scope
    runtime.handle().emit(Event::new("fine", Value::null()));
    runtime
        .run_until_idle(&mut interpreter)
        .expect("second drain succeeds");
    assert_eq!(number_of(&mut interpreter, "ok"), 1.0);
}

#[test]
fn producers_on_other_threads_feed_the_single_consumer() {
    let (runtime, mut interpreter) = setup(
        r#"
        var total = 0
        add -> _(n) { total = total + n }
        "#,
    );
    let mut producers = Vec::new();
    for _ in 0..4 {
        let handle = runtime.handle();
        producers.push(thread::spawn(move || {
            for _ in 0..25 {
                handle.emit(Event::new("add", Value::number(1.0)));
            }
        }));
    }
    for producer in producers {
        producer.join().expect("producer thread");
    }
    runtime
        .run_until_idle(&mut interpreter)
        .expect("dispatch should succeed");
    assert_eq!(number_of(&mut interpreter, "total"), 100.0);
}

#[test]
fn handlers_registered_mid_dispatch_receive_later_events() {
    let (runtime, mut interpreter) = setup(
        r#"
        var late_runs = 0
        install -> _(p) {
            late -> _(q) { late_runs = late_runs + 1 }
            emit late
        }
        "#,
    );
    runtime.handle().emit(Event::new("install", Value::null()));
    runtime
        .run_until_idle(&mut interpreter)
        .expect("dispatch should succeed");
    assert_eq!(number_of(&mut interpreter, "late_runs"), 1.0);
}
