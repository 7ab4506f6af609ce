use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, Result},
    environment::EnvironmentRef,
    value::{NativeFunction, Value, ValueKind},
};

/// Installs the prelude into the global frame. Deliberately small: no
/// file-system or network natives, the event queue is the only I/O the
/// language talks to besides the console.
pub fn install(env: &EnvironmentRef) {
    let mut scope = env.lock();
    scope.define("print".into(), native("print", usize::MAX, io_print));
    scope.define("println".into(), native("println", usize::MAX, io_println));
    scope.define("len".into(), native("len", 1, collections_len));
    scope.define("str".into(), native("str", 1, value_str));
    scope.define("clock".into(), native("clock", 0, time_clock));
}

fn native(name: &'static str, arity: usize, callback: fn(&[Value]) -> Result<Value>) -> Value {
    Value::new(ValueKind::NativeFunction(NativeFunction {
        name,
        arity,
        callback,
    }))
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn io_print(args: &[Value]) -> Result<Value> {
    print!("{}", joined(args));
    Ok(Value::null())
}

fn io_println(args: &[Value]) -> Result<Value> {
    println!("{}", joined(args));
    Ok(Value::null())
}

fn collections_len(args: &[Value]) -> Result<Value> {
    let length = match &*args[0].0 {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::List(values) => values.len(),
        ValueKind::Map(map) => map.len(),
        _ => {
            return Err(Diagnostic::new(
                DiagnosticKind::TypeError,
                format!("`len` expects String, Array or Map, found {}", args[0].type_name()),
            )
            .into());
        }
    };
    Ok(Value::number(length as f64))
}

fn value_str(args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].to_string()))
}

fn time_clock(_args: &[Value]) -> Result<Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Value::number(now))
}
