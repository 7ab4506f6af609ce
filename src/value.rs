use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    ast::Stmt,
    diagnostics::{Diagnostic, DiagnosticKind, Result},
    environment::EnvironmentRef,
};

/// A runtime value. Cheap to clone; the payload is shared behind an `Arc`
/// so values can ride inside events across producer threads.
#[derive(Clone)]
pub struct Value(pub Arc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Arc::new(kind))
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Self::new(ValueKind::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::new(ValueKind::List(values))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Self::new(ValueKind::Map(entries))
    }

    pub fn function(fun: ScriptFunction) -> Self {
        Self::new(ValueKind::Function(fun))
    }

    /// Null is falsy, booleans are themselves, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Null => "Null",
            ValueKind::Bool(_) => "Bool",
            ValueKind::Number(_) => "Number",
            ValueKind::String(_) => "String",
            ValueKind::List(_) => "Array",
            ValueKind::Map(_) => "Map",
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => "Function",
        }
    }

    /// Structural equality: Null equals only Null, collections compare
    /// recursively, callables compare by identity.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Number(a), ValueKind::Number(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::List(a), ValueKind::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(l, r)| l.deep_eq(r))
            }
            (ValueKind::Map(a), ValueKind::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.get(key).map(|rhs| value.deep_eq(rhs)).unwrap_or(false)
                    })
            }
            (ValueKind::Function(_), ValueKind::Function(_))
            | (ValueKind::NativeFunction(_), ValueKind::NativeFunction(_)) => {
                Arc::ptr_eq(&self.0, &other.0)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "\"{s}\""),
            ValueKind::List(values) => f.debug_list().entries(values.iter()).finish(),
            ValueKind::Map(map) => f.debug_map().entries(map.iter()).finish(),
            ValueKind::Function(fun) => write!(
                f,
                "<fn {}>",
                fun.name.clone().unwrap_or_else(|| "anonymous".into())
            ),
            ValueKind::NativeFunction(fun) => write!(f, "<native fn {}>", fun.name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Number(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            ValueKind::Map(map) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            ValueKind::Function(fun) => write!(
                f,
                "<fn {}>",
                fun.name.clone().unwrap_or_else(|| "anonymous".into())
            ),
            ValueKind::NativeFunction(fun) => write!(f, "<native fn {}>", fun.name),
        }
    }
}

pub enum ValueKind {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Function(ScriptFunction),
    NativeFunction(NativeFunction),
}

/// A script closure: parameters, body, and the environment that was active
/// when the binding statement executed. Immutable once created.
#[derive(Clone)]
pub struct ScriptFunction {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub env: EnvironmentRef,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    /// `usize::MAX` marks a variadic native.
    pub arity: usize,
    pub callback: fn(&[Value]) -> Result<Value>,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if self.arity != usize::MAX && args.len() != self.arity {
            return Err(Diagnostic::new(
                DiagnosticKind::Arity,
                format!(
                    "Expected {} arguments but got {}.",
                    self.arity,
                    args.len()
                ),
            )
            .into());
        }
        (self.callback)(args)
    }
}
