use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, Result, SourceSpan},
    value::Value,
};

/// Shared handle to a scope frame. `Arc` so closures co-own the frames they
/// capture; the mutex is uncontended because only the dispatch thread runs
/// script code, but it makes the chain `Send + Sync` for event payloads.
pub type EnvironmentRef = Arc<Mutex<Environment>>;

#[derive(Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Arc::new(Mutex::new(Self {
            parent: None,
            bindings: IndexMap::new(),
        }))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Arc::new(Mutex::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    /// Insert or overwrite in this frame only; ancestors are never touched.
    pub fn define(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Each frame's lock is released before recursing into its parent.
    pub fn get(env: &EnvironmentRef, name: &str, span: SourceSpan) -> Result<Value> {
        let parent = {
            let guard = env.lock();
            if let Some(value) = guard.bindings.get(name) {
                return Ok(value.clone());
            }
            guard.parent.clone()
        };
        if let Some(parent) = parent {
            return Environment::get(&parent, name, span);
        }
        Err(undefined(name, span))
    }

    /// Overwrites in the first frame of the chain that already defines the
    /// name; assignment never creates a binding.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value, span: SourceSpan) -> Result<()> {
        let parent = {
            let mut guard = env.lock();
            if let Some(slot) = guard.bindings.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            guard.parent.clone()
        };
        if let Some(parent) = parent {
            return Environment::assign(&parent, name, value, span);
        }
        Err(undefined(name, span))
    }
}

fn undefined(name: &str, span: SourceSpan) -> crate::diagnostics::RippleError {
    Diagnostic::new(
        DiagnosticKind::UndefinedVariable,
        format!("Undefined variable '{name}'."),
    )
    .with_span(span)
    .into()
}
