//! Core library for the Ripple event-driven scripting language: lexing,
//! parsing, evaluation, and the queue-backed dispatch runtime.

pub mod ast;
pub mod diagnostics;
pub mod environment;
pub mod events;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, RippleError, SourceSpan};
pub use events::{Event, EventRuntime, RuntimeHandle};
pub use repl::Repl;
pub use runtime::Interpreter;
