use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{Result, RippleError},
    events::{Event, EventRuntime},
    runtime::Interpreter,
    value::ValueKind,
};

/// Interactive shell: each line is interpreted, then the event queue is
/// drained so `emit` takes effect between prompts.
pub struct Repl {
    runtime: EventRuntime,
    interpreter: Interpreter,
}

impl Repl {
    pub fn new() -> Self {
        let runtime = EventRuntime::new();
        let interpreter = Interpreter::new(runtime.handle());
        Self {
            runtime,
            interpreter,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(|err| {
            RippleError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
        })?;
        self.runtime.handle().emit(Event::launch());
        self.drain();
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.interpreter.eval_source(trimmed) {
                        Ok(value) => {
                            if !matches!(&*value.0, ValueKind::Null) {
                                println!("{value}");
                            }
                        }
                        Err(RippleError::Diagnostic(diag)) => {
                            eprintln!("{:?}: {}", diag.kind, diag.message);
                        }
                        Err(other) => eprintln!("error: {other}"),
                    }
                    self.drain();
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    return Err(RippleError::from(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        err,
                    )));
                }
            }
        }
        Ok(())
    }

    fn drain(&mut self) {
        if let Err(err) = self.runtime.run_until_idle(&mut self.interpreter) {
            match err {
                RippleError::Diagnostic(diag) => eprintln!("{:?}: {}", diag.kind, diag.message),
                other => eprintln!("error: {other}"),
            }
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
