use std::{fs, path::PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ripple::{Event, EventRuntime, Interpreter, Repl, RippleError};

#[derive(Parser)]
#[command(author, version, about = "Ripple event-driven scripting language")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Ripple script: interpret it, then dispatch events
    Run {
        script: PathBuf,
        /// Exit once the event queue drains instead of running forever
        #[arg(long)]
        until_idle: bool,
    },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Ripple code and dispatch until idle
    Eval { source: String },
}

fn main() -> Result<(), RippleError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script, until_idle } => {
            let source = fs::read_to_string(&script)?;
            run_source(&source, until_idle)
        }
        Command::Repl => {
            let mut repl = Repl::new();
            repl.run()
        }
        Command::Eval { source } => run_source(&source, true),
    }
}

fn run_source(source: &str, until_idle: bool) -> Result<(), RippleError> {
    let runtime = EventRuntime::new();
    let mut interpreter = Interpreter::new(runtime.handle());
    interpreter.interpret(&ripple::parser::parse_program(source)?)?;
    if until_idle {
        runtime.handle().emit(Event::launch());
        runtime.run_until_idle(&mut interpreter)
    } else {
        runtime.run(&mut interpreter)
    }
}
