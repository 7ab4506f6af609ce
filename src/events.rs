use std::{collections::VecDeque, sync::Arc};

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};

use crate::{diagnostics::Result, runtime::Interpreter, value::Value};

/// The synthetic event seeded before the dispatch loop starts.
pub const LAUNCH_EVENT: &str = "launch";

/// A named occurrence carrying a payload (Null when absent).
#[derive(Clone)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn launch() -> Self {
        Self::new(LAUNCH_EVENT, Value::null())
    }
}

/// Unbounded FIFO: any number of producers, one blocking consumer.
struct EventQueue {
    items: Mutex<VecDeque<Event>>,
    ready: Condvar,
}

impl EventQueue {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    fn push(&self, event: Event) {
        self.items.lock().push_back(event);
        self.ready.notify_one();
    }

    /// Blocks until an event is available. Spurious wakeups resume the
    /// wait; they never surface to the caller.
    fn pop_blocking(&self) -> Event {
        let mut items = self.items.lock();
        loop {
            if let Some(event) = items.pop_front() {
                return event;
            }
            self.ready.wait(&mut items);
        }
    }

    fn try_pop(&self) -> Option<Event> {
        self.items.lock().pop_front()
    }
}

struct RuntimeState {
    queue: EventQueue,
    bindings: Mutex<IndexMap<String, Vec<Value>>>,
}

/// The capability the evaluator holds: enqueue events and register
/// handlers, nothing more. Cloneable and sendable to producer threads.
#[derive(Clone)]
pub struct RuntimeHandle {
    state: Arc<RuntimeState>,
}

impl RuntimeHandle {
    /// Fire-and-forget: appends to the queue tail and returns immediately,
    /// even when called from a running handler.
    pub fn emit(&self, event: Event) {
        tracing::debug!(event = %event.name, "enqueue");
        self.state.queue.push(event);
    }

    /// Appends a handler under the event name, preserving registration
    /// order across bindings on the same name.
    pub fn bind(&self, event: impl Into<String>, handler: Value) {
        self.state
            .bindings
            .lock()
            .entry(event.into())
            .or_default()
            .push(handler);
    }
}

/// Owns the queue and binding table; drives the single-threaded dispatch
/// loop that serializes concurrent event arrivals into deterministic
/// script execution.
pub struct EventRuntime {
    state: Arc<RuntimeState>,
}

impl Default for EventRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RuntimeState {
                queue: EventQueue::new(),
                bindings: Mutex::new(IndexMap::new()),
            }),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Seeds the `launch` event, then dispatches forever. A failing handler
    /// aborts only its own event's dispatch; the loop logs and moves on.
    pub fn run(&self, interpreter: &mut Interpreter) -> ! {
        self.state.queue.push(Event::launch());
        loop {
            let event = self.state.queue.pop_blocking();
            if let Err(err) = self.dispatch(interpreter, &event) {
                tracing::error!(event = %event.name, error = %err, "event handler failed");
            }
        }
    }

    /// Drains the queue without blocking and returns once it is idle.
    /// Unlike [`run`](Self::run), errors propagate to the caller.
    pub fn run_until_idle(&self, interpreter: &mut Interpreter) -> Result<()> {
        while let Some(event) = self.state.queue.try_pop() {
            self.dispatch(interpreter, &event)?;
        }
        Ok(())
    }

    fn dispatch(&self, interpreter: &mut Interpreter, event: &Event) -> Result<()> {
        // Snapshot the handler list before invoking anything: a handler
        // executing a binding statement re-enters the table lock.
        let handlers = self.state.bindings.lock().get(&event.name).cloned();
        let Some(handlers) = handlers else {
            tracing::trace!(event = %event.name, "no binding, discarded");
            return Ok(());
        };
        tracing::debug!(event = %event.name, handlers = handlers.len(), "dispatch");
        for handler in &handlers {
            interpreter.invoke_handler(handler, event.payload.clone())?;
        }
        Ok(())
    }
}
