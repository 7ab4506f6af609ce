use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, LogicalOp, Program, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, DiagnosticKind, Result, RippleError, SourceSpan},
    environment::{Environment, EnvironmentRef},
    events::{Event, RuntimeHandle},
    parser,
    value::{ScriptFunction, Value, ValueKind},
};

/// Tree-walking evaluator. Holds the current scope frame and the runtime's
/// emit/bind capability; the event runtime drives it from the dispatch loop.
pub struct Interpreter {
    env: EnvironmentRef,
    events: RuntimeHandle,
}

/// How a statement completed. The return signal travels here, on a path
/// separate from runtime errors, so neither can swallow the other.
enum Flow {
    Next,
    Return(Value),
}

impl Interpreter {
    pub fn new(events: RuntimeHandle) -> Self {
        let env = Environment::new();
        crate::stdlib::install(&env);
        Self { env, events }
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse_program(source).map_err(RippleError::from)?;
        self.interpret(&program)
    }

    /// Executes every top-level statement once, installing bindings and
    /// running side effects. Yields the value of the last top-level
    /// expression statement (Null when there is none).
    pub fn interpret(&mut self, program: &Program) -> Result<Value> {
        let mut last = Value::null();
        for stmt in &program.statements {
            if let StmtKind::Expr(expr) = &stmt.kind {
                last = self.evaluate(expr)?;
                continue;
            }
            match self.execute(stmt)? {
                Flow::Next => {}
                Flow::Return(_) => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Runtime,
                        "Cannot return from top-level code.",
                    )
                    .with_span(stmt.span)
                    .into());
                }
            }
        }
        Ok(last)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Block(statements) => {
                let child = Environment::with_parent(Arc::clone(&self.env));
                self.execute_block(statements, child)
            }
            StmtKind::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Next)
            }
            StmtKind::VarDecl { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::null(),
                };
                self.env.lock().define(name.clone(), value);
                Ok(Flow::Next)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    let child = Environment::with_parent(Arc::clone(&self.env));
                    self.execute_block(then_branch, child)
                } else if let Some(branch) = else_branch {
                    let child = Environment::with_parent(Arc::clone(&self.env));
                    self.execute_block(branch, child)
                } else {
                    Ok(Flow::Next)
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    let child = Environment::with_parent(Arc::clone(&self.env));
                    match self.execute_block(body, child)? {
                        Flow::Next => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let iterable_value = self.evaluate(iterable)?;
                let items = match &*iterable_value.0 {
                    ValueKind::List(values) => values.clone(),
                    _ => {
                        return Err(Diagnostic::new(
                            DiagnosticKind::TypeError,
                            "Can only iterate over arrays.",
                        )
                        .with_span(iterable.span)
                        .into());
                    }
                };
                for item in items {
                    let child = Environment::with_parent(Arc::clone(&self.env));
                    child.lock().define(binding.clone(), item);
                    match self.execute_block(body, child)? {
                        Flow::Next => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::null(),
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Binding {
                event,
                name,
                params,
                body,
            } => {
                let function = Value::function(ScriptFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    env: Arc::clone(&self.env),
                });
                if let Some(name) = name {
                    self.env.lock().define(name.clone(), function.clone());
                }
                self.events.bind(event.clone(), function);
                Ok(Flow::Next)
            }
            StmtKind::Emit { event, payload } => {
                let payload = match payload {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::null(),
                };
                self.events.emit(Event::new(event.clone(), payload));
                Ok(Flow::Next)
            }
        }
    }

    /// Runs `statements` inside `child`, restoring the previous scope on
    /// every exit path, errors included; a failed dispatch must not leave
    /// the interpreter stuck in a dead frame.
    fn execute_block(&mut self, statements: &[Stmt], child: EnvironmentRef) -> Result<Flow> {
        let prev = std::mem::replace(&mut self.env, child);
        let result = self.run_sequence(statements);
        self.env = prev;
        result
    }

    fn run_sequence(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Next => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Variable(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                Environment::assign(&self.env, name, value.clone(), expr.span)?;
                Ok(value)
            }
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                self.binary(*op, left_value, right_value, expr.span)
            }
            ExprKind::Logical { op, left, right } => {
                let left_value = self.evaluate(left)?;
                match op {
                    LogicalOp::Or if left_value.is_truthy() => Ok(left_value),
                    LogicalOp::And if !left_value.is_truthy() => Ok(left_value),
                    _ => self.evaluate(right),
                }
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::bool(!value.is_truthy())),
                    UnaryOp::Negate => match value.as_number() {
                        Some(n) => Ok(Value::number(-n)),
                        None => Err(Diagnostic::new(
                            DiagnosticKind::TypeError,
                            "Operand must be a number.",
                        )
                        .with_span(expr.span)
                        .into()),
                    },
                }
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut eval_args = Vec::with_capacity(args.len());
                for arg in args {
                    eval_args.push(self.evaluate(arg)?);
                }
                self.call(callee_value, eval_args, expr.span)
            }
            ExprKind::Grouping(inner) => self.evaluate(inner),
            ExprKind::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::DictLiteral(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value_expr) in entries {
                    map.insert(key.clone(), self.evaluate(value_expr)?);
                }
                Ok(Value::map(map))
            }
            ExprKind::Range { lower, upper } => {
                let lower_value = self.evaluate(lower)?;
                let upper_value = self.evaluate(upper)?;
                match (lower_value.as_number(), upper_value.as_number()) {
                    (Some(lower), Some(upper)) => {
                        let mut values = Vec::new();
                        let mut i = lower;
                        while i < upper {
                            values.push(Value::number(i));
                            i += 1.0;
                        }
                        Ok(Value::list(values))
                    }
                    _ => Err(Diagnostic::new(
                        DiagnosticKind::TypeError,
                        "Range bounds must be numbers.",
                    )
                    .with_span(expr.span)
                    .into()),
                }
            }
        }
    }

    fn binary(&self, op: BinaryOp, left: Value, right: Value, span: SourceSpan) -> Result<Value> {
        use BinaryOp::*;
        match op {
            Equal => Ok(Value::bool(left.deep_eq(&right))),
            NotEqual => Ok(Value::bool(!left.deep_eq(&right))),
            Add => match (&*left.0, &*right.0) {
                (ValueKind::Number(a), ValueKind::Number(b)) => Ok(Value::number(a + b)),
                (ValueKind::String(a), ValueKind::String(b)) => {
                    Ok(Value::string(format!("{a}{b}")))
                }
                (ValueKind::List(a), ValueKind::List(b)) => {
                    let mut values = Vec::with_capacity(a.len() + b.len());
                    values.extend(a.iter().cloned());
                    values.extend(b.iter().cloned());
                    Ok(Value::list(values))
                }
                _ => Err(Diagnostic::new(
                    DiagnosticKind::TypeError,
                    "Operands must be two numbers, strings or arrays.",
                )
                .with_span(span)
                .into()),
            },
            Sub => self.numeric(left, right, span, |a, b| Value::number(a - b)),
            Mul => self.numeric(left, right, span, |a, b| Value::number(a * b)),
            Div => self.numeric(left, right, span, |a, b| Value::number(a / b)),
            Greater => self.numeric(left, right, span, |a, b| Value::bool(a > b)),
            GreaterEqual => self.numeric(left, right, span, |a, b| Value::bool(a >= b)),
            Less => self.numeric(left, right, span, |a, b| Value::bool(a < b)),
            LessEqual => self.numeric(left, right, span, |a, b| Value::bool(a <= b)),
        }
    }

    fn numeric<F>(&self, left: Value, right: Value, span: SourceSpan, apply: F) -> Result<Value>
    where
        F: Fn(f64, f64) -> Value,
    {
        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(apply(a, b)),
            _ => Err(
                Diagnostic::new(DiagnosticKind::TypeError, "Operands must be numbers.")
                    .with_span(span)
                    .into(),
            ),
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match &*callee.0 {
            ValueKind::NativeFunction(fun) => fun.call(&args),
            ValueKind::Function(fun) => {
                if args.len() != fun.params.len() {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Arity,
                        format!(
                            "Expected {} arguments but got {}.",
                            fun.params.len(),
                            args.len()
                        ),
                    )
                    .with_span(span)
                    .into());
                }
                self.call_script(fun, args)
            }
            _ => Err(
                Diagnostic::new(DiagnosticKind::TypeError, "Can only call functions.")
                    .with_span(span)
                    .into(),
            ),
        }
    }

    /// Invokes a bound handler with the event payload as its single
    /// dispatch argument. Declared arity is not enforced here: missing
    /// parameters bind to Null, a zero-parameter handler ignores the
    /// payload.
    pub fn invoke_handler(&mut self, handler: &Value, payload: Value) -> Result<()> {
        match &*handler.0 {
            ValueKind::Function(fun) => {
                let mut args = Vec::with_capacity(fun.params.len());
                if !fun.params.is_empty() {
                    args.push(payload);
                    while args.len() < fun.params.len() {
                        args.push(Value::null());
                    }
                }
                self.call_script(fun, args)?;
                Ok(())
            }
            _ => Err(Diagnostic::new(
                DiagnosticKind::TypeError,
                "Can only call functions.",
            )
            .into()),
        }
    }

    /// The invocation frame's parent is the closure's captured environment,
    /// not the caller's. A `Return` signal completes the invocation with
    /// its value; running off the end yields Null.
    fn call_script(&mut self, fun: &ScriptFunction, args: Vec<Value>) -> Result<Value> {
        let frame = Environment::with_parent(Arc::clone(&fun.env));
        {
            let mut guard = frame.lock();
            for (name, value) in fun.params.iter().zip(args) {
                guard.define(name.clone(), value);
            }
        }
        match self.execute_block(&fun.body, frame)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::null()),
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::number(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Null => Value::null(),
    }
}
