//! Tree-walking evaluator.
//!
//! Statements execute in sequence for effect; expressions evaluate
//! recursively to a [`Value`].  Variable access goes through the resolver's
//! hop-distance table when an entry exists and falls back to the global
//! frame otherwise; globals are never distance-tracked because top-level
//! declarations may be added incrementally.
//!
//! `return` and `break` are not errors.  Every statement execution yields a
//! [`Flow`] outcome that callers propagate explicitly: a function call
//! boundary consumes `Return`, the nearest enclosing `while` consumes
//! `Break`.  Runtime errors, by contrast, unwind all the way to
//! [`Interpreter::interpret`] and abort the remaining top-level statements,
//! keeping side effects already performed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::object::{LoxCallable, LoxClass, LoxFunction, LoxInstance};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome of executing one statement.
#[derive(Debug)]
pub enum Flow<'a> {
    /// Execution ran off the end of the statement.
    Normal,

    /// A `return` is unwinding toward its call boundary.
    Return(Value<'a>),

    /// A `break` is unwinding toward the nearest enclosing loop.
    Break,
}

pub struct Interpreter<'a> {
    globals: Rc<RefCell<Environment<'a>>>,
    environment: Rc<RefCell<Environment<'a>>>,

    /// Hop distance per variable-use expression id.  Absence means global.
    locals: HashMap<ExprId, usize>,

    /// Injected output sink for `print`; stdout by default.
    output: Box<dyn Write>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter printing to stdout, with the native functions
    /// predefined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Create an interpreter printing to the given sink.  Tests pass a
    /// shared buffer here to capture program output.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value]| {
                    let timestamp: f64 = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
                        .as_secs_f64();
                    Ok(Value::Number(timestamp))
                },
            },
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Record a variable-use expression as a local at `depth` hops.  Called
    /// by the resolver; unresolved ids fall back to the global frame.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Interpret a whole program.  Stops at the first runtime error.
    pub fn interpret(&mut self, statements: &[Stmt<'a>]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}

                // the resolver rejects these statically; reaching here means
                // the caller skipped resolution
                Flow::Return(_) => {
                    return Err(LoxError::runtime(
                        statement.line(),
                        "Can't return from top-level code.",
                    ));
                }

                Flow::Break => {
                    return Err(LoxError::runtime(
                        statement.line(),
                        "Expect break only inside loop body.",
                    ));
                }
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ───────────────────────── statements ───────────────────────────

    /// Execute a single statement and report how control left it.
    pub fn execute(&mut self, stmt: &Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                let _ = self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(values) => {
                let mut rendered: Vec<String> = Vec::with_capacity(values.len());

                for value in values {
                    rendered.push(self.evaluate(value)?.to_string());
                }

                writeln!(self.output, "{}", rendered.join(" "))?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                debug!("Defining variable '{}'", name.lexeme);

                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body)? {
                        Flow::Normal => {}

                        // break halts this loop only
                        Flow::Break => break,

                        // return keeps unwinding toward the call boundary
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                // the current frame becomes the closure
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Break(_) => Ok(Flow::Break),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Declaring class '{}'", name.lexeme);

                // Bind a placeholder first so methods may name the class
                // recursively.
                self.environment.borrow_mut().define(name.lexeme, Value::Nil);

                let superclass = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            return Err(LoxError::runtime(
                                expr.line(),
                                "Superclass must be a class.",
                            ));
                        }
                    },
                    None => None,
                };

                let mut method_table: HashMap<&'a str, LoxFunction<'a>> = HashMap::new();

                for method in methods {
                    let is_initializer = method.name.lexeme == "init";

                    method_table.insert(
                        method.name.lexeme,
                        LoxFunction::new(
                            Rc::clone(method),
                            Rc::clone(&self.environment),
                            is_initializer,
                        ),
                    );
                }

                let class = Value::Class(Rc::new(LoxClass::new(
                    name.lexeme,
                    superclass,
                    method_table,
                )));

                self.environment
                    .borrow_mut()
                    .assign(name.lexeme, class, name.line)?;

                Ok(Flow::Normal)
            }
        }
    }

    /// Execute `statements` inside `environment`, restoring the previous
    /// frame on every exit path, early flow and errors included.  One frame
    /// per block, matching the resolver's one-scope-per-block contract.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt<'a>],
        environment: Rc<RefCell<Environment<'a>>>,
    ) -> Result<Flow<'a>> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut flow = Ok(Flow::Normal);

        for statement in statements {
            flow = self.execute(statement);

            if !matches!(flow, Ok(Flow::Normal)) {
                break;
            }
        }

        self.environment = previous;
        flow
    }

    // ───────────────────────── expressions ──────────────────────────

    /// Evaluate an expression to a value.
    pub fn evaluate(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal { value: literal, .. } => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right_val = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right_val {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(
                            operator.line,
                            "Operand must be a number.",
                        )),
                    },

                    TokenType::BANG => Ok(Value::Bool(!is_truthy(&right_val))),

                    _ => Err(LoxError::runtime(operator.line, "Invalid unary operator")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;
                self.binary_op(&left_val, operator, &right_val)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                // Short-circuit: yield the deciding operand's value, not a
                // boolean.
                let left_val = self.evaluate(left)?;

                if operator.token_type == TokenType::OR {
                    if is_truthy(&left_val) {
                        return Ok(left_val);
                    }
                } else if !is_truthy(&left_val) {
                    return Ok(left_val);
                }

                self.evaluate(right)
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                if let Some(&distance) = self.locals.get(id) {
                    Environment::assign_at(&self.environment, distance, name.lexeme, value.clone());
                } else {
                    self.globals
                        .borrow_mut()
                        .assign(name.lexeme, value.clone(), name.line)?;
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut args: Vec<Value<'a>> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                match callee_val {
                    Value::NativeFunction { name, arity, func } => {
                        check_arity(arity, args.len(), paren)?;
                        debug!("Calling native function '{}'", name);

                        func(&args).map_err(|message| LoxError::runtime(paren.line, message))
                    }

                    Value::Function(function) => {
                        check_arity(function.arity(), args.len(), paren)?;
                        function.call(self, args)
                    }

                    Value::Class(class) => {
                        check_arity(class.arity(), args.len(), paren)?;
                        class.call(self, args)
                    }

                    _ => Err(LoxError::runtime(
                        paren.line,
                        "Can only call functions and classes.",
                    )),
                }
            }

            Expr::Get { object, name } => {
                let object_val = self.evaluate(object)?;

                match object_val {
                    Value::Instance(instance) => LoxInstance::get(&instance, name),
                    _ => Err(LoxError::runtime(
                        name.line,
                        "Only instances have properties.",
                    )),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_val = self.evaluate(object)?;

                match object_val {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(name.lexeme, value.clone());
                        Ok(value)
                    }
                    _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
                }
            }

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),
        }
    }

    fn binary_op(
        &mut self,
        left: &Value<'a>,
        operator: &Token<'a>,
        right: &Value<'a>,
    ) -> Result<Value<'a>> {
        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a * b))
            }

            // IEEE-754 semantics: division by zero yields an infinity
            TokenType::SLASH => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(left, right))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(left, right))),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator")),
        }
    }

    /// Resolved-distance read with global fallback.
    fn look_up_variable(&self, name: &Token<'a>, id: ExprId) -> Result<Value<'a>> {
        if let Some(&distance) = self.locals.get(&id) {
            debug!("Reading '{}' at distance {}", name.lexeme, distance);

            Ok(Environment::get_at(&self.environment, distance, name.lexeme))
        } else {
            self.globals.borrow().get(name.lexeme, name.line)
        }
    }
}

impl<'a> Default for Interpreter<'a> {
    fn default() -> Self {
        Interpreter::new()
    }
}

// ───────────────────────── value helpers ────────────────────────────

/// nil and false are falsy; everything else, zero and the empty string
/// included, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// Value equality for numbers, strings, and booleans; identity for
/// functions, classes, and instances; nil equals only nil.
fn is_equal<'a>(left: &Value<'a>, right: &Value<'a>) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(
            operator.line,
            "Operands must be numbers.",
        )),
    }
}

fn check_arity(expected: usize, actual: usize, paren: &Token) -> Result<()> {
    if actual != expected {
        return Err(LoxError::runtime(
            paren.line,
            format!("Expected {} arguments but got {}.", expected, actual),
        ));
    }

    Ok(())
}
