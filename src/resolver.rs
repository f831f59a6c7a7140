//! Static resolver pass.
//!
//! One walk over the full program, before execution, doing three things:
//! 1. Build lexical scopes (a stack of `HashMap<&str, bool>` tracking
//!    declared vs. defined names).
//! 2. Collect static errors: redeclaration within one scope, a local read
//!    in its own initializer, `return` outside any function, `break`
//!    outside any loop body.  The pass never aborts early, so sibling
//!    statements keep producing diagnostics; any collected error must
//!    prevent execution.
//! 3. Record, for each variable-use expression id, its hop distance from
//!    the innermost scope, by calling back into the interpreter.  No entry
//!    means the name resolves as a global.
//!
//! The scope stack mirrors the interpreter's frames one-for-one: a block is
//! one scope, a function body is one scope holding its parameters, a class
//! body is one scope holding `this` around its methods.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::token::Token;

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'a, 'interp> {
    interpreter: &'interp mut Interpreter<'a>,
    scopes: Vec<HashMap<&'a str, bool>>, // false = declared, true = defined
    current_function: FunctionType,
    in_loop: bool,
    errors: Vec<LoxError>,
}

impl<'a, 'interp> Resolver<'a, 'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter<'a>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            in_loop: false,
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements and return every static error found.
    /// An empty list means the program may execute.
    pub fn resolve(mut self, statements: &[Stmt<'a>]) -> Vec<LoxError> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for statement in statements {
            self.resolve_stmt(statement);
        }

        self.errors
    }

    // ───────────────────── statement resolution ─────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare, resolve the initializer, only then define: a read
                // of the name in between is the self-reference error
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // the name is visible inside its own body (recursion)
                self.declare(declaration.name);
                self.define(declaration.name);
                self.resolve_function(declaration);
            }

            Stmt::Expression(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::Print(values) => {
                for value in values {
                    self.resolve_expr(value);
                }
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);

                let enclosing_in_loop = self.in_loop;
                self.in_loop = true;
                self.resolve_stmt(body);
                self.in_loop = enclosing_in_loop;
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors.push(LoxError::resolve(
                        keyword.line,
                        "Can't return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }

            Stmt::Break(keyword) => {
                if !self.in_loop {
                    self.errors.push(LoxError::resolve(
                        keyword.line,
                        "Expect break only inside loop body.",
                    ));
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.declare(name);
                self.define(name);

                if let Some(expr) = superclass {
                    self.resolve_expr(expr);
                }

                // one scope holding `this` wraps every method body
                self.begin_scope();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert("this", true);
                }

                for method in methods {
                    self.resolve_function(method);
                }

                self.end_scope();
            }
        }
    }

    // ───────────────────── expression resolution ────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Literal { .. } => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // reading a name whose own initializer is still running
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.errors.push(LoxError::resolve(
                            name.line,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // resolve the RHS first, then bind the LHS
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                self.resolve_local(*id, keyword);
            }
        }
    }

    // ───────────────────────── function helper ──────────────────────

    /// Enter a fresh scope for a function's parameters and body.  The
    /// in-loop flag is cleared: a `break` never crosses a call boundary,
    /// so a function body inside a loop does not count as loop body.
    fn resolve_function(&mut self, declaration: &FunctionDecl<'a>) {
        let enclosing_function = self.current_function;
        let enclosing_in_loop = self.in_loop;
        self.current_function = FunctionType::Function;
        self.in_loop = false;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        for statement in &declaration.body {
            self.resolve_stmt(statement);
        }
        self.end_scope();

        self.current_function = enclosing_function;
        self.in_loop = enclosing_in_loop;
    }

    // ───────────────────────── scope management ─────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme) {
                self.errors.push(LoxError::resolve(
                    name.line,
                    "Already a variable with this name in this scope.",
                ));
            }

            scope.insert(name.lexeme, false);
        }
    }

    fn define(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    // ─────────────────────── binding distances ──────────────────────

    /// Record this variable occurrence as a local at its hop distance, or
    /// leave it unrecorded (global) when no scope declares the name.
    fn resolve_local(&mut self, id: ExprId, name: &Token<'a>) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
