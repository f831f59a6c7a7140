//! Abstract syntax tree for the language.
//!
//! Both node families are closed tagged unions, so evaluation and resolution
//! are exhaustive matches and a missing case is a compile-time error.
//!
//! Every expression that names a variable (`Variable`, `Assign`, `This`)
//! carries an [`ExprId`] assigned by the parser from a running counter.  The
//! resolver keys its hop-distance table on that id, never on structural
//! equality: two syntactically identical uses at different positions are
//! distinct bindings.

use std::rc::Rc;

use serde::Serialize;

use crate::token::Token;

/// Stable identity of a variable-use expression node, unique per parse.
pub type ExprId = usize;

/// A literal constant that appears directly in the source code.  The parser
/// copies the value out of the token, so literals own their data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    /// Numeric literal, stored as IEEE-754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// Expression node.  The lifetime `'a` ties operator and name tokens back to
/// the borrowed token slice held by the parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr<'a> {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal { value: LiteralValue, line: usize },

    /// Prefix unary operator expression, `!ready` or `-42`.
    Unary {
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Infix binary operator expression, `a + b`, `x <= y`.
    Binary {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Short-circuiting `and` / `or`.  Yields the deciding operand's value.
    Logical {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Parenthesised sub-expression.
    Grouping(Box<Expr<'a>>),

    /// Variable access.
    Variable { id: ExprId, name: &'a Token<'a> },

    /// Assignment expression: `identifier "=" expression`.
    Assign {
        id: ExprId,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// Function, method, or class constructor call.
    Call {
        callee: Box<Expr<'a>>,

        /// The closing ')' token, retained for error reporting.
        paren: &'a Token<'a>,

        arguments: Vec<Expr<'a>>,
    },

    /// Property read: `object.property`.
    Get {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
    },

    /// Property write: `object.property = value`.
    Set {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// The `this` keyword inside a method body.
    This { id: ExprId, keyword: &'a Token<'a> },
}

impl<'a> Expr<'a> {
    /// Source line of the token nearest this node, for diagnostics.
    pub fn line(&self) -> usize {
        match self {
            Expr::Literal { line, .. } => *line,
            Expr::Unary { operator, .. } => operator.line,
            Expr::Binary { operator, .. } => operator.line,
            Expr::Logical { operator, .. } => operator.line,
            Expr::Grouping(inner) => inner.line(),
            Expr::Variable { name, .. } => name.line,
            Expr::Assign { name, .. } => name.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Get { name, .. } => name.line,
            Expr::Set { name, .. } => name.line,
            Expr::This { keyword, .. } => keyword.line,
        }
    }
}

/// A named function or method declaration.  Shared (`Rc`) between the
/// statement tree and every runtime function value created from it, so a
/// call never has to clone the body.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl<'a> {
    pub name: &'a Token<'a>,

    /// Parameter name tokens (arity is capped at 255 by the parser).
    pub params: Vec<&'a Token<'a>>,

    pub body: Vec<Stmt<'a>>,
}

/// Statement node.  Statements execute for effect and never yield a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    /// Stand-alone expression terminated by a semicolon.
    Expression(Expr<'a>),

    /// `print` statement: one or more comma-separated values, written
    /// space-separated on one line.
    Print(Vec<Expr<'a>>),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: &'a Token<'a>,
        initializer: Option<Expr<'a>>,
    },

    /// Braced scope.  Each execution creates exactly one new frame.
    Block(Vec<Stmt<'a>>),

    /// `if` / `else` conditional.
    If {
        condition: Expr<'a>,
        then_branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },

    /// `while` loop.  The nearest enclosing one catches `break`.
    While {
        condition: Expr<'a>,
        body: Box<Stmt<'a>>,
    },

    /// Function declaration, becomes a first-class callable value.
    Function(Rc<FunctionDecl<'a>>),

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token, kept for error locations.
        keyword: &'a Token<'a>,

        /// Optional result expression.  Absent means `nil`.
        value: Option<Expr<'a>>,
    },

    /// Class declaration.  The superclass, when present, is a variable
    /// expression that must evaluate to a class at runtime.
    Class {
        name: &'a Token<'a>,
        superclass: Option<Expr<'a>>,
        methods: Vec<Rc<FunctionDecl<'a>>>,
    },

    /// `break` statement; transfers control out of the nearest loop.
    Break(&'a Token<'a>),
}

impl<'a> Stmt<'a> {
    /// Source line of the token nearest this statement, for diagnostics.
    pub fn line(&self) -> usize {
        match self {
            Stmt::Expression(expr) => expr.line(),
            Stmt::Print(values) => values.first().map_or(0, Expr::line),
            Stmt::Var { name, .. } => name.line,
            Stmt::Block(statements) => statements.first().map_or(0, Stmt::line),
            Stmt::If { condition, .. } => condition.line(),
            Stmt::While { condition, .. } => condition.line(),
            Stmt::Function(declaration) => declaration.name.line,
            Stmt::Return { keyword, .. } => keyword.line,
            Stmt::Class { name, .. } => name.line,
            Stmt::Break(keyword) => keyword.line,
        }
    }
}
