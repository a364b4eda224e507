//! Hexel Expressions
//!
//! The expression language embedded in templates: block values such as
//! `@if="user.admin"` and the contents of `{% … %}` spans. Snippets are
//! parsed into opaque [`Expression`] and [`Statement`] handles that remember
//! the template position they were captured at, and are evaluated later
//! against a [`Scope`] supplied by the runtime.
//!
//! The language is a small JavaScript-flavoured subset: literals, member
//! access, calls, arithmetic and logical operators, the ternary, assignment
//! to variables, and a single `let` binding as the only declaration form.
//!
//! # Example
//!
//! ```
//! use hexel_expr::{parse_expression, MapScope, Position, Value};
//!
//! let expr = parse_expression("items.length * 2", Position::default()).unwrap();
//! let mut scope = MapScope::new();
//! scope.set("items", Value::Array(vec![Value::Null, Value::Null]));
//! assert_eq!(expr.evaluate(&mut scope).unwrap(), Value::Number(4.0));
//! ```

pub mod ast;
mod eval;
pub mod lexer;
mod methods;
pub mod parser;
pub mod scope;
pub mod value;

use std::fmt;

pub use hexel_lexer::Position;
pub use scope::{MapScope, Scope};
pub use value::{format_number, Function, NativeFn, Value};

use ast::{Expr, Stmt};
use parser::ExprParser;

/// Error in a template expression, reported at the position the snippet
/// was captured from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Expression error at line {line}, column {column}: {message}")]
pub struct ExprError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ExprError {
    pub fn at(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }
}

/// Error raised while evaluating an expression.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("TypeError: {0}")]
    Type(String),

    #[error("ReferenceError: {0}")]
    Reference(String),

    #[error("RangeError: {0}")]
    Range(String),

    /// Raised by host helpers.
    #[error("{0}")]
    Custom(String),

    /// A failure from the host while running a template block.
    #[error(transparent)]
    Host(Box<dyn std::error::Error + Send + Sync>),
}

impl EvalError {
    pub fn custom(message: impl Into<String>) -> Self {
        EvalError::Custom(message.into())
    }
}

/// Parse a single expression captured at `position`.
pub fn parse_expression(snippet: &str, position: Position) -> Result<Expression, ExprError> {
    let expr = ExprParser::new(snippet, position)?.parse_expression()?;
    Ok(Expression {
        source: snippet.to_string(),
        position,
        expr,
    })
}

/// Parse a single statement captured at `position`.
pub fn parse_statement(snippet: &str, position: Position) -> Result<Statement, ExprError> {
    let stmt = ExprParser::new(snippet, position)?.parse_statement()?;
    Ok(Statement {
        source: snippet.to_string(),
        position,
        stmt,
    })
}

/// A parsed expression handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    position: Position,
    expr: Expr,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn ast(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, scope: &mut dyn Scope) -> Result<Value, EvalError> {
        eval::evaluate(&self.expr, scope)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A parsed statement handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    source: String,
    position: Position,
    stmt: Stmt,
}

impl Statement {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn ast(&self) -> &Stmt {
        &self.stmt
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self.stmt, Stmt::Let { .. })
    }

    /// Run the statement. Declarations bind in the innermost frame and
    /// produce `undefined`; expression statements produce their value.
    pub fn execute(&self, scope: &mut dyn Scope) -> Result<Value, EvalError> {
        match &self.stmt {
            Stmt::Expression(expr) => eval::evaluate(expr, scope),
            Stmt::Let { name, init } => {
                let value = match init {
                    Some(expr) => eval::evaluate(expr, scope)?,
                    None => Value::Undefined,
                };
                scope.declare(name, value);
                Ok(Value::Undefined)
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
