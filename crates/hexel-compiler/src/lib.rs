//! Hexel Compiler
//!
//! Lowers a parsed [`Document`] into an immutable [`Program`] of steps that
//! the runtime interprets.
//!
//! ```text
//! Document AST → compile() → Program { steps }
//! ```
//!
//! Compiling never evaluates anything; every expression is carried through
//! as the parsed handle it was in the AST.

pub mod lower;
pub mod program;

use hexel_lexer::Position;
use hexel_parser::Document;

pub use program::{AttributeBuilder, Program, Step};

/// Compiler error for documents the parser would never produce.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Compile error at line {line}, column {column}: {message}")]
pub struct CompileError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl CompileError {
    pub fn at(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }
}

/// Compile a document into a program.
pub fn compile(doc: &Document) -> Result<Program, CompileError> {
    lower::lower(doc)
}
