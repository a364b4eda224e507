//! Hexel Parser
//!
//! Parses view template source into a [`Document`] AST by recursive descent
//! over the token stream of `hexel-lexer`. Embedded snippets are handed to
//! `hexel-expr` and kept as parsed handles.
//!
//! Parsing stops at the first error; no partial document is produced.
//!
//! # Example
//!
//! ```
//! use hexel_lexer::LexerOptions;
//! use hexel_parser::{parse, NodeKind};
//!
//! let doc = parse("<js @if=\"ready\">Go</js>", &LexerOptions::default()).unwrap();
//! assert!(matches!(doc.nodes[0].kind, NodeKind::If(_)));
//! ```

pub mod ast;
pub mod parser;

use std::fmt;

use hexel_expr::ExprError;
use hexel_lexer::{LexerError, LexerOptions, Position};

pub use ast::{Document, Node, NodeKind};
pub use parser::Parser;

/// Parse `source` with the given delimiter configuration.
pub fn parse(source: &str, options: &LexerOptions) -> Result<Document, ParseError> {
    Parser::new(source, options)?.parse()
}

/// Category of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Bad or missing character, or end of input inside a token.
    Lexical,
    /// Unexpected token or malformed construct.
    Syntax,
    /// Malformed embedded snippet or disallowed declaration form.
    Expression,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseErrorKind::Lexical => "Lexical",
            ParseErrorKind::Syntax => "Syntax",
            ParseErrorKind::Expression => "Expression",
        })
    }
}

/// Parser error with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, position: Position) -> Self {
        Self {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        let position = err.position().unwrap_or_default();
        let message = match err {
            LexerError::Unexpected { message, .. } => message,
            options @ LexerError::Options(_) => options.to_string(),
        };
        Self {
            kind: ParseErrorKind::Lexical,
            message,
            line: position.line,
            column: position.column,
        }
    }
}

impl From<ExprError> for ParseError {
    fn from(err: ExprError) -> Self {
        Self {
            kind: ParseErrorKind::Expression,
            message: err.message,
            line: err.line,
            column: err.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = ParseError::syntax("Unexpected end of file", Position::new(3, 14));
        assert_eq!(
            err.to_string(),
            "Syntax error at line 3, column 14: Unexpected end of file"
        );
    }

    #[test]
    fn test_expression_error_keeps_position() {
        let err: ParseError = ExprError::at("bad", Position::new(2, 8)).into();
        assert_eq!(err.kind, ParseErrorKind::Expression);
        assert_eq!(err.position(), Position::new(2, 8));
    }

    #[test]
    fn test_invalid_options_are_lexical_errors() {
        let options = LexerOptions {
            expression_start: "{".into(),
            ..LexerOptions::default()
        };
        let err = parse("x", &options).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Lexical);
        assert!(err.message.contains("Invalid lexer options"));
    }
}
