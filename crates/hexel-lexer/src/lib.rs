//! Hexel Lexer
//!
//! Tokenizes view template source into a stream of tokens.
//! Literal markup, element tags, `<js @keyword>` block openers and
//! `{% … %}` expression spans all share one character-level state machine;
//! delimiters are configurable through [`LexerOptions`].
//!
//! # Example
//!
//! ```
//! use hexel_lexer::{Lexer, LexerOptions, TokenKind};
//!
//! let tokens = Lexer::tokenize("<p>{%= name %}</p>", &LexerOptions::default()).unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::ElementStart);
//! assert_eq!(tokens[2].kind, TokenKind::PrintExpressionStart);
//! ```

pub mod lexer;
pub mod options;
pub mod token;

pub use lexer::Lexer;
pub use options::LexerOptions;
pub use token::{is_void_element, Position, Token, TokenKind};

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexerError {
    #[error("Lexical error at line {line}, column {column}: {message}")]
    Unexpected {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Invalid lexer options: {0}")]
    Options(String),
}

impl LexerError {
    pub fn at(message: impl Into<String>, position: Position) -> Self {
        LexerError::Unexpected {
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }

    /// Source position of the error, if it has one.
    pub fn position(&self) -> Option<Position> {
        match self {
            LexerError::Unexpected { line, column, .. } => Some(Position::new(*line, *column)),
            LexerError::Options(_) => None,
        }
    }
}
