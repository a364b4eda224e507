//! Lexer for template expressions.
//!
//! Tokenizes the snippets captured from block values and `{% … %}` spans.
//! Offsets are character offsets into the snippet; they are only used for
//! diagnostics inside the front end, never reported to template authors.
//!
//! # Examples
//!
//! ```
//! use hexel_expr::lexer::{ExprLexer, TokenKind};
//!
//! let tokens = ExprLexer::tokenize("count + 1").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Identifier);
//! assert_eq!(tokens[1].kind, TokenKind::Plus);
//! assert_eq!(tokens[2].kind, TokenKind::Number);
//! ```

use crate::ast::Span;

/// A token produced by the expression lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub value: TokenValue,
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Number,
    String,
    Boolean,
    Null,
    Undefined,

    // Identifiers & keywords
    Identifier,
    Typeof,
    This,
    Let,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    Lte,
    Gte,

    // Logical
    And,
    Or,
    Not,
    QuestionQuestion,

    // Assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    // Postfix
    PlusPlus,
    MinusMinus,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Punctuation
    Dot,
    Comma,
    Colon,
    Semicolon,
    Question,
    Arrow,
    OptionalChain,

    // End of input
    Eof,
}

/// The value carried by a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),
}

/// Expression lexer error.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprLexerError {
    pub message: String,
    pub span: Span,
}

/// Expression lexer over a single snippet.
pub struct ExprLexer {
    chars: Vec<char>,
    pos: usize,
}

impl ExprLexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the entire snippet. The last token is always `Eof`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprLexerError> {
        let mut lexer = ExprLexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Read the next token from the snippet.
    pub fn next_token(&mut self) -> Result<Token, ExprLexerError> {
        self.skip_whitespace();

        if self.is_at_end() {
            return Ok(self.token(TokenKind::Eof, self.pos, TokenValue::None));
        }

        let start = self.pos;
        let ch = self.current();

        let (kind, width) = match ch {
            '0'..='9' => return self.read_number(start),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                return self.read_number(start)
            }
            '\'' | '"' | '`' => return self.read_string(start),
            c if c.is_alphabetic() || c == '_' || c == '$' => return Ok(self.read_identifier(start)),

            '=' if self.peek() == Some('=') && self.peek_at(2) == Some('=') => {
                (TokenKind::StrictEq, 3)
            }
            '!' if self.peek() == Some('=') && self.peek_at(2) == Some('=') => {
                (TokenKind::StrictNotEq, 3)
            }
            '=' if self.peek() == Some('=') => (TokenKind::EqEq, 2),
            '!' if self.peek() == Some('=') => (TokenKind::NotEq, 2),
            '=' if self.peek() == Some('>') => (TokenKind::Arrow, 2),
            '&' if self.peek() == Some('&') => (TokenKind::And, 2),
            '|' if self.peek() == Some('|') => (TokenKind::Or, 2),
            '+' if self.peek() == Some('+') => (TokenKind::PlusPlus, 2),
            '-' if self.peek() == Some('-') => (TokenKind::MinusMinus, 2),
            '+' if self.peek() == Some('=') => (TokenKind::PlusEq, 2),
            '-' if self.peek() == Some('=') => (TokenKind::MinusEq, 2),
            '*' if self.peek() == Some('=') => (TokenKind::StarEq, 2),
            '/' if self.peek() == Some('=') => (TokenKind::SlashEq, 2),
            '<' if self.peek() == Some('=') => (TokenKind::Lte, 2),
            '>' if self.peek() == Some('=') => (TokenKind::Gte, 2),
            '?' if self.peek() == Some('?') => (TokenKind::QuestionQuestion, 2),
            // `a?.5:1` is a ternary, not an optional chain.
            '?' if self.peek() == Some('.')
                && !self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) =>
            {
                (TokenKind::OptionalChain, 2)
            }

            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '*' => (TokenKind::Star, 1),
            '/' => (TokenKind::Slash, 1),
            '%' => (TokenKind::Percent, 1),
            '!' => (TokenKind::Not, 1),
            '<' => (TokenKind::Lt, 1),
            '>' => (TokenKind::Gt, 1),
            '=' => (TokenKind::Eq, 1),
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '[' => (TokenKind::LBracket, 1),
            ']' => (TokenKind::RBracket, 1),
            '{' => (TokenKind::LBrace, 1),
            '}' => (TokenKind::RBrace, 1),
            '.' => (TokenKind::Dot, 1),
            ',' => (TokenKind::Comma, 1),
            ':' => (TokenKind::Colon, 1),
            ';' => (TokenKind::Semicolon, 1),
            '?' => (TokenKind::Question, 1),

            _ => {
                return Err(ExprLexerError {
                    message: format!("Unexpected character: '{ch}'"),
                    span: Span::new(start, start + 1),
                })
            }
        };

        self.pos += width;
        Ok(self.token(kind, start, TokenValue::None))
    }

    // --- Private helpers ---

    fn read_number(&mut self, start: usize) -> Result<Token, ExprLexerError> {
        while !self.is_at_end() && (self.current().is_ascii_digit() || self.current() == '.') {
            self.advance();
        }

        if !self.is_at_end() && matches!(self.current(), 'e' | 'E') {
            let digits_at = match self.peek() {
                Some('+' | '-') => 2,
                _ => 1,
            };
            if self.peek_at(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += digits_at;
                while !self.is_at_end() && self.current().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        let text = self.text(start);
        let value: f64 = text.parse().map_err(|_| ExprLexerError {
            message: format!("Invalid number: '{text}'"),
            span: Span::new(start, self.pos),
        })?;

        Ok(self.token(TokenKind::Number, start, TokenValue::Number(value)))
    }

    fn read_string(&mut self, start: usize) -> Result<Token, ExprLexerError> {
        let quote = self.current();
        self.advance(); // skip opening quote

        let mut value = String::new();

        while !self.is_at_end() && self.current() != quote {
            if self.current() == '\\' {
                self.advance();
                if self.is_at_end() {
                    return Err(ExprLexerError {
                        message: "Unterminated escape sequence".into(),
                        span: Span::new(start, self.pos),
                    });
                }
                match self.current() {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    c => value.push(c),
                }
            } else {
                value.push(self.current());
            }
            self.advance();
        }

        if self.is_at_end() {
            return Err(ExprLexerError {
                message: "Unterminated string".into(),
                span: Span::new(start, self.pos),
            });
        }

        self.advance(); // skip closing quote

        Ok(self.token(TokenKind::String, start, TokenValue::String(value)))
    }

    fn read_identifier(&mut self, start: usize) -> Token {
        while !self.is_at_end()
            && (self.current().is_alphanumeric() || self.current() == '_' || self.current() == '$')
        {
            self.advance();
        }

        let text = self.text(start);

        match text.as_str() {
            "true" => self.token(TokenKind::Boolean, start, TokenValue::Boolean(true)),
            "false" => self.token(TokenKind::Boolean, start, TokenValue::Boolean(false)),
            "null" => self.token(TokenKind::Null, start, TokenValue::None),
            "undefined" => self.token(TokenKind::Undefined, start, TokenValue::None),
            "typeof" => self.token(TokenKind::Typeof, start, TokenValue::None),
            "this" => self.token(TokenKind::This, start, TokenValue::None),
            "let" => self.token(TokenKind::Let, start, TokenValue::None),
            _ => self.token(TokenKind::Identifier, start, TokenValue::Identifier(text)),
        }
    }

    fn token(&self, kind: TokenKind, start: usize, value: TokenValue) -> Token {
        Token {
            kind,
            span: Span::new(start, self.pos),
            value,
        }
    }

    fn text(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn current(&self) -> char {
        self.chars[self.pos]
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current().is_whitespace() {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokenize(source: &str) -> Vec<Token> {
        ExprLexer::tokenize(source).unwrap()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    // --- Literals ---

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("42")[0].value, TokenValue::Number(42.0));
        assert_eq!(tokenize("2.75")[0].value, TokenValue::Number(2.75));
        assert_eq!(tokenize(".5")[0].value, TokenValue::Number(0.5));
    }

    #[test]
    fn test_exponent_numbers() {
        assert_eq!(tokenize("1e3")[0].value, TokenValue::Number(1000.0));
        assert_eq!(tokenize("2.5E-1")[0].value, TokenValue::Number(0.25));
        assert_eq!(tokenize("1e+2")[0].value, TokenValue::Number(100.0));
        assert_eq!(
            kinds("1em"),
            vec![TokenKind::Number, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_strings_in_all_quotes() {
        for source in ["'hi'", "\"hi\"", "`hi`"] {
            let tokens = tokenize(source);
            assert_eq!(tokens[0].kind, TokenKind::String);
            assert_eq!(tokens[0].value, TokenValue::String("hi".into()));
        }
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#"'a\nb\'c\\'"#);
        assert_eq!(tokens[0].value, TokenValue::String("a\nb'c\\".into()));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("true null undefined typeof this let"),
            vec![
                TokenKind::Boolean,
                TokenKind::Null,
                TokenKind::Undefined,
                TokenKind::Typeof,
                TokenKind::This,
                TokenKind::Let,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dollar_identifiers() {
        let tokens = tokenize("$block _x é");
        assert_eq!(tokens[0].value, TokenValue::Identifier("$block".into()));
        assert_eq!(tokens[1].value, TokenValue::Identifier("_x".into()));
        assert_eq!(tokens[2].value, TokenValue::Identifier("é".into()));
    }

    // --- Operators ---

    #[test]
    fn test_comparison() {
        assert_eq!(
            kinds("a == b != c === d !== e <= f"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqEq,
                TokenKind::Identifier,
                TokenKind::NotEq,
                TokenKind::Identifier,
                TokenKind::StrictEq,
                TokenKind::Identifier,
                TokenKind::StrictNotEq,
                TokenKind::Identifier,
                TokenKind::Lte,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_assignment_operators() {
        assert_eq!(
            kinds("a = b += c -= d *= e /= f"),
            vec![
                TokenKind::Identifier,
                TokenKind::Eq,
                TokenKind::Identifier,
                TokenKind::PlusEq,
                TokenKind::Identifier,
                TokenKind::MinusEq,
                TokenKind::Identifier,
                TokenKind::StarEq,
                TokenKind::Identifier,
                TokenKind::SlashEq,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_optional_chain_versus_ternary() {
        assert_eq!(
            kinds("a?.b"),
            vec![
                TokenKind::Identifier,
                TokenKind::OptionalChain,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("a?.5:1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Question,
                TokenKind::Number,
                TokenKind::Colon,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_object_braces() {
        assert_eq!(
            kinds("{a: {b: 1}}"),
            vec![
                TokenKind::LBrace,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::LBrace,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Number,
                TokenKind::RBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    // --- Errors ---

    #[test]
    fn test_unterminated_string() {
        let err = ExprLexer::tokenize("'hello").unwrap_err();
        assert!(err.message.contains("Unterminated string"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = ExprLexer::tokenize("count # 5").unwrap_err();
        assert!(err.message.contains("Unexpected character"));
        assert_eq!(err.span, Span::new(6, 7));
    }

    #[test]
    fn test_invalid_number() {
        assert!(ExprLexer::tokenize("1.2.3").is_err());
    }

    #[test]
    fn test_span_tracking() {
        let tokens = tokenize("a + b");
        assert_eq!(tokens[0].span, Span::new(0, 1));
        assert_eq!(tokens[1].span, Span::new(2, 3));
        assert_eq!(tokens[2].span, Span::new(4, 5));
    }
}
