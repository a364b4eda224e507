use crate::token::{
    lookup_keyword, Position, Token, TokenKind, ATTRIBUTE_KEYWORDS, BLOCK_KEYWORDS, KEYWORDS,
};
use crate::{LexerError, LexerOptions};

const WHITESPACE_CHARS: &[char] = &[' ', '\t', '\n'];
const TAG_NAME_TERMINATORS: &[char] = &['/', '>', ' ', '\t', '\n'];
const KEYWORD_TERMINATORS: &[char] = &['/', '>', '=', '"', '\'', ' ', '\t', '\n'];

/// Template source lexer.
///
/// Produces tokens on demand with one token of lookahead. The parser drives
/// it through [`Lexer::peek_token`] and [`Lexer::next_token`], and switches to
/// raw character consumption with [`Lexer::consume_raw_until`] for quoted
/// block values whose contents belong to the expression language.
///
/// Follows the same cursor layout as the rest of the toolchain:
/// - `Vec<char>` source for index-based navigation
/// - line/column tracking on every character (tabs advance by `tab_width`)
/// - position captured at the start of every token
pub struct Lexer {
    options: LexerOptions,
    block_tag: String,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    buffer: Option<Token>,
}

impl Lexer {
    /// Create a lexer over `source`. Fails if the delimiter configuration is invalid.
    pub fn new(source: &str, options: LexerOptions) -> Result<Self, LexerError> {
        options.validate()?;
        let normalized = source.replace("\r\n", "\n");

        Ok(Self {
            block_tag: options.block_tag_name.to_lowercase(),
            options,
            chars: normalized.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            buffer: None,
        })
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &str, options: &LexerOptions) -> Result<Vec<Token>, LexerError> {
        let mut lexer = Lexer::new(source, options.clone())?;
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn options(&self) -> &LexerOptions {
        &self.options
    }

    /// Current cursor position (past any buffered token).
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Look at the next token without consuming it. `None` at end of input.
    pub fn peek_token(&mut self) -> Result<Option<&Token>, LexerError> {
        if self.buffer.is_none() {
            self.buffer = self.scan_token()?;
        }
        Ok(self.buffer.as_ref())
    }

    /// Consume and return the next token. `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        match self.buffer.take() {
            Some(token) => Ok(Some(token)),
            None => self.scan_token(),
        }
    }

    /// Consume raw characters up to (not including) `stop`.
    ///
    /// Must only be called with no token buffered. Reaching the end of input
    /// before `stop` is a lexical error.
    pub fn consume_raw_until(&mut self, stop: char) -> Result<String, LexerError> {
        debug_assert!(self.buffer.is_none(), "raw consumption with a buffered token");

        let mut raw = String::new();
        while self.peek() != Some(stop) {
            raw.push(self.consume()?);
        }
        Ok(raw)
    }

    // --- Scanners ---

    /// Scan the next token from the cursor.
    fn scan_token(&mut self) -> Result<Option<Token>, LexerError> {
        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        let position = self.position();

        // Prefix checks run longest-intent first so overlapping delimiters resolve.
        if self.matches_str(&self.options.expression_start) {
            return self.scan_expression_start(position).map(Some);
        }

        if self.matches_str(&self.options.expression_end) {
            let delimiter = self.options.expression_end.clone();
            self.expect_str(&delimiter)?;
            return Ok(Some(self.token(TokenKind::ExpressionEnd, position, delimiter)));
        }

        let token = match ch {
            '<' => self.scan_angle(position)?,
            ']' => self.scan_right_square(position),
            '@' => self.scan_attribute_keyword(position),
            '-' => self.scan_dashes(position),
            '>' => self.single(TokenKind::RightAngleBrace, position),
            '{' => self.single(TokenKind::LeftCurlyBrace, position),
            '}' => self.single(TokenKind::RightCurlyBrace, position),
            '[' => self.single(TokenKind::LeftSquareBrace, position),
            '/' => self.single(TokenKind::ForwardSlash, position),
            '?' => self.single(TokenKind::QuestionMark, position),
            '_' => self.single(TokenKind::Underscore, position),
            '$' => self.single(TokenKind::Dollar, position),
            '=' => self.single(TokenKind::Equals, position),
            '.' => self.single(TokenKind::Dot, position),
            ',' => self.single(TokenKind::Comma, position),
            '"' => self.single(TokenKind::DoubleQuote, position),
            '\'' => self.single(TokenKind::SingleQuote, position),
            '`' => self.single(TokenKind::Backtick, position),
            c if WHITESPACE_CHARS.contains(&c) => {
                let text = self.consume_while(|c| WHITESPACE_CHARS.contains(&c));
                self.token(TokenKind::Whitespace, position, text)
            }
            c if c.is_ascii_alphabetic() => {
                let text = self.consume_while(|c| c.is_ascii_alphabetic());
                let kind = lookup_keyword(KEYWORDS, &text).unwrap_or(TokenKind::Letters);
                self.token(kind, position, text)
            }
            c if c.is_ascii_digit() => {
                let text = self.consume_while(|c| c.is_ascii_digit());
                self.token(TokenKind::Numbers, position, text)
            }
            _ => self.single(TokenKind::Unknown, position),
        };

        Ok(Some(token))
    }

    /// Scan a print, comment or plain expression opener.
    fn scan_expression_start(&mut self, position: Position) -> Result<Token, LexerError> {
        let (kind, delimiter) = if self.matches_str(&self.options.print_prefix) {
            (
                TokenKind::PrintExpressionStart,
                self.options.print_prefix.clone(),
            )
        } else if self.matches_str(&self.options.comment_prefix) {
            (
                TokenKind::CommentExpressionStart,
                self.options.comment_prefix.clone(),
            )
        } else {
            (
                TokenKind::ExpressionStart,
                self.options.expression_start.clone(),
            )
        };

        self.expect_str(&delimiter)?;
        Ok(self.token(kind, position, delimiter))
    }

    /// Scan everything that begins with `<`: tags, block openers, closing
    /// tags, comments, CDATA sections and the doctype.
    fn scan_angle(&mut self, position: Position) -> Result<Token, LexerError> {
        self.expect('<')?;
        let mut text = String::from("<");

        match self.peek() {
            Some('/') => {
                self.advance();
                text.push('/');

                let Some(raw_name) = self.scan_tag_name() else {
                    return Ok(self.token(TokenKind::Unknown, position, text));
                };
                text.push_str(&raw_name);
                let tag_name = raw_name.to_lowercase();

                let kind = if tag_name == self.block_tag {
                    TokenKind::BlockClosingStart
                } else {
                    TokenKind::ElementClosingStart
                };
                let mut token = self.token(kind, position, text);
                token.tag_name = Some(tag_name);
                Ok(token)
            }

            Some('!') => {
                self.advance();
                text.push('!');

                for (marker, kind) in [
                    ("--", TokenKind::CommentStart),
                    ("[CDATA[", TokenKind::CDataStart),
                    ("DOCTYPE", TokenKind::Doctype),
                ] {
                    if self.matches_str(marker) {
                        self.expect_str(marker)?;
                        text.push_str(marker);
                        return Ok(self.token(kind, position, text));
                    }
                }

                Ok(self.token(TokenKind::Unknown, position, text))
            }

            Some(c) if c.is_ascii_alphanumeric() => {
                let raw_name = self.scan_tag_name().unwrap_or_default();
                text.push_str(&raw_name);
                let tag_name = raw_name.to_lowercase();

                let mut token = if tag_name == self.block_tag {
                    self.scan_block_opener(position, text)
                } else {
                    self.token(TokenKind::ElementStart, position, text)
                };
                token.tag_name = Some(tag_name);
                Ok(token)
            }

            _ => Ok(self.token(TokenKind::LeftAngleBrace, position, text)),
        }
    }

    /// Scan the `@keyword` of a block opener. A bare `<js` is a scope.
    fn scan_block_opener(&mut self, position: Position, mut text: String) -> Token {
        text.push_str(&self.consume_while(|c| WHITESPACE_CHARS.contains(&c)));

        if self.peek() != Some('@') {
            return self.token(TokenKind::Scope, position, text);
        }

        self.advance();
        text.push('@');
        let keyword = self.consume_while(|c| !KEYWORD_TERMINATORS.contains(&c));
        text.push_str(&keyword);

        let kind = lookup_keyword(BLOCK_KEYWORDS, &keyword).unwrap_or(TokenKind::Unknown);
        self.token(kind, position, text)
    }

    /// Scan `@block`, `@context`, or a lone `@`.
    fn scan_attribute_keyword(&mut self, position: Position) -> Token {
        self.advance();
        let mut text = String::from("@");

        if !self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return self.token(TokenKind::At, position, text);
        }

        let keyword = self.consume_while(|c| !KEYWORD_TERMINATORS.contains(&c));
        text.push_str(&keyword);

        let kind = lookup_keyword(ATTRIBUTE_KEYWORDS, &keyword).unwrap_or(TokenKind::Unknown);
        self.token(kind, position, text)
    }

    /// Scan `]` or the CDATA terminator `]]>`.
    fn scan_right_square(&mut self, position: Position) -> Token {
        self.advance();

        if self.matches_str("]>") {
            self.advance();
            self.advance();
            return self.token(TokenKind::CDataEnd, position, "]]>".into());
        }

        self.token(TokenKind::RightSquareBrace, position, "]".into())
    }

    /// Classify a run of dashes: `-`, `--`, or the comment terminator `-->`.
    fn scan_dashes(&mut self, position: Position) -> Token {
        self.advance();

        if self.peek() != Some('-') {
            return self.token(TokenKind::Dash, position, "-".into());
        }
        self.advance();

        if self.peek() != Some('>') {
            return self.token(TokenKind::DoubleDash, position, "--".into());
        }
        self.advance();

        self.token(TokenKind::CommentEnd, position, "-->".into())
    }

    /// Scan a tag name in its original case, or `None` if no name starts here.
    fn scan_tag_name(&mut self) -> Option<String> {
        if !self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.consume_while(|c| !TAG_NAME_TERMINATORS.contains(&c)))
    }

    // --- Helpers ---

    fn token(&self, kind: TokenKind, position: Position, text: String) -> Token {
        let mut token = Token::new(kind, position);
        token.text = text;
        token
    }

    fn single(&mut self, kind: TokenKind, position: Position) -> Token {
        let text = self.advance().map(String::from).unwrap_or_default();
        self.token(kind, position, text)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn matches_str(&self, expected: &str) -> bool {
        expected
            .chars()
            .enumerate()
            .all(|(offset, c)| self.chars.get(self.pos + offset) == Some(&c))
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        match c {
            '\n' => {
                self.line += 1;
                self.column = 1;
            }
            '\t' => self.column += self.options.tab_width,
            _ => self.column += 1,
        }
        Some(c)
    }

    fn consume(&mut self) -> Result<char, LexerError> {
        self.advance()
            .ok_or_else(|| LexerError::at("Unexpected end of file", self.position()))
    }

    fn consume_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn expect(&mut self, expected: char) -> Result<char, LexerError> {
        match self.peek() {
            Some(c) if c == expected => self.consume(),
            Some(c) => Err(LexerError::at(
                format!("Expected '{expected}', found '{c}'"),
                self.position(),
            )),
            None => Err(LexerError::at("Unexpected end of file", self.position())),
        }
    }

    fn expect_str(&mut self, expected: &str) -> Result<(), LexerError> {
        for c in expected.chars() {
            self.expect(c)?;
        }
        Ok(())
    }
}
