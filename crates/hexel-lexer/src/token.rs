use std::fmt;

/// A position in template source, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Token classification for template source.
///
/// Kinds carry no data; the raw text lives on [`Token::text`] so that
/// literal text can always be reproduced verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Expression spans
    ExpressionStart,
    PrintExpressionStart,
    CommentExpressionStart,
    ExpressionEnd,

    // Tags
    LeftAngleBrace,
    ElementStart,
    ElementClosingStart,
    BlockClosingStart,
    CommentStart,
    CommentEnd,
    CDataStart,
    CDataEnd,
    Doctype,

    // Block openers (`<js @keyword`)
    Scope,
    Print,
    If,
    ElseIf,
    Else,
    Switch,
    Case,
    DefaultCase,
    Foreach,
    While,
    Render,
    RenderContent,
    ContentFor,
    Layout,

    // Attribute keywords (`@block`, `@context`)
    BlockAttribute,
    ContextAttribute,
    At,

    // Punctuation
    RightAngleBrace,
    LeftCurlyBrace,
    RightCurlyBrace,
    LeftSquareBrace,
    RightSquareBrace,
    ForwardSlash,
    QuestionMark,
    Underscore,
    Dollar,
    Equals,
    Dot,
    Comma,
    DoubleQuote,
    SingleQuote,
    Backtick,
    Dash,
    DoubleDash,

    // Runs
    Whitespace,
    Letters,
    Numbers,

    // Keywords
    InKeyword,
    OfKeyword,

    Unknown,
}

impl TokenKind {
    pub fn is_quote(self) -> bool {
        matches!(self, TokenKind::DoubleQuote | TokenKind::SingleQuote)
    }
}

/// A token produced by the template lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    /// Raw source text covered by the token.
    pub text: String,
    /// Lowercased tag name for element, block and closing tokens.
    pub tag_name: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self {
            kind,
            position,
            text: String::new(),
            tag_name: None,
        }
    }
}

/// Block keywords recognized after `<TAG @`.
pub const BLOCK_KEYWORDS: &[(&str, TokenKind)] = &[
    ("print", TokenKind::Print),
    ("if", TokenKind::If),
    ("else-if", TokenKind::ElseIf),
    ("else", TokenKind::Else),
    ("switch", TokenKind::Switch),
    ("case", TokenKind::Case),
    ("default", TokenKind::DefaultCase),
    ("foreach", TokenKind::Foreach),
    ("while", TokenKind::While),
    ("render", TokenKind::Render),
    ("render-content", TokenKind::RenderContent),
    ("content-for", TokenKind::ContentFor),
    ("layout", TokenKind::Layout),
];

/// Attribute keywords recognized on `@name` inside a block opener.
pub const ATTRIBUTE_KEYWORDS: &[(&str, TokenKind)] = &[
    ("block", TokenKind::BlockAttribute),
    ("context", TokenKind::ContextAttribute),
];

/// Keywords recognized on runs of letters.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("in", TokenKind::InKeyword),
    ("of", TokenKind::OfKeyword),
];

pub fn lookup_keyword(table: &[(&str, TokenKind)], word: &str) -> Option<TokenKind> {
    table
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, kind)| *kind)
}

/// HTML void elements (no children, never closed).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Check if a tag name is an HTML void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}
