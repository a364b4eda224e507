//! Document parser for Hexel views.
//!
//! One-token-lookahead recursive descent over [`hexel_lexer::Lexer`]. Every
//! block construct is terminated by a block closing tag; anything that does
//! not start a structural node is accumulated as literal text.

use hexel_expr::{parse_expression, parse_statement, Expression};
use hexel_lexer::{is_void_element, Lexer, LexerOptions, Position, Token, TokenKind};

use crate::ast::{
    Attribute, AttributeKind, AttributeValue, Case, Conditional, ContentFor, DefaultCase, Document,
    Element, Foreach, Node, NodeKind, Print, PrintBlock, Render, Switch, While,
};
use crate::{ParseError, ParseErrorKind};

/// Tokens that can never start a node.
const INVALID_NODE_START: &[TokenKind] = &[
    TokenKind::ElseIf,
    TokenKind::Else,
    TokenKind::Case,
    TokenKind::DefaultCase,
    TokenKind::BlockClosingStart,
    TokenKind::ExpressionEnd,
    TokenKind::ElementClosingStart,
];

/// Tokens that end a run of literal text.
const INVALID_TEXT: &[TokenKind] = &[
    TokenKind::Scope,
    TokenKind::Print,
    TokenKind::If,
    TokenKind::ElseIf,
    TokenKind::Else,
    TokenKind::Switch,
    TokenKind::Case,
    TokenKind::DefaultCase,
    TokenKind::Foreach,
    TokenKind::While,
    TokenKind::Render,
    TokenKind::RenderContent,
    TokenKind::ContentFor,
    TokenKind::Layout,
    TokenKind::BlockClosingStart,
    TokenKind::ExpressionStart,
    TokenKind::ExpressionEnd,
    TokenKind::PrintExpressionStart,
    TokenKind::CommentExpressionStart,
    TokenKind::CommentStart,
    TokenKind::CDataStart,
    TokenKind::Doctype,
    TokenKind::ElementStart,
    TokenKind::ElementClosingStart,
];

const ATTRIBUTE_NAME_TERMINATORS: &[TokenKind] = &[
    TokenKind::Whitespace,
    TokenKind::Equals,
    TokenKind::Dot,
    TokenKind::RightSquareBrace,
    TokenKind::ForwardSlash,
    TokenKind::RightAngleBrace,
    TokenKind::DoubleQuote,
    TokenKind::SingleQuote,
];

const ATTRIBUTE_VALUE_TERMINATORS: &[TokenKind] = &[
    TokenKind::ExpressionStart,
    TokenKind::ExpressionEnd,
    TokenKind::PrintExpressionStart,
    TokenKind::CommentExpressionStart,
];

const VARIABLE_NAME_START: &[TokenKind] =
    &[TokenKind::Letters, TokenKind::Underscore, TokenKind::Dollar];

const VARIABLE_NAME_PART: &[TokenKind] = &[
    TokenKind::Letters,
    TokenKind::Numbers,
    TokenKind::Underscore,
    TokenKind::Dollar,
    TokenKind::InKeyword,
    TokenKind::OfKeyword,
];

/// Elements whose body is raw text up to their own closing tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A quoted `="…"` value read as raw characters.
struct QuotedValue {
    text: String,
    /// Position of the first character after the opening quote.
    position: Position,
    quote: char,
}

/// Hexel document parser.
pub struct Parser {
    lexer: Lexer,
}

impl Parser {
    pub fn new(source: &str, options: &LexerOptions) -> Result<Self, ParseError> {
        Ok(Self {
            lexer: Lexer::new(source, options.clone())?,
        })
    }

    /// Parse the whole source. A layout declaration is only accepted as the
    /// very first token.
    pub fn parse(mut self) -> Result<Document, ParseError> {
        let mut nodes = Vec::new();

        if self.matches(TokenKind::Layout)? {
            nodes.push(self.parse_layout()?);
        }

        while !self.is_eof()? {
            nodes.push(self.parse_node()?);
        }

        Ok(Document { nodes })
    }

    fn parse_node(&mut self) -> Result<Node, ParseError> {
        let Some(kind) = self.peek_kind()? else {
            return Err(self.eof_error());
        };

        match kind {
            // Blocks
            TokenKind::Scope => self.parse_scope(),
            TokenKind::Print => self.parse_print(),
            TokenKind::If => {
                let (conditional, position) = self.parse_conditional(TokenKind::If)?;
                Ok(Node::new(NodeKind::If(conditional), position))
            }
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::While => self.parse_while(),
            TokenKind::Render => self.parse_render(),
            TokenKind::RenderContent => self.parse_render_content(),
            TokenKind::ContentFor => self.parse_content_for(),
            TokenKind::Layout => Err(ParseError::syntax(
                "A layout can only be declared at the very start of a view",
                self.current_position()?,
            )),

            // Expressions
            TokenKind::ExpressionStart => self.parse_expression_node(),
            TokenKind::PrintExpressionStart => self.parse_print_expression_node(),
            TokenKind::CommentExpressionStart => self.parse_comment_expression(),

            // HTML
            TokenKind::CommentStart => self.parse_comment(),
            TokenKind::CDataStart => self.parse_cdata(),
            TokenKind::Doctype => self.parse_doctype(),
            TokenKind::ElementStart => self.parse_element(),
            TokenKind::Whitespace => {
                let token = self.advance()?;
                Ok(Node::new(NodeKind::Whitespace(token.text), token.position))
            }

            kind if INVALID_NODE_START.contains(&kind) => Err(self.unexpected_token()),
            TokenKind::Unknown if self.at_unknown_block()? => {
                let token = self.advance()?;
                Err(ParseError::syntax(
                    format!("Unknown block keyword in '{}'", token.text),
                    token.position,
                ))
            }
            _ => self.parse_text(),
        }
    }

    /// Parse nodes until the next token is `kind`, without consuming it.
    fn parse_nodes_until(&mut self, kind: TokenKind) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        while !self.matches(kind)? {
            nodes.push(self.parse_node()?);
        }
        Ok(nodes)
    }

    /// Children of a block up to and including its closing tag.
    fn parse_block_body(&mut self) -> Result<Vec<Node>, ParseError> {
        let children = self.parse_nodes_until(TokenKind::BlockClosingStart)?;
        self.expect(TokenKind::BlockClosingStart)?;
        self.skip_whitespace()?;
        self.expect(TokenKind::RightAngleBrace)?;
        Ok(children)
    }

    // --- Blocks ---

    fn parse_scope(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::Scope)?.position;
        self.finish_opening_tag()?;
        let children = self.parse_block_body()?;
        Ok(Node::new(NodeKind::Scope(children), position))
    }

    fn parse_print(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::Print)?.position;
        let expression = self.block_expression()?;
        self.skip_whitespace()?;

        let has_params = self.matches(TokenKind::BlockAttribute)?;
        let mut params = Vec::new();

        if has_params {
            self.advance()?;
            self.skip_whitespace()?;
            self.expect(TokenKind::Equals)?;
            self.skip_whitespace()?;
            let quote = self.expect_quote()?;

            loop {
                self.skip_whitespace()?;
                if self.consume_optional(quote)?.is_some() {
                    break;
                }
                if !params.is_empty() {
                    self.expect(TokenKind::Comma)?;
                    self.skip_whitespace()?;
                }

                let name_position = self.current_position()?;
                let name = self.parse_variable_name()?;
                if params.contains(&name) {
                    return Err(ParseError::syntax(
                        format!("Duplicate block argument '{name}'"),
                        name_position,
                    ));
                }
                params.push(name);
            }

            if params.is_empty() {
                return Err(ParseError::syntax(
                    "Expected one or more block arguments",
                    self.current_position()?,
                ));
            }
            self.skip_whitespace()?;
        }

        if !has_params && self.consume_optional(TokenKind::ForwardSlash)?.is_some() {
            self.expect(TokenKind::RightAngleBrace)?;
            return Ok(Node::new(
                NodeKind::Print(Print {
                    expression,
                    block: None,
                }),
                position,
            ));
        }

        self.expect(TokenKind::RightAngleBrace)?;
        let children = self.parse_block_body()?;

        Ok(Node::new(
            NodeKind::Print(Print {
                expression,
                block: Some(PrintBlock { params, children }),
            }),
            position,
        ))
    }

    /// `if` and `else-if`: condition, body, then an optional alternate.
    fn parse_conditional(
        &mut self,
        opener: TokenKind,
    ) -> Result<(Conditional, Position), ParseError> {
        let position = self.expect(opener)?.position;
        let condition = self.block_expression()?;
        self.finish_opening_tag()?;
        let children = self.parse_block_body()?;
        let alternate = self.parse_alternate(true)?;

        Ok((
            Conditional {
                condition,
                children,
                alternate,
            },
            position,
        ))
    }

    /// Look past whitespace and comment spans for an `else-if` / `else`.
    /// The skipped content is discarded either way.
    fn parse_alternate(&mut self, allow_else_if: bool) -> Result<Option<Box<Node>>, ParseError> {
        loop {
            match self.peek_kind()? {
                Some(TokenKind::Whitespace) => {
                    self.advance()?;
                }
                Some(TokenKind::CommentExpressionStart) => {
                    self.parse_comment_expression()?;
                }
                Some(TokenKind::ElseIf) if allow_else_if => {
                    let (conditional, position) = self.parse_conditional(TokenKind::ElseIf)?;
                    return Ok(Some(Box::new(Node::new(
                        NodeKind::ElseIf(conditional),
                        position,
                    ))));
                }
                Some(TokenKind::Else) => {
                    let position = self.expect(TokenKind::Else)?.position;
                    self.finish_opening_tag()?;
                    let children = self.parse_block_body()?;
                    return Ok(Some(Box::new(Node::new(NodeKind::Else(children), position))));
                }
                _ => return Ok(None),
            }
        }
    }

    fn parse_switch(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::Switch)?.position;
        let expression = self.block_expression()?;
        self.finish_opening_tag()?;

        let mut cases = Vec::new();
        let mut default = None;

        loop {
            match self.peek_kind()? {
                None => return Err(self.eof_error()),
                Some(TokenKind::BlockClosingStart) => break,
                Some(TokenKind::Whitespace) => {
                    self.advance()?;
                }
                Some(TokenKind::CommentExpressionStart) => {
                    self.parse_comment_expression()?;
                }
                Some(TokenKind::Case) => {
                    let position = self.expect(TokenKind::Case)?.position;
                    let expression = self.block_expression()?;
                    self.finish_opening_tag()?;
                    let children = self.parse_block_body()?;
                    cases.push(Case {
                        expression,
                        children,
                        position,
                    });
                }
                Some(TokenKind::DefaultCase) => {
                    let position = self.current_position()?;
                    if default.is_some() {
                        return Err(ParseError::syntax(
                            "A switch block can only have one default case",
                            position,
                        ));
                    }
                    self.advance()?;
                    self.finish_opening_tag()?;
                    let children = self.parse_block_body()?;
                    default = Some(DefaultCase { children, position });
                }
                Some(_) => return Err(self.unexpected_token()),
            }
        }

        self.parse_block_body()?;

        Ok(Node::new(
            NodeKind::Switch(Switch {
                expression,
                cases,
                default,
            }),
            position,
        ))
    }

    fn parse_foreach(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::Foreach)?.position;
        self.skip_whitespace()?;
        self.expect(TokenKind::Equals)?;
        self.skip_whitespace()?;
        let quote = self.expect_quote()?;

        let mut identifiers: Vec<String> = Vec::new();
        loop {
            if !identifiers.is_empty() {
                self.expect(TokenKind::Comma)?;
            }
            self.skip_whitespace()?;

            let identifier_position = self.current_position()?;
            let identifier = self.parse_variable_name()?;
            if identifiers.contains(&identifier) {
                return Err(ParseError::syntax(
                    format!("Duplicate identifier '{identifier}' in foreach"),
                    identifier_position,
                ));
            }
            if identifiers.len() == 2 {
                return Err(ParseError::syntax(
                    "A foreach block takes at most two identifiers",
                    identifier_position,
                ));
            }
            identifiers.push(identifier);
            self.skip_whitespace()?;

            if !self.matches(TokenKind::Comma)? {
                break;
            }
        }

        if !self.matches_any(&[TokenKind::InKeyword, TokenKind::OfKeyword])? {
            let token = self.advance()?;
            return Err(ParseError::syntax(
                format!("Expected 'in' or 'of', found {}", describe(&token)),
                token.position,
            ));
        }
        self.advance()?;
        self.skip_whitespace()?;

        let collection_position = self.current_position()?;
        let collection = self.consume_while(|t| t.kind != quote)?;
        self.expect(quote)?;
        let collection = parse_expression(collection.trim(), collection_position)?;

        self.finish_opening_tag()?;
        let children = self.parse_block_body()?;
        let alternate = self.parse_alternate(false)?;

        Ok(Node::new(
            NodeKind::Foreach(Foreach {
                identifiers,
                collection,
                children,
                alternate,
            }),
            position,
        ))
    }

    fn parse_while(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::While)?.position;
        let condition = self.block_expression()?;
        self.finish_opening_tag()?;
        let children = self.parse_block_body()?;
        Ok(Node::new(
            NodeKind::While(While {
                condition,
                children,
            }),
            position,
        ))
    }

    fn parse_render(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::Render)?.position;
        let view_path = self.block_name("view path")?;
        self.skip_whitespace()?;

        let context = if self.consume_optional(TokenKind::ContextAttribute)?.is_some() {
            let context = self.block_expression()?;
            self.skip_whitespace()?;
            Some(context)
        } else {
            None
        };

        self.expect(TokenKind::ForwardSlash)?;
        self.expect(TokenKind::RightAngleBrace)?;

        Ok(Node::new(
            NodeKind::Render(Render { view_path, context }),
            position,
        ))
    }

    fn parse_render_content(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::RenderContent)?.position;
        self.skip_whitespace()?;

        let slot = if self.matches(TokenKind::Equals)? {
            Some(self.block_name("slot name")?)
        } else {
            None
        };

        self.finish_self_closing_tag()?;
        Ok(Node::new(NodeKind::RenderContent(slot), position))
    }

    fn parse_content_for(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::ContentFor)?.position;
        let slot = self.block_name("slot name")?;
        self.finish_opening_tag()?;
        let children = self.parse_block_body()?;
        Ok(Node::new(
            NodeKind::ContentFor(ContentFor { slot, children }),
            position,
        ))
    }

    fn parse_layout(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::Layout)?.position;
        let view_path = self.block_name("layout path")?;
        self.finish_self_closing_tag()?;
        Ok(Node::new(NodeKind::Layout(view_path), position))
    }

    fn finish_opening_tag(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace()?;
        self.expect(TokenKind::RightAngleBrace)?;
        Ok(())
    }

    fn finish_self_closing_tag(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace()?;
        self.expect(TokenKind::ForwardSlash)?;
        self.expect(TokenKind::RightAngleBrace)?;
        Ok(())
    }

    // --- Block values ---

    /// `="…"`, read raw up to the matching quote.
    fn quoted_value(&mut self) -> Result<QuotedValue, ParseError> {
        self.skip_whitespace()?;
        self.expect(TokenKind::Equals)?;
        self.skip_whitespace()?;
        let quote_kind = self.expect_quote()?;
        let quote = if quote_kind == TokenKind::DoubleQuote {
            '"'
        } else {
            '\''
        };

        let position = self.lexer.position();
        let text = self.lexer.consume_raw_until(quote)?;
        self.expect(quote_kind)?;

        Ok(QuotedValue {
            text,
            position,
            quote,
        })
    }

    fn block_expression(&mut self) -> Result<Expression, ParseError> {
        let value = self.quoted_value()?;
        Ok(parse_expression(value.text.trim(), value.position)?)
    }

    /// A literal block value such as a view path or slot name.
    fn block_name(&mut self, what: &str) -> Result<String, ParseError> {
        let value = self.quoted_value()?;
        let name = value.text.trim();
        if name.is_empty() {
            return Err(ParseError::syntax(format!("Expected a {what}"), value.position));
        }
        Ok(name.to_string())
    }

    fn parse_variable_name(&mut self) -> Result<String, ParseError> {
        let token = self.advance()?;
        if !VARIABLE_NAME_START.contains(&token.kind) {
            return Err(ParseError::syntax(
                format!("Expected a variable name, found {}", describe(&token)),
                token.position,
            ));
        }

        let mut name = token.text;
        name.push_str(&self.consume_while(|t| VARIABLE_NAME_PART.contains(&t.kind))?);
        Ok(name)
    }

    // --- Expression spans ---

    /// Raw snippet text up to the expression end delimiter, and the
    /// position it starts at.
    fn expression_snippet(&mut self) -> Result<(String, Position), ParseError> {
        let position = self.current_position()?;
        let text = self.consume_while(|t| t.kind != TokenKind::ExpressionEnd)?;
        self.expect(TokenKind::ExpressionEnd)?;
        Ok((text, position))
    }

    fn parse_expression_node(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::ExpressionStart)?.position;
        let (text, snippet_position) = self.expression_snippet()?;
        let statement = parse_statement(&text, snippet_position)?;
        Ok(Node::new(NodeKind::Expression(statement), position))
    }

    fn parse_print_expression_node(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::PrintExpressionStart)?.position;
        let (text, snippet_position) = self.expression_snippet()?;
        let statement = parse_statement(&text, snippet_position)?;

        if statement.is_declaration() {
            return Err(ParseError {
                kind: ParseErrorKind::Expression,
                message: "A declaration cannot be printed".into(),
                line: snippet_position.line,
                column: snippet_position.column,
            });
        }

        Ok(Node::new(NodeKind::PrintExpression(statement), position))
    }

    fn parse_comment_expression(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::CommentExpressionStart)?.position;
        let text = self.consume_while(|t| t.kind != TokenKind::ExpressionEnd)?;
        self.expect(TokenKind::ExpressionEnd)?;
        Ok(Node::new(NodeKind::CommentExpression(text), position))
    }

    // --- HTML ---

    fn parse_comment(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::CommentStart)?.position;
        let text = self.consume_while(|t| t.kind != TokenKind::CommentEnd)?;
        self.expect(TokenKind::CommentEnd)?;
        Ok(Node::new(NodeKind::Comment(text), position))
    }

    fn parse_cdata(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::CDataStart)?.position;
        let text = self.consume_while(|t| t.kind != TokenKind::CDataEnd)?;
        self.expect(TokenKind::CDataEnd)?;
        Ok(Node::new(NodeKind::CData(text), position))
    }

    fn parse_doctype(&mut self) -> Result<Node, ParseError> {
        let position = self.expect(TokenKind::Doctype)?.position;
        self.expect(TokenKind::Whitespace)?;

        let token = self.expect(TokenKind::Letters)?;
        if token.text != "html" {
            return Err(ParseError::syntax(
                format!("Expected 'html', found '{}'", token.text),
                token.position,
            ));
        }

        self.skip_whitespace()?;
        self.expect(TokenKind::RightAngleBrace)?;
        Ok(Node::new(NodeKind::Doctype, position))
    }

    fn parse_element(&mut self) -> Result<Node, ParseError> {
        let token = self.expect(TokenKind::ElementStart)?;
        let position = token.position;
        let tag_name = token.tag_name.unwrap_or_default();
        let is_void = is_void_element(&tag_name);
        self.skip_whitespace()?;

        let mut attributes = Vec::new();
        while !self.matches_any(&[TokenKind::ForwardSlash, TokenKind::RightAngleBrace])? {
            attributes.push(self.parse_attribute()?);
            self.skip_whitespace()?;
        }

        let is_self_closing = self.consume_optional(TokenKind::ForwardSlash)?.is_some();
        self.expect(TokenKind::RightAngleBrace)?;

        let mut children = Vec::new();
        if !is_void && !is_self_closing {
            children = if RAW_TEXT_ELEMENTS.contains(&tag_name.as_str()) {
                vec![self.parse_raw_text(&tag_name)?]
            } else {
                self.parse_nodes_until(TokenKind::ElementClosingStart)?
            };
            self.parse_closing_tag(&tag_name)?;
        }

        Ok(Node::new(
            NodeKind::Element(Element {
                tag_name,
                is_void,
                is_self_closing,
                attributes,
                children,
            }),
            position,
        ))
    }

    /// Everything up to `</tag`, with no nested grammar.
    fn parse_raw_text(&mut self, tag_name: &str) -> Result<Node, ParseError> {
        let position = self.current_position()?;
        let text = self.consume_while(|t| {
            t.kind != TokenKind::ElementClosingStart || t.tag_name.as_deref() != Some(tag_name)
        })?;
        Ok(Node::new(NodeKind::Text(text), position))
    }

    fn parse_closing_tag(&mut self, tag_name: &str) -> Result<(), ParseError> {
        let token = self.expect(TokenKind::ElementClosingStart)?;
        self.skip_whitespace()?;
        self.expect(TokenKind::RightAngleBrace)?;

        let found = token.tag_name.unwrap_or_default();
        if found != tag_name {
            return Err(ParseError::syntax(
                format!("Mismatched closing tag: expected </{tag_name}>, found </{found}>"),
                token.position,
            ));
        }
        Ok(())
    }

    // --- Attributes ---

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let position = self.current_position()?;

        if self.consume_optional(TokenKind::LeftSquareBrace)?.is_none() {
            return self.parse_normal_attribute(position);
        }

        if self.consume_optional(TokenKind::QuestionMark)?.is_some() {
            let name = self.parse_attribute_name()?;
            self.expect(TokenKind::RightSquareBrace)?;
            let value = self.quoted_value()?;
            let condition = parse_expression(&value.text, value.position)?;
            return Ok(Attribute {
                kind: AttributeKind::Conditional {
                    name,
                    quote: value.quote,
                    condition,
                },
                position,
            });
        }

        let name = self.parse_attribute_name()?;

        if self.consume_optional(TokenKind::Dot)?.is_some() {
            let suffix_position = self.current_position()?;
            let suffix = self.consume_while(|t| !ATTRIBUTE_NAME_TERMINATORS.contains(&t.kind))?;
            if suffix.is_empty() {
                return Err(ParseError::syntax(
                    "Expected a value to append",
                    suffix_position,
                ));
            }
            self.expect(TokenKind::RightSquareBrace)?;
            let value = self.quoted_value()?;
            let condition = parse_expression(&value.text, value.position)?;
            return Ok(Attribute {
                kind: AttributeKind::Append {
                    name,
                    quote: value.quote,
                    suffix,
                    condition,
                },
                position,
            });
        }

        self.expect(TokenKind::RightSquareBrace)?;
        let value = self.quoted_value()?;
        let expression = parse_expression(&value.text, value.position)?;
        Ok(Attribute {
            kind: AttributeKind::Expression {
                name,
                quote: value.quote,
                expression,
            },
            position,
        })
    }

    fn parse_normal_attribute(&mut self, position: Position) -> Result<Attribute, ParseError> {
        let name = self.parse_attribute_name()?;
        self.skip_whitespace()?;

        if self.consume_optional(TokenKind::Equals)?.is_none() {
            return Ok(Attribute {
                kind: AttributeKind::Normal {
                    name,
                    quote: None,
                    values: None,
                },
                position,
            });
        }

        self.skip_whitespace()?;
        let quote_kind = self.expect_quote()?;
        let quote = if quote_kind == TokenKind::DoubleQuote {
            '"'
        } else {
            '\''
        };

        let mut values = Vec::new();
        loop {
            match self.peek_kind()? {
                None => return Err(self.eof_error()),
                Some(kind) if kind == quote_kind => break,
                Some(TokenKind::PrintExpressionStart) => {
                    self.advance()?;
                    let (text, snippet_position) = self.expression_snippet()?;
                    values.push(AttributeValue::Expression(parse_expression(
                        &text,
                        snippet_position,
                    )?));
                }
                Some(TokenKind::CommentExpressionStart) => {
                    self.parse_comment_expression()?;
                }
                Some(TokenKind::ExpressionStart) => {
                    return Err(ParseError::syntax(
                        "Statements are not allowed inside attribute values",
                        self.current_position()?,
                    ));
                }
                Some(TokenKind::ExpressionEnd) => return Err(self.unexpected_token()),
                Some(_) => {
                    let literal = self.consume_while(|t| {
                        t.kind != quote_kind && !ATTRIBUTE_VALUE_TERMINATORS.contains(&t.kind)
                    })?;
                    values.push(AttributeValue::Literal(literal));
                }
            }
        }

        self.expect(quote_kind)?;
        Ok(Attribute {
            kind: AttributeKind::Normal {
                name,
                quote: Some(quote),
                values: Some(values),
            },
            position,
        })
    }

    fn parse_attribute_name(&mut self) -> Result<String, ParseError> {
        let position = self.current_position()?;
        let name = self.consume_while(|t| !ATTRIBUTE_NAME_TERMINATORS.contains(&t.kind))?;

        if name.is_empty() {
            return Err(match self.peek_kind()? {
                None => self.eof_error(),
                Some(_) => ParseError::syntax("Expected an attribute name", position),
            });
        }
        Ok(name)
    }

    // --- Helpers ---

    fn peek_kind(&mut self) -> Result<Option<TokenKind>, ParseError> {
        Ok(self.lexer.peek_token()?.map(|t| t.kind))
    }

    /// An opener of the block tag with an unrecognized `@keyword`.
    fn at_unknown_block(&mut self) -> Result<bool, ParseError> {
        let prefix = format!("<{}", self.lexer.options().block_tag_name.to_lowercase());
        Ok(self.lexer.peek_token()?.is_some_and(|t| {
            t.kind == TokenKind::Unknown
                && t.text.contains('@')
                && t.text.to_lowercase().starts_with(&prefix)
        }))
    }

    fn is_eof(&mut self) -> Result<bool, ParseError> {
        Ok(self.peek_kind()?.is_none())
    }

    fn matches(&mut self, kind: TokenKind) -> Result<bool, ParseError> {
        Ok(self.peek_kind()? == Some(kind))
    }

    fn matches_any(&mut self, kinds: &[TokenKind]) -> Result<bool, ParseError> {
        Ok(self.peek_kind()?.is_some_and(|kind| kinds.contains(&kind)))
    }

    /// Position of the next token, or of the end of input.
    fn current_position(&mut self) -> Result<Position, ParseError> {
        let cursor = self.lexer.position();
        Ok(self.lexer.peek_token()?.map_or(cursor, |t| t.position))
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        match self.lexer.next_token()? {
            Some(token) => Ok(token),
            None => Err(self.eof_error()),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.advance()?;
        if token.kind != kind {
            return Err(ParseError::syntax(
                format!("Expected {}, found {}", describe_kind(kind), describe(&token)),
                token.position,
            ));
        }
        Ok(token)
    }

    fn expect_quote(&mut self) -> Result<TokenKind, ParseError> {
        let token = self.advance()?;
        if !token.kind.is_quote() {
            return Err(ParseError::syntax(
                format!("Expected a quote, found {}", describe(&token)),
                token.position,
            ));
        }
        Ok(token.kind)
    }

    fn consume_optional(&mut self, kind: TokenKind) -> Result<Option<Token>, ParseError> {
        if self.matches(kind)? {
            Ok(Some(self.advance()?))
        } else {
            Ok(None)
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), ParseError> {
        self.consume_optional(TokenKind::Whitespace)?;
        Ok(())
    }

    /// Concatenate the text of tokens while `predicate` holds, stopping at
    /// the end of input.
    fn consume_while(
        &mut self,
        predicate: impl Fn(&Token) -> bool,
    ) -> Result<String, ParseError> {
        let mut text = String::new();
        loop {
            match self.lexer.peek_token()? {
                Some(token) if predicate(token) => {}
                _ => break,
            }
            if let Some(token) = self.lexer.next_token()? {
                text.push_str(&token.text);
            }
        }
        Ok(text)
    }

    fn parse_text(&mut self) -> Result<Node, ParseError> {
        let position = self.current_position()?;
        let text = self.consume_while(|t| !INVALID_TEXT.contains(&t.kind))?;
        Ok(Node::new(NodeKind::Text(text), position))
    }

    fn unexpected_token(&mut self) -> ParseError {
        let cursor = self.lexer.position();
        match self.lexer.peek_token() {
            Ok(Some(token)) => {
                ParseError::syntax(format!("Unexpected {}", describe(token)), token.position)
            }
            Ok(None) => ParseError::syntax("Unexpected end of file", cursor),
            Err(err) => err.into(),
        }
    }

    /// Only meaningful once the input is exhausted.
    fn eof_error(&self) -> ParseError {
        ParseError::syntax("Unexpected end of file", self.lexer.position())
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Whitespace => "whitespace".into(),
        _ => format!("'{}'", token.text),
    }
}

fn describe_kind(kind: TokenKind) -> String {
    let text = match kind {
        TokenKind::RightAngleBrace => "'>'",
        TokenKind::ForwardSlash => "'/'",
        TokenKind::Equals => "'='",
        TokenKind::Comma => "','",
        TokenKind::RightSquareBrace => "']'",
        TokenKind::DoubleQuote => "'\"'",
        TokenKind::SingleQuote => "\"'\"",
        TokenKind::Whitespace => "whitespace",
        TokenKind::Letters => "a word",
        TokenKind::ExpressionEnd => "the end of the expression",
        TokenKind::BlockClosingStart => "a closing block tag",
        TokenKind::ElementClosingStart => "a closing tag",
        TokenKind::CommentEnd => "'-->'",
        TokenKind::CDataEnd => "']]>'",
        other => return format!("{other:?}"),
    };
    text.to_string()
}
