//! Expression parser.
//!
//! Converts the token stream of one snippet into an [`Expr`] or [`Stmt`]
//! using recursive descent with Pratt-style precedence climbing for binary
//! operators. Every error is reported at the template position the snippet
//! was captured from.

use hexel_lexer::Position;

use crate::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, ObjectProperty, PostfixOp, Span, Stmt, UnaryOp,
};
use crate::lexer::{ExprLexer, Token, TokenKind, TokenValue};
use crate::value::format_number;
use crate::ExprError;

/// Declaration keywords that are rejected in favour of a single `let`.
const REJECTED_DECLARATIONS: &[&str] = &["const", "var", "function", "class"];

pub struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    position: Position,
}

impl ExprParser {
    /// Tokenize `source`, captured at `position` in the template.
    pub fn new(source: &str, position: Position) -> Result<Self, ExprError> {
        let tokens =
            ExprLexer::tokenize(source).map_err(|e| ExprError::at(e.message, position))?;
        Ok(Self {
            tokens,
            pos: 0,
            position,
        })
    }

    /// Parse exactly one expression. A trailing `;` is tolerated.
    pub fn parse_expression(mut self) -> Result<Expr, ExprError> {
        if self.check(TokenKind::Eof) {
            return Err(self.error("Expected an expression".into()));
        }

        let expr = self.expression()?;
        self.finish()?;
        Ok(expr)
    }

    /// Parse exactly one statement: an expression or a single `let` binding.
    pub fn parse_statement(mut self) -> Result<Stmt, ExprError> {
        let stmt = match self.peek().kind {
            TokenKind::Eof => return Err(self.error("Expected a statement".into())),
            TokenKind::Let => self.let_declaration()?,
            TokenKind::Identifier => {
                if let Some(keyword) = self.rejected_declaration() {
                    return Err(self.error(format!(
                        "'{keyword}' is not allowed here; only a single let binding may be declared"
                    )));
                }
                Stmt::Expression(self.expression()?)
            }
            _ => Stmt::Expression(self.expression()?),
        };

        self.finish()?;
        Ok(stmt)
    }

    // --- Statements ---

    fn let_declaration(&mut self) -> Result<Stmt, ExprError> {
        self.advance(); // let

        let name = self.expect_identifier()?;
        if REJECTED_DECLARATIONS.contains(&name.as_str()) {
            return Err(self.error(format!("'{name}' cannot be used as a variable name")));
        }

        let init = if self.eat(TokenKind::Eq) {
            Some(self.expression()?)
        } else {
            None
        };

        if self.check(TokenKind::Comma) {
            return Err(self.error("Only a single binding may be declared".into()));
        }

        Ok(Stmt::Let { name, init })
    }

    fn rejected_declaration(&self) -> Option<&'static str> {
        match &self.peek().value {
            TokenValue::Identifier(name) => REJECTED_DECLARATIONS
                .iter()
                .find(|keyword| **keyword == name.as_str())
                .copied(),
            _ => None,
        }
    }

    // --- Expressions, lowest precedence first ---

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ExprError> {
        let target = self.ternary()?;

        let op = match self.peek().kind {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::AddAssign,
            TokenKind::MinusEq => AssignOp::SubAssign,
            TokenKind::StarEq => AssignOp::MulAssign,
            TokenKind::SlashEq => AssignOp::DivAssign,
            _ => return Ok(target),
        };
        self.advance();

        let value = self.assignment()?;
        let span = Span::new(target.span.start, value.span.end);

        match target.kind {
            ExprKind::Identifier(name) => Ok(Expr {
                kind: ExprKind::Assignment {
                    name,
                    op,
                    value: Box::new(value),
                },
                span,
            }),
            ExprKind::Member { .. } => {
                Err(self.error("Assignment to object members is not supported".into()))
            }
            _ => Err(self.error("Invalid assignment target".into())),
        }
    }

    fn ternary(&mut self) -> Result<Expr, ExprError> {
        let condition = self.binary(1)?;
        if !self.eat(TokenKind::Question) {
            return Ok(condition);
        }

        let consequent = self.assignment()?;
        self.expect(TokenKind::Colon)?;
        let alternate = self.assignment()?;

        let span = Span::new(condition.span.start, alternate.span.end);
        Ok(Expr {
            kind: ExprKind::Ternary {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        })
    }

    /// Precedence climbing over left-associative binary operators.
    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;

        while let Some((op, precedence)) = binary_operator(self.peek().kind) {
            if precedence < min_precedence {
                break;
            }
            self.advance();

            let right = self.binary(precedence + 1)?;
            let span = Span::new(left.span.start, right.span.end);
            left = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                return Err(self.error("Prefix update operators are not supported".into()))
            }
            _ => return self.postfix(),
        };

        let start = self.advance().span.start;
        let operand = self.unary()?;
        let span = Span::new(start, operand.span.end);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let operand = self.call_member()?;

        let op = match self.peek().kind {
            TokenKind::PlusPlus => PostfixOp::Increment,
            TokenKind::MinusMinus => PostfixOp::Decrement,
            _ => return Ok(operand),
        };
        let end = self.advance().span.end;

        match operand.kind {
            ExprKind::Identifier(name) => Ok(Expr {
                kind: ExprKind::Postfix { name, op },
                span: Span::new(operand.span.start, end),
            }),
            _ => Err(self.error("Invalid update target; only variables can be incremented".into())),
        }
    }

    fn call_member(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;

        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.property_name()?;
                    expr = member(expr, property, false, false);
                }
                TokenKind::OptionalChain => {
                    self.advance();
                    if self.eat(TokenKind::LBracket) {
                        let property = self.expression()?;
                        self.expect(TokenKind::RBracket)?;
                        expr = member(expr, property, true, true);
                    } else if self.check(TokenKind::LParen) {
                        return Err(self.error("Optional calls are not supported".into()));
                    } else {
                        let property = self.property_name()?;
                        expr = member(expr, property, false, true);
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let property = self.expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = member(expr, property, true, false);
                }
                TokenKind::LParen => {
                    self.advance();
                    let arguments = self.list(TokenKind::RParen, Self::expression)?;
                    let span = Span::new(expr.span.start, self.previous_end());
                    expr = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            arguments,
                        },
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance();

        let kind = match (token.kind, token.value) {
            (TokenKind::Number, TokenValue::Number(n)) => ExprKind::Number(n),
            (TokenKind::String, TokenValue::String(s)) => ExprKind::String(s),
            (TokenKind::Boolean, TokenValue::Boolean(b)) => ExprKind::Boolean(b),
            (TokenKind::Identifier, TokenValue::Identifier(name)) => ExprKind::Identifier(name),
            (TokenKind::Null, _) => ExprKind::Null,
            (TokenKind::Undefined, _) => ExprKind::Undefined,
            (TokenKind::This, _) => ExprKind::This,
            (TokenKind::LParen, _) => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            (TokenKind::LBracket, _) => {
                ExprKind::Array(self.list(TokenKind::RBracket, Self::expression)?)
            }
            (TokenKind::LBrace, _) => {
                ExprKind::Object(self.list(TokenKind::RBrace, Self::object_property)?)
            }
            (TokenKind::Arrow, _) => {
                return Err(self.error("Arrow functions are not supported".into()))
            }
            (TokenKind::Eof, _) => {
                return Err(self.error("Unexpected end of expression".into()))
            }
            (kind, _) => return Err(self.error(format!("Unexpected token {kind:?}"))),
        };

        Ok(Expr {
            kind,
            span: Span::new(token.span.start, self.previous_end()),
        })
    }

    fn object_property(&mut self) -> Result<ObjectProperty, ExprError> {
        let token = self.advance();
        let shorthand_allowed = token.kind == TokenKind::Identifier;

        let key = match token.value {
            TokenValue::String(s) | TokenValue::Identifier(s) => s,
            TokenValue::Number(n) => format_number(n),
            _ => keyword_text(token.kind).map(str::to_string).ok_or_else(|| {
                self.error(format!("Expected property name, got {:?}", token.kind))
            })?,
        };

        if self.eat(TokenKind::Colon) {
            let value = self.expression()?;
            return Ok(ObjectProperty {
                key,
                value,
                shorthand: false,
            });
        }

        if !shorthand_allowed {
            return Err(self.error(format!("Expected ':' after property '{key}'")));
        }

        Ok(ObjectProperty {
            value: Expr {
                kind: ExprKind::Identifier(key.clone()),
                span: token.span,
            },
            key,
            shorthand: true,
        })
    }

    /// Comma-separated items up to `close`, allowing a trailing comma.
    fn list<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> Result<T, ExprError>,
    ) -> Result<Vec<T>, ExprError> {
        let mut items = Vec::new();

        while !self.check(close) {
            items.push(item(self)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(close)?;
        Ok(items)
    }

    /// The name after `.` or `?.`; keywords are valid property names.
    fn property_name(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance();

        let name = match token.value {
            TokenValue::Identifier(name) => name,
            _ => keyword_text(token.kind).map(str::to_string).ok_or_else(|| {
                self.error(format!("Expected property name, got {:?}", token.kind))
            })?,
        };

        Ok(Expr {
            kind: ExprKind::String(name),
            span: token.span,
        })
    }

    // --- Helpers ---

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ExprError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "Expected {kind:?}, got {:?}",
                self.peek().kind
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ExprError> {
        if let TokenValue::Identifier(name) = &self.peek().value {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(format!(
                "Expected identifier, got {:?}",
                self.peek().kind
            )))
        }
    }

    /// Accept an optional trailing `;` and require the end of the snippet.
    fn finish(&mut self) -> Result<(), ExprError> {
        if self.eat(TokenKind::Semicolon) && !self.check(TokenKind::Eof) {
            return Err(self.error("Only a single statement is allowed".into()));
        }

        match self.peek().kind {
            TokenKind::Eof => Ok(()),
            TokenKind::Arrow => Err(self.error("Arrow functions are not supported".into())),
            kind => Err(self.error(format!("Unexpected token {kind:?} after expression"))),
        }
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.span.end)
    }

    fn error(&self, message: String) -> ExprError {
        ExprError::at(message, self.position)
    }
}

fn member(object: Expr, property: Expr, computed: bool, optional: bool) -> Expr {
    let span = Span::new(object.span.start, property.span.end);
    Expr {
        kind: ExprKind::Member {
            object: Box::new(object),
            property: Box::new(property),
            computed,
            optional,
        },
        span,
    }
}

/// Binary operator and its precedence (higher binds tighter).
fn binary_operator(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::QuestionQuestion => (BinaryOp::NullishCoalescing, 1),
        TokenKind::Or => (BinaryOp::Or, 2),
        TokenKind::And => (BinaryOp::And, 3),
        TokenKind::EqEq => (BinaryOp::Eq, 4),
        TokenKind::NotEq => (BinaryOp::Neq, 4),
        TokenKind::StrictEq => (BinaryOp::StrictEq, 4),
        TokenKind::StrictNotEq => (BinaryOp::StrictNeq, 4),
        TokenKind::Lt => (BinaryOp::Lt, 5),
        TokenKind::Gt => (BinaryOp::Gt, 5),
        TokenKind::Lte => (BinaryOp::Lte, 5),
        TokenKind::Gte => (BinaryOp::Gte, 5),
        TokenKind::Plus => (BinaryOp::Add, 6),
        TokenKind::Minus => (BinaryOp::Sub, 6),
        TokenKind::Star => (BinaryOp::Mul, 7),
        TokenKind::Slash => (BinaryOp::Div, 7),
        TokenKind::Percent => (BinaryOp::Mod, 7),
        _ => return None,
    };
    Some(entry)
}

fn keyword_text(kind: TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::Null => Some("null"),
        TokenKind::Undefined => Some("undefined"),
        TokenKind::Typeof => Some("typeof"),
        TokenKind::This => Some("this"),
        TokenKind::Let => Some("let"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Expr {
        ExprParser::new(source, Position::default())
            .and_then(ExprParser::parse_expression)
            .unwrap()
    }

    fn parse_err(source: &str) -> ExprError {
        ExprParser::new(source, Position::new(3, 7))
            .and_then(ExprParser::parse_expression)
            .unwrap_err()
    }

    fn statement(source: &str) -> Result<Stmt, ExprError> {
        ExprParser::new(source, Position::new(2, 5)).and_then(ExprParser::parse_statement)
    }

    // =========================================================================
    // Precedence
    // =========================================================================

    #[test]
    fn test_multiplication_binds_tighter() {
        let expr = parse("1 + 2 * 3");
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse("a - b - c");
        let ExprKind::Binary { left, op, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert!(matches!(
            left.kind,
            ExprKind::Binary {
                op: BinaryOp::Sub,
                ..
            }
        ));
    }

    #[test]
    fn test_logical_precedence() {
        let expr = parse("a || b && c");
        let ExprKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_ternary_and_assignment() {
        let expr = parse("x = a ? 1 : 2");
        let ExprKind::Assignment { name, op, value } = expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(name, "x");
        assert_eq!(op, AssignOp::Assign);
        assert!(matches!(value.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn test_unary_chain() {
        let expr = parse("!!-x");
        assert!(matches!(
            expr.kind,
            ExprKind::Unary {
                op: UnaryOp::Not,
                ..
            }
        ));
    }

    // =========================================================================
    // Member access and calls
    // =========================================================================

    #[test]
    fn test_member_chain_and_call() {
        let expr = parse("user.tags[0].toUpperCase()");
        let ExprKind::Call { callee, arguments } = expr.kind else {
            panic!("expected call");
        };
        assert!(arguments.is_empty());
        let ExprKind::Member {
            property, computed, ..
        } = callee.kind
        else {
            panic!("expected member");
        };
        assert!(!computed);
        assert_eq!(property.kind, ExprKind::String("toUpperCase".into()));
    }

    #[test]
    fn test_optional_member() {
        let expr = parse("user?.name");
        assert!(matches!(
            expr.kind,
            ExprKind::Member { optional: true, .. }
        ));
    }

    #[test]
    fn test_keyword_property_names() {
        let expr = parse("a.default.null");
        assert!(matches!(expr.kind, ExprKind::Member { .. }));
    }

    // =========================================================================
    // Literals
    // =========================================================================

    #[test]
    fn test_array_with_trailing_comma() {
        let expr = parse("[1, 'two', x,]");
        let ExprKind::Array(items) = expr.kind else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_object_literal_forms() {
        let expr = parse("{ a: 1, 'b c': 2, 3: x, name }");
        let ExprKind::Object(props) = expr.kind else {
            panic!("expected object");
        };
        let keys: Vec<&str> = props.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "3", "name"]);
        assert!(props[3].shorthand);
        assert_eq!(props[3].value.kind, ExprKind::Identifier("name".into()));
    }

    #[test]
    fn test_this_and_parentheses() {
        let expr = parse("(this)");
        assert_eq!(expr.kind, ExprKind::This);
    }

    #[test]
    fn test_postfix_increment() {
        let expr = parse("i++");
        assert_eq!(
            expr.kind,
            ExprKind::Postfix {
                name: "i".into(),
                op: PostfixOp::Increment
            }
        );
    }

    #[test]
    fn test_trailing_semicolon_tolerated() {
        assert_eq!(parse("1;").kind, ExprKind::Number(1.0));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_errors_use_captured_position() {
        let err = parse_err("1 +");
        assert_eq!((err.line, err.column), (3, 7));
        assert!(err.message.contains("Unexpected end"));
    }

    #[test]
    fn test_member_assignment_rejected() {
        let err = parse_err("a.b = 1");
        assert!(err.message.contains("object members"));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_err("a b").message.contains("after expression"));
        assert!(parse_err("a; b").message.contains("single statement"));
        assert!(parse_err("").message.contains("Expected an expression"));
    }

    #[test]
    fn test_arrow_functions_rejected() {
        assert!(parse_err("(x) => x").message.contains("Arrow"));
    }

    #[test]
    fn test_lexer_errors_are_repositioned() {
        let err = parse_err("'open");
        assert_eq!((err.line, err.column), (3, 7));
    }

    // =========================================================================
    // Statements
    // =========================================================================

    #[test]
    fn test_let_declaration() {
        let stmt = statement("let total = a + 1;").unwrap();
        let Stmt::Let { name, init } = stmt else {
            panic!("expected let");
        };
        assert_eq!(name, "total");
        assert!(init.is_some());
    }

    #[test]
    fn test_let_without_initializer() {
        assert_eq!(
            statement("let x").unwrap(),
            Stmt::Let {
                name: "x".into(),
                init: None
            }
        );
    }

    #[test]
    fn test_other_declarations_rejected() {
        for source in ["const x = 1", "var x = 1", "function f() {}", "class A {}"] {
            let err = statement(source).unwrap_err();
            assert_eq!((err.line, err.column), (2, 5), "source: {source}");
            assert!(err.message.contains("single let binding"), "source: {source}");
        }
    }

    #[test]
    fn test_multiple_bindings_rejected() {
        let err = statement("let a = 1, b = 2").unwrap_err();
        assert!(err.message.contains("single binding"));
    }

    #[test]
    fn test_multiple_statements_rejected() {
        assert!(statement("a = 1; b = 2").is_err());
    }
}
