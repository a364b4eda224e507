//! Abstract Syntax Tree for Hexel views.
//!
//! A closed set of node variants, each carried by a [`Node`] together with
//! the source position it starts at. Embedded snippets are held as opaque
//! [`Expression`] / [`Statement`] handles from `hexel-expr`.

use hexel_expr::{Expression, Statement};
use hexel_lexer::Position;

/// A complete parsed view.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    /// The layout path declared at the top of the view, if any.
    pub fn layout(&self) -> Option<&str> {
        match self.nodes.first().map(|node| &node.kind) {
            Some(NodeKind::Layout(path)) => Some(path),
            _ => None,
        }
    }
}

/// A node and the position it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Position,
}

impl Node {
    pub fn new(kind: NodeKind, position: Position) -> Self {
        Self { kind, position }
    }
}

/// Node variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Literal text.
    Text(String),

    /// A run of whitespace between nodes.
    Whitespace(String),

    /// `<!-- … -->`, holding the inner text.
    Comment(String),

    /// `<![CDATA[ … ]]>`, holding the inner text.
    CData(String),

    /// `<!DOCTYPE html>`
    Doctype,

    /// An HTML element.
    Element(Element),

    /// `<js>…</js>`: renders its children, nothing else.
    Scope(Vec<Node>),

    /// `<js @print="…">`
    Print(Print),

    /// `<js @if="…">`
    If(Conditional),

    /// `<js @else-if="…">`, only found as an alternate.
    ElseIf(Conditional),

    /// `<js @else>`, only found as an alternate.
    Else(Vec<Node>),

    /// `<js @switch="…">`
    Switch(Switch),

    /// `<js @foreach="item in items">`
    Foreach(Foreach),

    /// `<js @while="…">`
    While(While),

    /// `<js @render="path" />`
    Render(Render),

    /// `<js @render-content />` or `<js @render-content="slot" />`
    RenderContent(Option<String>),

    /// `<js @content-for="slot">…</js>`
    ContentFor(ContentFor),

    /// `{% statement %}`: evaluated for its side effects.
    Expression(Statement),

    /// `{%= statement %}`: evaluated and rendered.
    PrintExpression(Statement),

    /// `{%# … %}`: discarded.
    CommentExpression(String),

    /// `<js @layout="path" />`: only valid as the first node.
    Layout(String),
}

/// An HTML element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag_name: String,
    pub is_void: bool,
    pub is_self_closing: bool,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

/// An attribute and the position it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    /// `name`, `name="literal {%= expr %} mixed"`. No values means a
    /// boolean attribute.
    Normal {
        name: String,
        quote: Option<char>,
        values: Option<Vec<AttributeValue>>,
    },

    /// `[name]="expr"`
    Expression {
        name: String,
        quote: char,
        expression: Expression,
    },

    /// `[?name]="condition"`: present as a boolean attribute when truthy.
    Conditional {
        name: String,
        quote: char,
        condition: Expression,
    },

    /// `[name.suffix]="condition"`: appends `suffix` to `name` when truthy.
    Append {
        name: String,
        quote: char,
        suffix: String,
        condition: Expression,
    },
}

impl AttributeKind {
    pub fn name(&self) -> &str {
        match self {
            AttributeKind::Normal { name, .. }
            | AttributeKind::Expression { name, .. }
            | AttributeKind::Conditional { name, .. }
            | AttributeKind::Append { name, .. } => name,
        }
    }
}

/// One segment of a normal attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Literal(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Print {
    pub expression: Expression,
    pub block: Option<PrintBlock>,
}

/// The body of a print with a block, callable from the print expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintBlock {
    pub params: Vec<String>,
    pub children: Vec<Node>,
}

/// Shared shape of `if` and `else-if`.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Expression,
    pub children: Vec<Node>,
    /// An `ElseIf` or `Else` node.
    pub alternate: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub expression: Expression,
    pub cases: Vec<Case>,
    pub default: Option<DefaultCase>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub expression: Expression,
    pub children: Vec<Node>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultCase {
    pub children: Vec<Node>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Foreach {
    /// One or two unique names.
    pub identifiers: Vec<String>,
    pub collection: Expression,
    pub children: Vec<Node>,
    /// An `Else` node rendered when the collection yields nothing.
    pub alternate: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub condition: Expression,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Render {
    pub view_path: String,
    pub context: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentFor {
    pub slot: String,
    pub children: Vec<Node>,
}
