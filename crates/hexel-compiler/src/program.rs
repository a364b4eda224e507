//! The executable form of a view.
//!
//! A [`Program`] is a tree of [`Step`]s: literal output, runtime calls, and
//! control-flow wrappers around nested step lists. Programs hold no render
//! state and can be shared between concurrent renders.

use std::fmt;
use std::sync::Arc;

use hexel_expr::{Expression, Position, Statement};
use hexel_parser::ast::AttributeValue;

/// A compiled view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub steps: Vec<Step>,
}

impl Program {
    /// The layout this program registers when run as a full render.
    pub fn layout(&self) -> Option<&str> {
        match self.steps.first() {
            Some(Step::SetLayout(path)) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Literal text, emitted as is.
    Text(String),
    /// Emits `<!--…-->`.
    Comment(String),
    /// Emits `<![CDATA[…]]>`.
    CData(String),
    /// Emits `<!DOCTYPE html>`.
    Doctype,

    OpenTag {
        tag_name: String,
        attributes: Vec<AttributeBuilder>,
    },
    CloseTag(String),

    /// Nested steps in a fresh lexical frame.
    Block(Vec<Step>),

    If {
        condition: Expression,
        consequent: Vec<Step>,
        alternate: Option<Vec<Step>>,
    },

    /// Strict-equality dispatch with no fallthrough.
    Switch {
        expression: Expression,
        cases: Vec<(Expression, Vec<Step>)>,
        default: Option<Vec<Step>>,
    },

    Foreach {
        identifiers: Vec<String>,
        collection: Expression,
        body: Vec<Step>,
        /// Runs only when the collection yields nothing.
        empty: Option<Vec<Step>>,
    },

    While {
        condition: Expression,
        body: Vec<Step>,
    },

    RenderPartial {
        view_path: String,
        context: Option<Expression>,
        position: Position,
    },
    RenderContent(Option<String>),

    /// Push a fresh render target.
    SaveTarget,
    /// Pop the current target and merge it into the parent, routing its
    /// default buffer into the named slot.
    MergeTarget(String),

    /// Evaluate and emit.
    RenderValue(Expression),
    /// Evaluate a statement and emit its result.
    RenderStatement(Statement),
    /// Bind `body` as `$block`, then evaluate and emit `expression`.
    PrintBlock {
        expression: Expression,
        params: Vec<String>,
        body: Arc<[Step]>,
    },

    /// Execute a statement for its side effects.
    Execute(Statement),

    SetLayout(String),
}

/// How one attribute of an element is produced at render time.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeBuilder {
    /// `None` values mean a boolean attribute.
    Normal {
        name: String,
        quote: Option<char>,
        values: Option<Vec<AttributeValue>>,
    },
    Expression {
        name: String,
        quote: char,
        expression: Expression,
    },
    Conditional {
        name: String,
        condition: Expression,
    },
    Append {
        name: String,
        quote: char,
        value: String,
        condition: Expression,
    },
}

// =========================================================================
// Listing
// =========================================================================

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_steps(f, &self.steps, 0)
    }
}

fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[Step], depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);

    for step in steps {
        match step {
            Step::Text(text) => writeln!(f, "{indent}text {text:?}")?,
            Step::Comment(text) => writeln!(f, "{indent}comment {text:?}")?,
            Step::CData(text) => writeln!(f, "{indent}cdata {text:?}")?,
            Step::Doctype => writeln!(f, "{indent}doctype")?,
            Step::OpenTag {
                tag_name,
                attributes,
            } => {
                write!(f, "{indent}open <{tag_name}>")?;
                for attribute in attributes {
                    write!(f, " {attribute}")?;
                }
                writeln!(f)?;
            }
            Step::CloseTag(tag_name) => writeln!(f, "{indent}close </{tag_name}>")?,
            Step::Block(body) => {
                writeln!(f, "{indent}block")?;
                write_steps(f, body, depth + 1)?;
            }
            Step::If {
                condition,
                consequent,
                alternate,
            } => {
                writeln!(f, "{indent}if {}", condition.source().trim())?;
                write_steps(f, consequent, depth + 1)?;
                if let Some(alternate) = alternate {
                    writeln!(f, "{indent}else")?;
                    write_steps(f, alternate, depth + 1)?;
                }
            }
            Step::Switch {
                expression,
                cases,
                default,
            } => {
                writeln!(f, "{indent}switch {}", expression.source().trim())?;
                for (case, body) in cases {
                    writeln!(f, "{indent}  case {}", case.source().trim())?;
                    write_steps(f, body, depth + 2)?;
                }
                if let Some(body) = default {
                    writeln!(f, "{indent}  default")?;
                    write_steps(f, body, depth + 2)?;
                }
            }
            Step::Foreach {
                identifiers,
                collection,
                body,
                empty,
            } => {
                writeln!(
                    f,
                    "{indent}foreach {} in {}",
                    identifiers.join(", "),
                    collection.source().trim()
                )?;
                write_steps(f, body, depth + 1)?;
                if let Some(empty) = empty {
                    writeln!(f, "{indent}else")?;
                    write_steps(f, empty, depth + 1)?;
                }
            }
            Step::While { condition, body } => {
                writeln!(f, "{indent}while {}", condition.source().trim())?;
                write_steps(f, body, depth + 1)?;
            }
            Step::RenderPartial {
                view_path, context, ..
            } => match context {
                Some(context) => writeln!(
                    f,
                    "{indent}render {view_path:?} with {}",
                    context.source().trim()
                )?,
                None => writeln!(f, "{indent}render {view_path:?}")?,
            },
            Step::RenderContent(None) => writeln!(f, "{indent}render-content")?,
            Step::RenderContent(Some(slot)) => writeln!(f, "{indent}render-content {slot:?}")?,
            Step::SaveTarget => writeln!(f, "{indent}save-target")?,
            Step::MergeTarget(slot) => writeln!(f, "{indent}merge-target {slot:?}")?,
            Step::RenderValue(expression) => {
                writeln!(f, "{indent}print {}", expression.source().trim())?
            }
            Step::RenderStatement(statement) => {
                writeln!(f, "{indent}print {}", statement.source().trim())?
            }
            Step::PrintBlock {
                expression,
                params,
                body,
            } => {
                writeln!(
                    f,
                    "{indent}print {} with block({})",
                    expression.source().trim(),
                    params.join(", ")
                )?;
                write_steps(f, body, depth + 1)?;
            }
            Step::Execute(statement) => {
                writeln!(f, "{indent}execute {}", statement.source().trim())?
            }
            Step::SetLayout(path) => writeln!(f, "{indent}layout {path:?}")?,
        }
    }

    Ok(())
}

impl fmt::Display for AttributeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeBuilder::Normal {
                name,
                quote,
                values,
            } => {
                let Some(values) = values else {
                    return f.write_str(name);
                };
                let quote = quote.unwrap_or('"');
                write!(f, "{name}={quote}")?;
                for value in values {
                    match value {
                        AttributeValue::Literal(text) => f.write_str(text)?,
                        AttributeValue::Expression(expression) => {
                            write!(f, "{{{}}}", expression.source().trim())?
                        }
                    }
                }
                write!(f, "{quote}")
            }
            AttributeBuilder::Expression {
                name, expression, ..
            } => write!(f, "[{name}]={}", expression.source().trim()),
            AttributeBuilder::Conditional { name, condition } => {
                write!(f, "[?{name}]={}", condition.source().trim())
            }
            AttributeBuilder::Append {
                name,
                value,
                condition,
                ..
            } => write!(f, "[{name}.{value}]={}", condition.source().trim()),
        }
    }
}
