//! AST to step lowering.
//!
//! Walks the document once, node by node. Control-flow nodes become
//! wrappers around their lowered bodies; everything else becomes a single
//! runtime step or nothing.

use std::sync::Arc;

use hexel_parser::ast::{
    AttributeKind, Conditional, Document, Element, Node, NodeKind, Print, Switch,
};

use crate::program::{AttributeBuilder, Program, Step};
use crate::CompileError;

/// Lower a parsed document into a program.
pub fn lower(doc: &Document) -> Result<Program, CompileError> {
    let mut steps = Vec::with_capacity(doc.nodes.len());

    for (index, node) in doc.nodes.iter().enumerate() {
        match &node.kind {
            NodeKind::Layout(path) if index == 0 => steps.push(Step::SetLayout(path.clone())),
            _ => lower_node(node, &mut steps)?,
        }
    }

    Ok(Program { steps })
}

fn lower_nodes(nodes: &[Node]) -> Result<Vec<Step>, CompileError> {
    let mut steps = Vec::with_capacity(nodes.len());
    for node in nodes {
        lower_node(node, &mut steps)?;
    }
    Ok(steps)
}

fn lower_node(node: &Node, out: &mut Vec<Step>) -> Result<(), CompileError> {
    match &node.kind {
        NodeKind::Text(text) | NodeKind::Whitespace(text) => out.push(Step::Text(text.clone())),
        NodeKind::Comment(text) => out.push(Step::Comment(text.clone())),
        NodeKind::CData(text) => out.push(Step::CData(text.clone())),
        NodeKind::Doctype => out.push(Step::Doctype),

        NodeKind::Element(el) => lower_element(el, out)?,

        NodeKind::Scope(children) => out.push(Step::Block(lower_nodes(children)?)),
        NodeKind::Print(print) => out.push(lower_print(print)?),
        NodeKind::If(conditional) => out.push(lower_conditional(conditional)?),
        NodeKind::ElseIf(_) | NodeKind::Else(_) => {
            return Err(CompileError::at(
                "Found an else branch that does not follow an if block",
                node.position,
            ));
        }
        NodeKind::Switch(switch) => out.push(lower_switch(switch)?),
        NodeKind::Foreach(foreach) => {
            let empty = match &foreach.alternate {
                None => None,
                Some(alternate) => match &alternate.kind {
                    NodeKind::Else(children) => Some(lower_nodes(children)?),
                    _ => {
                        return Err(CompileError::at(
                            "A foreach block can only be followed by an else block",
                            alternate.position,
                        ));
                    }
                },
            };
            out.push(Step::Foreach {
                identifiers: foreach.identifiers.clone(),
                collection: foreach.collection.clone(),
                body: lower_nodes(&foreach.children)?,
                empty,
            });
        }
        NodeKind::While(block) => out.push(Step::While {
            condition: block.condition.clone(),
            body: lower_nodes(&block.children)?,
        }),

        NodeKind::Render(render) => out.push(Step::RenderPartial {
            view_path: render.view_path.clone(),
            context: render.context.clone(),
            position: node.position,
        }),
        NodeKind::RenderContent(slot) => out.push(Step::RenderContent(slot.clone())),
        NodeKind::ContentFor(content) => {
            out.push(Step::SaveTarget);
            out.push(Step::Block(lower_nodes(&content.children)?));
            out.push(Step::MergeTarget(content.slot.clone()));
        }

        NodeKind::Expression(statement) => out.push(Step::Execute(statement.clone())),
        NodeKind::PrintExpression(statement) => {
            out.push(Step::RenderStatement(statement.clone()))
        }
        NodeKind::CommentExpression(_) => {}

        NodeKind::Layout(_) => {
            return Err(CompileError::at(
                "A layout can only be declared as the first node of a view",
                node.position,
            ));
        }
    }

    Ok(())
}

fn lower_element(el: &Element, out: &mut Vec<Step>) -> Result<(), CompileError> {
    let attributes = el
        .attributes
        .iter()
        .map(|attribute| match &attribute.kind {
            AttributeKind::Normal {
                name,
                quote,
                values,
            } => AttributeBuilder::Normal {
                name: name.clone(),
                quote: *quote,
                values: values.clone(),
            },
            AttributeKind::Expression {
                name,
                quote,
                expression,
            } => AttributeBuilder::Expression {
                name: name.clone(),
                quote: *quote,
                expression: expression.clone(),
            },
            AttributeKind::Conditional {
                name, condition, ..
            } => AttributeBuilder::Conditional {
                name: name.clone(),
                condition: condition.clone(),
            },
            AttributeKind::Append {
                name,
                quote,
                suffix,
                condition,
            } => AttributeBuilder::Append {
                name: name.clone(),
                quote: *quote,
                value: suffix.clone(),
                condition: condition.clone(),
            },
        })
        .collect();

    out.push(Step::OpenTag {
        tag_name: el.tag_name.clone(),
        attributes,
    });

    if el.is_void || el.is_self_closing {
        return Ok(());
    }

    for child in &el.children {
        lower_node(child, out)?;
    }
    out.push(Step::CloseTag(el.tag_name.clone()));
    Ok(())
}

fn lower_print(print: &Print) -> Result<Step, CompileError> {
    let Some(block) = &print.block else {
        return Ok(Step::RenderValue(print.expression.clone()));
    };

    let body: Arc<[Step]> = lower_nodes(&block.children)?.into();
    Ok(Step::PrintBlock {
        expression: print.expression.clone(),
        params: block.params.clone(),
        body,
    })
}

fn lower_conditional(conditional: &Conditional) -> Result<Step, CompileError> {
    let alternate = match &conditional.alternate {
        None => None,
        Some(node) => Some(match &node.kind {
            NodeKind::ElseIf(nested) => vec![lower_conditional(nested)?],
            NodeKind::Else(children) => lower_nodes(children)?,
            _ => {
                return Err(CompileError::at(
                    "An if block can only be followed by else-if or else",
                    node.position,
                ));
            }
        }),
    };

    Ok(Step::If {
        condition: conditional.condition.clone(),
        consequent: lower_nodes(&conditional.children)?,
        alternate,
    })
}

fn lower_switch(switch: &Switch) -> Result<Step, CompileError> {
    let cases = switch
        .cases
        .iter()
        .map(|case| Ok((case.expression.clone(), lower_nodes(&case.children)?)))
        .collect::<Result<Vec<_>, CompileError>>()?;

    let default = match &switch.default {
        Some(default) => Some(lower_nodes(&default.children)?),
        None => None,
    };

    Ok(Step::Switch {
        expression: switch.expression.clone(),
        cases,
        default,
    })
}
