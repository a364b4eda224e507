//! Step interpreter.
//!
//! A [`Runtime`] backs exactly one top-level render call. It owns the render
//! target stack, the lexical frames, the block table and the layout state,
//! and is dropped once the call returns.

use std::sync::Arc;

use hexel_compiler::{AttributeBuilder, Program, Step};
use hexel_expr::{EvalError, Expression, Function, Position, Scope, Statement, Value};
use hexel_parser::ast::AttributeValue;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::attribute_set::AttributeSet;
use crate::collection::create_collection;
use crate::environment::Environment;
use crate::render_target::RenderTarget;
use crate::RenderError;

/// Name the body of a print block is bound to inside its expression.
pub const BLOCK_BINDING: &str = "$block";

/// Deepest nesting of partial renders and block calls in one render.
pub const MAX_RENDER_DEPTH: usize = 32;

type Frame = IndexMap<String, Value>;

/// A print-block body callable as `Function::Block(index)`.
#[derive(Clone)]
struct BlockBody {
    params: Vec<String>,
    steps: Arc<[Step]>,
    position: Position,
}

pub struct Runtime<'env> {
    environment: &'env Environment,
    target: RenderTarget,
    target_stack: Vec<RenderTarget>,
    layout_stack: Vec<String>,
    pending_layout: Option<String>,
    context: Value,
    frames: Vec<Frame>,
    blocks: Vec<BlockBody>,
    /// Nesting depth of partial renders; layouts are ignored inside one.
    partial_depth: usize,
    /// Partial renders and block calls currently on the stack.
    depth: usize,
}

impl<'env> Runtime<'env> {
    pub fn new(environment: &'env Environment, context: Value) -> Self {
        Self {
            environment,
            target: RenderTarget::new(),
            target_stack: Vec::new(),
            layout_stack: Vec::new(),
            pending_layout: None,
            context,
            frames: vec![Frame::new()],
            blocks: Vec::new(),
            partial_depth: 0,
            depth: 0,
        }
    }

    /// Run `program` as a full render, followed by its layout chain.
    ///
    /// The environment's default layout is registered first, so it takes
    /// precedence over a `@layout` declared by the view.
    pub fn render(&mut self, program: &Program) -> Result<(), RenderError> {
        let environment = self.environment;
        if let Some(layout) = &environment.options().default_layout {
            self.set_layout(layout);
        }

        self.execute(&program.steps)?;
        self.render_layout()
    }

    /// Run `program` as a partial: its layout declaration is ignored.
    pub fn render_partial(&mut self, program: &Program) -> Result<(), RenderError> {
        self.partial_depth += 1;
        let result = self.execute(&program.steps);
        self.partial_depth -= 1;
        result
    }

    /// The default buffer of the current target.
    pub fn output(&self) -> &str {
        self.target.get_default()
    }

    pub fn into_output(self) -> String {
        self.target.into_default()
    }

    // --- Render targets ---

    pub fn save_render_target(&mut self) {
        trace!(depth = self.target_stack.len() + 1, "saving render target");
        let previous = std::mem::take(&mut self.target);
        self.target_stack.push(previous);
    }

    /// Reinstate the previously saved target and hand back the finished one.
    /// `None` when nothing was saved.
    pub fn restore_render_target(&mut self) -> Option<RenderTarget> {
        let previous = self.target_stack.pop()?;
        trace!(depth = self.target_stack.len(), "restoring render target");
        Some(std::mem::replace(&mut self.target, previous))
    }

    pub fn merge_render_target(&mut self, slot: &str) {
        if let Some(finished) = self.restore_render_target() {
            self.target.merge(finished, Some(slot));
        }
    }

    // --- Output ---

    pub fn render_text(&mut self, text: &str) {
        self.target.append(text);
    }

    pub fn render_comment(&mut self, text: &str) {
        self.target.append("<!--");
        self.target.append(text);
        self.target.append("-->");
    }

    pub fn render_cdata(&mut self, text: &str) {
        self.target.append("<![CDATA[");
        self.target.append(text);
        self.target.append("]]>");
    }

    pub fn render_doctype(&mut self) {
        self.target.append("<!DOCTYPE html>");
    }

    pub fn render_open_tag(&mut self, tag_name: &str, attributes: &AttributeSet) {
        self.target.append("<");
        self.target.append(tag_name);
        self.target.append(&attributes.to_string());
        self.target.append(">");
    }

    pub fn render_close_tag(&mut self, tag_name: &str) {
        self.target.append("</");
        self.target.append(tag_name);
        self.target.append(">");
    }

    /// Emit a value's display text. Null and undefined emit nothing.
    pub fn render_value(&mut self, value: &Value) {
        if !value.is_nullish() {
            self.target.append(&value.to_string());
        }
    }

    /// Emit a named slot, or the layout content when no slot is given.
    pub fn render_content(&mut self, slot: Option<&str>) {
        let content = match slot {
            Some(slot) => self.target.get(slot).to_string(),
            None => self.target.layout_content().to_string(),
        };
        self.target.append(&content);
    }

    // --- Views ---

    /// Register the layout for this render. The first call wins.
    pub fn set_layout(&mut self, path: &str) {
        if self.pending_layout.is_none() {
            self.pending_layout = Some(path.to_string());
        }
    }

    /// Apply the pending layout, and any layout it declares in turn.
    pub fn render_layout(&mut self) -> Result<(), RenderError> {
        while let Some(path) = self.pending_layout.take() {
            let key = self.environment.resolve_view(&path)?;
            if self.layout_stack.contains(&key) {
                let mut chain = self.layout_stack.clone();
                chain.push(key);
                return Err(RenderError::LayoutCycle { chain });
            }

            let program = self.environment.compile_view(&path)?;
            debug!(layout = %key, "applying layout");
            self.layout_stack.push(key);

            self.target.start_layout();
            self.frames = vec![Frame::new()];
            self.execute(&program.steps)?;
        }
        Ok(())
    }

    /// Render another view inline into the current target. `overrides`
    /// fields are merged over the current context.
    pub fn render_partial_view(
        &mut self,
        path: &str,
        overrides: Option<Value>,
        position: Position,
    ) -> Result<(), RenderError> {
        self.enter(path, position)?;
        let result = self.render_partial_inline(path, overrides, position);
        self.depth -= 1;
        result
    }

    fn render_partial_inline(
        &mut self,
        path: &str,
        overrides: Option<Value>,
        position: Position,
    ) -> Result<(), RenderError> {
        let program = self.environment.compile_view(path)?;

        let mut fields = match &self.context {
            Value::Object(fields) => fields.clone(),
            _ => IndexMap::new(),
        };
        match overrides {
            None | Some(Value::Null) | Some(Value::Undefined) => {}
            Some(Value::Object(extra)) => fields.extend(extra),
            Some(other) => {
                return Err(RenderError::InvalidContext {
                    type_name: other.type_name(),
                    line: position.line,
                    column: position.column,
                });
            }
        }

        debug!(view = path, "rendering partial");
        let context = std::mem::replace(&mut self.context, Value::Object(fields));
        let frames = std::mem::replace(&mut self.frames, vec![Frame::new()]);

        let result = self.render_partial(&program);

        self.frames = frames;
        self.context = context;
        result
    }

    /// Count one more nested partial or block call, failing past the limit.
    fn enter(&mut self, name: &str, position: Position) -> Result<(), RenderError> {
        if self.depth >= MAX_RENDER_DEPTH {
            return Err(RenderError::RecursionLimit {
                name: name.to_string(),
                limit: MAX_RENDER_DEPTH,
                line: position.line,
                column: position.column,
            });
        }
        self.depth += 1;
        Ok(())
    }

    // --- Execution ---

    fn execute(&mut self, steps: &[Step]) -> Result<(), RenderError> {
        for step in steps {
            self.execute_step(step)?;
        }
        Ok(())
    }

    fn execute_in_frame(&mut self, steps: &[Step], frame: Frame) -> Result<(), RenderError> {
        self.frames.push(frame);
        let result = self.execute(steps);
        self.frames.pop();
        result
    }

    fn execute_step(&mut self, step: &Step) -> Result<(), RenderError> {
        match step {
            Step::Text(text) => self.render_text(text),
            Step::Comment(text) => self.render_comment(text),
            Step::CData(text) => self.render_cdata(text),
            Step::Doctype => self.render_doctype(),

            Step::OpenTag {
                tag_name,
                attributes,
            } => {
                let attributes = self.build_attributes(attributes)?;
                self.render_open_tag(tag_name, &attributes);
            }
            Step::CloseTag(tag_name) => self.render_close_tag(tag_name),

            Step::Block(body) => self.execute_in_frame(body, Frame::new())?,

            Step::If {
                condition,
                consequent,
                alternate,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_in_frame(consequent, Frame::new())?;
                } else if let Some(alternate) = alternate {
                    self.execute_in_frame(alternate, Frame::new())?;
                }
            }

            Step::Switch {
                expression,
                cases,
                default,
            } => {
                let value = self.evaluate(expression)?;
                let mut matched = false;
                for (case, body) in cases {
                    if self.evaluate(case)?.strict_equals(&value) {
                        self.execute_in_frame(body, Frame::new())?;
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    if let Some(body) = default {
                        self.execute_in_frame(body, Frame::new())?;
                    }
                }
            }

            Step::Foreach {
                identifiers,
                collection,
                body,
                empty,
            } => {
                let value = self.evaluate(collection)?;
                let tuples = create_collection(&value, collection.position())?;

                if tuples.is_empty() {
                    if let Some(empty) = empty {
                        self.execute_in_frame(empty, Frame::new())?;
                    }
                    return Ok(());
                }

                for tuple in tuples {
                    let frame: Frame = identifiers.iter().cloned().zip(tuple).collect();
                    self.execute_in_frame(body, frame)?;
                }
            }

            Step::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute_in_frame(body, Frame::new())?;
                }
            }

            Step::RenderPartial {
                view_path,
                context,
                position,
            } => {
                let overrides = match context {
                    Some(context) => Some(self.evaluate(context)?),
                    None => None,
                };
                self.render_partial_view(view_path, overrides, *position)?;
            }
            Step::RenderContent(slot) => self.render_content(slot.as_deref()),

            Step::SaveTarget => self.save_render_target(),
            Step::MergeTarget(slot) => self.merge_render_target(slot),

            Step::RenderValue(expression) => {
                let value = self.evaluate(expression)?;
                self.render_value(&value);
            }
            Step::RenderStatement(statement) => {
                let value = self.run_statement(statement)?;
                self.render_value(&value);
            }
            Step::PrintBlock {
                expression,
                params,
                body,
            } => {
                let index = self.block_index(params, body, expression.position());

                let mut frame = Frame::new();
                frame.insert(
                    BLOCK_BINDING.to_string(),
                    Value::Function(Function::Block(index)),
                );
                self.frames.push(frame);
                let value = self.evaluate(expression);
                self.frames.pop();

                self.render_value(&value?);
            }

            Step::Execute(statement) => {
                self.run_statement(statement)?;
            }

            Step::SetLayout(path) => {
                if self.partial_depth == 0 {
                    self.set_layout(path);
                }
            }
        }

        Ok(())
    }

    /// Table index for a print-block body. Each body is registered once per
    /// render, however often its step runs.
    fn block_index(
        &mut self,
        params: &[String],
        body: &Arc<[Step]>,
        position: Position,
    ) -> usize {
        if let Some(index) = self
            .blocks
            .iter()
            .position(|block| Arc::ptr_eq(&block.steps, body))
        {
            return index;
        }
        self.blocks.push(BlockBody {
            params: params.to_vec(),
            steps: Arc::clone(body),
            position,
        });
        self.blocks.len() - 1
    }

    fn build_attributes(
        &mut self,
        builders: &[AttributeBuilder],
    ) -> Result<AttributeSet, RenderError> {
        let mut set = AttributeSet::new();

        for builder in builders {
            match builder {
                AttributeBuilder::Normal {
                    name,
                    quote,
                    values,
                } => match values {
                    None => set.set_boolean(name),
                    Some(values) => {
                        let mut text = String::new();
                        for value in values {
                            match value {
                                AttributeValue::Literal(literal) => text.push_str(literal),
                                AttributeValue::Expression(expression) => {
                                    text.push_str(&self.evaluate(expression)?.to_string())
                                }
                            }
                        }
                        set.set_value(name, quote.unwrap_or('"'), text);
                    }
                },
                AttributeBuilder::Expression {
                    name,
                    quote,
                    expression,
                } => {
                    let value = self.evaluate(expression)?;
                    set.set_value(name, *quote, value.to_string());
                }
                AttributeBuilder::Conditional { name, condition } => {
                    if self.evaluate(condition)?.is_truthy() {
                        set.set_boolean(name);
                    }
                }
                AttributeBuilder::Append {
                    name,
                    quote,
                    value,
                    condition,
                } => {
                    if self.evaluate(condition)?.is_truthy() {
                        set.append_value(name, *quote, value);
                    }
                }
            }
        }

        Ok(set)
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, RenderError> {
        expression
            .evaluate(self)
            .map_err(|err| RenderError::evaluation(err, expression.position()))
    }

    fn run_statement(&mut self, statement: &Statement) -> Result<Value, RenderError> {
        statement
            .execute(self)
            .map_err(|err| RenderError::evaluation(err, statement.position()))
    }
}

/// Lookup order: lexical frames innermost first, then the render context,
/// then the environment's helpers.
impl Scope for Runtime<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.frames.iter().rev().find_map(|frame| frame.get(name)) {
            return Some(value.clone());
        }
        if let Value::Object(fields) = &self.context {
            if let Some(value) = fields.get(name) {
                return Some(value.clone());
            }
        }
        self.environment.helper(name).cloned()
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        if let Some(slot) = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.get_mut(name))
        {
            *slot = value;
            return Ok(());
        }
        if let Value::Object(fields) = &mut self.context {
            if let Some(slot) = fields.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        Err(EvalError::Reference(format!("{name} is not defined")))
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    fn this_value(&self) -> Value {
        self.context.clone()
    }

    fn call_block(&mut self, index: usize, args: &[Value]) -> Result<Value, EvalError> {
        let Some(block) = self.blocks.get(index).cloned() else {
            return Err(EvalError::custom(format!("No block is bound at index {index}")));
        };

        let frame: Frame = block
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| (param.clone(), args.get(i).cloned().unwrap_or_default()))
            .collect();

        self.enter(BLOCK_BINDING, block.position)
            .map_err(|err| EvalError::Host(Box::new(err)))?;
        self.save_render_target();
        let result = self.execute_in_frame(&block.steps, frame);
        let captured = self.restore_render_target();
        self.depth -= 1;
        result.map_err(|err| EvalError::Host(Box::new(err)))?;

        Ok(Value::String(
            captured.map(RenderTarget::into_default).unwrap_or_default(),
        ))
    }
}
