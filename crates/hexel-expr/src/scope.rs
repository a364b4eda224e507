use indexmap::IndexMap;

use crate::{EvalError, Value};

/// Variable environment an expression is evaluated against.
///
/// The runtime implements this over its lexical frames and the render
/// context; [`MapScope`] is a flat standalone implementation.
pub trait Scope {
    /// Resolve a name. `None` when nothing is bound.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Update an existing binding.
    fn assign(&mut self, name: &str, value: Value) -> Result<(), EvalError>;

    /// Bind a new variable in the innermost frame.
    fn declare(&mut self, name: &str, value: Value);

    /// Value of `this`.
    fn this_value(&self) -> Value;

    /// Invoke a template block callable.
    fn call_block(&mut self, index: usize, args: &[Value]) -> Result<Value, EvalError>;
}

/// A single flat frame of variables.
#[derive(Debug, Clone, Default)]
pub struct MapScope {
    vars: IndexMap<String, Value>,
    this: Value,
}

impl MapScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_this(this: Value) -> Self {
        Self {
            vars: IndexMap::new(),
            this,
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

impl Scope for MapScope {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        match self.vars.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(EvalError::Reference(format!("{name} is not defined"))),
        }
    }

    fn declare(&mut self, name: &str, value: Value) {
        self.set(name, value);
    }

    fn this_value(&self) -> Value {
        self.this.clone()
    }

    fn call_block(&mut self, _index: usize, _args: &[Value]) -> Result<Value, EvalError> {
        Err(EvalError::Type(
            "template blocks can only be called during a render".into(),
        ))
    }
}
