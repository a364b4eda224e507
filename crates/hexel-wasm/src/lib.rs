//! WASM bindings for Hexel.
//!
//! Templates rendered here have no view directory: any `@render` or
//! `@layout` they reference fails with a view-not-found error.

use hexel_runtime::{Environment, EnvironmentOptions, MemoryLoader, RenderError};
use wasm_bindgen::prelude::*;

/// Outcome of [`check`], mirrored into a plain JS object.
#[derive(Debug, Clone, PartialEq)]
struct Diagnostic {
    message: String,
    line: usize,
    column: usize,
}

fn environment() -> Result<Environment, RenderError> {
    Environment::with_loader(EnvironmentOptions::default(), MemoryLoader::new())
}

fn render_json(source: &str, context: serde_json::Value) -> Result<String, RenderError> {
    environment()?.render_string(source, context)
}

fn diagnose(source: &str) -> Option<Diagnostic> {
    let err = match environment().and_then(|env| env.compile_source(source, "<string>")) {
        Ok(_) => return None,
        Err(err) => err,
    };

    let position = err.position().unwrap_or_default();
    let message = match &err {
        RenderError::Parse { source, .. } => source.to_string(),
        RenderError::Compile { source, .. } => source.to_string(),
        other => other.to_string(),
    };

    Some(Diagnostic {
        message,
        line: position.line,
        column: position.column,
    })
}

/// Render template source with a JS object as `this`.
///
/// An `undefined` context renders against an empty object.
#[wasm_bindgen]
pub fn render_string(source: &str, context: JsValue) -> Result<String, JsError> {
    let context = if context.is_undefined() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_wasm_bindgen::from_value(context).map_err(|e| JsError::new(&e.to_string()))?
    };

    render_json(source, context).map_err(|e| JsError::new(&e.to_string()))
}

/// Parse and compile template source.
///
/// Returns `{ ok: true }` or `{ ok: false, message, line, column }`.
#[wasm_bindgen]
pub fn check(source: &str) -> Result<JsValue, JsError> {
    let js_obj = js_sys::Object::new();
    let set = |key: &str, value: JsValue| {
        js_sys::Reflect::set(&js_obj, &key.into(), &value)
            .map(|_| ())
            .map_err(|_| JsError::new(&format!("Failed to set {key} property")))
    };

    match diagnose(source) {
        None => set("ok", true.into())?,
        Some(diagnostic) => {
            set("ok", false.into())?;
            set("message", diagnostic.message.into())?;
            set("line", (diagnostic.line as u32).into())?;
            set("column", (diagnostic.column as u32).into())?;
        }
    }

    Ok(js_obj.into())
}

/// Get the engine version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
