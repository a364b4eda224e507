//! View lookup, compilation and caching.
//!
//! An [`Environment`] resolves view paths through a [`ViewLoader`], parses
//! and compiles each view lazily, and optionally keeps the compiled
//! programs by canonical path. Cached programs are never invalidated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use hexel_compiler::{compile, Program};
use hexel_expr::{EvalError, Function, Value};
use hexel_lexer::LexerOptions;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::runtime::Runtime;
use crate::RenderError;

/// Name reported for views rendered from a string.
const STRING_VIEW: &str = "<string>";

/// Environment configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EnvironmentOptions {
    /// Directory view paths are resolved against.
    pub root: PathBuf,
    pub cache_views: bool,
    pub lexer: LexerOptions,
    /// Layout registered before every full render. It takes precedence
    /// over a view's own `@layout`.
    pub default_layout: Option<String>,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("views"),
            cache_views: true,
            lexer: LexerOptions::default(),
            default_layout: None,
        }
    }
}

/// Source of view templates.
pub trait ViewLoader: Send + Sync {
    /// Canonical key for `path`; `ViewNotFound` when there is no such view.
    fn resolve(&self, path: &str) -> Result<String, RenderError>;

    /// Source text for a key returned by [`ViewLoader::resolve`].
    fn load(&self, key: &str) -> Result<String, RenderError>;
}

/// Loads views from a directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ViewLoader for FileLoader {
    fn resolve(&self, path: &str) -> Result<String, RenderError> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Err(RenderError::ViewNotFound(path.to_string()));
        }
        let canonical = full.canonicalize().map_err(|source| RenderError::Io {
            path: path.to_string(),
            source,
        })?;
        Ok(canonical.to_string_lossy().into_owned())
    }

    fn load(&self, key: &str) -> Result<String, RenderError> {
        std::fs::read_to_string(key).map_err(|source| RenderError::Io {
            path: key.to_string(),
            source,
        })
    }
}

/// Views held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    views: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, path: &str, source: &str) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: &str, source: &str) {
        self.views.insert(normalize(path), source.to_string());
    }
}

impl ViewLoader for MemoryLoader {
    fn resolve(&self, path: &str) -> Result<String, RenderError> {
        let key = normalize(path);
        if self.views.contains_key(&key) {
            Ok(key)
        } else {
            Err(RenderError::ViewNotFound(path.to_string()))
        }
    }

    fn load(&self, key: &str) -> Result<String, RenderError> {
        self.views
            .get(key)
            .cloned()
            .ok_or_else(|| RenderError::ViewNotFound(key.to_string()))
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").trim_start_matches('/').to_string()
}

/// Shared, immutable-after-setup rendering environment.
pub struct Environment {
    options: EnvironmentOptions,
    loader: Box<dyn ViewLoader>,
    cache: Mutex<HashMap<String, Arc<Program>>>,
    helpers: IndexMap<String, Value>,
}

impl Environment {
    /// An environment loading views from `options.root`.
    pub fn new(options: EnvironmentOptions) -> Result<Self, RenderError> {
        let loader = FileLoader::new(options.root.clone());
        Self::with_loader(options, loader)
    }

    pub fn with_loader(
        options: EnvironmentOptions,
        loader: impl ViewLoader + 'static,
    ) -> Result<Self, RenderError> {
        options.lexer.validate()?;
        Ok(Self {
            options,
            loader: Box::new(loader),
            cache: Mutex::new(HashMap::new()),
            helpers: IndexMap::new(),
        })
    }

    pub fn options(&self) -> &EnvironmentOptions {
        &self.options
    }

    /// Install a native function visible to every template by `name`.
    pub fn register_helper<F>(&mut self, name: &str, helper: F)
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.helpers
            .insert(name.to_string(), Value::Function(Function::native(helper)));
    }

    pub fn helper(&self, name: &str) -> Option<&Value> {
        self.helpers.get(name)
    }

    pub fn resolve_view(&self, path: &str) -> Result<String, RenderError> {
        self.loader.resolve(path)
    }

    /// The compiled program for `path`, from the cache when enabled.
    pub fn compile_view(&self, path: &str) -> Result<Arc<Program>, RenderError> {
        let key = self.loader.resolve(path)?;

        if self.options.cache_views {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(program) = cache.get(&key) {
                debug!(view = %key, "view served from cache");
                return Ok(Arc::clone(program));
            }
        }

        debug!(view = %key, "loading view");
        let source = self.loader.load(&key)?;
        let program = Arc::new(self.compile_source(&source, &key)?);
        debug!(view = %key, steps = program.steps.len(), "compiled view");

        if self.options.cache_views {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.insert(key, Arc::clone(&program));
        }

        Ok(program)
    }

    /// Parse and compile `source`; `name` labels any error.
    pub fn compile_source(&self, source: &str, name: &str) -> Result<Program, RenderError> {
        let doc = hexel_parser::parse(source, &self.options.lexer).map_err(|source| {
            RenderError::Parse {
                path: name.to_string(),
                source,
            }
        })?;
        compile(&doc).map_err(|source| RenderError::Compile {
            path: name.to_string(),
            source,
        })
    }

    /// Render the view at `path` with `context` as `this`.
    pub fn render(&self, path: &str, context: impl Into<Value>) -> Result<String, RenderError> {
        let program = self.compile_view(path)?;
        self.render_program(&program, context.into())
    }

    /// Render the view at `path` as a partial: a `@layout` it declares is
    /// ignored and the default layout is not applied.
    pub fn render_partial(
        &self,
        path: &str,
        context: impl Into<Value>,
    ) -> Result<String, RenderError> {
        let program = self.compile_view(path)?;
        let mut runtime = Runtime::new(self, context.into());
        runtime.render_partial(&program)?;
        Ok(runtime.into_output())
    }

    /// Render template source directly. Partials and layouts it references
    /// still go through the loader.
    pub fn render_string(
        &self,
        source: &str,
        context: impl Into<Value>,
    ) -> Result<String, RenderError> {
        let program = self.compile_source(source, STRING_VIEW)?;
        self.render_program(&program, context.into())
    }

    /// Full render of an already compiled program in a fresh runtime.
    pub fn render_program(&self, program: &Program, context: Value) -> Result<String, RenderError> {
        let mut runtime = Runtime::new(self, context);
        runtime.render(program)?;
        Ok(runtime.into_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn memory_env(views: &[(&str, &str)]) -> Environment {
        let loader = views
            .iter()
            .fold(MemoryLoader::new(), |loader, (path, source)| {
                loader.with_view(path, source)
            });
        Environment::with_loader(EnvironmentOptions::default(), loader).unwrap()
    }

    #[test]
    fn test_options_from_json() {
        let options: EnvironmentOptions = serde_json::from_value(json!({
            "root": "templates",
            "cache-views": false,
            "lexer": { "block-tag-name": "tpl" },
            "default-layout": "layout.html"
        }))
        .unwrap();
        assert_eq!(options.root, PathBuf::from("templates"));
        assert!(!options.cache_views);
        assert_eq!(options.lexer.block_tag_name, "tpl");
        assert_eq!(options.lexer.expression_start, "{%");
        assert_eq!(options.default_layout.as_deref(), Some("layout.html"));
    }

    #[test]
    fn test_invalid_lexer_options_rejected() {
        let options = EnvironmentOptions {
            lexer: LexerOptions {
                tab_width: 0,
                ..LexerOptions::default()
            },
            ..EnvironmentOptions::default()
        };
        let err = Environment::with_loader(options, MemoryLoader::new())
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::Options(_)));
    }

    #[test]
    fn test_memory_loader_normalizes_paths() {
        let env = memory_env(&[("views/a.html", "A")]);
        assert_eq!(env.resolve_view("./views/a.html").unwrap(), "views/a.html");
        assert!(matches!(
            env.resolve_view("b.html"),
            Err(RenderError::ViewNotFound(path)) if path == "b.html"
        ));
    }

    #[test]
    fn test_compile_view_is_cached() {
        let env = memory_env(&[("a.html", "<p>x</p>")]);
        let first = env.compile_view("a.html").unwrap();
        let second = env.compile_view("a.html").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_compile_view_without_cache() {
        let options = EnvironmentOptions {
            cache_views: false,
            ..EnvironmentOptions::default()
        };
        let env = Environment::with_loader(options, MemoryLoader::new().with_view("a.html", "x"))
            .unwrap();
        let first = env.compile_view("a.html").unwrap();
        let second = env.compile_view("a.html").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_errors_name_the_view() {
        let env = memory_env(&[("broken.html", "<div>")]);
        let err = env.render("broken.html", Value::Null).unwrap_err();
        assert_eq!(
            err.to_string(),
            "broken.html: Syntax error at line 1, column 6: Unexpected end of file"
        );
    }

    #[test]
    fn test_render_string() {
        let env = memory_env(&[]);
        let out = env
            .render_string("Hi {%= name %}!", json!({ "name": "Ada" }))
            .unwrap();
        assert_eq!(out, "Hi Ada!");
    }

    #[test]
    fn test_render_partial_skips_layouts() {
        let options = EnvironmentOptions {
            default_layout: Some("default.html".into()),
            ..EnvironmentOptions::default()
        };
        let loader = MemoryLoader::new()
            .with_view("item.html", "<js @layout=\"base.html\" /><li>{%= name %}</li>")
            .with_view("base.html", "<ul><js @render-content /></ul>")
            .with_view("default.html", "D[<js @render-content />]");
        let env = Environment::with_loader(options, loader).unwrap();

        assert_eq!(
            env.render_partial("item.html", json!({ "name": "Ada" })).unwrap(),
            "<li>Ada</li>"
        );
        assert_eq!(
            env.render("item.html", json!({ "name": "Ada" })).unwrap(),
            "D[<li>Ada</li>]"
        );
    }

    #[test]
    fn test_environment_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Environment>();
    }
}
