//! Hexel Runtime
//!
//! Executes compiled view programs. An [`Environment`] is built once and
//! shared; every render call gets its own [`Runtime`] holding the render
//! target stack and layout state for that call only.
//!
//! ```text
//! Environment::render(path, context)
//!   → compile_view(path)           (cached by canonical path)
//!   → Runtime::render(program)     (steps, then the layout chain)
//!   → String
//! ```
//!
//! # Example
//!
//! ```
//! use hexel_runtime::{Environment, EnvironmentOptions, MemoryLoader};
//! use serde_json::json;
//!
//! let loader = MemoryLoader::new()
//!     .with_view("page.html", "<js @layout=\"base.html\" /><p>{%= title %}</p>")
//!     .with_view("base.html", "<main><js @render-content /></main>");
//! let env = Environment::with_loader(EnvironmentOptions::default(), loader).unwrap();
//!
//! let html = env.render("page.html", json!({ "title": "Hello" })).unwrap();
//! assert_eq!(html, "<main><p>Hello</p></main>");
//! ```

pub mod attribute_set;
pub mod collection;
pub mod environment;
pub mod error;
pub mod render_target;
pub mod runtime;

pub use attribute_set::AttributeSet;
pub use collection::create_collection;
pub use environment::{Environment, EnvironmentOptions, FileLoader, MemoryLoader, ViewLoader};
pub use error::RenderError;
pub use hexel_expr::Value;
pub use render_target::RenderTarget;
pub use runtime::Runtime;
