//! Rendering views from a directory on disk.

use std::fs;

use hexel_runtime::{Environment, EnvironmentOptions, RenderError};
use pretty_assertions::assert_eq;
use serde_json::json;

fn write(dir: &std::path::Path, path: &str, source: &str) {
    let full = dir.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, source).unwrap();
}

fn environment(dir: &std::path::Path, cache_views: bool) -> Environment {
    Environment::new(EnvironmentOptions {
        root: dir.to_path_buf(),
        cache_views,
        ..EnvironmentOptions::default()
    })
    .unwrap()
}

#[test]
fn test_render_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "layouts/main.html", "<body><js @render-content /></body>");
    write(
        dir.path(),
        "index.html",
        "<js @layout=\"layouts/main.html\" /><js @foreach=\"p in people\"><js @render=\"partials/person.html\" @context=\"{ p }\" /></js>",
    );
    write(dir.path(), "partials/person.html", "<i>{%= p.name %}</i>");

    let env = environment(dir.path(), true);
    let out = env
        .render(
            "index.html",
            json!({ "people": [{ "name": "Ada" }, { "name": "Lin" }] }),
        )
        .unwrap();
    assert_eq!(out, "<body><i>Ada</i><i>Lin</i></body>");
}

#[test]
fn test_missing_file_is_view_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let env = environment(dir.path(), true);
    let err = env.render("nope.html", json!({})).unwrap_err();
    assert!(matches!(err, RenderError::ViewNotFound(path) if path == "nope.html"));
}

#[test]
fn test_cached_views_are_not_invalidated() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.html", "one");

    let cached = environment(dir.path(), true);
    let uncached = environment(dir.path(), false);
    assert_eq!(cached.render("a.html", json!({})).unwrap(), "one");
    assert_eq!(uncached.render("a.html", json!({})).unwrap(), "one");

    write(dir.path(), "a.html", "two");
    assert_eq!(cached.render("a.html", json!({})).unwrap(), "one");
    assert_eq!(uncached.render("a.html", json!({})).unwrap(), "two");
}

#[test]
fn test_equivalent_paths_share_a_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "views/a.html", "a");

    let env = environment(dir.path(), true);
    let first = env.compile_view("views/a.html").unwrap();
    let second = env.compile_view("views/../views/a.html").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
