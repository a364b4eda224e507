//! End-to-end rendering tests: source in, HTML out.

use hexel_parser::ParseErrorKind;
use hexel_runtime::runtime::MAX_RENDER_DEPTH;
use hexel_runtime::{Environment, EnvironmentOptions, MemoryLoader, RenderError, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

fn env_with(options: EnvironmentOptions, views: &[(&str, &str)]) -> Environment {
    let loader = views
        .iter()
        .fold(MemoryLoader::new(), |loader, (path, source)| {
            loader.with_view(path, source)
        });
    Environment::with_loader(options, loader).unwrap()
}

fn env(views: &[(&str, &str)]) -> Environment {
    env_with(EnvironmentOptions::default(), views)
}

fn render(source: &str, context: serde_json::Value) -> String {
    env(&[]).render_string(source, context).unwrap()
}

fn render_err(source: &str, context: serde_json::Value) -> RenderError {
    env(&[]).render_string(source, context).unwrap_err()
}

// =========================================================================
// Literal output
// =========================================================================

#[test]
fn test_plain_text_is_identity() {
    let source = "Hello, world!\n  1 < 2 & 3 > 2\n";
    assert_eq!(render(source, json!({})), source);
}

#[test]
fn test_comment_and_doctype_exact() {
    assert_eq!(render("<!--C-->", json!({})), "<!--C-->");
    assert_eq!(render("<!DOCTYPE html>", json!({})), "<!DOCTYPE html>");
    assert_eq!(render("<![CDATA[a < b]]>", json!({})), "<![CDATA[a < b]]>");
}

#[test]
fn test_void_and_self_closing_elements() {
    assert_eq!(
        render("<br><img src=\"a.png\"><div/><p></p>", json!({})),
        "<br><img src=\"a.png\"><div><p></p>"
    );
}

#[test]
fn test_nested_elements_close_in_order() {
    assert_eq!(
        render("<ul>\n  <li><b>x</b></li>\n</ul>", json!({})),
        "<ul>\n  <li><b>x</b></li>\n</ul>"
    );
}

#[test]
fn test_script_body_is_raw() {
    let source = "<script>if (a < b) { go('{%= x %}'); }</script>";
    assert_eq!(render(source, json!({})), source);
}

// =========================================================================
// Attributes
// =========================================================================

#[test]
fn test_element_without_attributes_has_no_space() {
    assert_eq!(render("<div >x</div>", json!({})), "<div>x</div>");
}

#[test]
fn test_attribute_forms() {
    let out = render(
        "<a href=\"/u/{%= id %}\" [title]=\"t\" [?hidden]=\"h\" class=\"btn\" [class.active]=\"on\" disabled>x</a>",
        json!({ "id": 5, "t": "T", "h": false, "on": true }),
    );
    assert_eq!(
        out,
        "<a href=\"/u/5\" title=\"T\" class=\"btn active\" disabled>x</a>"
    );
}

#[test]
fn test_conditional_attribute_present_when_truthy() {
    assert_eq!(
        render("<input [?checked]=\"on\">", json!({ "on": 1 })),
        "<input checked>"
    );
}

#[test]
fn test_single_quotes_are_kept() {
    assert_eq!(
        render("<p title='{%= t %}' [data-x]='n'></p>", json!({ "t": "a", "n": null })),
        "<p title='a' data-x=''></p>"
    );
}

// =========================================================================
// Values
// =========================================================================

#[test]
fn test_print_forms() {
    let out = render(
        "<js @print=\"a\" />|{%= b %}|{%= missing %}|{%= n %}",
        json!({ "a": "A", "b": [1, 2], "n": null }),
    );
    assert_eq!(out, "A|1,2||");
}

#[test]
fn test_this_is_the_context() {
    assert_eq!(render("{%= this.name %}", json!({ "name": "ctx" })), "ctx");
}

#[test]
fn test_helpers_provide_escaping() {
    let mut env = env(&[]);
    env.register_helper("escape", |args| {
        let text = args.first().map(Value::to_string).unwrap_or_default();
        Ok(Value::from(
            text.replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;"),
        ))
    });
    let out = env
        .render_string("{%= html %}|{%= escape(html) %}", json!({ "html": "<b>" }))
        .unwrap();
    assert_eq!(out, "<b>|&lt;b&gt;");
}

#[test]
fn test_let_is_block_scoped() {
    let out = render(
        "{% let x = 'outer' %}<js>{% let x = 'inner' %}{%= x %}</js>{%= x %}",
        json!({}),
    );
    assert_eq!(out, "innerouter");
}

// =========================================================================
// Control flow
// =========================================================================

#[test]
fn test_if_chain() {
    let source = "<js @if=\"n > 1\">big</js><js @else-if=\"n === 1\">one</js><js @else>none</js>";
    assert_eq!(render(source, json!({ "n": 5 })), "big");
    assert_eq!(render(source, json!({ "n": 1 })), "one");
    assert_eq!(render(source, json!({ "n": 0 })), "none");
}

#[test]
fn test_switch_strict_without_fallthrough() {
    let source = "<js @switch=\"kind\">\n  <js @case=\"'a'\">A</js>\n  <js @case=\"'b'\">B</js>\n  <js @default>?</js>\n</js>";
    assert_eq!(render(source, json!({ "kind": "a" })), "A");
    assert_eq!(render(source, json!({ "kind": "b" })), "B");
    assert_eq!(render(source, json!({ "kind": "z" })), "?");
    assert_eq!(
        render("<js @switch=\"n\"><js @case=\"'1'\">s</js><js @default>d</js></js>", json!({ "n": 1 })),
        "d"
    );
}

#[test]
fn test_foreach_single_identifier() {
    assert_eq!(
        render("<js @foreach=\"item in [1, 2, 3]\">({%= item %})</js>", json!({})),
        "(1)(2)(3)"
    );
}

#[test]
fn test_foreach_with_index() {
    assert_eq!(
        render(
            "<js @foreach=\"item, i in [1, 2, 3]\">({%= item %},{%= i %})</js>",
            json!({})
        ),
        "(1,0)(2,1)(3,2)"
    );
}

#[test]
fn test_foreach_object_entries_in_order() {
    assert_eq!(
        render(
            "<js @foreach=\"k, v of {x: 1, y: 2}\">({%= k %},{%= v %})</js>",
            json!({})
        ),
        "(x,1)(y,2)"
    );
    assert_eq!(
        render(
            "<js @foreach=\"k of obj\">{%= k %};</js>",
            json!({ "obj": { "b": 1, "a": 2 } })
        ),
        "b;a;"
    );
}

#[test]
fn test_foreach_null_collection_is_error() {
    let err = render_err("<js @foreach=\"x in missing\">a</js>", json!({}));
    assert!(matches!(
        err,
        RenderError::NullCollection {
            line: 1,
            column: 20
        }
    ));

    let err = render_err("<js @foreach=\"x in items\">a</js>", json!({ "items": null }));
    assert!(matches!(err, RenderError::NullCollection { .. }));
}

#[test]
fn test_foreach_over_number_is_error() {
    let err = render_err("<js @foreach=\"x in 3\">a</js>", json!({}));
    assert!(matches!(err, RenderError::NotIterable { type_name: "number", .. }));
}

#[test]
fn test_foreach_else_only_on_zero_iterations() {
    let source = "<js @foreach=\"x in items\">{%= x %}</js><js @else>empty</js>";
    assert_eq!(render(source, json!({ "items": [] })), "empty");
    assert_eq!(render(source, json!({ "items": [1] })), "1");
    assert_eq!(
        render("<js @foreach=\"x in items\">{%= x %}</js>", json!({ "items": [] })),
        ""
    );
}

#[test]
fn test_while_loop() {
    assert_eq!(
        render(
            "{% let i = 0 %}<js @while=\"i < 3\">{%= i %}{% i += 1 %}</js>",
            json!({})
        ),
        "012"
    );
}

#[test]
fn test_end_to_end_list() {
    assert_eq!(
        render(
            "<ul class=\"list\"><js @foreach=\"item in items\"><li>{%= item %}</li></js></ul>",
            json!({ "items": [1, 2, 3] })
        ),
        "<ul class=\"list\"><li>1</li><li>2</li><li>3</li></ul>"
    );
}

// =========================================================================
// Print blocks
// =========================================================================

#[test]
fn test_print_block_with_arguments() {
    assert_eq!(
        render(
            "<js @print=\"$block('Ada') + $block('Bob')\" @block=\"name\"><em>{%= name %}</em></js>",
            json!({})
        ),
        "<em>Ada</em><em>Bob</em>"
    );
}

#[test]
fn test_print_block_as_callback() {
    assert_eq!(
        render(
            "<js @print=\"items.map($block).join(', ')\" @block=\"item, i\">{%= i %}:{%= item %}</js>",
            json!({ "items": ["a", "b"] })
        ),
        "0:a, 1:b"
    );
}

#[test]
fn test_recursive_print_block_hits_depth_limit() {
    let err = render_err("<js @print=\"$block()\">x{%= $block() %}</js>", json!({}));
    assert!(matches!(
        err,
        RenderError::RecursionLimit { ref name, line: 1, column: 13, .. } if name == "$block"
    ));
}

#[test]
fn test_print_block_in_loop() {
    assert_eq!(
        render(
            "<js @foreach=\"n in [1, 2, 3]\"><js @print=\"$block(n * 2)\" @block=\"v\">[{%= v %}]</js></js>",
            json!({})
        ),
        "[2][4][6]"
    );
}

#[test]
fn test_print_block_output_is_captured_not_emitted() {
    assert_eq!(
        render(
            "[<js @print=\"$block().length\">abc</js>]",
            json!({})
        ),
        "[3]"
    );
}

// =========================================================================
// Slots
// =========================================================================

#[test]
fn test_content_for_round_trip() {
    assert_eq!(
        render(
            "<js @content-for=\"head\"><title>T</title></js>body<js @render-content=\"head\" />",
            json!({})
        ),
        "body<title>T</title>"
    );
}

#[test]
fn test_content_for_locals_stay_inside() {
    assert_eq!(
        render(
            "{% let x = 'page' %}<js @content-for=\"s\">{% let x = 'slot' %}{%= x %}</js>{%= x %}|<js @render-content=\"s\" />",
            json!({})
        ),
        "page|slot"
    );
}

#[test]
fn test_unconsumed_content_is_discarded() {
    assert_eq!(
        render("a<js @content-for=\"x\">hidden</js>b", json!({})),
        "ab"
    );
}

// =========================================================================
// Partials
// =========================================================================

#[test]
fn test_partial_with_context_override() {
    let env = env(&[("card.html", "<b>{%= title %}</b>")]);
    let out = env
        .render_string(
            "<js @render=\"card.html\" @context=\"{ title: 'X' }\" />|<js @render=\"card.html\" />",
            json!({ "title": "Y" }),
        )
        .unwrap();
    assert_eq!(out, "<b>X</b>|<b>Y</b>");
}

#[test]
fn test_partial_does_not_see_caller_locals() {
    let env = env(&[("peek.html", "{%= typeof secret %}")]);
    let out = env
        .render_string("{% let secret = 1 %}<js @render=\"peek.html\" />", json!({}))
        .unwrap();
    assert_eq!(out, "undefined");
}

#[test]
fn test_partial_never_triggers_layout() {
    let env = env(&[
        ("card.html", "<js @layout=\"base.html\" />card"),
        ("base.html", "[<js @render-content />]"),
    ]);
    let out = env
        .render_string("<js @render=\"card.html\" />", json!({}))
        .unwrap();
    assert_eq!(out, "card");
}

#[test]
fn test_partial_context_must_be_object() {
    let env = env(&[("card.html", "x")]);
    let err = env
        .render_string("<js @render=\"card.html\" @context=\"5\" />", json!({}))
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidContext { type_name: "number", .. }));
}

#[test]
fn test_self_rendering_partial_hits_depth_limit() {
    let env = env(&[("a.html", "x<js @render=\"a.html\" />")]);
    let err = env.render("a.html", json!({})).unwrap_err();
    match err {
        RenderError::RecursionLimit {
            name,
            limit,
            line,
            column,
        } => {
            assert_eq!(name, "a.html");
            assert_eq!(limit, MAX_RENDER_DEPTH);
            assert_eq!((line, column), (1, 2));
        }
        other => panic!("Expected RecursionLimit, got {other:?}"),
    }
}

#[test]
fn test_nested_partials_below_the_limit() {
    let env = env(&[
        ("list.html", "<js @if=\"n > 0\">{%= n %}<js @render=\"list.html\" @context=\"{ n: n - 1 }\" /></js>"),
    ]);
    assert_eq!(env.render("list.html", json!({ "n": 5 })).unwrap(), "54321");
}

#[test]
fn test_missing_partial() {
    let err = render_err("<js @render=\"nope.html\" />", json!({}));
    assert!(matches!(err, RenderError::ViewNotFound(path) if path == "nope.html"));
}

// =========================================================================
// Layouts
// =========================================================================

#[test]
fn test_layout_wraps_content_and_slots() {
    let env = env(&[
        (
            "page.html",
            "<js @layout=\"base.html\" /><js @content-for=\"title\">Home</js><p>hi</p>",
        ),
        (
            "base.html",
            "<title><js @render-content=\"title\" /></title><main><js @render-content /></main>",
        ),
    ]);
    assert_eq!(
        env.render("page.html", json!({})).unwrap(),
        "<title>Home</title><main><p>hi</p></main>"
    );
}

#[test]
fn test_layout_chain() {
    let env = env(&[
        ("page.html", "<js @layout=\"inner.html\" />P"),
        ("inner.html", "<js @layout=\"outer.html\" /><div><js @render-content /></div>"),
        ("outer.html", "<body><js @render-content /></body>"),
    ]);
    assert_eq!(
        env.render("page.html", json!({})).unwrap(),
        "<body><div>P</div></body>"
    );
}

#[test]
fn test_layout_cycle_is_error() {
    let env = env(&[
        ("page.html", "<js @layout=\"a.html\" />page"),
        ("a.html", "<js @layout=\"b.html\" />A<js @render-content />"),
        ("b.html", "<js @layout=\"a.html\" />B<js @render-content />"),
    ]);
    let err = env.render("page.html", json!({})).unwrap_err();
    match err {
        RenderError::LayoutCycle { chain } => {
            assert_eq!(chain, vec!["a.html", "b.html", "a.html"]);
        }
        other => panic!("Expected LayoutCycle, got {other:?}"),
    }
}

#[test]
fn test_missing_layout() {
    let err = render_err("<js @layout=\"gone.html\" />x", json!({}));
    assert!(matches!(err, RenderError::ViewNotFound(_)));
}

#[test]
fn test_default_layout_takes_precedence() {
    let options = EnvironmentOptions {
        default_layout: Some("base.html".into()),
        ..EnvironmentOptions::default()
    };
    let env = env_with(
        options,
        &[
            ("base.html", "base[<js @render-content />]"),
            ("other.html", "other[<js @render-content />]"),
        ],
    );
    assert_eq!(env.render_string("x", json!({})).unwrap(), "base[x]");
    assert_eq!(
        env.render_string("<js @layout=\"other.html\" />y", json!({}))
            .unwrap(),
        "base[y]"
    );
}

#[test]
fn test_default_layout_may_chain_to_another() {
    let options = EnvironmentOptions {
        default_layout: Some("base.html".into()),
        ..EnvironmentOptions::default()
    };
    let env = env_with(
        options,
        &[
            ("base.html", "<js @layout=\"outer.html\" />base[<js @render-content />]"),
            ("outer.html", "outer[<js @render-content />]"),
        ],
    );
    assert_eq!(env.render_string("x", json!({})).unwrap(), "outer[base[x]]");
}

// =========================================================================
// Errors
// =========================================================================

#[test]
fn test_unclosed_element_is_syntax_error_at_eof() {
    match render_err("<div>", json!({})) {
        RenderError::Parse { source, .. } => {
            assert_eq!(source.kind, ParseErrorKind::Syntax);
            assert_eq!((source.line, source.column), (1, 6));
        }
        other => panic!("Expected Parse, got {other:?}"),
    }
}

#[test]
fn test_evaluation_error_carries_position() {
    let err = render_err("<p>{%= user.name %}</p>", json!({ "user": null }));
    match err {
        RenderError::Evaluation {
            message,
            line,
            column,
        } => {
            assert!(message.contains("Cannot read properties of null"));
            assert_eq!((line, column), (1, 7));
        }
        other => panic!("Expected Evaluation, got {other:?}"),
    }
}

#[test]
fn test_error_inside_print_block_keeps_its_kind() {
    let err = render_err(
        "<js @print=\"$block()\"><js @render=\"nope.html\" /></js>",
        json!({}),
    );
    assert!(matches!(err, RenderError::ViewNotFound(_)));
}

// =========================================================================
// Programs
// =========================================================================

#[test]
fn test_same_program_renders_identically() {
    let env = env(&[]);
    let program = env
        .compile_source(
            "{% let n = 0 %}<js @foreach=\"x in xs\">{% n += x %}{%= n %} </js>",
            "<test>",
        )
        .unwrap();
    let context = Value::from(json!({ "xs": [1, 2, 3] }));
    let first = env.render_program(&program, context.clone()).unwrap();
    let second = env.render_program(&program, context).unwrap();
    assert_eq!(first, "1 3 6 ");
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_renders_share_environment() {
    let env = env(&[("page.html", "<js @foreach=\"x in xs\">{%= x %}</js>")]);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let env = &env;
                scope.spawn(move || env.render("page.html", json!({ "xs": [i, i] })).unwrap())
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("{i}{i}"));
        }
    });
}
