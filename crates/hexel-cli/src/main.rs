use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use hexel_runtime::{Environment, EnvironmentOptions, RenderError};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "HEXEL_LOG";

#[derive(Parser)]
#[command(name = "hexel")]
#[command(about = "Hexel: HTML view templates with embedded expressions")]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with environment options
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Tag name that opens template blocks
    #[arg(long, global = true)]
    tag: Option<String>,

    /// Columns a tab advances when reporting positions
    #[arg(long, global = true)]
    tab_width: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a view and print the document
    Render {
        /// View path, relative to the views directory
        view: String,

        /// JSON file used as the render context
        #[arg(long, value_name = "FILE")]
        context: Option<PathBuf>,

        /// Directory views are resolved against
        #[arg(long, value_name = "DIR")]
        views: Option<PathBuf>,

        /// Layout wrapping the view, in place of any it declares
        #[arg(long, value_name = "PATH")]
        layout: Option<String>,

        /// Compile every view on each use
        #[arg(long)]
        no_cache: bool,
    },

    /// Parse and compile a template file, reporting the first error
    Check {
        /// Template file
        path: PathBuf,
    },

    /// Print the compiled program of a template file
    Dump {
        /// Template file
        path: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Error reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = load_options(&cli)?;

    match cli.command {
        Command::Render {
            view,
            context,
            views,
            layout,
            no_cache,
        } => {
            let mut options = options;
            if let Some(views) = views {
                options.root = views;
            }
            if layout.is_some() {
                options.default_layout = layout;
            }
            if no_cache {
                options.cache_views = false;
            }
            let output = cmd_render(options, &view, context.as_deref())?;
            print!("{output}");
        }
        Command::Check { path } => {
            cmd_check(options, &path)?;
            eprintln!("OK: {}", path.display());
        }
        Command::Dump { path } => {
            print!("{}", cmd_dump(options, &path)?);
        }
    }

    Ok(())
}

/// Options from `--config`, with the global flags applied on top.
fn load_options(cli: &Cli) -> Result<EnvironmentOptions, CliError> {
    let mut options = match &cli.config {
        Some(path) => {
            debug!(config = %path.display(), "loading options");
            let text = read_file(path)?;
            serde_json::from_str(&text).map_err(|source| CliError::Json {
                path: path.clone(),
                source,
            })?
        }
        None => EnvironmentOptions::default(),
    };

    if let Some(tag) = &cli.tag {
        options.lexer.block_tag_name = tag.clone();
    }
    if let Some(tab_width) = cli.tab_width {
        options.lexer.tab_width = tab_width;
    }

    Ok(options)
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn cmd_render(
    options: EnvironmentOptions,
    view: &str,
    context: Option<&Path>,
) -> Result<String, CliError> {
    let context = match context {
        Some(path) => {
            let text = read_file(path)?;
            serde_json::from_str(&text).map_err(|source| CliError::Json {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => serde_json::Value::Object(serde_json::Map::new()),
    };

    let env = Environment::new(options)?;
    Ok(env.render(view, context)?)
}

fn cmd_check(options: EnvironmentOptions, path: &Path) -> Result<(), CliError> {
    let source = read_file(path)?;
    let env = Environment::new(options)?;
    env.compile_source(&source, &path.display().to_string())?;
    Ok(())
}

fn cmd_dump(options: EnvironmentOptions, path: &Path) -> Result<String, CliError> {
    let source = read_file(path)?;
    let env = Environment::new(options)?;
    let program = env.compile_source(&source, &path.display().to_string())?;
    Ok(program.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hexel").chain(args.iter().copied())).unwrap()
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    // =========================================================================
    // Arguments
    // =========================================================================

    #[test]
    fn test_render_arguments() {
        let cli = parse_args(&[
            "render",
            "index.html",
            "--context",
            "ctx.json",
            "--views",
            "site",
            "--layout",
            "base.html",
            "--no-cache",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Render {
                view,
                context,
                views,
                layout,
                no_cache,
            } => {
                assert_eq!(view, "index.html");
                assert_eq!(context, Some(PathBuf::from("ctx.json")));
                assert_eq!(views, Some(PathBuf::from("site")));
                assert_eq!(layout.as_deref(), Some("base.html"));
                assert!(no_cache);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(
            dir.path(),
            "hexel.json",
            r#"{ "root": "site", "lexer": { "block-tag-name": "tpl", "tab-width": 2 } }"#,
        );
        let cli = parse_args(&[
            "check",
            "a.html",
            "--config",
            config.to_str().unwrap(),
            "--tab-width",
            "8",
        ]);
        let options = load_options(&cli).unwrap();
        assert_eq!(options.root, PathBuf::from("site"));
        assert_eq!(options.lexer.block_tag_name, "tpl");
        assert_eq!(options.lexer.tab_width, 8);
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "hexel.json", "{ nope");
        let cli = parse_args(&["check", "a.html", "--config", config.to_str().unwrap()]);
        assert!(matches!(load_options(&cli), Err(CliError::Json { .. })));
    }

    // =========================================================================
    // Commands
    // =========================================================================

    #[test]
    fn test_cmd_render() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.html", "<main><js @render-content /></main>");
        write(dir.path(), "index.html", "<h1>{%= title %}</h1>");
        let context = write(dir.path(), "ctx.json", r#"{ "title": "Hi" }"#);

        let options = EnvironmentOptions {
            root: dir.path().to_path_buf(),
            default_layout: Some("base.html".into()),
            ..EnvironmentOptions::default()
        };
        let output = cmd_render(options, "index.html", Some(&context)).unwrap();
        assert_eq!(output, "<main><h1>Hi</h1></main>");
    }

    #[test]
    fn test_cmd_render_missing_view() {
        let dir = tempfile::tempdir().unwrap();
        let options = EnvironmentOptions {
            root: dir.path().to_path_buf(),
            ..EnvironmentOptions::default()
        };
        let err = cmd_render(options, "nope.html", None).unwrap_err();
        assert!(matches!(
            err,
            CliError::Render(RenderError::ViewNotFound(path)) if path == "nope.html"
        ));
    }

    #[test]
    fn test_cmd_check_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "good.html", "<p>{%= 1 %}</p>");
        let bad = write(dir.path(), "bad.html", "<div>");

        assert!(cmd_check(EnvironmentOptions::default(), &good).is_ok());
        let err = cmd_check(EnvironmentOptions::default(), &bad).unwrap_err();
        assert!(err
            .to_string()
            .ends_with("Syntax error at line 1, column 6: Unexpected end of file"));
    }

    #[test]
    fn test_cmd_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.html", "<b>{%= name %}</b>");
        let listing = cmd_dump(EnvironmentOptions::default(), &path).unwrap();
        assert_eq!(listing, "open <b>\nprint name\nclose </b>\n");
    }

    #[test]
    fn test_cmd_check_missing_file() {
        let err = cmd_check(EnvironmentOptions::default(), Path::new("no/such/file.html"))
            .unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }
}
