use hexel_compiler::CompileError;
use hexel_expr::{EvalError, Position};
use hexel_lexer::LexerError;
use hexel_parser::ParseError;

/// Anything that can abort a render call.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("View not found: {0}")]
    ViewNotFound(String),

    #[error("Failed to read view {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("{path}: {source}")]
    Compile {
        path: String,
        #[source]
        source: CompileError,
    },

    #[error("Cycle detected in view layouts: {}", .chain.join(" -> "))]
    LayoutCycle { chain: Vec<String> },

    #[error("Foreach collection cannot be null or undefined at line {line}, column {column}")]
    NullCollection { line: usize, column: usize },

    #[error("Foreach collection of type {type_name} is not iterable at line {line}, column {column}")]
    NotIterable {
        type_name: &'static str,
        line: usize,
        column: usize,
    },

    #[error("Partial context must be an object, found {type_name} at line {line}, column {column}")]
    InvalidContext {
        type_name: &'static str,
        line: usize,
        column: usize,
    },

    #[error("Render depth limit of {limit} exceeded by {name} at line {line}, column {column}")]
    RecursionLimit {
        name: String,
        limit: usize,
        line: usize,
        column: usize,
    },

    #[error("Evaluation error at line {line}, column {column}: {message}")]
    Evaluation {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Invalid environment options: {0}")]
    Options(#[from] LexerError),
}

impl RenderError {
    /// Attach a template position to an evaluation failure. Render errors
    /// that travelled through a block call come back out unchanged.
    pub fn evaluation(err: EvalError, position: Position) -> Self {
        let message = match err {
            EvalError::Host(inner) => match inner.downcast::<RenderError>() {
                Ok(render) => return *render,
                Err(other) => other.to_string(),
            },
            other => other.to_string(),
        };
        RenderError::Evaluation {
            message,
            line: position.line,
            column: position.column,
        }
    }

    /// Template position, for errors raised while executing a program.
    pub fn position(&self) -> Option<Position> {
        match self {
            RenderError::NullCollection { line, column }
            | RenderError::NotIterable { line, column, .. }
            | RenderError::InvalidContext { line, column, .. }
            | RenderError::RecursionLimit { line, column, .. }
            | RenderError::Evaluation { line, column, .. } => Some(Position::new(*line, *column)),
            RenderError::Parse { source, .. } => Some(source.position()),
            RenderError::Compile { source, .. } => Some(Position::new(source.line, source.column)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_evaluation_error_display() {
        let err = RenderError::evaluation(
            EvalError::Type("x is not a function".into()),
            Position::new(4, 9),
        );
        assert_eq!(
            err.to_string(),
            "Evaluation error at line 4, column 9: TypeError: x is not a function"
        );
        assert_eq!(err.position(), Some(Position::new(4, 9)));
    }

    #[test]
    fn test_render_errors_pass_through_host() {
        let inner = RenderError::ViewNotFound("card.html".into());
        let err = RenderError::evaluation(EvalError::Host(Box::new(inner)), Position::new(1, 1));
        assert!(matches!(err, RenderError::ViewNotFound(path) if path == "card.html"));
    }

    #[test]
    fn test_layout_cycle_display() {
        let err = RenderError::LayoutCycle {
            chain: vec!["a.html".into(), "b.html".into(), "a.html".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cycle detected in view layouts: a.html -> b.html -> a.html"
        );
    }
}
