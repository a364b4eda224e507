use serde::Deserialize;

use crate::LexerError;

/// Delimiter configuration for the template lexer.
///
/// The print and comment prefixes must extend the expression start
/// delimiter, so `{%=` and `{%#` share the `{%` opener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LexerOptions {
    pub block_tag_name: String,
    pub expression_start: String,
    pub expression_end: String,
    pub print_prefix: String,
    pub comment_prefix: String,
    pub tab_width: usize,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            block_tag_name: "js".into(),
            expression_start: "{%".into(),
            expression_end: "%}".into(),
            print_prefix: "{%=".into(),
            comment_prefix: "{%#".into(),
            tab_width: 4,
        }
    }
}

impl LexerOptions {
    /// Check the delimiter configuration.
    pub fn validate(&self) -> Result<(), LexerError> {
        if self.expression_start.chars().count() < 2 {
            return Err(options_error(
                "expression start delimiter must be at least 2 characters long",
            ));
        }

        if self.expression_end.chars().count() < 2 {
            return Err(options_error(
                "expression end delimiter must be at least 2 characters long",
            ));
        }

        if !self.print_prefix.starts_with(&self.expression_start) {
            return Err(options_error(
                "print prefix must start with the expression start delimiter",
            ));
        }

        if !self.comment_prefix.starts_with(&self.expression_start) {
            return Err(options_error(
                "comment prefix must start with the expression start delimiter",
            ));
        }

        if self.print_prefix == self.comment_prefix {
            return Err(options_error("print and comment prefixes must differ"));
        }

        let valid_tag = self
            .block_tag_name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
            && self
                .block_tag_name
                .chars()
                .all(|c| !c.is_whitespace() && c != '/' && c != '>');
        if !valid_tag {
            return Err(options_error(format!(
                "invalid block tag name: '{}'",
                self.block_tag_name
            )));
        }

        if self.tab_width == 0 {
            return Err(options_error("tab width must be at least 1"));
        }

        Ok(())
    }
}

fn options_error(message: impl Into<String>) -> LexerError {
    LexerError::Options(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(LexerOptions::default().validate().is_ok());
    }

    #[test]
    fn test_short_start_delimiter_rejected() {
        let options = LexerOptions {
            expression_start: "{".into(),
            ..LexerOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_short_end_delimiter_rejected() {
        let options = LexerOptions {
            expression_end: "}".into(),
            ..LexerOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_prefix_must_extend_start() {
        let options = LexerOptions {
            print_prefix: "<%=".into(),
            ..LexerOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("print prefix"));

        let options = LexerOptions {
            comment_prefix: "<%#".into(),
            ..LexerOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("comment prefix"));
    }

    #[test]
    fn test_custom_delimiters() {
        let options = LexerOptions {
            expression_start: "<%".into(),
            expression_end: "%>".into(),
            print_prefix: "<%=".into(),
            comment_prefix: "<%#".into(),
            ..LexerOptions::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_empty_block_tag_rejected() {
        let options = LexerOptions {
            block_tag_name: String::new(),
            ..LexerOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let options: LexerOptions =
            serde_json::from_str(r#"{ "block-tag-name": "tpl", "tab-width": 2 }"#).unwrap();
        assert_eq!(options.block_tag_name, "tpl");
        assert_eq!(options.tab_width, 2);
        assert_eq!(options.expression_start, "{%");
    }
}
