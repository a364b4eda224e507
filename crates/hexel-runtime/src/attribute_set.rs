//! Attribute collection for one element open tag.

use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    boolean: bool,
    quote: char,
    value: String,
}

/// Attributes by name, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    entries: IndexMap<String, Entry>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_value(&mut self, name: &str, quote: char, value: String) {
        self.entries.insert(
            name.to_string(),
            Entry {
                boolean: false,
                quote,
                value,
            },
        );
    }

    pub fn set_boolean(&mut self, name: &str) {
        self.entries.insert(
            name.to_string(),
            Entry {
                boolean: true,
                quote: '"',
                value: String::new(),
            },
        );
    }

    /// Add to an existing value, separated by a space.
    pub fn append_value(&mut self, name: &str, quote: char, value: &str) {
        match self.entries.get_mut(name) {
            Some(entry) if !entry.boolean => {
                entry.value.push(' ');
                entry.value.push_str(value);
            }
            _ => self.set_value(name, quote, value.to_string()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.value.as_str())
    }
}

/// Serializes with a single leading space, or as nothing at all.
impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, entry) in &self.entries {
            if entry.boolean {
                write!(f, " {name}")?;
            } else {
                let quote = entry.quote;
                write!(f, " {name}={quote}{}{quote}", entry.value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_set_is_empty_string() {
        assert_eq!(AttributeSet::new().to_string(), "");
    }

    #[test]
    fn test_single_leading_space_and_booleans() {
        let mut set = AttributeSet::new();
        set.set_value("id", '"', "main".into());
        set.set_boolean("hidden");
        set.set_value("title", '\'', "x".into());
        assert_eq!(set.to_string(), " id=\"main\" hidden title='x'");
    }

    #[test]
    fn test_append_joins_with_space() {
        let mut set = AttributeSet::new();
        set.set_value("class", '"', "btn".into());
        set.append_value("class", '"', "active");
        set.append_value("data-x", '\'', "1");
        assert_eq!(set.to_string(), " class=\"btn active\" data-x='1'");
    }

    #[test]
    fn test_setters_overwrite_in_place() {
        let mut set = AttributeSet::new();
        set.set_value("a", '"', "1".into());
        set.set_value("b", '"', "2".into());
        set.set_value("a", '"', "3".into());
        assert_eq!(set.to_string(), " a=\"3\" b=\"2\"");
    }
}
