//! Connection-template parameter discovery.
//!
//! A template such as `postgres://<host>:<port>/<database>` declares one
//! option per distinct `<name>` placeholder, in first-occurrence order. The
//! scan is deliberately permissive: a name only counts when its `<` is closed
//! by a `>`, anything else is literal text, and `<>` declares nothing.

use super::Descriptor;
use serde::Serialize;

/// A named parameter of a connection template.
///
/// Options carry no value; [`crate::connection::synthesize`] resolves values
/// into a fresh map on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbOption {
    /// Placeholder name as written in the template
    pub name: String,
    /// Text of the descriptor key with the same name, if present
    pub description: Option<String>,
}

impl DbOption {
    /// Creates an option.
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }

    /// Case-insensitive name comparison used for the fixed caller fields.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Returns the distinct placeholder names of `template` in first-occurrence order.
pub fn placeholder_names(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    let mut open: Option<usize> = None;

    for (index, ch) in template.char_indices() {
        match ch {
            // A second '<' restarts the placeholder; the first becomes text
            '<' => open = Some(index.saturating_add(1)),
            '>' => {
                if let Some(start) = open.take() {
                    let name = &template[start..index];
                    if !name.is_empty() && !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            _ => {}
        }
    }

    names
}

/// Lists the options declared by a descriptor's `connectionSpec`.
///
/// Each option's description is the descriptor's value under the option's
/// own name, if any. A descriptor without a template declares no options.
pub fn extract_options(descriptor: &Descriptor) -> Vec<DbOption> {
    let Some(template) = descriptor.connection_spec() else {
        tracing::debug!(
            "Database type '{}' has no connectionSpec; no options declared",
            descriptor.name()
        );
        return Vec::new();
    };

    placeholder_names(template)
        .into_iter()
        .map(|name| DbOption::new(name, descriptor.get(name).map(str::to_string)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorOrigin;

    fn descriptor(pairs: &[(&str, &str)]) -> Descriptor {
        let properties = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Descriptor::from_resolved(
            "testdb",
            properties,
            DescriptorOrigin::Packaged("testdb.properties".to_string()),
        )
    }

    #[test]
    fn test_first_occurrence_order() {
        assert_eq!(
            placeholder_names("server=<host>;port=<port>;db=<database>"),
            vec!["host", "port", "database"]
        );
    }

    #[test]
    fn test_duplicates_declared_once() {
        assert_eq!(placeholder_names("<host>:<host>/db"), vec!["host"]);
        assert_eq!(placeholder_names("<b><a><b><a>"), vec!["b", "a"]);
    }

    #[test]
    fn test_names_are_case_sensitive_tokens() {
        assert_eq!(placeholder_names("<Host>/<host>"), vec!["Host", "host"]);
    }

    #[test]
    fn test_unbalanced_delimiters_are_text() {
        assert!(placeholder_names("a<b").is_empty());
        assert!(placeholder_names("a>b>").is_empty());
        assert!(placeholder_names("<>").is_empty());
        assert_eq!(placeholder_names("<<host>"), vec!["host"]);
        assert_eq!(placeholder_names("<a<b>"), vec!["b"]);
        assert_eq!(placeholder_names("x>y<port>z<"), vec!["port"]);
    }

    #[test]
    fn test_no_placeholders() {
        assert!(placeholder_names("sqlite::memory:").is_empty());
        assert!(placeholder_names("").is_empty());
    }

    #[test]
    fn test_extract_options_attaches_descriptions() {
        let d = descriptor(&[
            ("connectionSpec", "jdbc:x://<host>:<port>/<database>"),
            ("host", "Database server"),
            ("database", "Database name"),
        ]);
        let options = extract_options(&d);
        assert_eq!(
            options,
            vec![
                DbOption::new("host", Some("Database server".to_string())),
                DbOption::new("port", None),
                DbOption::new("database", Some("Database name".to_string())),
            ]
        );
    }

    #[test]
    fn test_extract_options_without_template() {
        let d = descriptor(&[("host", "Database server")]);
        assert!(extract_options(&d).is_empty());
    }

    #[test]
    fn test_is_named_ignores_case() {
        let option = DbOption::new("HOST", None);
        assert!(option.is_named("host"));
        assert!(!option.is_named("hostname"));
    }
}
