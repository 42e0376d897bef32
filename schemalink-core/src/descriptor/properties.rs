//! Reader for the `.properties` format database-type descriptors are written in.
//!
//! Supported: `#` and `!` comment lines, `=`, `:` or whitespace between key
//! and value, trailing-backslash continuation lines, and the escapes
//! `\t \n \r \f \\ \uXXXX`. Any other escaped character stands for itself,
//! which is how separators are written inside keys (`a\=b`).

use crate::{Result, error::SchemaLinkError};
use std::collections::BTreeMap;

/// Parses properties text into a key/value map. Later duplicates win.
///
/// `origin` only feeds error messages.
pub fn parse_properties(text: &str, origin: &str) -> Result<BTreeMap<String, String>> {
    let mut properties = BTreeMap::new();

    for (line_number, logical) in logical_lines(text) {
        let (raw_key, raw_value) = split_key_value(&logical);
        let key = unescape(raw_key).map_err(|message| {
            SchemaLinkError::configuration(format!(
                "{} line {}: {}",
                origin, line_number, message
            ))
        })?;
        let value = unescape(raw_value).map_err(|message| {
            SchemaLinkError::configuration(format!(
                "{} line {}: {}",
                origin, line_number, message
            ))
        })?;
        properties.insert(key, value);
    }

    Ok(properties)
}

/// Joins continuation lines and drops blanks and comments.
///
/// Yields the 1-based number of the first physical line of each entry.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut entries = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, physical) in text.lines().enumerate() {
        let line = physical.trim_start_matches([' ', '\t', '\u{c}']);

        let (number, mut current) = match pending.take() {
            Some(open) => open,
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                (index.saturating_add(1), String::new())
            }
        };

        if ends_with_continuation(line) {
            current.push_str(&line[..line.len().saturating_sub(1)]);
            pending = Some((number, current));
        } else {
            current.push_str(line);
            entries.push((number, current));
        }
    }

    // A dangling continuation on the last line still forms an entry
    if let Some(open) = pending {
        entries.push(open);
    }

    entries
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Splits at the first unescaped separator, still escaped on both sides.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (index, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = index;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\u{c}']);
    }
    (key, rest)
}

fn unescape(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("malformed \\uXXXX encoding '\\u{}'", hex))?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> BTreeMap<String, String> {
        parse_properties(text, "test.properties").unwrap()
    }

    #[test]
    fn test_separators() {
        let props = parse("a=1\nb: 2\nc 3\nd  =  4\n");
        assert_eq!(props["a"], "1");
        assert_eq!(props["b"], "2");
        assert_eq!(props["c"], "3");
        assert_eq!(props["d"], "4");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let props = parse("# comment\n! also comment\n\n   \nkey=value\n");
        assert_eq!(props.len(), 1);
        assert_eq!(props["key"], "value");
    }

    #[test]
    fn test_continuation_lines() {
        let props = parse("selectViewSql=select text \\\n     from views \\\n  where name = :view\n");
        assert_eq!(
            props["selectViewSql"],
            "select text from views where name = :view"
        );
    }

    #[test]
    fn test_escaped_backslash_is_not_continuation() {
        let props = parse("path=c:\\\\data\\\\\nnext=1\n");
        assert_eq!(props["path"], "c:\\data\\");
        assert_eq!(props["next"], "1");
    }

    #[test]
    fn test_escapes() {
        let props = parse("a=tab\\there\nb=\\u00e9t\\u00e9\nc\\=d=e\n");
        assert_eq!(props["a"], "tab\there");
        assert_eq!(props["b"], "été");
        assert_eq!(props["c=d"], "e");
    }

    #[test]
    fn test_value_keeps_angle_brackets_and_colons() {
        let props = parse("connectionSpec=postgres://<host>:<port>/<database>\n");
        assert_eq!(props["connectionSpec"], "postgres://<host>:<port>/<database>");
    }

    #[test]
    fn test_include_directive_value() {
        let props = parse("include.1 = mysql::selectRowCountSql\n");
        assert_eq!(props["include.1"], "mysql::selectRowCountSql");
    }

    #[test]
    fn test_empty_value_and_duplicates() {
        let props = parse("empty=\nkey=first\nkey=second\n");
        assert_eq!(props["empty"], "");
        assert_eq!(props["key"], "second");
    }

    #[test]
    fn test_malformed_unicode_escape() {
        let err = parse_properties("bad=\\u12\n", "broken.properties").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken.properties line 1"));
        assert!(message.contains("\\uXXXX"));
    }
}
