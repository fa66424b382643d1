//! Structural merge of YAML documents
//!
//! Every document this tool edits is held as a neutral `serde_yaml::Value`
//! tree. This module holds the shared path handling used to navigate those
//! trees; the merge algorithm itself lives in [`keyed`].
//!
//! ## Path Syntax
//!
//! Two path forms are accepted:
//!
//! - Field paths like `spec.install.spec.deployments[0]` or
//!   `metadata.annotations["olm.skipRange"]`, used for targeted edits.
//! - Scheme paths like `$.spec.relatedImages`, used to select keyed lists in
//!   a [`keyed::MergeScheme`]. `$` is the document root.

pub mod keyed;

use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};

/// One step of a field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// Mapping key
    Key(String),
    /// Sequence position
    Index(usize),
}

/// Split a field path into segments.
///
/// Keys are separated by `.`; a `\` makes the next character literal.
/// Brackets hold either a position (`[0]`) or a quoted key
/// (`["olm.skipRange"]`, `['a.b']`). An unquoted non-numeric bracket is
/// taken as a key. The empty path and `/` address the root.
///
/// ```
/// use bundle_reconcile::merge::{parse_path, PathSegment};
///
/// let segments = parse_path(r#"spec.deployments[0].annotations["olm.skipRange"]"#);
/// assert_eq!(segments[2], PathSegment::Index(0));
/// assert_eq!(segments[4], PathSegment::Key("olm.skipRange".to_string()));
/// ```
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let path = path.trim();
    if path.is_empty() || path == "/" {
        return Vec::new();
    }
    PathLexer {
        chars: path.chars().peekable(),
        segments: Vec::new(),
        key: String::new(),
    }
    .run()
}

struct PathLexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    segments: Vec<PathSegment>,
    key: String,
}

impl PathLexer<'_> {
    fn run(mut self) -> Vec<PathSegment> {
        while let Some(ch) = self.chars.next() {
            match ch {
                '\\' => {
                    if let Some(literal) = self.chars.next() {
                        self.key.push(literal);
                    }
                }
                '.' => self.flush(),
                '[' => {
                    self.flush();
                    self.bracket();
                }
                _ => self.key.push(ch),
            }
        }
        self.flush();
        self.segments
    }

    fn flush(&mut self) {
        if !self.key.is_empty() {
            self.segments.push(PathSegment::Key(std::mem::take(&mut self.key)));
        }
    }

    fn bracket(&mut self) {
        match self.chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                self.chars.next();
                let key = self.quoted(quote);
                self.segments.push(PathSegment::Key(key));
            }
            _ => {
                let raw: String = self.chars.by_ref().take_while(|&c| c != ']').collect();
                let raw = raw.trim();
                match raw.parse::<usize>() {
                    Ok(idx) => self.segments.push(PathSegment::Index(idx)),
                    Err(_) if !raw.is_empty() => self.segments.push(PathSegment::Key(raw.to_string())),
                    Err(_) => {}
                }
            }
        }
    }

    /// Read up to the closing `quote]`, honouring `\` escapes.
    fn quoted(&mut self, quote: char) -> String {
        let mut key = String::new();
        while let Some(ch) = self.chars.next() {
            if ch == '\\' {
                key.extend(self.chars.next());
            } else if ch == quote && self.chars.peek() == Some(&']') {
                self.chars.next();
                break;
            } else {
                key.push(ch);
            }
        }
        key
    }
}

/// Parse a scheme path (`$.a.b`) into map keys.
///
/// # Errors
///
/// Returns `Error::Merge` when the path does not start at the root or
/// contains an index; scheme paths address lists by their map location.
pub fn parse_scheme_path(path: &str) -> Result<Vec<String>> {
    let trimmed = path.trim();
    let rest = trimmed.strip_prefix('$').ok_or_else(|| Error::Merge {
        operation: "merge scheme".to_string(),
        message: format!("Scheme path '{}' must start with '$'", path),
    })?;

    parse_path(rest)
        .into_iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => Ok(key),
            PathSegment::Index(idx) => Err(Error::Merge {
                operation: "merge scheme".to_string(),
                message: format!("Scheme path '{}' cannot contain index [{}]", path, idx),
            }),
        })
        .collect()
}

/// Render map keys back into scheme path form.
pub fn scheme_path_string(keys: &[String]) -> String {
    std::iter::once("$")
        .chain(keys.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(".")
}

/// Get a human-readable type name for a YAML value
///
/// Used for logging and error messages to describe the type of a value.
pub fn yaml_type_name(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "Null",
        YamlValue::Bool(_) => "Bool",
        YamlValue::Number(_) => "Number",
        YamlValue::String(_) => "String",
        YamlValue::Sequence(_) => "Sequence",
        YamlValue::Mapping(_) => "Mapping",
        YamlValue::Tagged(_) => "Tagged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_simple_dot_notation() {
        let segments = parse_path("foo.bar.baz");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], PathSegment::Key("foo".to_string()));
        assert_eq!(segments[1], PathSegment::Key("bar".to_string()));
        assert_eq!(segments[2], PathSegment::Key("baz".to_string()));
    }

    #[test]
    fn test_parse_path_deployment_container() {
        let segments = parse_path("spec.install.spec.deployments[0].spec");
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[3], PathSegment::Key("deployments".to_string()));
        assert_eq!(segments[4], PathSegment::Index(0));
    }

    #[test]
    fn test_parse_path_quoted_annotation_key() {
        let segments = parse_path(r#"metadata.annotations["olm.skipRange"]"#);
        assert_eq!(
            segments,
            vec![
                PathSegment::Key("metadata".to_string()),
                PathSegment::Key("annotations".to_string()),
                PathSegment::Key("olm.skipRange".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_path_empty() {
        assert!(parse_path("").is_empty());
        assert!(parse_path("/").is_empty());
    }

    #[test]
    fn test_parse_path_escaped_dot() {
        let segments = parse_path(r"foo\.bar.baz");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], PathSegment::Key("foo.bar".to_string()));
        assert_eq!(segments[1], PathSegment::Key("baz".to_string()));
    }

    #[test]
    fn test_parse_scheme_path() {
        assert_eq!(
            parse_scheme_path("$.spec.relatedImages").unwrap(),
            vec!["spec".to_string(), "relatedImages".to_string()]
        );
        assert!(parse_scheme_path("$").unwrap().is_empty());
        assert!(parse_scheme_path("spec.relatedImages").is_err());
        assert!(parse_scheme_path("$.items[0]").is_err());
    }

    #[test]
    fn test_scheme_path_string() {
        assert_eq!(scheme_path_string(&[]), "$");
        assert_eq!(
            scheme_path_string(&["x".to_string(), "a".to_string()]),
            "$.x.a"
        );
    }
}
