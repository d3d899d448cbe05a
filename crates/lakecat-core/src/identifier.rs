//! Namespace and table identifiers.
//!
//! An identifier is an ordered sequence of path segments, most specific last.
//! Used as a namespace it names every segment; used as a table reference the
//! last segment is the table name and the rest is the namespace.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Path-like identifier for a namespace or a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(Vec<String>);

impl Identifier {
    /// Build an identifier from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty identifier (the catalog root).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Parse a dot-separated identifier. An empty string yields the empty identifier.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::empty();
        }
        Self::new(dotted.split('.'))
    }

    /// Identifier segments, most specific last.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the identifier has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, or the empty string for an empty identifier.
    pub fn table_name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    /// All segments except the last.
    ///
    /// A single-segment identifier yields an empty namespace. An empty identifier
    /// also yields an empty namespace; use [`Identifier::split_table`] when an empty
    /// table reference must be rejected.
    pub fn namespace(&self) -> Identifier {
        match self.0.split_last() {
            Some((_, rest)) => Self(rest.to_vec()),
            None => Self::empty(),
        }
    }

    /// Split a table reference into its namespace and table name.
    pub fn split_table(&self) -> Result<(Identifier, &str)> {
        match self.0.split_last() {
            Some((name, rest)) => Ok((Self(rest.to_vec()), name.as_str())),
            None => Err(Error::InvalidIdentifier(
                "table identifier must have at least one segment".into(),
            )),
        }
    }

    /// Identifier of `name` inside this namespace.
    pub fn child(&self, name: impl Into<String>) -> Identifier {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Whether `prefix` is a (non-strict) prefix of this identifier.
    pub fn starts_with(&self, prefix: &Identifier) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Join segments with a separator.
    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    /// Consume the identifier, returning its segments.
    pub fn into_segments(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("."))
    }
}

impl FromStr for Identifier {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<Vec<String>> for Identifier {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for Identifier {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Identifier {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl<S: Into<String>> FromIterator<S> for Identifier {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_is_last_segment() {
        let ident = Identifier::from(["warehouse", "sales", "orders"]);
        assert_eq!(ident.table_name(), "orders");
        assert_eq!(ident.namespace(), Identifier::from(["warehouse", "sales"]));
        assert_eq!(ident.namespace().len(), ident.len() - 1);
    }

    #[test]
    fn test_empty_identifier() {
        let ident = Identifier::empty();
        assert_eq!(ident.table_name(), "");
        assert!(ident.namespace().is_empty());
        assert!(matches!(
            ident.split_table(),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_single_segment_has_empty_namespace() {
        let ident = Identifier::from(["orders"]);
        assert_eq!(ident.table_name(), "orders");
        assert!(ident.namespace().is_empty());

        let (ns, name) = ident.split_table().unwrap();
        assert!(ns.is_empty());
        assert_eq!(name, "orders");
    }

    #[test]
    fn test_parse_and_display() {
        let ident: Identifier = "db.schema.events".parse().unwrap();
        assert_eq!(ident.segments(), &["db", "schema", "events"]);
        assert_eq!(ident.to_string(), "db.schema.events");
        assert!(Identifier::parse("").is_empty());
    }

    #[test]
    fn test_child_and_prefix() {
        let ns = Identifier::from(["db"]);
        let table = ns.child("events");
        assert_eq!(table, Identifier::from(["db", "events"]));
        assert!(table.starts_with(&ns));
        assert!(!ns.starts_with(&table));
        assert!(table.starts_with(&Identifier::empty()));
    }

    #[test]
    fn test_serializes_as_array() {
        let ident = Identifier::from(["a", "b"]);
        let json = serde_json::to_string(&ident).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ident);
    }
}
