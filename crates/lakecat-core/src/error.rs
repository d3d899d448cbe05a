//! Error types for lakecat core library.
//!
//! A single closed enumeration covers every failure a catalog can surface.
//! Callers branch on the sentinel variants (`NoSuchTable`, `NoSuchNamespace`,
//! `NamespaceAlreadyExists`, `TableAlreadyExists`, `CatalogNotFound`,
//! `NamespaceNotEmpty`) and never on backend-specific client errors.

use std::fmt::Display;
use thiserror::Error;

/// Result type alias for lakecat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for lakecat.
#[derive(Error, Debug)]
pub enum Error {
    /// Table does not exist in the catalog
    #[error("table does not exist: {0}")]
    NoSuchTable(String),

    /// Namespace does not exist in the catalog
    #[error("namespace does not exist: {0}")]
    NoSuchNamespace(String),

    /// Namespace already exists
    #[error("namespace already exists: {0}")]
    NamespaceAlreadyExists(String),

    /// Table already exists
    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    /// Catalog type has no registered factory
    #[error("catalog type not registered: {0}")]
    CatalogNotFound(String),

    /// Namespace still contains tables
    #[error("namespace is not empty: {0}")]
    NamespaceNotEmpty(String),

    /// Keys requested for both removal and update
    #[error("conflict between removals and updates for keys: {keys:?}")]
    PropertiesConflict { keys: Vec<String> },

    /// Identifier cannot be used for the requested operation
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Commit rejected because a requirement no longer holds
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// Operation cancelled through its execution context
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend transport error, annotated with the operation and target
    #[error("{operation} failed for {target}: {message}")]
    Transport {
        operation: &'static str,
        target: String,
        message: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Metadata storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a backend client error with the operation name and the identifier involved.
    pub fn transport(operation: &'static str, target: impl Display, err: impl Display) -> Self {
        Error::Transport {
            operation,
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether this is a `NoSuchTable` or `NoSuchNamespace` sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoSuchTable(_) | Error::NoSuchNamespace(_))
    }

    /// Whether this is a `TableAlreadyExists` or `NamespaceAlreadyExists` sentinel.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Error::TableAlreadyExists(_) | Error::NamespaceAlreadyExists(_)
        )
    }
}

// Conversion implementations for external error types

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_display() {
        let err = Error::NoSuchTable("db.events".into());
        assert_eq!(err.to_string(), "table does not exist: db.events");

        let err = Error::NamespaceNotEmpty("db".into());
        assert_eq!(err.to_string(), "namespace is not empty: db");
    }

    #[test]
    fn test_conflict_lists_every_key() {
        let err = Error::PropertiesConflict {
            keys: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"a\""));
        assert!(msg.contains("\"b\""));
    }

    #[test]
    fn test_transport_context() {
        let err = Error::transport("load_table", "db.events", "connection refused");
        assert_eq!(
            err.to_string(),
            "load_table failed for db.events: connection refused"
        );
    }

    #[test]
    fn test_classification() {
        assert!(Error::NoSuchNamespace("db".into()).is_not_found());
        assert!(Error::TableAlreadyExists("db.t".into()).is_already_exists());
        assert!(!Error::Cancelled.is_not_found());
        assert!(!Error::CommitFailed("stale".into()).is_already_exists());
    }
}
