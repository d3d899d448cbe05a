//! Lakecat Core - one catalog contract for Iceberg tables
//!
//! This library puts a single async [`Catalog`] trait in front of the ways an
//! Iceberg table can be tracked:
//!
//! - Iceberg REST catalogs (OAuth2, SigV4, TLS)
//! - Hive Metastore over Thrift
//! - AWS Glue and AWS DynamoDB
//! - SQL catalogs on SQLite
//!
//! Every operation takes a cancellation token and reports failures through one
//! closed [`Error`] enum whose sentinel variants are backend independent.

pub mod catalog;
pub mod config;
pub mod error;
pub mod identifier;
pub mod io;
pub mod options;
pub mod properties;
pub mod table;

// Re-export commonly used types
pub use catalog::registry::{CatalogFactory, CatalogRegistry};
pub use catalog::{Catalog, CatalogBackend, CatalogType};
pub use config::LakecatConfig;
pub use error::{Error, Result};
pub use identifier::Identifier;
pub use properties::{Properties, PropertiesUpdateSummary};
pub use table::{Table, TableMetadata, TableRequirement, TableUpdate};
