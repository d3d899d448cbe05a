//! Catalog contract and backends.
//!
//! Every backend implements [`CatalogBackend`]. Callers use [`Catalog`], which is
//! implemented for every backend and adds cancellation: each operation takes a
//! [`CancellationToken`] and returns [`Error::Cancelled`] as soon as the token
//! fires, dropping the in-flight backend call.
//!
//! - `rest`: Iceberg REST catalog over HTTP
//! - `hive`: Hive Metastore over Thrift
//! - `glue`: AWS Glue Data Catalog
//! - `dynamodb`: DynamoDB table using the Iceberg catalog layout
//! - `sql`: SQL registry (SQLite)

mod aws;
pub mod dynamodb;
pub mod glue;
pub mod hive;
mod pointer;
pub mod registry;
pub mod rest;
pub mod rest_api;
pub mod sql;

use crate::identifier::Identifier;
use crate::options::{CreateTableOption, CreateTableOptions};
use crate::properties::{Properties, PropertiesUpdateSummary};
use crate::table::{Schema, Table, TableMetadata, TableRequirement, TableUpdate};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Backend kind of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogType {
    /// Iceberg REST catalog
    Rest,
    /// Hive metastore catalog
    Hive,
    /// AWS Glue catalog
    Glue,
    /// AWS DynamoDB catalog
    #[serde(rename = "dynamodb")]
    DynamoDb,
    /// SQL catalog
    Sql,
}

impl CatalogType {
    pub const ALL: [CatalogType; 5] = [
        CatalogType::Rest,
        CatalogType::Hive,
        CatalogType::Glue,
        CatalogType::DynamoDb,
        CatalogType::Sql,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogType::Rest => "rest",
            CatalogType::Hive => "hive",
            CatalogType::Glue => "glue",
            CatalogType::DynamoDb => "dynamodb",
            CatalogType::Sql => "sql",
        }
    }
}

impl fmt::Display for CatalogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CatalogType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::CatalogNotFound(s.to_string()))
    }
}

/// Uniform catalog contract, shared as `Arc<dyn Catalog>`.
#[async_trait]
pub trait Catalog: Send + Sync {
    fn catalog_type(&self) -> CatalogType;

    /// Create a table. Fails with `TableAlreadyExists` or `NoSuchNamespace`.
    async fn create_table(
        &self,
        ctx: &CancellationToken,
        identifier: &Identifier,
        schema: Schema,
        options: Vec<CreateTableOption>,
    ) -> Result<Table>;

    /// Validate `requirements` against the current metadata, apply `updates`, and
    /// swap the table's metadata pointer. Returns the new metadata and its location.
    async fn commit_table(
        &self,
        ctx: &CancellationToken,
        table: &Table,
        requirements: &[TableRequirement],
        updates: &[TableUpdate],
    ) -> Result<(TableMetadata, String)>;

    async fn list_tables(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
    ) -> Result<Vec<Identifier>>;

    /// Load a table. `properties` are IO properties attached to the returned table.
    async fn load_table(
        &self,
        ctx: &CancellationToken,
        identifier: &Identifier,
        properties: &Properties,
    ) -> Result<Table>;

    /// Remove the catalog entry. Data and metadata files are left in place.
    async fn drop_table(&self, ctx: &CancellationToken, identifier: &Identifier) -> Result<()>;

    /// Rename a table and return it loaded under its new identifier.
    async fn rename_table(
        &self,
        ctx: &CancellationToken,
        from: &Identifier,
        to: &Identifier,
    ) -> Result<Table>;

    /// Namespaces under `parent`; an empty parent lists top-level namespaces.
    async fn list_namespaces(
        &self,
        ctx: &CancellationToken,
        parent: &Identifier,
    ) -> Result<Vec<Identifier>>;

    async fn create_namespace(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
        properties: &Properties,
    ) -> Result<()>;

    /// Drop an empty namespace. Fails with `NamespaceNotEmpty` while tables remain.
    async fn drop_namespace(&self, ctx: &CancellationToken, namespace: &Identifier) -> Result<()>;

    async fn load_namespace_properties(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
    ) -> Result<Properties>;

    /// Remove `removals` and upsert `updates`. Conflicting keys fail before any change.
    async fn update_namespace_properties(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary>;
}

/// Backend implementation of the catalog operations.
///
/// Same operations as [`Catalog`] without the cancellation token; table-creation
/// options arrive already resolved.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    fn catalog_type(&self) -> CatalogType;

    async fn create_table(
        &self,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table>;

    async fn commit_table(
        &self,
        table: &Table,
        requirements: &[TableRequirement],
        updates: &[TableUpdate],
    ) -> Result<(TableMetadata, String)>;

    async fn list_tables(&self, namespace: &Identifier) -> Result<Vec<Identifier>>;

    async fn load_table(&self, identifier: &Identifier, properties: &Properties) -> Result<Table>;

    async fn drop_table(&self, identifier: &Identifier) -> Result<()>;

    async fn rename_table(&self, from: &Identifier, to: &Identifier) -> Result<Table>;

    async fn list_namespaces(&self, parent: &Identifier) -> Result<Vec<Identifier>>;

    async fn create_namespace(&self, namespace: &Identifier, properties: &Properties) -> Result<()>;

    async fn drop_namespace(&self, namespace: &Identifier) -> Result<()>;

    async fn load_namespace_properties(&self, namespace: &Identifier) -> Result<Properties>;

    async fn update_namespace_properties(
        &self,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary>;
}

/// Run `fut` unless `ctx` is cancelled first.
async fn cancellable<T>(
    ctx: &CancellationToken,
    fut: impl Future<Output = Result<T>> + Send,
) -> Result<T> {
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

#[async_trait]
impl<B: CatalogBackend> Catalog for B {
    fn catalog_type(&self) -> CatalogType {
        CatalogBackend::catalog_type(self)
    }

    async fn create_table(
        &self,
        ctx: &CancellationToken,
        identifier: &Identifier,
        schema: Schema,
        options: Vec<CreateTableOption>,
    ) -> Result<Table> {
        let options = CreateTableOptions::resolve(options);
        cancellable(
            ctx,
            CatalogBackend::create_table(self, identifier, schema, options),
        )
        .await
    }

    async fn commit_table(
        &self,
        ctx: &CancellationToken,
        table: &Table,
        requirements: &[TableRequirement],
        updates: &[TableUpdate],
    ) -> Result<(TableMetadata, String)> {
        cancellable(
            ctx,
            CatalogBackend::commit_table(self, table, requirements, updates),
        )
        .await
    }

    async fn list_tables(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
    ) -> Result<Vec<Identifier>> {
        cancellable(ctx, CatalogBackend::list_tables(self, namespace)).await
    }

    async fn load_table(
        &self,
        ctx: &CancellationToken,
        identifier: &Identifier,
        properties: &Properties,
    ) -> Result<Table> {
        cancellable(ctx, CatalogBackend::load_table(self, identifier, properties)).await
    }

    async fn drop_table(&self, ctx: &CancellationToken, identifier: &Identifier) -> Result<()> {
        cancellable(ctx, CatalogBackend::drop_table(self, identifier)).await
    }

    async fn rename_table(
        &self,
        ctx: &CancellationToken,
        from: &Identifier,
        to: &Identifier,
    ) -> Result<Table> {
        cancellable(ctx, CatalogBackend::rename_table(self, from, to)).await
    }

    async fn list_namespaces(
        &self,
        ctx: &CancellationToken,
        parent: &Identifier,
    ) -> Result<Vec<Identifier>> {
        cancellable(ctx, CatalogBackend::list_namespaces(self, parent)).await
    }

    async fn create_namespace(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
        properties: &Properties,
    ) -> Result<()> {
        cancellable(
            ctx,
            CatalogBackend::create_namespace(self, namespace, properties),
        )
        .await
    }

    async fn drop_namespace(&self, ctx: &CancellationToken, namespace: &Identifier) -> Result<()> {
        cancellable(ctx, CatalogBackend::drop_namespace(self, namespace)).await
    }

    async fn load_namespace_properties(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
    ) -> Result<Properties> {
        cancellable(ctx, CatalogBackend::load_namespace_properties(self, namespace)).await
    }

    async fn update_namespace_properties(
        &self,
        ctx: &CancellationToken,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary> {
        cancellable(
            ctx,
            CatalogBackend::update_namespace_properties(self, namespace, removals, updates),
        )
        .await
    }
}
