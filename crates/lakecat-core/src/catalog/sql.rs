//! SQL catalog backed by SQLite.
//!
//! Uses the JDBC catalog layout: `iceberg_tables` holds one pointer row per
//! table and `iceberg_namespace_properties` one row per namespace property.
//! Namespaces are stored with their segments joined by `.`. Every namespace
//! carries an `exists` marker row so that a namespace without properties is
//! still visible; the marker is never returned to callers.

use super::pointer::{self, StagedMetadata};
use super::{CatalogBackend, CatalogType};
use crate::identifier::Identifier;
use crate::io::FileIo;
use crate::options::{CatalogOption, ConnectionOptions, CreateTableOptions};
use crate::properties::{reconcile, Properties, PropertiesUpdateSummary};
use crate::table::{Schema, Table, TableMetadata, TableRequirement, TableUpdate};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info};

const NAMESPACE_SEPARATOR: &str = ".";
const NAMESPACE_MARKER_KEY: &str = "exists";
const NAMESPACE_MARKER_VALUE: &str = "true";

const CREATE_TABLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS iceberg_tables (
    catalog_name VARCHAR(255) NOT NULL,
    table_namespace VARCHAR(255) NOT NULL,
    table_name VARCHAR(255) NOT NULL,
    metadata_location VARCHAR(1000),
    previous_metadata_location VARCHAR(1000),
    PRIMARY KEY (catalog_name, table_namespace, table_name)
);
"#;

const CREATE_NAMESPACE_PROPERTIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS iceberg_namespace_properties (
    catalog_name VARCHAR(255) NOT NULL,
    namespace VARCHAR(255) NOT NULL,
    property_key VARCHAR(255) NOT NULL,
    property_value VARCHAR(1000),
    PRIMARY KEY (catalog_name, namespace, property_key)
);
"#;

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(inner) if inner.is_unique_violation())
}

fn namespace_key(namespace: &Identifier) -> Result<String> {
    if namespace.is_empty() {
        return Err(Error::InvalidIdentifier("namespace must not be empty".into()));
    }
    pointer::joined_key(namespace, NAMESPACE_SEPARATOR)
}

/// Namespace key and table name of a table reference.
fn table_key(identifier: &Identifier) -> Result<(String, &str)> {
    let (namespace, name) = identifier.split_table()?;
    if name.is_empty() {
        return Err(Error::InvalidIdentifier(format!(
            "table name of '{identifier}' must not be empty"
        )));
    }
    Ok((namespace_key(&namespace)?, name))
}

/// Reject user properties that collide with the namespace marker row.
fn check_reserved_keys<'a>(keys: impl IntoIterator<Item = &'a String>) -> Result<()> {
    if keys.into_iter().any(|k| k == NAMESPACE_MARKER_KEY) {
        return Err(Error::InvalidIdentifier(format!(
            "namespace property '{NAMESPACE_MARKER_KEY}' is reserved"
        )));
    }
    Ok(())
}

/// SQL catalog.
pub struct SqlCatalog {
    name: String,
    pool: SqlitePool,
    io: FileIo,
    options: ConnectionOptions,
}

impl std::fmt::Debug for SqlCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlCatalog")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

impl SqlCatalog {
    /// Connect to the database at `uri` and create the catalog tables if missing.
    ///
    /// `io_properties` configure the object store that holds metadata files.
    pub async fn new(
        name: impl Into<String>,
        uri: &str,
        io_properties: Properties,
        options: impl IntoIterator<Item = CatalogOption<SqlCatalog>>,
    ) -> Result<Self> {
        let name = name.into();
        let options = ConnectionOptions::resolve(options);

        let connect_options = SqliteConnectOptions::from_str(uri)
            .map_err(|e| Error::Config(format!("invalid SQL catalog uri {uri}: {e}")))?
            .create_if_missing(true);

        // Each in-memory connection is a separate database
        let pool_options = if uri.contains(":memory:") || uri.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| Error::transport("connect", uri, e))?;

        let catalog = Self {
            name,
            pool,
            io: FileIo::new(io_properties),
            options,
        };
        catalog.init_schema().await?;

        info!(catalog = %catalog.name, uri = %uri, "SQL catalog initialized");
        Ok(catalog)
    }

    async fn init_schema(&self) -> Result<()> {
        for ddl in [CREATE_TABLES_TABLE, CREATE_NAMESPACE_PROPERTIES_TABLE] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::transport("init_schema", &self.name, e))?;
        }
        Ok(())
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            r#"
SELECT EXISTS (
    SELECT 1 FROM iceberg_namespace_properties WHERE catalog_name = $1 AND namespace = $2
) OR EXISTS (
    SELECT 1 FROM iceberg_tables WHERE catalog_name = $1 AND table_namespace = $2
);
            "#,
        )
        .bind(&self.name) // $1
        .bind(namespace) // $2
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::transport("namespace_exists", namespace, e))?;
        Ok(found != 0)
    }

    async fn require_namespace(&self, namespace: &Identifier) -> Result<String> {
        let key = namespace_key(namespace)?;
        if !self.namespace_exists(&key).await? {
            return Err(Error::NoSuchNamespace(namespace.to_string()));
        }
        Ok(key)
    }

    async fn current_metadata_location(
        &self,
        namespace: &str,
        table: &str,
    ) -> Result<Option<String>> {
        let location: Option<Option<String>> = sqlx::query_scalar(
            r#"
SELECT metadata_location FROM iceberg_tables
WHERE catalog_name = $1 AND table_namespace = $2 AND table_name = $3;
            "#,
        )
        .bind(&self.name) // $1
        .bind(namespace) // $2
        .bind(table) // $3
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::transport("load_table", format!("{namespace}.{table}"), e))?;
        Ok(location.flatten())
    }

    async fn read_properties(&self, namespace: &str) -> Result<Properties> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
SELECT property_key, property_value FROM iceberg_namespace_properties
WHERE catalog_name = $1 AND namespace = $2;
            "#,
        )
        .bind(&self.name) // $1
        .bind(namespace) // $2
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::transport("load_namespace_properties", namespace, e))?;

        Ok(rows
            .into_iter()
            .filter(|(key, _)| key != NAMESPACE_MARKER_KEY)
            .map(|(key, value)| (key, value.unwrap_or_default()))
            .collect())
    }

    async fn insert_table_row(
        &self,
        namespace: &str,
        name: &str,
        staged: &StagedMetadata,
    ) -> Result<()> {
        sqlx::query(
            r#"
INSERT INTO iceberg_tables ( catalog_name, table_namespace, table_name, metadata_location, previous_metadata_location )
VALUES ( $1, $2, $3, $4, NULL );
            "#,
        )
        .bind(&self.name) // $1
        .bind(namespace) // $2
        .bind(name) // $3
        .bind(&staged.location) // $4
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::TableAlreadyExists(format!("{namespace}.{name}"))
            } else {
                Error::transport("create_table", format!("{namespace}.{name}"), e)
            }
        })?;
        Ok(())
    }
}

#[async_trait]
impl CatalogBackend for SqlCatalog {
    fn catalog_type(&self) -> CatalogType {
        CatalogType::Sql
    }

    async fn create_table(
        &self,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table> {
        let (namespace, name) = identifier.split_table()?;
        let (ns_key, _) = table_key(identifier)?;
        if !self.namespace_exists(&ns_key).await? {
            return Err(Error::NoSuchNamespace(namespace.to_string()));
        }

        if self.current_metadata_location(&ns_key, name).await?.is_some() {
            return Err(Error::TableAlreadyExists(identifier.to_string()));
        }

        let staged = pointer::stage_new_table(
            &self.io,
            self.options.warehouse_location.as_deref(),
            &namespace,
            name,
            schema,
            options,
        )
        .await?;

        if let Err(e) = self.insert_table_row(&ns_key, name, &staged).await {
            pointer::discard(&self.io, &staged).await;
            return Err(e);
        }

        info!(table = %identifier, location = %staged.location, "Created table");
        Ok(Table::new(identifier.clone(), staged.metadata, staged.location))
    }

    async fn commit_table(
        &self,
        table: &Table,
        requirements: &[TableRequirement],
        updates: &[TableUpdate],
    ) -> Result<(TableMetadata, String)> {
        let identifier = table.identifier();
        let (ns_key, name) = table_key(identifier)?;

        let current_location = self
            .current_metadata_location(&ns_key, name)
            .await?
            .ok_or_else(|| Error::NoSuchTable(identifier.to_string()))?;
        let current = self.io.read_metadata(&current_location).await?;

        let staged = pointer::stage_table_commit(
            &self.io,
            &current,
            &current_location,
            requirements,
            updates,
        )
        .await?;

        let swapped = sqlx::query(
            r#"
UPDATE iceberg_tables
SET metadata_location = $1, previous_metadata_location = $2
WHERE catalog_name = $3 AND table_namespace = $4 AND table_name = $5 AND metadata_location = $2;
            "#,
        )
        .bind(&staged.location) // $1
        .bind(&current_location) // $2
        .bind(&self.name) // $3
        .bind(&ns_key) // $4
        .bind(name) // $5
        .execute(&self.pool)
        .await;

        match swapped {
            Ok(result) if result.rows_affected() == 1 => {
                info!(table = %identifier, location = %staged.location, "Committed table metadata");
                Ok((staged.metadata, staged.location))
            }
            Ok(_) => {
                pointer::discard(&self.io, &staged).await;
                Err(Error::CommitFailed(format!(
                    "{identifier} was updated concurrently"
                )))
            }
            Err(e) => {
                pointer::discard(&self.io, &staged).await;
                Err(Error::transport("commit_table", identifier, e))
            }
        }
    }

    async fn list_tables(&self, namespace: &Identifier) -> Result<Vec<Identifier>> {
        let ns_key = self.require_namespace(namespace).await?;

        let names: Vec<String> = sqlx::query_scalar(
            r#"
SELECT table_name FROM iceberg_tables
WHERE catalog_name = $1 AND table_namespace = $2
ORDER BY table_name;
            "#,
        )
        .bind(&self.name) // $1
        .bind(&ns_key) // $2
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::transport("list_tables", namespace, e))?;

        Ok(names.into_iter().map(|name| namespace.child(name)).collect())
    }

    async fn load_table(&self, identifier: &Identifier, properties: &Properties) -> Result<Table> {
        let (ns_key, name) = table_key(identifier)?;

        let location = self
            .current_metadata_location(&ns_key, name)
            .await?
            .ok_or_else(|| Error::NoSuchTable(identifier.to_string()))?;
        let metadata = self.io.read_metadata(&location).await?;

        debug!(table = %identifier, location = %location, "Loaded table");
        Ok(Table::new(identifier.clone(), metadata, location)
            .with_io_properties(properties.clone()))
    }

    async fn drop_table(&self, identifier: &Identifier) -> Result<()> {
        let (ns_key, name) = table_key(identifier)?;

        let result = sqlx::query(
            r#"
DELETE FROM iceberg_tables
WHERE catalog_name = $1 AND table_namespace = $2 AND table_name = $3;
            "#,
        )
        .bind(&self.name) // $1
        .bind(&ns_key) // $2
        .bind(name) // $3
        .execute(&self.pool)
        .await
        .map_err(|e| Error::transport("drop_table", identifier, e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NoSuchTable(identifier.to_string()));
        }
        info!(table = %identifier, "Dropped table");
        Ok(())
    }

    async fn rename_table(&self, from: &Identifier, to: &Identifier) -> Result<Table> {
        let (from_key, from_name) = table_key(from)?;
        let (to_key, to_name) = table_key(to)?;

        if self
            .current_metadata_location(&from_key, from_name)
            .await?
            .is_none()
        {
            return Err(Error::NoSuchTable(from.to_string()));
        }
        if !self.namespace_exists(&to_key).await? {
            return Err(Error::NoSuchNamespace(to.namespace().to_string()));
        }
        if self
            .current_metadata_location(&to_key, to_name)
            .await?
            .is_some()
        {
            return Err(Error::TableAlreadyExists(to.to_string()));
        }

        let result = sqlx::query(
            r#"
UPDATE iceberg_tables
SET table_namespace = $1, table_name = $2
WHERE catalog_name = $3 AND table_namespace = $4 AND table_name = $5;
            "#,
        )
        .bind(&to_key) // $1
        .bind(to_name) // $2
        .bind(&self.name) // $3
        .bind(&from_key) // $4
        .bind(from_name) // $5
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::TableAlreadyExists(to.to_string())
            } else {
                Error::transport("rename_table", from, e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NoSuchTable(from.to_string()));
        }

        info!(from = %from, to = %to, "Renamed table");
        CatalogBackend::load_table(self, to, &Properties::new()).await
    }

    async fn list_namespaces(&self, parent: &Identifier) -> Result<Vec<Identifier>> {
        let keys: Vec<String> = sqlx::query_scalar(
            r#"
SELECT namespace FROM iceberg_namespace_properties WHERE catalog_name = $1
UNION
SELECT table_namespace FROM iceberg_tables WHERE catalog_name = $1;
            "#,
        )
        .bind(&self.name) // $1
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::transport("list_namespaces", parent, e))?;

        let depth = parent.len() + 1;
        let children: BTreeSet<Identifier> = keys
            .iter()
            .map(|key| Identifier::new(key.split(NAMESPACE_SEPARATOR)))
            .filter(|ns| ns.len() >= depth && ns.starts_with(parent))
            .map(|ns| Identifier::new(ns.segments()[..depth].iter().cloned()))
            .collect();

        Ok(children.into_iter().collect())
    }

    async fn create_namespace(&self, namespace: &Identifier, properties: &Properties) -> Result<()> {
        let ns_key = namespace_key(namespace)?;
        check_reserved_keys(properties.keys())?;
        if self.namespace_exists(&ns_key).await? {
            return Err(Error::NamespaceAlreadyExists(namespace.to_string()));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::transport("create_namespace", namespace, e))?;

        let marker = (NAMESPACE_MARKER_KEY, NAMESPACE_MARKER_VALUE);
        let entries = std::iter::once(marker).chain(
            properties
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );

        for (key, value) in entries {
            sqlx::query(
                r#"
INSERT INTO iceberg_namespace_properties ( catalog_name, namespace, property_key, property_value )
VALUES ( $1, $2, $3, $4 );
                "#,
            )
            .bind(&self.name) // $1
            .bind(&ns_key) // $2
            .bind(key) // $3
            .bind(value) // $4
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::NamespaceAlreadyExists(namespace.to_string())
                } else {
                    Error::transport("create_namespace", namespace, e)
                }
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::transport("create_namespace", namespace, e))?;

        info!(namespace = %namespace, "Created namespace");
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &Identifier) -> Result<()> {
        let ns_key = self.require_namespace(namespace).await?;

        let tables: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(*) FROM iceberg_tables WHERE catalog_name = $1 AND table_namespace = $2;
            "#,
        )
        .bind(&self.name) // $1
        .bind(&ns_key) // $2
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::transport("drop_namespace", namespace, e))?;

        if tables > 0 {
            return Err(Error::NamespaceNotEmpty(namespace.to_string()));
        }

        sqlx::query(
            r#"
DELETE FROM iceberg_namespace_properties WHERE catalog_name = $1 AND namespace = $2;
            "#,
        )
        .bind(&self.name) // $1
        .bind(&ns_key) // $2
        .execute(&self.pool)
        .await
        .map_err(|e| Error::transport("drop_namespace", namespace, e))?;

        info!(namespace = %namespace, "Dropped namespace");
        Ok(())
    }

    async fn load_namespace_properties(&self, namespace: &Identifier) -> Result<Properties> {
        let ns_key = self.require_namespace(namespace).await?;
        self.read_properties(&ns_key).await
    }

    async fn update_namespace_properties(
        &self,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary> {
        let ns_key = self.require_namespace(namespace).await?;
        check_reserved_keys(updates.keys())?;
        let current = self.read_properties(&ns_key).await?;
        let (next, summary) = reconcile(&current, removals, updates)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::transport("update_namespace_properties", namespace, e))?;

        for key in &summary.removed {
            sqlx::query(
                r#"
DELETE FROM iceberg_namespace_properties
WHERE catalog_name = $1 AND namespace = $2 AND property_key = $3;
                "#,
            )
            .bind(&self.name) // $1
            .bind(&ns_key) // $2
            .bind(key) // $3
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::transport("update_namespace_properties", namespace, e))?;
        }

        for key in &summary.updated {
            sqlx::query(
                r#"
INSERT INTO iceberg_namespace_properties ( catalog_name, namespace, property_key, property_value )
VALUES ( $1, $2, $3, $4 )
ON CONFLICT ( catalog_name, namespace, property_key )
DO UPDATE SET property_value = excluded.property_value;
                "#,
            )
            .bind(&self.name) // $1
            .bind(&ns_key) // $2
            .bind(key) // $3
            .bind(next.get(key).map(String::as_str)) // $4
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::transport("update_namespace_properties", namespace, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::transport("update_namespace_properties", namespace, e))?;

        info!(
            namespace = %namespace,
            removed = summary.removed.len(),
            updated = summary.updated.len(),
            missing = summary.missing.len(),
            "Updated namespace properties"
        );
        Ok(summary)
    }
}
