//! AWS Glue catalog implementation.
//!
//! Glue databases are namespaces (one level only) and Glue tables carry the
//! Iceberg pointer in their parameters: `table_type = ICEBERG`,
//! `metadata_location` and `previous_metadata_location`. Commits rewrite the
//! table with `UpdateTable`, guarded by the Glue `VersionId` read alongside the
//! current pointer.
//!
//! AWS properties understood by the catalog:
//! - `region` / `client.region`
//! - `access-key-id`, `secret-access-key`, `session-token` (optionally `client.` prefixed)
//! - `glue.id`: catalog ID, defaults to the caller's account
//! - `glue.endpoint`: alternate Glue endpoint
//! - `s3.*`: passed to the object store used for metadata files

use super::aws;
use super::pointer::{
    self, ICEBERG_TABLE_TYPE, METADATA_LOCATION, PREVIOUS_METADATA_LOCATION, TABLE_TYPE,
};
use super::{CatalogBackend, CatalogType};
use crate::identifier::Identifier;
use crate::io::FileIo;
use crate::options::{CatalogOption, ConnectionOptions, CreateTableOptions};
use crate::properties::{reconcile, Properties, PropertiesUpdateSummary};
use crate::table::{Schema, Table, TableMetadata, TableRequirement, TableUpdate};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_glue::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_glue::types::{
    Column, Database, DatabaseInput, SerDeInfo, StorageDescriptor, Table as GlueTable, TableInput,
};
use aws_sdk_glue::Client as GlueClient;
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{debug, info, warn};

/// AWS property holding the Glue catalog ID.
pub const GLUE_CATALOG_ID: &str = "glue.id";
/// AWS property holding an alternate Glue endpoint.
pub const GLUE_ENDPOINT: &str = "glue.endpoint";

/// Namespace property mapped to the database `LocationUri`.
pub const LOCATION_PROPERTY: &str = "location";
/// Namespace property mapped to the database `Description`.
pub const COMMENT_PROPERTY: &str = "comment";

const EXTERNAL_TABLE: &str = "EXTERNAL_TABLE";
const ICEBERG_INPUT_FORMAT: &str = "org.apache.iceberg.mr.hive.HiveIcebergInputFormat";
const ICEBERG_OUTPUT_FORMAT: &str = "org.apache.iceberg.mr.hive.HiveIcebergOutputFormat";
const ICEBERG_SERDE: &str = "org.apache.iceberg.mr.hive.HiveIcebergSerDe";

const ENTITY_NOT_FOUND: &str = "EntityNotFoundException";
const ALREADY_EXISTS: &str = "AlreadyExistsException";
const CONCURRENT_MODIFICATION: &str = "ConcurrentModificationException";

fn error_code<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> Option<&str> {
    err.as_service_error().and_then(|e| e.code())
}

/// Kind of Glue call a service error came from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum GlueCall {
    /// Reads, updates and deletes addressed to a database
    Database,
    CreateDatabase,
    /// Reads and deletes addressed to a table
    Table,
    CreateTable,
    UpdateTable,
}

/// Map a Glue error code to the catalog error for `target`.
fn glue_error(
    call: GlueCall,
    code: Option<&str>,
    operation: &'static str,
    target: &Identifier,
    err: impl Display,
) -> Error {
    match (call, code) {
        (GlueCall::CreateDatabase, Some(ALREADY_EXISTS)) => {
            Error::NamespaceAlreadyExists(target.to_string())
        }
        (GlueCall::CreateTable, Some(ALREADY_EXISTS)) => {
            Error::TableAlreadyExists(target.to_string())
        }
        (GlueCall::CreateTable, Some(ENTITY_NOT_FOUND)) => {
            Error::NoSuchNamespace(target.namespace().to_string())
        }
        (GlueCall::UpdateTable, Some(CONCURRENT_MODIFICATION)) => {
            Error::CommitFailed(format!("{target} was updated concurrently"))
        }
        (GlueCall::Table | GlueCall::UpdateTable, Some(ENTITY_NOT_FOUND)) => {
            Error::NoSuchTable(target.to_string())
        }
        (GlueCall::Database, Some(ENTITY_NOT_FOUND)) => {
            Error::NoSuchNamespace(target.to_string())
        }
        _ => Error::transport(operation, target, err),
    }
}

/// Databases holding any table cannot be dropped.
fn require_empty(tables: &[GlueTable], namespace: &Identifier) -> Result<()> {
    if tables.is_empty() {
        Ok(())
    } else {
        Err(Error::NamespaceNotEmpty(namespace.to_string()))
    }
}

async fn delete_table_entry(
    client: &GlueClient,
    catalog_id: Option<String>,
    identifier: &Identifier,
) -> Result<()> {
    let (database, name) = pointer::database_and_table(identifier)?;
    client
        .delete_table()
        .set_catalog_id(catalog_id)
        .database_name(database)
        .name(name)
        .send()
        .await
        .map_err(|e| {
            glue_error(
                GlueCall::Table,
                error_code(&e),
                "drop_table",
                identifier,
                DisplayErrorContext(&e),
            )
        })?;
    Ok(())
}

/// Copy `from` to `to` through `input`, then delete `from`. The copy is removed
/// again when the delete fails.
async fn move_table_entry(
    client: GlueClient,
    catalog_id: Option<String>,
    input: TableInput,
    from: Identifier,
    to: Identifier,
) -> Result<()> {
    let (to_database, _) = pointer::database_and_table(&to)?;
    client
        .create_table()
        .set_catalog_id(catalog_id.clone())
        .database_name(to_database)
        .table_input(input)
        .send()
        .await
        .map_err(|e| {
            glue_error(
                GlueCall::CreateTable,
                error_code(&e),
                "rename_table",
                &to,
                DisplayErrorContext(&e),
            )
        })?;

    if let Err(e) = delete_table_entry(&client, catalog_id.clone(), &from).await {
        if let Err(rollback) = delete_table_entry(&client, catalog_id, &to).await {
            warn!(table = %to, error = %rollback, "Failed to roll back renamed table copy");
        }
        return Err(e);
    }
    Ok(())
}

/// Namespace properties of a Glue database.
fn database_properties(database: &Database) -> Properties {
    let mut properties = database.parameters().cloned().unwrap_or_default();
    if let Some(location) = database.location_uri() {
        properties.insert(LOCATION_PROPERTY.to_string(), location.to_string());
    }
    if let Some(description) = database.description() {
        properties.insert(COMMENT_PROPERTY.to_string(), description.to_string());
    }
    properties
}

/// Glue database input for a namespace and its properties.
fn database_input(name: &str, properties: &Properties) -> Result<DatabaseInput> {
    let parameters: HashMap<String, String> = properties
        .iter()
        .filter(|(k, _)| k.as_str() != LOCATION_PROPERTY && k.as_str() != COMMENT_PROPERTY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    DatabaseInput::builder()
        .name(name)
        .set_location_uri(properties.get(LOCATION_PROPERTY).cloned())
        .set_description(properties.get(COMMENT_PROPERTY).cloned())
        .set_parameters(Some(parameters))
        .build()
        .map_err(|e| Error::Config(format!("Failed to build database input: {}", e)))
}

/// Storage descriptor listing the current schema's columns.
fn storage_descriptor(metadata: &TableMetadata) -> Result<StorageDescriptor> {
    let mut columns = Vec::new();
    if let Some(schema) = metadata.current_schema() {
        for field in &schema.fields {
            let column = Column::builder()
                .name(&field.name)
                .r#type(pointer::hive_column_type(&field.field_type))
                .set_comment(field.doc.clone())
                .build()
                .map_err(|e| Error::Config(format!("Failed to build column: {}", e)))?;
            columns.push(column);
        }
    }

    Ok(StorageDescriptor::builder()
        .set_columns(Some(columns))
        .location(&metadata.location)
        .input_format(ICEBERG_INPUT_FORMAT)
        .output_format(ICEBERG_OUTPUT_FORMAT)
        .serde_info(
            SerDeInfo::builder()
                .serialization_library(ICEBERG_SERDE)
                .build(),
        )
        .build())
}

/// Table input pointing at `metadata_location`, keeping any other parameters.
fn table_input(
    name: &str,
    metadata: &TableMetadata,
    metadata_location: &str,
    previous_location: Option<&str>,
    existing: Option<&HashMap<String, String>>,
) -> Result<TableInput> {
    let mut parameters = existing.cloned().unwrap_or_default();
    parameters.insert(TABLE_TYPE.to_string(), ICEBERG_TABLE_TYPE.to_string());
    parameters.insert(METADATA_LOCATION.to_string(), metadata_location.to_string());
    match previous_location {
        Some(previous) => {
            parameters.insert(PREVIOUS_METADATA_LOCATION.to_string(), previous.to_string());
        }
        None => {
            parameters.remove(PREVIOUS_METADATA_LOCATION);
        }
    }

    TableInput::builder()
        .name(name)
        .table_type(EXTERNAL_TABLE)
        .storage_descriptor(storage_descriptor(metadata)?)
        .set_description(metadata.properties.get(COMMENT_PROPERTY).cloned())
        .set_parameters(Some(parameters))
        .build()
        .map_err(|e| Error::Config(format!("Failed to build table input: {}", e)))
}

/// Copy of an existing table under a new name.
fn renamed_table_input(table: &GlueTable, name: &str) -> Result<TableInput> {
    TableInput::builder()
        .name(name)
        .set_description(table.description().map(str::to_string))
        .set_owner(table.owner().map(str::to_string))
        .set_table_type(table.table_type().map(str::to_string))
        .set_storage_descriptor(table.storage_descriptor().cloned())
        .set_parameters(table.parameters().cloned())
        .build()
        .map_err(|e| Error::Config(format!("Failed to build table input: {}", e)))
}

fn is_iceberg_table(table: &GlueTable) -> bool {
    table
        .parameters()
        .and_then(|p| p.get(TABLE_TYPE))
        .map(|t| t.eq_ignore_ascii_case(ICEBERG_TABLE_TYPE))
        .unwrap_or(false)
}

/// Current metadata location of an Iceberg table; other tables are reported missing.
fn iceberg_metadata_location(table: &GlueTable, identifier: &Identifier) -> Result<String> {
    if !is_iceberg_table(table) {
        warn!(table = %identifier, "Glue table is not an Iceberg table");
        return Err(Error::NoSuchTable(identifier.to_string()));
    }
    table
        .parameters()
        .and_then(|p| p.get(METADATA_LOCATION))
        .cloned()
        .ok_or_else(|| Error::NoSuchTable(identifier.to_string()))
}

/// AWS Glue catalog.
pub struct GlueCatalog {
    client: GlueClient,
    catalog_id: Option<String>,
    io: FileIo,
    options: ConnectionOptions,
}

impl std::fmt::Debug for GlueCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlueCatalog")
            .field("catalog_id", &self.catalog_id)
            .field("options", &self.options)
            .finish()
    }
}

impl GlueCatalog {
    /// Create a Glue catalog client.
    pub async fn new(options: impl IntoIterator<Item = CatalogOption<GlueCatalog>>) -> Result<Self> {
        let options = ConnectionOptions::resolve(options);
        let sdk_config = aws::load_sdk_config(&options).await;

        let mut config = aws_sdk_glue::config::Builder::from(&sdk_config);
        if let Some(endpoint) = options.aws_property(&[GLUE_ENDPOINT]) {
            config = config.endpoint_url(endpoint);
        }
        let client = GlueClient::from_conf(config.build());

        let catalog_id = options.aws_property(&[GLUE_CATALOG_ID]).map(str::to_string);
        let io = FileIo::new(aws::io_properties(&options, &sdk_config));

        info!(
            region = ?sdk_config.region(),
            catalog_id = ?catalog_id,
            "AWS Glue catalog client initialized"
        );

        Ok(Self {
            client,
            catalog_id,
            io,
            options,
        })
    }

    async fn get_database(&self, database: &str, namespace: &Identifier) -> Result<Database> {
        let result = self
            .client
            .get_database()
            .set_catalog_id(self.catalog_id.clone())
            .name(database)
            .send()
            .await;

        match result {
            Ok(output) => output
                .database()
                .cloned()
                .ok_or_else(|| Error::NoSuchNamespace(namespace.to_string())),
            Err(e) => Err(glue_error(
                GlueCall::Database,
                error_code(&e),
                "get_database",
                namespace,
                DisplayErrorContext(&e),
            )),
        }
    }

    async fn get_table(
        &self,
        database: &str,
        name: &str,
        identifier: &Identifier,
    ) -> Result<GlueTable> {
        let result = self
            .client
            .get_table()
            .set_catalog_id(self.catalog_id.clone())
            .database_name(database)
            .name(name)
            .send()
            .await;

        match result {
            Ok(output) => output
                .table()
                .cloned()
                .ok_or_else(|| Error::NoSuchTable(identifier.to_string())),
            Err(e) => Err(glue_error(
                GlueCall::Table,
                error_code(&e),
                "get_table",
                identifier,
                DisplayErrorContext(&e),
            )),
        }
    }

    /// All tables of a database, following pagination.
    async fn get_tables(&self, database: &str, namespace: &Identifier) -> Result<Vec<GlueTable>> {
        let mut tables = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let result = self
                .client
                .get_tables()
                .set_catalog_id(self.catalog_id.clone())
                .database_name(database)
                .set_next_token(next_token.take())
                .send()
                .await;

            let output = result.map_err(|e| {
                glue_error(
                    GlueCall::Database,
                    error_code(&e),
                    "list_tables",
                    namespace,
                    DisplayErrorContext(&e),
                )
            })?;

            tables.extend(output.table_list().iter().cloned());
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(tables)
    }
}

#[async_trait]
impl CatalogBackend for GlueCatalog {
    fn catalog_type(&self) -> CatalogType {
        CatalogType::Glue
    }

    async fn create_table(
        &self,
        identifier: &Identifier,
        schema: Schema,
        mut options: CreateTableOptions,
    ) -> Result<Table> {
        let (database, name) = pointer::database_and_table(identifier)?;
        let glue_database = self.get_database(&database, &identifier.namespace()).await?;

        let warehouse = self.options.warehouse_location.as_deref();
        if options.location.is_none() && warehouse.is_none() {
            options.location = glue_database
                .location_uri()
                .map(|location| format!("{}/{}", location.trim_end_matches('/'), name));
        }

        let staged = pointer::stage_new_table(
            &self.io,
            warehouse,
            &identifier.namespace(),
            &name,
            schema,
            options,
        )
        .await?;

        let input = match table_input(&name, &staged.metadata, &staged.location, None, None) {
            Ok(input) => input,
            Err(e) => {
                pointer::discard(&self.io, &staged).await;
                return Err(e);
            }
        };

        let result = self
            .client
            .create_table()
            .set_catalog_id(self.catalog_id.clone())
            .database_name(&database)
            .table_input(input)
            .send()
            .await;

        if let Err(e) = result {
            pointer::discard(&self.io, &staged).await;
            return Err(glue_error(
                GlueCall::CreateTable,
                error_code(&e),
                "create_table",
                identifier,
                DisplayErrorContext(&e),
            ));
        }

        info!(table = %identifier, location = %staged.location, "Created Glue table");
        Ok(Table::new(identifier.clone(), staged.metadata, staged.location))
    }

    async fn commit_table(
        &self,
        table: &Table,
        requirements: &[TableRequirement],
        updates: &[TableUpdate],
    ) -> Result<(TableMetadata, String)> {
        let identifier = table.identifier();
        let (database, name) = pointer::database_and_table(identifier)?;

        let glue_table = self.get_table(&database, &name, identifier).await?;
        let current_location = iceberg_metadata_location(&glue_table, identifier)?;
        let current = self.io.read_metadata(&current_location).await?;

        let staged = pointer::stage_table_commit(
            &self.io,
            &current,
            &current_location,
            requirements,
            updates,
        )
        .await?;

        let input = match table_input(
            &name,
            &staged.metadata,
            &staged.location,
            Some(&current_location),
            glue_table.parameters(),
        ) {
            Ok(input) => input,
            Err(e) => {
                pointer::discard(&self.io, &staged).await;
                return Err(e);
            }
        };

        let result = self
            .client
            .update_table()
            .set_catalog_id(self.catalog_id.clone())
            .database_name(&database)
            .table_input(input)
            .set_version_id(glue_table.version_id().map(str::to_string))
            .skip_archive(true)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(table = %identifier, location = %staged.location, "Committed table metadata to Glue");
                Ok((staged.metadata, staged.location))
            }
            Err(e) => {
                pointer::discard(&self.io, &staged).await;
                Err(glue_error(
                    GlueCall::UpdateTable,
                    error_code(&e),
                    "commit_table",
                    identifier,
                    DisplayErrorContext(&e),
                ))
            }
        }
    }

    async fn list_tables(&self, namespace: &Identifier) -> Result<Vec<Identifier>> {
        let database = pointer::database_name(namespace)?;
        let tables = self.get_tables(database, namespace).await?;

        Ok(tables
            .iter()
            .filter(|t| is_iceberg_table(t))
            .map(|t| namespace.child(t.name()))
            .collect())
    }

    async fn load_table(&self, identifier: &Identifier, properties: &Properties) -> Result<Table> {
        let (database, name) = pointer::database_and_table(identifier)?;
        let glue_table = self.get_table(&database, &name, identifier).await?;
        let location = iceberg_metadata_location(&glue_table, identifier)?;
        let metadata = self.io.read_metadata(&location).await?;

        debug!(table = %identifier, location = %location, "Loaded Glue table");
        Ok(Table::new(identifier.clone(), metadata, location).with_io_properties(properties.clone()))
    }

    async fn drop_table(&self, identifier: &Identifier) -> Result<()> {
        delete_table_entry(&self.client, self.catalog_id.clone(), identifier).await?;

        info!(table = %identifier, "Dropped Glue table");
        Ok(())
    }

    async fn rename_table(&self, from: &Identifier, to: &Identifier) -> Result<Table> {
        let (from_database, from_name) = pointer::database_and_table(from)?;
        let (to_database, to_name) = pointer::database_and_table(to)?;

        let source = self.get_table(&from_database, &from_name, from).await?;
        iceberg_metadata_location(&source, from)?;
        self.get_database(&to_database, &to.namespace()).await?;

        // Glue has no rename. The copy and delete run as their own task so a
        // cancelled caller cannot leave both entries behind.
        let input = renamed_table_input(&source, &to_name)?;
        tokio::spawn(move_table_entry(
            self.client.clone(),
            self.catalog_id.clone(),
            input,
            from.clone(),
            to.clone(),
        ))
        .await
        .map_err(|e| Error::transport("rename_table", from, e))??;

        info!(from = %from, to = %to, "Renamed Glue table");
        CatalogBackend::load_table(self, to, &Properties::new()).await
    }

    async fn list_namespaces(&self, parent: &Identifier) -> Result<Vec<Identifier>> {
        pointer::require_root(parent)?;

        let mut namespaces = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .get_databases()
                .set_catalog_id(self.catalog_id.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| Error::transport("list_namespaces", parent, DisplayErrorContext(&e)))?;

            namespaces.extend(
                output
                    .database_list()
                    .iter()
                    .map(|db| Identifier::from([db.name()])),
            );
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(namespaces)
    }

    async fn create_namespace(&self, namespace: &Identifier, properties: &Properties) -> Result<()> {
        let database = pointer::database_name(namespace)?;
        let input = database_input(database, properties)?;

        let result = self
            .client
            .create_database()
            .set_catalog_id(self.catalog_id.clone())
            .database_input(input)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(namespace = %namespace, "Created Glue database");
                Ok(())
            }
            Err(e) => Err(glue_error(
                GlueCall::CreateDatabase,
                error_code(&e),
                "create_namespace",
                namespace,
                DisplayErrorContext(&e),
            )),
        }
    }

    async fn drop_namespace(&self, namespace: &Identifier) -> Result<()> {
        let database = pointer::database_name(namespace)?;
        self.get_database(database, namespace).await?;

        let tables = self
            .client
            .get_tables()
            .set_catalog_id(self.catalog_id.clone())
            .database_name(database)
            .max_results(1)
            .send()
            .await
            .map_err(|e| {
                glue_error(
                    GlueCall::Database,
                    error_code(&e),
                    "drop_namespace",
                    namespace,
                    DisplayErrorContext(&e),
                )
            })?;
        require_empty(tables.table_list(), namespace)?;

        let result = self
            .client
            .delete_database()
            .set_catalog_id(self.catalog_id.clone())
            .name(database)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(namespace = %namespace, "Dropped Glue database");
                Ok(())
            }
            Err(e) => Err(glue_error(
                GlueCall::Database,
                error_code(&e),
                "drop_namespace",
                namespace,
                DisplayErrorContext(&e),
            )),
        }
    }

    async fn load_namespace_properties(&self, namespace: &Identifier) -> Result<Properties> {
        let database = pointer::database_name(namespace)?;
        let glue_database = self.get_database(database, namespace).await?;
        Ok(database_properties(&glue_database))
    }

    async fn update_namespace_properties(
        &self,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary> {
        let database = pointer::database_name(namespace)?;
        let current = database_properties(&self.get_database(database, namespace).await?);
        let (next, summary) = reconcile(&current, removals, updates)?;

        self.client
            .update_database()
            .set_catalog_id(self.catalog_id.clone())
            .name(database)
            .database_input(database_input(database, &next)?)
            .send()
            .await
            .map_err(|e| {
                glue_error(
                    GlueCall::Database,
                    error_code(&e),
                    "update_namespace_properties",
                    namespace,
                    DisplayErrorContext(&e),
                )
            })?;

        info!(
            namespace = %namespace,
            removed = summary.removed.len(),
            updated = summary.updated.len(),
            "Updated Glue database properties"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::options::{with_aws_properties, with_warehouse_location};
    use crate::table::SchemaField;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn metadata() -> TableMetadata {
        let mut id = SchemaField::primitive(1, "id", "long", true);
        id.doc = Some("Primary key".to_string());
        TableMetadata::new(
            Schema::new(
                0,
                vec![id, SchemaField::primitive(2, "ts", "timestamptz", false)],
            ),
            None,
            None,
            "s3://bucket/wh/db/events",
            Properties::from([(COMMENT_PROPERTY.to_string(), "Event stream".to_string())]),
        )
    }

    async fn catalog() -> GlueCatalog {
        GlueCatalog::new(vec![
            with_warehouse_location("s3://bucket/wh"),
            with_aws_properties(Properties::from([
                ("region".to_string(), "us-east-1".to_string()),
                ("access-key-id".to_string(), "AKIDEXAMPLE".to_string()),
                ("secret-access-key".to_string(), "secret".to_string()),
                (GLUE_CATALOG_ID.to_string(), "123456789012".to_string()),
            ])),
        ])
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_glue_catalog_client_creation() {
        let catalog = catalog().await;
        assert_eq!(catalog.catalog_id.as_deref(), Some("123456789012"));
        assert_eq!(
            catalog.options.warehouse_location.as_deref(),
            Some("s3://bucket/wh")
        );
        let catalog: Arc<dyn Catalog> = Arc::new(catalog);
        assert_eq!(catalog.catalog_type(), CatalogType::Glue);
    }

    #[tokio::test]
    async fn test_hierarchical_namespaces_rejected_before_any_call() {
        let catalog: Arc<dyn Catalog> = Arc::new(catalog().await);
        let ctx = CancellationToken::new();

        let err = catalog
            .create_namespace(&ctx, &Identifier::from(["a", "b"]), &Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let err = catalog
            .list_namespaces(&ctx, &Identifier::from(["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let err = catalog
            .load_table(&ctx, &Identifier::from(["a", "b", "t"]), &Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[test]
    fn test_database_properties_round_trip() {
        let properties = Properties::from([
            (LOCATION_PROPERTY.to_string(), "s3://bucket/db".to_string()),
            (COMMENT_PROPERTY.to_string(), "Sales data".to_string()),
            ("owner".to_string(), "etl".to_string()),
        ]);

        let input = database_input("sales", &properties).unwrap();
        assert_eq!(input.name(), "sales");
        assert_eq!(input.location_uri(), Some("s3://bucket/db"));
        assert_eq!(input.description(), Some("Sales data"));
        let parameters = input.parameters().unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters["owner"], "etl");

        let database = Database::builder()
            .name("sales")
            .location_uri("s3://bucket/db")
            .description("Sales data")
            .parameters("owner", "etl")
            .build()
            .unwrap();
        assert_eq!(database_properties(&database), properties);
    }

    #[test]
    fn test_table_input_for_new_table() {
        let input = table_input(
            "events",
            &metadata(),
            "s3://bucket/wh/db/events/metadata/00000-a.metadata.json",
            None,
            None,
        )
        .unwrap();

        assert_eq!(input.table_type(), Some(EXTERNAL_TABLE));
        assert_eq!(input.description(), Some("Event stream"));
        let parameters = input.parameters().unwrap();
        assert_eq!(parameters[TABLE_TYPE], ICEBERG_TABLE_TYPE);
        assert!(parameters[METADATA_LOCATION].ends_with("00000-a.metadata.json"));
        assert!(!parameters.contains_key(PREVIOUS_METADATA_LOCATION));

        let sd = input.storage_descriptor().unwrap();
        assert_eq!(sd.location(), Some("s3://bucket/wh/db/events"));
        assert_eq!(sd.input_format(), Some(ICEBERG_INPUT_FORMAT));
        let columns: Vec<(&str, Option<&str>)> =
            sd.columns().iter().map(|c| (c.name(), c.r#type())).collect();
        assert_eq!(
            columns,
            vec![("id", Some("bigint")), ("ts", Some("timestamp"))]
        );
        assert_eq!(sd.columns()[0].comment(), Some("Primary key"));
    }

    #[test]
    fn test_table_input_for_commit_keeps_parameters() {
        let existing = HashMap::from([
            ("owner".to_string(), "etl".to_string()),
            (METADATA_LOCATION.to_string(), "s3://old.json".to_string()),
        ]);
        let input = table_input(
            "events",
            &metadata(),
            "s3://new.json",
            Some("s3://old.json"),
            Some(&existing),
        )
        .unwrap();

        let parameters = input.parameters().unwrap();
        assert_eq!(parameters["owner"], "etl");
        assert_eq!(parameters[METADATA_LOCATION], "s3://new.json");
        assert_eq!(parameters[PREVIOUS_METADATA_LOCATION], "s3://old.json");
    }

    #[test]
    fn test_iceberg_table_detection() {
        let ident = Identifier::from(["db", "t"]);
        let iceberg = GlueTable::builder()
            .name("t")
            .parameters(TABLE_TYPE, "iceberg")
            .parameters(METADATA_LOCATION, "s3://m.json")
            .build()
            .unwrap();
        assert_eq!(
            iceberg_metadata_location(&iceberg, &ident).unwrap(),
            "s3://m.json"
        );

        let hive = GlueTable::builder()
            .name("t")
            .parameters(TABLE_TYPE, "HIVE")
            .build()
            .unwrap();
        assert!(!is_iceberg_table(&hive));
        assert!(matches!(
            iceberg_metadata_location(&hive, &ident),
            Err(Error::NoSuchTable(_))
        ));

        let renamed = renamed_table_input(&iceberg, "t2").unwrap();
        assert_eq!(renamed.name(), "t2");
        assert_eq!(renamed.parameters().unwrap()[METADATA_LOCATION], "s3://m.json");
    }

    #[test]
    fn test_glue_error_codes_map_to_sentinels() {
        let ns = Identifier::from(["db"]);
        let table = ns.child("t");
        let map = |call, code, target: &Identifier| glue_error(call, code, "op", target, "boom");

        assert!(matches!(
            map(GlueCall::Table, Some(ENTITY_NOT_FOUND), &table),
            Error::NoSuchTable(ref t) if t == "db.t"
        ));
        assert!(matches!(
            map(GlueCall::UpdateTable, Some(ENTITY_NOT_FOUND), &table),
            Error::NoSuchTable(_)
        ));
        assert!(matches!(
            map(GlueCall::Database, Some(ENTITY_NOT_FOUND), &ns),
            Error::NoSuchNamespace(ref n) if n == "db"
        ));
        assert!(matches!(
            map(GlueCall::CreateTable, Some(ENTITY_NOT_FOUND), &table),
            Error::NoSuchNamespace(ref n) if n == "db"
        ));
        assert!(matches!(
            map(GlueCall::CreateTable, Some(ALREADY_EXISTS), &table),
            Error::TableAlreadyExists(_)
        ));
        assert!(matches!(
            map(GlueCall::CreateDatabase, Some(ALREADY_EXISTS), &ns),
            Error::NamespaceAlreadyExists(_)
        ));
        assert!(matches!(
            map(GlueCall::UpdateTable, Some(CONCURRENT_MODIFICATION), &table),
            Error::CommitFailed(_)
        ));

        // Codes outside a call's sentinels stay transport errors
        assert!(matches!(
            map(GlueCall::Table, Some(ALREADY_EXISTS), &table),
            Error::Transport { operation: "op", .. }
        ));
        assert!(matches!(
            map(GlueCall::Database, None, &ns),
            Error::Transport { .. }
        ));
    }

    #[test]
    fn test_database_with_tables_is_not_empty() {
        let ns = Identifier::from(["db"]);
        assert!(require_empty(&[], &ns).is_ok());

        let tables = [GlueTable::builder().name("orders").build().unwrap()];
        assert!(matches!(
            require_empty(&tables, &ns),
            Err(Error::NamespaceNotEmpty(ref n)) if n == "db"
        ));
    }

    async fn glue_at(endpoint: &str) -> GlueCatalog {
        GlueCatalog::new(vec![with_aws_properties(Properties::from([
            ("region".to_string(), "us-east-1".to_string()),
            ("access-key-id".to_string(), "AKIDEXAMPLE".to_string()),
            ("secret-access-key".to_string(), "secret".to_string()),
            (GLUE_ENDPOINT.to_string(), endpoint.to_string()),
        ]))])
        .await
        .unwrap()
    }

    async fn catalog_at(endpoint: &str) -> Arc<dyn Catalog> {
        Arc::new(glue_at(endpoint).await)
    }

    fn glue_call(server: &mut mockito::ServerGuard, target: &str) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_header("x-amz-target", format!("AWSGlue.{target}").as_str())
            .with_header("content-type", "application/x-amz-json-1.1")
    }

    #[tokio::test]
    async fn test_missing_table_through_service() {
        let mut server = mockito::Server::new_async().await;
        let get_table = glue_call(&mut server, "GetTable")
            .with_status(400)
            .with_header("x-amzn-errortype", ENTITY_NOT_FOUND)
            .with_body(r#"{"__type":"EntityNotFoundException","Message":"Table t not found"}"#)
            .create_async()
            .await;

        let catalog = catalog_at(&server.url()).await;
        let err = catalog
            .load_table(
                &CancellationToken::new(),
                &Identifier::from(["db", "t"]),
                &Properties::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchTable(ref t) if t == "db.t"));
        get_table.assert_async().await;
    }

    #[tokio::test]
    async fn test_drop_database_with_tables_through_service() {
        let mut server = mockito::Server::new_async().await;
        let get_database = glue_call(&mut server, "GetDatabase")
            .with_status(200)
            .with_body(r#"{"Database":{"Name":"db"}}"#)
            .create_async()
            .await;
        let get_tables = glue_call(&mut server, "GetTables")
            .with_status(200)
            .with_body(r#"{"TableList":[{"Name":"orders"}]}"#)
            .create_async()
            .await;
        let delete_database = glue_call(&mut server, "DeleteDatabase")
            .with_status(200)
            .with_body("{}")
            .expect(0)
            .create_async()
            .await;

        let catalog = catalog_at(&server.url()).await;
        let err = catalog
            .drop_namespace(&CancellationToken::new(), &Identifier::from(["db"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NamespaceNotEmpty(_)));
        get_database.assert_async().await;
        get_tables.assert_async().await;
        delete_database.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_move_removes_the_copy() {
        let mut server = mockito::Server::new_async().await;
        let create = glue_call(&mut server, "CreateTable")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "DatabaseName": "archive",
                "TableInput": {"Name": "orders_2024"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let delete_source = glue_call(&mut server, "DeleteTable")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"Name": "orders"})))
            .with_status(400)
            .with_header("x-amzn-errortype", "AccessDeniedException")
            .with_body(r#"{"__type":"AccessDeniedException","Message":"not allowed"}"#)
            .create_async()
            .await;
        let delete_copy = glue_call(&mut server, "DeleteTable")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"DatabaseName": "archive", "Name": "orders_2024"}),
            ))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let glue = glue_at(&server.url()).await;
        let input = TableInput::builder().name("orders_2024").build().unwrap();
        let err = move_table_entry(
            glue.client.clone(),
            None,
            input,
            Identifier::from(["sales", "orders"]),
            Identifier::from(["archive", "orders_2024"]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        create.assert_async().await;
        delete_source.assert_async().await;
        delete_copy.assert_async().await;
    }
}
