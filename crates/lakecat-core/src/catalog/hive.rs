//! Hive Metastore catalog implementation.
//!
//! Talks to the metastore over Thrift using the `hive_metastore` crate. Hive
//! databases are namespaces (one level only); Iceberg tables are external Hive
//! tables whose parameters carry `table_type = ICEBERG` and the current
//! `metadata_location`.
//!
//! The metastore has no compare-and-swap, so a commit re-reads the table's
//! `metadata_location` right before `alter_table` and fails with
//! `CommitFailed` if it moved. Commits from one `HiveCatalog` are serialized.

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
use ahash::AHashMap;
use async_trait::async_trait;
use faststr::FastStr;
use futures::stream::{self, StreamExt, TryStreamExt};
use hive_metastore::{ThriftHiveMetastoreClient, ThriftHiveMetastoreClientBuilder};
use std::fmt::Debug;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use volo_thrift::MaybeException;

/// Namespace property mapped to the database `locationUri`.
pub const LOCATION_PROPERTY: &str = "location";
/// Namespace property mapped to the database `description`.
pub const COMMENT_PROPERTY: &str = "comment";

const EXTERNAL_TABLE: &str = "EXTERNAL_TABLE";
const ICEBERG_INPUT_FORMAT: &str = "org.apache.iceberg.mr.hive.HiveIcebergInputFormat";
const ICEBERG_OUTPUT_FORMAT: &str = "org.apache.iceberg.mr.hive.HiveIcebergOutputFormat";
const ICEBERG_SERDE: &str = "org.apache.iceberg.mr.hive.HiveIcebergSerDe";

const NO_SUCH_OBJECT: &str = "NoSuchObjectException";
const ALREADY_EXISTS: &str = "AlreadyExistsException";
const INVALID_OPERATION: &str = "InvalidOperationException";

/// In-flight `get_table` calls while filtering a database listing.
const TABLE_LOOKUP_CONCURRENCY: usize = 8;

type Parameters = AHashMap<FastStr, FastStr>;

/// Thrift exceptions only expose their kind through the generated enum's name.
fn is_exception(exception: &impl Debug, name: &str) -> bool {
    format!("{:?}", exception).contains(name)
}

/// Kind of metastore call an exception came from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum HiveCall {
    /// Reads and updates addressed to a database
    Database,
    CreateDatabase,
    DropDatabase,
    /// Reads and drops addressed to a table
    Table,
    CreateTable,
    AlterTable,
}

/// Map a metastore exception to the catalog error for `target`.
fn hive_error(
    call: HiveCall,
    exception: &impl Debug,
    operation: &'static str,
    target: &Identifier,
) -> Error {
    let is = |name| is_exception(exception, name);
    match call {
        HiveCall::Database | HiveCall::DropDatabase if is(NO_SUCH_OBJECT) => {
            Error::NoSuchNamespace(target.to_string())
        }
        HiveCall::DropDatabase if is(INVALID_OPERATION) => {
            Error::NamespaceNotEmpty(target.to_string())
        }
        HiveCall::CreateDatabase if is(ALREADY_EXISTS) => {
            Error::NamespaceAlreadyExists(target.to_string())
        }
        HiveCall::Table if is(NO_SUCH_OBJECT) => Error::NoSuchTable(target.to_string()),
        HiveCall::CreateTable if is(ALREADY_EXISTS) => {
            Error::TableAlreadyExists(target.to_string())
        }
        HiveCall::CreateTable if is(NO_SUCH_OBJECT) => {
            Error::NoSuchNamespace(target.namespace().to_string())
        }
        HiveCall::AlterTable if is(INVALID_OPERATION) => {
            Error::CommitFailed(format!("{target}: {:?}", exception))
        }
        _ => Error::transport(operation, target, format!("{:?}", exception)),
    }
}

/// Parse a Thrift URI (`thrift://host:port`) into host and port.
fn parse_thrift_uri(uri: &str) -> Result<(String, u16)> {
    let address = uri.strip_prefix("thrift://").unwrap_or(uri);

    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        Error::Config(format!(
            "Invalid Hive Metastore URI format: {}. Expected thrift://host:port",
            uri
        ))
    })?;
    if host.is_empty() {
        return Err(Error::Config(format!("Missing host in Hive Metastore URI: {}", uri)));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| Error::Config(format!("Invalid port in Hive Metastore URI: {}", port)))?;

    Ok((host.to_string(), port))
}

fn to_parameters(properties: &Properties) -> Parameters {
    properties
        .iter()
        .map(|(k, v)| (FastStr::from(k.clone()), FastStr::from(v.clone())))
        .collect()
}

fn database_properties(database: &hive_metastore::Database) -> Properties {
    let mut properties: Properties = database
        .parameters
        .as_ref()
        .map(|p| p.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        .unwrap_or_default();
    if let Some(location) = &database.location_uri {
        properties.insert(LOCATION_PROPERTY.to_string(), location.to_string());
    }
    if let Some(description) = &database.description {
        properties.insert(COMMENT_PROPERTY.to_string(), description.to_string());
    }
    properties
}

/// Apply namespace properties to a database, splitting out location and comment.
fn apply_database_properties(database: &mut hive_metastore::Database, properties: &Properties) {
    let parameters: Properties = properties
        .iter()
        .filter(|(k, _)| k.as_str() != LOCATION_PROPERTY && k.as_str() != COMMENT_PROPERTY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    database.location_uri = properties.get(LOCATION_PROPERTY).cloned().map(FastStr::from);
    database.description = properties.get(COMMENT_PROPERTY).cloned().map(FastStr::from);
    database.parameters = Some(to_parameters(&parameters));
}

fn new_database(name: &str, properties: &Properties) -> hive_metastore::Database {
    let mut database = hive_metastore::Database {
        name: Some(name.to_string().into()),
        description: None,
        location_uri: None,
        parameters: None,
        privileges: None,
        owner_name: None,
        owner_type: None,
        catalog_name: None,
    };
    apply_database_properties(&mut database, properties);
    database
}

/// Storage descriptor listing the current schema's columns.
fn storage_descriptor(metadata: &TableMetadata) -> hive_metastore::StorageDescriptor {
    let columns: Vec<hive_metastore::FieldSchema> = metadata
        .current_schema()
        .map(|schema| {
            schema
                .fields
                .iter()
                .map(|f| hive_metastore::FieldSchema {
                    name: Some(f.name.clone().into()),
                    r#type: Some(pointer::hive_column_type(&f.field_type).into()),
                    comment: f.doc.clone().map(FastStr::from),
                })
                .collect()
        })
        .unwrap_or_default();

    hive_metastore::StorageDescriptor {
        cols: Some(columns),
        location: Some(metadata.location.clone().into()),
        input_format: Some(ICEBERG_INPUT_FORMAT.into()),
        output_format: Some(ICEBERG_OUTPUT_FORMAT.into()),
        serde_info: Some(hive_metastore::SerDeInfo {
            name: None,
            serialization_lib: Some(ICEBERG_SERDE.into()),
            parameters: None,
        }),
        compressed: Some(false),
        num_buckets: Some(-1),
        bucket_cols: None,
        sort_cols: None,
        parameters: None,
        skewed_info: None,
        stored_as_sub_directories: Some(false),
    }
}

/// Point a table's parameters at `metadata_location`, keeping everything else.
fn pointer_parameters(
    existing: Option<&Parameters>,
    metadata_location: &str,
    previous_location: Option<&str>,
) -> Parameters {
    let mut parameters = existing.cloned().unwrap_or_default();
    parameters.insert(
        FastStr::from_static_str(TABLE_TYPE),
        FastStr::from_static_str(ICEBERG_TABLE_TYPE),
    );
    parameters.insert(
        FastStr::from_static_str(METADATA_LOCATION),
        FastStr::from(metadata_location.to_string()),
    );
    match previous_location {
        Some(previous) => {
            parameters.insert(
                FastStr::from_static_str(PREVIOUS_METADATA_LOCATION),
                FastStr::from(previous.to_string()),
            );
        }
        None => {
            parameters.remove(PREVIOUS_METADATA_LOCATION);
        }
    }
    parameters
}

fn new_table(
    database: &str,
    name: &str,
    metadata: &TableMetadata,
    metadata_location: &str,
) -> hive_metastore::Table {
    let mut parameters = pointer_parameters(None, metadata_location, None);
    for (key, value) in &metadata.properties {
        parameters
            .entry(FastStr::from(key.clone()))
            .or_insert_with(|| FastStr::from(value.clone()));
    }

    hive_metastore::Table {
        table_name: Some(name.to_string().into()),
        db_name: Some(database.to_string().into()),
        owner: None,
        create_time: Some(chrono::Utc::now().timestamp() as i32),
        last_access_time: Some(0),
        retention: Some(0),
        sd: Some(storage_descriptor(metadata)),
        partition_keys: None,
        parameters: Some(parameters),
        view_original_text: None,
        view_expanded_text: None,
        table_type: Some(EXTERNAL_TABLE.into()),
        privileges: None,
        temporary: Some(false),
        rewrite_enabled: None,
        cat_name: None,
    }
}

fn is_iceberg_table(table: &hive_metastore::Table) -> bool {
    table
        .parameters
        .as_ref()
        .and_then(|p| p.get(TABLE_TYPE))
        .map(|t| t.eq_ignore_ascii_case(ICEBERG_TABLE_TYPE))
        .unwrap_or(false)
}

fn metadata_location_of(table: &hive_metastore::Table) -> Option<String> {
    table
        .parameters
        .as_ref()
        .and_then(|p| p.get(METADATA_LOCATION))
        .map(|l| l.to_string())
}

/// Current metadata location of an Iceberg table; other tables are reported missing.
fn iceberg_metadata_location(
    table: &hive_metastore::Table,
    identifier: &Identifier,
) -> Result<String> {
    if !is_iceberg_table(table) {
        warn!(table = %identifier, "Hive table is not an Iceberg table");
        return Err(Error::NoSuchTable(identifier.to_string()));
    }
    metadata_location_of(table).ok_or_else(|| Error::NoSuchTable(identifier.to_string()))
}

/// Hive Metastore catalog.
pub struct HiveCatalog {
    uri: String,
    /// Connected lazily on first use
    client: RwLock<Option<ThriftHiveMetastoreClient>>,
    commit_lock: Mutex<()>,
    io: FileIo,
    options: ConnectionOptions,
}

impl std::fmt::Debug for HiveCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HiveCatalog")
            .field("uri", &self.uri)
            .field("options", &self.options)
            .finish()
    }
}

impl HiveCatalog {
    /// Create a Hive catalog for the metastore at `uri` (`thrift://host:port`).
    ///
    /// The Thrift connection is opened on the first operation. `io_properties`
    /// configure the object store that holds metadata files.
    pub fn new(
        uri: impl Into<String>,
        io_properties: Properties,
        options: impl IntoIterator<Item = CatalogOption<HiveCatalog>>,
    ) -> Result<Self> {
        let uri = uri.into();
        parse_thrift_uri(&uri)?;
        let options = ConnectionOptions::resolve(options);

        info!(uri = %uri, "Hive Metastore catalog client initialized");
        Ok(Self {
            uri,
            client: RwLock::new(None),
            commit_lock: Mutex::new(()),
            io: FileIo::new(io_properties),
            options,
        })
    }

    async fn client(&self) -> Result<ThriftHiveMetastoreClient> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut guard = self.client.write().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = self.connect().await?;
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn connect(&self) -> Result<ThriftHiveMetastoreClient> {
        let (host, port) = parse_thrift_uri(&self.uri)?;
        debug!(host = %host, port = port, "Connecting to Hive Metastore");

        let address = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| Error::transport("connect", &self.uri, e))?
            .next()
            .ok_or_else(|| Error::transport("connect", &self.uri, "no address resolved"))?;

        let client = ThriftHiveMetastoreClientBuilder::new("lakecat-hive")
            .address(address)
            .build();

        info!(uri = %self.uri, address = %address, "Connected to Hive Metastore");
        Ok(client)
    }

    /// Drop the cached connection so the next call reconnects.
    async fn reset_connection(&self) {
        *self.client.write().await = None;
    }

    async fn get_database(
        &self,
        database: &str,
        namespace: &Identifier,
    ) -> Result<hive_metastore::Database> {
        let client = self.client().await?;
        let response = match client.get_database(database.to_string().into()).await {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("get_database", namespace, e));
            }
        };

        match response {
            MaybeException::Ok(db) => Ok(db),
            MaybeException::Exception(e) => Err(hive_error(
                HiveCall::Database,
                &e,
                "get_database",
                namespace,
            )),
        }
    }

    async fn get_table(
        &self,
        database: &str,
        name: &str,
        identifier: &Identifier,
    ) -> Result<hive_metastore::Table> {
        let client = self.client().await?;
        let response = match client
            .get_table(database.to_string().into(), name.to_string().into())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("get_table", identifier, e));
            }
        };

        match response {
            MaybeException::Ok(table) => Ok(table),
            MaybeException::Exception(e) => {
                Err(hive_error(HiveCall::Table, &e, "get_table", identifier))
            }
        }
    }

    async fn get_all_tables(&self, database: &str, namespace: &Identifier) -> Result<Vec<String>> {
        let client = self.client().await?;
        let response = match client.get_all_tables(database.to_string().into()).await {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("list_tables", namespace, e));
            }
        };

        match response {
            MaybeException::Ok(tables) => Ok(tables.into_iter().map(|s| s.to_string()).collect()),
            MaybeException::Exception(e) => {
                Err(hive_error(HiveCall::Database, &e, "list_tables", namespace))
            }
        }
    }

    async fn alter_table(
        &self,
        database: &str,
        name: &str,
        table: hive_metastore::Table,
        operation: &'static str,
        identifier: &Identifier,
    ) -> Result<()> {
        let client = self.client().await?;
        let response = match client
            .alter_table(database.to_string().into(), name.to_string().into(), table)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport(operation, identifier, e));
            }
        };

        match response {
            MaybeException::Ok(_) => Ok(()),
            MaybeException::Exception(e) => {
                Err(hive_error(HiveCall::AlterTable, &e, operation, identifier))
            }
        }
    }
}

#[async_trait]
impl CatalogBackend for HiveCatalog {
    fn catalog_type(&self) -> CatalogType {
        CatalogType::Hive
    }

    async fn create_table(
        &self,
        identifier: &Identifier,
        schema: Schema,
        mut options: CreateTableOptions,
    ) -> Result<Table> {
        let (database, name) = pointer::database_and_table(identifier)?;
        let namespace = identifier.namespace();
        let hive_database = self.get_database(&database, &namespace).await?;

        let warehouse = self.options.warehouse_location.as_deref();
        if options.location.is_none() && warehouse.is_none() {
            options.location = hive_database
                .location_uri
                .as_ref()
                .map(|location| format!("{}/{}", location.trim_end_matches('/'), name));
        }

        let staged =
            pointer::stage_new_table(&self.io, warehouse, &namespace, &name, schema, options)
                .await?;
        let hive_table = new_table(&database, &name, &staged.metadata, &staged.location);

        let client = self.client().await?;
        let result = match client.create_table(hive_table).await {
            Ok(MaybeException::Ok(_)) => Ok(()),
            Ok(MaybeException::Exception(e)) => Err(hive_error(
                HiveCall::CreateTable,
                &e,
                "create_table",
                identifier,
            )),
            Err(e) => {
                self.reset_connection().await;
                Err(Error::transport("create_table", identifier, e))
            }
        };

        if let Err(e) = result {
            pointer::discard(&self.io, &staged).await;
            return Err(e);
        }

        info!(table = %identifier, location = %staged.location, "Created Hive table");
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

        let _guard = self.commit_lock.lock().await;

        let hive_table = self.get_table(&database, &name, identifier).await?;
        let current_location = iceberg_metadata_location(&hive_table, identifier)?;
        let current = self.io.read_metadata(&current_location).await?;

        let staged = pointer::stage_table_commit(
            &self.io,
            &current,
            &current_location,
            requirements,
            updates,
        )
        .await?;

        // Re-read the pointer as close to the swap as possible
        let latest = match self.get_table(&database, &name, identifier).await {
            Ok(latest) => latest,
            Err(e) => {
                pointer::discard(&self.io, &staged).await;
                return Err(e);
            }
        };
        if metadata_location_of(&latest).as_deref() != Some(current_location.as_str()) {
            pointer::discard(&self.io, &staged).await;
            return Err(Error::CommitFailed(format!(
                "{identifier} was updated concurrently"
            )));
        }

        let mut updated = latest;
        updated.parameters = Some(pointer_parameters(
            updated.parameters.as_ref(),
            &staged.location,
            Some(&current_location),
        ));
        updated.sd = Some(storage_descriptor(&staged.metadata));

        if let Err(e) = self
            .alter_table(&database, &name, updated, "commit_table", identifier)
            .await
        {
            pointer::discard(&self.io, &staged).await;
            return Err(e);
        }

        info!(table = %identifier, location = %staged.location, "Committed table metadata to Hive");
        Ok((staged.metadata, staged.location))
    }

    async fn list_tables(&self, namespace: &Identifier) -> Result<Vec<Identifier>> {
        let database = pointer::database_name(namespace)?;
        self.get_database(database, namespace).await?;

        let names = self.get_all_tables(database, namespace).await?;
        let tables: Vec<Option<Identifier>> = stream::iter(names)
            .map(|name| async move {
                let identifier = namespace.child(name.as_str());
                match self.get_table(database, &name, &identifier).await {
                    Ok(table) if is_iceberg_table(&table) => Ok(Some(identifier)),
                    Ok(_) => Ok(None),
                    // Dropped between listing and loading
                    Err(Error::NoSuchTable(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .buffered(TABLE_LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(tables.into_iter().flatten().collect())
    }

    async fn load_table(&self, identifier: &Identifier, properties: &Properties) -> Result<Table> {
        let (database, name) = pointer::database_and_table(identifier)?;
        let hive_table = self.get_table(&database, &name, identifier).await?;
        let location = iceberg_metadata_location(&hive_table, identifier)?;
        let metadata = self.io.read_metadata(&location).await?;

        debug!(table = %identifier, location = %location, "Loaded Hive table");
        Ok(Table::new(identifier.clone(), metadata, location).with_io_properties(properties.clone()))
    }

    async fn drop_table(&self, identifier: &Identifier) -> Result<()> {
        let (database, name) = pointer::database_and_table(identifier)?;
        let client = self.client().await?;

        let response = match client
            .drop_table(database.into(), name.into(), false)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("drop_table", identifier, e));
            }
        };

        match response {
            MaybeException::Ok(_) => {
                info!(table = %identifier, "Dropped Hive table");
                Ok(())
            }
            MaybeException::Exception(e) => {
                Err(hive_error(HiveCall::Table, &e, "drop_table", identifier))
            }
        }
    }

    async fn rename_table(&self, from: &Identifier, to: &Identifier) -> Result<Table> {
        let (from_database, from_name) = pointer::database_and_table(from)?;
        let (to_database, to_name) = pointer::database_and_table(to)?;

        let source = self.get_table(&from_database, &from_name, from).await?;
        iceberg_metadata_location(&source, from)?;
        self.get_database(&to_database, &to.namespace()).await?;
        match self.get_table(&to_database, &to_name, to).await {
            Ok(_) => return Err(Error::TableAlreadyExists(to.to_string())),
            Err(Error::NoSuchTable(_)) => {}
            Err(e) => return Err(e),
        }

        let mut renamed = source;
        renamed.db_name = Some(to_database.clone().into());
        renamed.table_name = Some(to_name.clone().into());
        self.alter_table(&from_database, &from_name, renamed, "rename_table", from)
            .await?;

        info!(from = %from, to = %to, "Renamed Hive table");
        CatalogBackend::load_table(self, to, &Properties::new()).await
    }

    async fn list_namespaces(&self, parent: &Identifier) -> Result<Vec<Identifier>> {
        pointer::require_root(parent)?;
        let client = self.client().await?;

        let response = match client.get_all_databases().await {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("list_namespaces", parent, e));
            }
        };

        match response {
            MaybeException::Ok(databases) => Ok(databases
                .into_iter()
                .map(|db| Identifier::from([db.as_str()]))
                .collect()),
            MaybeException::Exception(e) => Err(Error::transport(
                "list_namespaces",
                parent,
                format!("{:?}", e),
            )),
        }
    }

    async fn create_namespace(&self, namespace: &Identifier, properties: &Properties) -> Result<()> {
        let database = pointer::database_name(namespace)?;
        let client = self.client().await?;

        let response = match client.create_database(new_database(database, properties)).await {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("create_namespace", namespace, e));
            }
        };

        match response {
            MaybeException::Ok(_) => {
                info!(namespace = %namespace, "Created Hive database");
                Ok(())
            }
            MaybeException::Exception(e) => Err(hive_error(
                HiveCall::CreateDatabase,
                &e,
                "create_namespace",
                namespace,
            )),
        }
    }

    async fn drop_namespace(&self, namespace: &Identifier) -> Result<()> {
        let database = pointer::database_name(namespace)?;
        self.get_database(database, namespace).await?;
        if !self.get_all_tables(database, namespace).await?.is_empty() {
            return Err(Error::NamespaceNotEmpty(namespace.to_string()));
        }

        let client = self.client().await?;
        let response = match client
            .drop_database(database.to_string().into(), false, false)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("drop_namespace", namespace, e));
            }
        };

        match response {
            MaybeException::Ok(_) => {
                info!(namespace = %namespace, "Dropped Hive database");
                Ok(())
            }
            MaybeException::Exception(e) => Err(hive_error(
                HiveCall::DropDatabase,
                &e,
                "drop_namespace",
                namespace,
            )),
        }
    }

    async fn load_namespace_properties(&self, namespace: &Identifier) -> Result<Properties> {
        let database = pointer::database_name(namespace)?;
        let hive_database = self.get_database(database, namespace).await?;
        Ok(database_properties(&hive_database))
    }

    async fn update_namespace_properties(
        &self,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary> {
        let database = pointer::database_name(namespace)?;
        let mut hive_database = self.get_database(database, namespace).await?;
        let (next, summary) = reconcile(&database_properties(&hive_database), removals, updates)?;
        apply_database_properties(&mut hive_database, &next);

        let client = self.client().await?;
        let response = match client
            .alter_database(database.to_string().into(), hive_database)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.reset_connection().await;
                return Err(Error::transport("update_namespace_properties", namespace, e));
            }
        };

        match response {
            MaybeException::Ok(_) => {
                info!(
                    namespace = %namespace,
                    removed = summary.removed.len(),
                    updated = summary.updated.len(),
                    "Updated Hive database properties"
                );
                Ok(summary)
            }
            MaybeException::Exception(e) => Err(hive_error(
                HiveCall::Database,
                &e,
                "update_namespace_properties",
                namespace,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::table::SchemaField;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn metadata() -> TableMetadata {
        TableMetadata::new(
            Schema::new(
                0,
                vec![
                    SchemaField::primitive(1, "id", "long", true),
                    SchemaField::primitive(2, "name", "string", false),
                ],
            ),
            None,
            None,
            "s3://bucket/wh/db/users",
            Properties::from([("owner".to_string(), "etl".to_string())]),
        )
    }

    #[test]
    fn test_parse_thrift_uri() {
        let (host, port) = parse_thrift_uri("thrift://localhost:9083").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 9083);

        let (host, port) = parse_thrift_uri("metastore.example.com:9083").unwrap();
        assert_eq!(host, "metastore.example.com");
        assert_eq!(port, 9083);
    }

    #[test]
    fn test_parse_thrift_uri_invalid() {
        assert!(parse_thrift_uri("localhost").is_err());
        assert!(parse_thrift_uri("localhost:invalid").is_err());
        assert!(parse_thrift_uri("thrift://:9083").is_err());
    }

    #[test]
    fn test_new_rejects_bad_uri_without_connecting() {
        let err = HiveCatalog::new("thrift://metastore", Properties::new(), vec![]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let catalog = HiveCatalog::new("thrift://localhost:9083", Properties::new(), vec![]);
        assert!(catalog.is_ok());
    }

    #[tokio::test]
    async fn test_flat_namespaces_rejected_before_any_call() {
        let catalog: Arc<dyn Catalog> = Arc::new(
            HiveCatalog::new("thrift://localhost:9083", Properties::new(), vec![]).unwrap(),
        );
        let ctx = CancellationToken::new();

        let err = catalog
            .list_namespaces(&ctx, &Identifier::from(["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let err = catalog
            .drop_table(&ctx, &Identifier::from(["a", "b", "t"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
        assert_eq!(catalog.catalog_type(), CatalogType::Hive);
    }

    #[test]
    fn test_database_properties_round_trip() {
        let properties = Properties::from([
            (LOCATION_PROPERTY.to_string(), "s3://bucket/db".to_string()),
            (COMMENT_PROPERTY.to_string(), "Users".to_string()),
            ("owner".to_string(), "etl".to_string()),
        ]);

        let database = new_database("db", &properties);
        assert_eq!(database.name.as_deref(), Some("db"));
        assert_eq!(database.location_uri.as_deref(), Some("s3://bucket/db"));
        assert_eq!(database.parameters.as_ref().map(|p| p.len()), Some(1));
        assert_eq!(database_properties(&database), properties);
    }

    #[test]
    fn test_new_table_parameters_and_columns() {
        let table = new_table(
            "db",
            "users",
            &metadata(),
            "s3://bucket/wh/db/users/metadata/00000-a.metadata.json",
        );

        assert!(is_iceberg_table(&table));
        assert_eq!(table.table_type.as_deref(), Some(EXTERNAL_TABLE));
        let parameters = table.parameters.as_ref().unwrap();
        assert_eq!(parameters.get("owner").map(|v| v.as_str()), Some("etl"));
        assert!(parameters.get(PREVIOUS_METADATA_LOCATION).is_none());

        let cols = table.sd.as_ref().and_then(|sd| sd.cols.as_ref()).unwrap();
        let types: Vec<&str> = cols.iter().filter_map(|c| c.r#type.as_deref()).collect();
        assert_eq!(types, vec!["bigint", "string"]);
    }

    #[test]
    fn test_pointer_parameters_on_commit() {
        let table = new_table("db", "users", &metadata(), "s3://v0.json");
        let parameters =
            pointer_parameters(table.parameters.as_ref(), "s3://v1.json", Some("s3://v0.json"));

        assert_eq!(parameters.get(METADATA_LOCATION).map(|v| v.as_str()), Some("s3://v1.json"));
        assert_eq!(
            parameters.get(PREVIOUS_METADATA_LOCATION).map(|v| v.as_str()),
            Some("s3://v0.json")
        );
        assert_eq!(parameters.get("owner").map(|v| v.as_str()), Some("etl"));
    }

    #[test]
    fn test_non_iceberg_table_is_missing() {
        let ident = Identifier::from(["db", "users"]);
        let mut table = new_table("db", "users", &metadata(), "s3://v0.json");
        assert_eq!(iceberg_metadata_location(&table, &ident).unwrap(), "s3://v0.json");

        table.parameters = Some(Parameters::new());
        assert!(matches!(
            iceberg_metadata_location(&table, &ident),
            Err(Error::NoSuchTable(_))
        ));
    }

    #[derive(Debug)]
    struct NoSuchObjectException {
        message: Option<String>,
    }

    #[derive(Debug)]
    struct AlreadyExistsException {
        message: Option<String>,
    }

    #[derive(Debug)]
    struct InvalidOperationException {
        message: Option<String>,
    }

    #[test]
    fn test_hive_exceptions_map_to_sentinels() {
        let table = Identifier::from(["db", "users"]);
        let db = Identifier::from(["db"]);
        let missing = NoSuchObjectException { message: Some("db.users".into()) };
        let exists = AlreadyExistsException { message: None };
        let invalid = InvalidOperationException {
            message: Some("table has been modified".into()),
        };

        assert!(matches!(
            hive_error(HiveCall::Table, &missing, "load_table", &table),
            Error::NoSuchTable(t) if t == "db.users"
        ));
        assert!(matches!(
            hive_error(HiveCall::Database, &missing, "get_database", &db),
            Error::NoSuchNamespace(ns) if ns == "db"
        ));
        assert!(matches!(
            hive_error(HiveCall::CreateTable, &missing, "create_table", &table),
            Error::NoSuchNamespace(ns) if ns == "db"
        ));
        assert!(matches!(
            hive_error(HiveCall::CreateTable, &exists, "create_table", &table),
            Error::TableAlreadyExists(_)
        ));
        assert!(matches!(
            hive_error(HiveCall::CreateDatabase, &exists, "create_namespace", &db),
            Error::NamespaceAlreadyExists(_)
        ));
        assert!(matches!(
            hive_error(HiveCall::AlterTable, &invalid, "commit_table", &table),
            Error::CommitFailed(_)
        ));
        assert!(matches!(
            hive_error(HiveCall::DropDatabase, &invalid, "drop_namespace", &db),
            Error::NamespaceNotEmpty(_)
        ));
        assert!(matches!(
            hive_error(HiveCall::DropDatabase, &missing, "drop_namespace", &db),
            Error::NoSuchNamespace(_)
        ));
    }

    #[test]
    fn test_unexpected_hive_exceptions_are_transport() {
        let table = Identifier::from(["db", "users"]);
        let exists = AlreadyExistsException { message: None };
        let invalid = InvalidOperationException { message: None };

        // Exceptions outside a call's known set keep the operation name
        for (call, operation) in [
            (HiveCall::Table, "drop_table"),
            (HiveCall::AlterTable, "commit_table"),
        ] {
            match hive_error(call, &exists, operation, &table) {
                Error::Transport { operation: op, message, .. } => {
                    assert_eq!(op, operation);
                    assert!(message.contains("AlreadyExistsException"));
                }
                other => panic!("expected transport error, got {other:?}"),
            }
        }
        assert!(matches!(
            hive_error(HiveCall::CreateTable, &invalid, "create_table", &table),
            Error::Transport { .. }
        ));
    }
}
