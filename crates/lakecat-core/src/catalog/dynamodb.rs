//! AWS DynamoDB catalog implementation.
//!
//! All catalog entries live in one DynamoDB table (default `iceberg`) keyed by
//! `identifier` (hash) and `namespace` (range):
//!
//! - namespace rows: `identifier = "NAMESPACE"`, `namespace = "a.b"`
//! - table rows: `identifier = "a.b.t"`, `namespace = "a.b"`
//!
//! Properties are stored as `p.<key>` string attributes. Every row carries a
//! version `v` that is replaced on each write; updates are conditional on the
//! version that was read. The `namespace-identifier` index lists a namespace's
//! tables.

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
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, Delete, GlobalSecondaryIndex,
    KeySchemaElement, KeyType, Projection, ProjectionType, Put, ScalarAttributeType, TableStatus,
    TransactWriteItem,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, info};

/// AWS property naming the catalog table.
pub const DYNAMODB_TABLE_NAME: &str = "dynamodb.table-name";
/// AWS property holding an alternate DynamoDB endpoint.
pub const DYNAMODB_ENDPOINT: &str = "dynamodb.endpoint";
pub const DEFAULT_TABLE_NAME: &str = "iceberg";

const COL_IDENTIFIER: &str = "identifier";
const COL_NAMESPACE: &str = "namespace";
const COL_VERSION: &str = "v";
const COL_CREATED_AT: &str = "created_at";
const COL_UPDATED_AT: &str = "updated_at";
const PROPERTY_PREFIX: &str = "p.";
const NAMESPACE_ROW: &str = "NAMESPACE";
const NAMESPACE_INDEX: &str = "namespace-identifier";
const SEPARATOR: &str = ".";

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";
const TRANSACTION_CANCELED: &str = "TransactionCanceledException";
const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

const TABLE_ACTIVE_POLL: Duration = Duration::from_secs(1);
const TABLE_ACTIVE_ATTEMPTS: u32 = 60;

type Item = HashMap<String, AttributeValue>;

fn error_code<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> Option<&str> {
    err.as_service_error().and_then(|e| e.code())
}

/// Conditional writes issued against the catalog table.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RowWrite {
    CreateTable,
    CommitTable,
    DropTable,
    RenameTable,
    CreateNamespace,
    UpdateNamespace,
    DropNamespace,
}

impl RowWrite {
    fn operation(self) -> &'static str {
        match self {
            RowWrite::CreateTable => "create_table",
            RowWrite::CommitTable => "commit_table",
            RowWrite::DropTable => "drop_table",
            RowWrite::RenameTable => "rename_table",
            RowWrite::CreateNamespace => "create_namespace",
            RowWrite::UpdateNamespace => "update_namespace_properties",
            RowWrite::DropNamespace => "drop_namespace",
        }
    }
}

/// Map a failed write on `target` to a catalog error. A failed condition
/// means the row was not in the state the write expected.
fn write_error(
    write: RowWrite,
    code: Option<&str>,
    target: &Identifier,
    err: impl Display,
) -> Error {
    match (write, code) {
        (RowWrite::CreateTable, Some(CONDITIONAL_CHECK_FAILED)) => {
            Error::TableAlreadyExists(target.to_string())
        }
        (RowWrite::CommitTable, Some(CONDITIONAL_CHECK_FAILED)) => {
            Error::CommitFailed(format!("{target} was updated concurrently"))
        }
        (RowWrite::DropTable, Some(CONDITIONAL_CHECK_FAILED)) => {
            Error::NoSuchTable(target.to_string())
        }
        (RowWrite::RenameTable, Some(TRANSACTION_CANCELED)) => Error::CommitFailed(format!(
            "rename of {target} conflicted with a concurrent change"
        )),
        (RowWrite::CreateNamespace, Some(CONDITIONAL_CHECK_FAILED)) => {
            Error::NamespaceAlreadyExists(target.to_string())
        }
        (RowWrite::UpdateNamespace, Some(CONDITIONAL_CHECK_FAILED)) => {
            Error::CommitFailed(format!("namespace {target} was updated concurrently"))
        }
        (RowWrite::DropNamespace, Some(CONDITIONAL_CHECK_FAILED)) => {
            Error::NoSuchNamespace(target.to_string())
        }
        _ => Error::transport(write.operation(), target, err),
    }
}

fn namespace_key(namespace: &Identifier) -> Result<String> {
    if namespace.is_empty() {
        return Err(Error::InvalidIdentifier("namespace must not be empty".into()));
    }
    pointer::joined_key(namespace, SEPARATOR)
}

/// Row key of a table: its full dotted identifier and its namespace.
fn table_key(identifier: &Identifier) -> Result<(String, String)> {
    let (namespace, _) = identifier.split_table()?;
    let namespace = namespace_key(&namespace)?;
    Ok((pointer::joined_key(identifier, SEPARATOR)?, namespace))
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name).and_then(|v| v.as_s().ok()).map(String::as_str)
}

fn item_properties(item: &Item) -> Properties {
    item.iter()
        .filter_map(|(k, v)| {
            let key = k.strip_prefix(PROPERTY_PREFIX)?;
            let value = v.as_s().ok()?;
            Some((key.to_string(), value.clone()))
        })
        .collect()
}

fn now_millis() -> AttributeValue {
    AttributeValue::N(chrono::Utc::now().timestamp_millis().to_string())
}

fn new_version() -> AttributeValue {
    AttributeValue::S(uuid::Uuid::new_v4().to_string())
}

/// Row with the given key and properties. `previous` carries `created_at` over.
fn build_item(
    identifier: &str,
    namespace: &str,
    properties: &Properties,
    previous: Option<&Item>,
) -> Item {
    let mut item = Item::new();
    item.insert(COL_IDENTIFIER.to_string(), AttributeValue::S(identifier.to_string()));
    item.insert(COL_NAMESPACE.to_string(), AttributeValue::S(namespace.to_string()));
    item.insert(COL_VERSION.to_string(), new_version());
    let created_at = previous
        .and_then(|p| p.get(COL_CREATED_AT).cloned())
        .unwrap_or_else(now_millis);
    item.insert(COL_CREATED_AT.to_string(), created_at);
    item.insert(COL_UPDATED_AT.to_string(), now_millis());
    for (key, value) in properties {
        item.insert(
            format!("{PROPERTY_PREFIX}{key}"),
            AttributeValue::S(value.clone()),
        );
    }
    item
}

fn pointer_properties(metadata_location: &str, previous_location: Option<&str>) -> Properties {
    let mut properties = Properties::from([
        (TABLE_TYPE.to_string(), ICEBERG_TABLE_TYPE.to_string()),
        (METADATA_LOCATION.to_string(), metadata_location.to_string()),
    ]);
    if let Some(previous) = previous_location {
        properties.insert(PREVIOUS_METADATA_LOCATION.to_string(), previous.to_string());
    }
    properties
}

/// Current metadata location of a table row; non-Iceberg rows are reported missing.
fn iceberg_metadata_location(item: &Item, identifier: &Identifier) -> Result<String> {
    let properties = item_properties(item);
    let is_iceberg = properties
        .get(TABLE_TYPE)
        .map(|t| t.eq_ignore_ascii_case(ICEBERG_TABLE_TYPE))
        .unwrap_or(false);
    match properties.get(METADATA_LOCATION) {
        Some(location) if is_iceberg => Ok(location.clone()),
        _ => Err(Error::NoSuchTable(identifier.to_string())),
    }
}

fn row_version(item: &Item) -> Option<AttributeValue> {
    item.get(COL_VERSION).cloned()
}

/// AWS DynamoDB catalog.
pub struct DynamoDbCatalog {
    client: DynamoDbClient,
    table_name: String,
    io: FileIo,
    options: ConnectionOptions,
}

impl std::fmt::Debug for DynamoDbCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbCatalog")
            .field("table_name", &self.table_name)
            .field("options", &self.options)
            .finish()
    }
}

impl DynamoDbCatalog {
    /// Create a DynamoDB catalog client. The catalog table is not touched; call
    /// [`DynamoDbCatalog::ensure_catalog_table`] to create it when missing.
    pub async fn new(
        options: impl IntoIterator<Item = CatalogOption<DynamoDbCatalog>>,
    ) -> Result<Self> {
        let options = ConnectionOptions::resolve(options);
        let sdk_config = aws::load_sdk_config(&options).await;

        let mut config = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = options.aws_property(&[DYNAMODB_ENDPOINT]) {
            config = config.endpoint_url(endpoint);
        }
        let client = DynamoDbClient::from_conf(config.build());

        let table_name = options
            .aws_property(&[DYNAMODB_TABLE_NAME])
            .unwrap_or(DEFAULT_TABLE_NAME)
            .to_string();
        let io = FileIo::new(aws::io_properties(&options, &sdk_config));

        info!(
            region = ?sdk_config.region(),
            table = %table_name,
            "AWS DynamoDB catalog client initialized"
        );

        Ok(Self {
            client,
            table_name,
            io,
            options,
        })
    }

    /// Name of the DynamoDB table holding the catalog.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the catalog table and its index if missing, then wait until it is active.
    pub async fn ensure_catalog_table(&self) -> Result<()> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) if error_code(&e) == Some(RESOURCE_NOT_FOUND) => {}
            Err(e) => {
                return Err(Error::transport(
                    "describe_table",
                    &self.table_name,
                    DisplayErrorContext(&e),
                ))
            }
        }

        let config_err = |e: aws_sdk_dynamodb::error::BuildError| {
            Error::Config(format!("Failed to build catalog table definition: {}", e))
        };
        let attribute = |name: &str| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(config_err)
        };
        let key = |name: &str, key_type: KeyType| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(config_err)
        };

        let index = GlobalSecondaryIndex::builder()
            .index_name(NAMESPACE_INDEX)
            .key_schema(key(COL_NAMESPACE, KeyType::Hash)?)
            .key_schema(key(COL_IDENTIFIER, KeyType::Range)?)
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::KeysOnly)
                    .build(),
            )
            .build()
            .map_err(config_err)?;

        self.client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(attribute(COL_IDENTIFIER)?)
            .attribute_definitions(attribute(COL_NAMESPACE)?)
            .key_schema(key(COL_IDENTIFIER, KeyType::Hash)?)
            .key_schema(key(COL_NAMESPACE, KeyType::Range)?)
            .global_secondary_indexes(index)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| {
                Error::transport("create_catalog_table", &self.table_name, DisplayErrorContext(&e))
            })?;
        info!(table = %self.table_name, "Created DynamoDB catalog table");

        for _ in 0..TABLE_ACTIVE_ATTEMPTS {
            let output = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(|e| {
                    Error::transport("describe_table", &self.table_name, DisplayErrorContext(&e))
                })?;
            if output.table().and_then(|t| t.table_status()) == Some(&TableStatus::Active) {
                return Ok(());
            }
            debug!(table = %self.table_name, "Waiting for DynamoDB catalog table to become active");
            tokio::time::sleep(TABLE_ACTIVE_POLL).await;
        }

        Err(Error::transport(
            "create_catalog_table",
            &self.table_name,
            "table did not become active",
        ))
    }

    async fn get_item(
        &self,
        identifier: &str,
        namespace: &str,
        operation: &'static str,
        target: &Identifier,
    ) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(COL_IDENTIFIER, AttributeValue::S(identifier.to_string()))
            .key(COL_NAMESPACE, AttributeValue::S(namespace.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| Error::transport(operation, target, DisplayErrorContext(&e)))?;
        Ok(output.item().cloned())
    }

    async fn namespace_item(&self, namespace: &Identifier, operation: &'static str) -> Result<Item> {
        let key = namespace_key(namespace)?;
        self.get_item(NAMESPACE_ROW, &key, operation, namespace)
            .await?
            .ok_or_else(|| Error::NoSuchNamespace(namespace.to_string()))
    }

    async fn table_item(&self, identifier: &Identifier, operation: &'static str) -> Result<Item> {
        let (key, namespace) = table_key(identifier)?;
        self.get_item(&key, &namespace, operation, identifier)
            .await?
            .ok_or_else(|| Error::NoSuchTable(identifier.to_string()))
    }

    /// RowWrite `item`, requiring the row to be absent (`expected = None`) or at
    /// `expected` version.
    async fn put_item(
        &self,
        item: Item,
        expected: Option<AttributeValue>,
        write: RowWrite,
        target: &Identifier,
    ) -> Result<()> {
        let request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item));
        let request = match expected {
            Some(version) => request
                .condition_expression("#v = :v")
                .expression_attribute_names("#v", COL_VERSION)
                .expression_attribute_values(":v", version),
            None => request
                .condition_expression("attribute_not_exists(#v)")
                .expression_attribute_names("#v", COL_VERSION),
        };

        request
            .send()
            .await
            .map_err(|e| write_error(write, error_code(&e), target, DisplayErrorContext(&e)))?;
        Ok(())
    }

    /// Delete a row, requiring it to exist.
    async fn delete_item(
        &self,
        identifier: &str,
        namespace: &str,
        write: RowWrite,
        target: &Identifier,
    ) -> Result<()> {
        self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(COL_IDENTIFIER, AttributeValue::S(identifier.to_string()))
            .key(COL_NAMESPACE, AttributeValue::S(namespace.to_string()))
            .condition_expression("attribute_exists(#v)")
            .expression_attribute_names("#v", COL_VERSION)
            .send()
            .await
            .map_err(|e| write_error(write, error_code(&e), target, DisplayErrorContext(&e)))?;
        Ok(())
    }

    /// Identifiers of the table rows in `namespace`, via the namespace index.
    async fn table_rows(
        &self,
        namespace: &Identifier,
        operation: &'static str,
    ) -> Result<Vec<String>> {
        let key = namespace_key(namespace)?;
        let mut identifiers = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(NAMESPACE_INDEX)
                .key_condition_expression("#ns = :ns")
                .expression_attribute_names("#ns", COL_NAMESPACE)
                .expression_attribute_values(":ns", AttributeValue::S(key.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| Error::transport(operation, namespace, DisplayErrorContext(&e)))?;

            identifiers.extend(
                output
                    .items()
                    .iter()
                    .filter_map(|item| string_attr(item, COL_IDENTIFIER))
                    .filter(|id| *id != NAMESPACE_ROW)
                    .map(str::to_string),
            );
            match output.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }
        Ok(identifiers)
    }
}

#[async_trait]
impl CatalogBackend for DynamoDbCatalog {
    fn catalog_type(&self) -> CatalogType {
        CatalogType::DynamoDb
    }

    async fn create_table(
        &self,
        identifier: &Identifier,
        schema: Schema,
        mut options: CreateTableOptions,
    ) -> Result<Table> {
        let (key, namespace_key) = table_key(identifier)?;
        let namespace = identifier.namespace();
        let namespace_row = self.namespace_item(&namespace, "create_table").await?;
        if self
            .get_item(&key, &namespace_key, "create_table", identifier)
            .await?
            .is_some()
        {
            return Err(Error::TableAlreadyExists(identifier.to_string()));
        }

        let warehouse = self.options.warehouse_location.as_deref();
        if options.location.is_none() && warehouse.is_none() {
            options.location = item_properties(&namespace_row)
                .get("location")
                .map(|location| {
                    format!("{}/{}", location.trim_end_matches('/'), identifier.table_name())
                });
        }

        let staged = pointer::stage_new_table(
            &self.io,
            warehouse,
            &namespace,
            identifier.table_name(),
            schema,
            options,
        )
        .await?;

        let item = build_item(
            &key,
            &namespace_key,
            &pointer_properties(&staged.location, None),
            None,
        );
        if let Err(e) = self.put_item(item, None, RowWrite::CreateTable, identifier).await {
            pointer::discard(&self.io, &staged).await;
            return Err(e);
        }

        info!(table = %identifier, location = %staged.location, "Created DynamoDB table entry");
        Ok(Table::new(identifier.clone(), staged.metadata, staged.location))
    }

    async fn commit_table(
        &self,
        table: &Table,
        requirements: &[TableRequirement],
        updates: &[TableUpdate],
    ) -> Result<(TableMetadata, String)> {
        let identifier = table.identifier();
        let (key, namespace_key) = table_key(identifier)?;

        let row = self.table_item(identifier, "commit_table").await?;
        let current_location = iceberg_metadata_location(&row, identifier)?;
        let current = self.io.read_metadata(&current_location).await?;

        let staged = pointer::stage_table_commit(
            &self.io,
            &current,
            &current_location,
            requirements,
            updates,
        )
        .await?;

        let mut properties = item_properties(&row);
        properties.extend(pointer_properties(&staged.location, Some(&current_location)));
        let item = build_item(&key, &namespace_key, &properties, Some(&row));

        match self
            .put_item(item, row_version(&row), RowWrite::CommitTable, identifier)
            .await
        {
            Ok(()) => {
                info!(table = %identifier, location = %staged.location, "Committed table metadata to DynamoDB");
                Ok((staged.metadata, staged.location))
            }
            Err(e) => {
                pointer::discard(&self.io, &staged).await;
                Err(e)
            }
        }
    }

    async fn list_tables(&self, namespace: &Identifier) -> Result<Vec<Identifier>> {
        self.namespace_item(namespace, "list_tables").await?;
        let prefix = format!("{}{}", namespace_key(namespace)?, SEPARATOR);

        Ok(self
            .table_rows(namespace, "list_tables")
            .await?
            .iter()
            .filter_map(|id| id.strip_prefix(&prefix))
            .map(|name| namespace.child(name))
            .collect())
    }

    async fn load_table(&self, identifier: &Identifier, properties: &Properties) -> Result<Table> {
        let row = self.table_item(identifier, "load_table").await?;
        let location = iceberg_metadata_location(&row, identifier)?;
        let metadata = self.io.read_metadata(&location).await?;

        debug!(table = %identifier, location = %location, "Loaded DynamoDB table");
        Ok(Table::new(identifier.clone(), metadata, location).with_io_properties(properties.clone()))
    }

    async fn drop_table(&self, identifier: &Identifier) -> Result<()> {
        let (key, namespace_key) = table_key(identifier)?;
        self.delete_item(&key, &namespace_key, RowWrite::DropTable, identifier).await?;

        info!(table = %identifier, "Dropped DynamoDB table entry");
        Ok(())
    }

    async fn rename_table(&self, from: &Identifier, to: &Identifier) -> Result<Table> {
        let (from_key, from_namespace) = table_key(from)?;
        let (to_key, to_namespace) = table_key(to)?;

        let source = self.table_item(from, "rename_table").await?;
        iceberg_metadata_location(&source, from)?;
        self.namespace_item(&to.namespace(), "rename_table").await?;
        if self
            .get_item(&to_key, &to_namespace, "rename_table", to)
            .await?
            .is_some()
        {
            return Err(Error::TableAlreadyExists(to.to_string()));
        }

        let config_err = |e: aws_sdk_dynamodb::error::BuildError| {
            Error::Config(format!("Failed to build rename transaction: {}", e))
        };
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(build_item(
                &to_key,
                &to_namespace,
                &item_properties(&source),
                Some(&source),
            )))
            .condition_expression("attribute_not_exists(#v)")
            .expression_attribute_names("#v", COL_VERSION)
            .build()
            .map_err(config_err)?;
        let mut delete = Delete::builder()
            .table_name(&self.table_name)
            .key(COL_IDENTIFIER, AttributeValue::S(from_key))
            .key(COL_NAMESPACE, AttributeValue::S(from_namespace))
            .expression_attribute_names("#v", COL_VERSION);
        delete = match row_version(&source) {
            Some(version) => delete
                .condition_expression("#v = :v")
                .expression_attribute_values(":v", version),
            None => delete.condition_expression("attribute_exists(#v)"),
        };
        let delete = delete.build().map_err(config_err)?;

        self.client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(put).build())
            .transact_items(TransactWriteItem::builder().delete(delete).build())
            .send()
            .await
            .map_err(|e| {
                write_error(RowWrite::RenameTable, error_code(&e), from, DisplayErrorContext(&e))
            })?;

        info!(from = %from, to = %to, "Renamed DynamoDB table entry");
        CatalogBackend::load_table(self, to, &Properties::new()).await
    }

    async fn list_namespaces(&self, parent: &Identifier) -> Result<Vec<Identifier>> {
        let prefix = if parent.is_empty() {
            None
        } else {
            self.namespace_item(parent, "list_namespaces").await?;
            Some(format!("{}{}", namespace_key(parent)?, SEPARATOR))
        };

        let mut namespaces = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut query = self
                .client
                .query()
                .table_name(&self.table_name)
                .expression_attribute_names("#id", COL_IDENTIFIER)
                .expression_attribute_values(":id", AttributeValue::S(NAMESPACE_ROW.to_string()))
                .set_exclusive_start_key(start_key.take());
            query = match &prefix {
                Some(prefix) => query
                    .key_condition_expression("#id = :id AND begins_with(#ns, :prefix)")
                    .expression_attribute_names("#ns", COL_NAMESPACE)
                    .expression_attribute_values(":prefix", AttributeValue::S(prefix.clone())),
                None => query.key_condition_expression("#id = :id"),
            };

            let output = query
                .send()
                .await
                .map_err(|e| Error::transport("list_namespaces", parent, DisplayErrorContext(&e)))?;

            namespaces.extend(
                output
                    .items()
                    .iter()
                    .filter_map(|item| string_attr(item, COL_NAMESPACE))
                    .map(|ns| Identifier::new(ns.split(SEPARATOR)))
                    .filter(|ns| ns.len() == parent.len() + 1 && ns.starts_with(parent)),
            );
            match output.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }
        Ok(namespaces)
    }

    async fn create_namespace(&self, namespace: &Identifier, properties: &Properties) -> Result<()> {
        let key = namespace_key(namespace)?;
        let item = build_item(NAMESPACE_ROW, &key, properties, None);

        self.put_item(item, None, RowWrite::CreateNamespace, namespace).await?;

        info!(namespace = %namespace, "Created DynamoDB namespace");
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &Identifier) -> Result<()> {
        let key = namespace_key(namespace)?;
        self.namespace_item(namespace, "drop_namespace").await?;
        if !self.table_rows(namespace, "drop_namespace").await?.is_empty() {
            return Err(Error::NamespaceNotEmpty(namespace.to_string()));
        }

        self.delete_item(NAMESPACE_ROW, &key, RowWrite::DropNamespace, namespace).await?;

        info!(namespace = %namespace, "Dropped DynamoDB namespace");
        Ok(())
    }

    async fn load_namespace_properties(&self, namespace: &Identifier) -> Result<Properties> {
        let row = self
            .namespace_item(namespace, "load_namespace_properties")
            .await?;
        Ok(item_properties(&row))
    }

    async fn update_namespace_properties(
        &self,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary> {
        let key = namespace_key(namespace)?;
        let row = self
            .namespace_item(namespace, "update_namespace_properties")
            .await?;
        let (next, summary) = reconcile(&item_properties(&row), removals, updates)?;

        let item = build_item(NAMESPACE_ROW, &key, &next, Some(&row));
        self.put_item(item, row_version(&row), RowWrite::UpdateNamespace, namespace).await?;

        info!(
            namespace = %namespace,
            removed = summary.removed.len(),
            updated = summary.updated.len(),
            "Updated DynamoDB namespace properties"
        );
        Ok(summary)
    }
}
