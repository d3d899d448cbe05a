//! Shared steps for catalogs that store a pointer to the current metadata file.
//!
//! Glue, Hive, DynamoDB and SQL keep `metadata_location` (and the previous one)
//! in their own store and keep the metadata JSON in object storage. Creating or
//! committing writes a new metadata file first; the backend then swaps its
//! pointer conditionally on the location it read.

use crate::identifier::Identifier;
use crate::io::{self, FileIo};
use crate::options::CreateTableOptions;
use crate::properties::Properties;
use crate::table::{stage_commit, Schema, TableMetadata, TableRequirement, TableUpdate};
use crate::{Error, Result};
use serde_json::Value;
use tracing::warn;

/// Catalog entry parameter holding the current metadata file.
pub(crate) const METADATA_LOCATION: &str = "metadata_location";
/// Catalog entry parameter holding the metadata file before the last commit.
pub(crate) const PREVIOUS_METADATA_LOCATION: &str = "previous_metadata_location";
/// Catalog entry parameter marking an Iceberg table.
pub(crate) const TABLE_TYPE: &str = "table_type";
pub(crate) const ICEBERG_TABLE_TYPE: &str = "ICEBERG";

/// Metadata written to storage but not yet referenced by the catalog.
#[derive(Debug)]
pub(crate) struct StagedMetadata {
    pub metadata: TableMetadata,
    pub location: String,
}

/// Write the first metadata file for a new table.
pub(crate) async fn stage_new_table(
    io: &FileIo,
    warehouse: Option<&str>,
    namespace: &Identifier,
    name: &str,
    schema: Schema,
    options: CreateTableOptions,
) -> Result<StagedMetadata> {
    let location = match (options.location, warehouse) {
        (Some(location), _) => location,
        (None, Some(warehouse)) => io::default_table_location(warehouse, namespace, name),
        (None, None) => {
            return Err(Error::Config(
                "a warehouse location or an explicit table location is required".into(),
            ))
        }
    };

    let metadata = TableMetadata::new(
        schema,
        options.partition_spec,
        options.sort_order,
        location.clone(),
        options.properties,
    );
    let metadata_location = io::new_metadata_location(&location, 0);
    io.write_metadata(&metadata_location, &metadata).await?;

    Ok(StagedMetadata {
        metadata,
        location: metadata_location,
    })
}

/// Validate and apply a commit against the current metadata and write the result.
pub(crate) async fn stage_table_commit(
    io: &FileIo,
    current: &TableMetadata,
    current_location: &str,
    requirements: &[TableRequirement],
    updates: &[TableUpdate],
) -> Result<StagedMetadata> {
    let metadata = stage_commit(current, current_location, requirements, updates)?;
    let location = io::new_metadata_location(
        &metadata.location,
        io::next_metadata_version(current_location),
    );
    io.write_metadata(&location, &metadata).await?;

    Ok(StagedMetadata { metadata, location })
}

/// Remove a staged metadata file after the pointer swap failed.
pub(crate) async fn discard(io: &FileIo, staged: &StagedMetadata) {
    if let Err(e) = io.delete(&staged.location).await {
        warn!(location = %staged.location, error = %e, "Failed to remove unreferenced metadata file");
    }
}

/// IO properties for a loaded table; caller-supplied keys win.
pub(crate) fn merge_io_properties(base: &Properties, overrides: &Properties) -> Properties {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Database name of a single-level namespace.
pub(crate) fn database_name(namespace: &Identifier) -> Result<&str> {
    match namespace.segments() {
        [database] if !database.is_empty() => Ok(database.as_str()),
        _ => Err(Error::InvalidIdentifier(format!(
            "expected a single-level namespace, got '{namespace}'"
        ))),
    }
}

/// Database and table names of a `database.table` identifier.
pub(crate) fn database_and_table(identifier: &Identifier) -> Result<(String, String)> {
    let (namespace, name) = identifier.split_table()?;
    let database = database_name(&namespace)?;
    Ok((database.to_string(), name.to_string()))
}

/// Join identifier segments into a single row key.
///
/// Segments must be non-empty and must not contain `separator`, so distinct
/// identifiers never map to the same key.
pub(crate) fn joined_key(identifier: &Identifier, separator: &str) -> Result<String> {
    if identifier.is_empty() {
        return Err(Error::InvalidIdentifier("identifier must not be empty".into()));
    }
    if let Some(segment) = identifier
        .segments()
        .iter()
        .find(|s| s.is_empty() || s.contains(separator))
    {
        return Err(Error::InvalidIdentifier(format!(
            "segment '{segment}' of '{identifier}' is empty or contains '{separator}'"
        )));
    }
    Ok(identifier.join(separator))
}

/// Reject hierarchical listing on catalogs with a flat namespace model.
pub(crate) fn require_root(parent: &Identifier) -> Result<()> {
    if parent.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(format!(
            "hierarchical namespaces are not supported, got parent '{parent}'"
        )))
    }
}

/// Hive column type for an Iceberg field type, used by Glue and Hive columns.
pub(crate) fn hive_column_type(field_type: &Value) -> String {
    match field_type {
        Value::String(name) => hive_primitive_type(name),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("struct") => {
                let fields = map
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|f| {
                                let name = f.get("name").and_then(Value::as_str).unwrap_or_default();
                                let inner = f.get("type").map(hive_column_type).unwrap_or_default();
                                format!("{name}:{inner}")
                            })
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .unwrap_or_default();
                format!("struct<{fields}>")
            }
            Some("list") => {
                let element = map.get("element").map(hive_column_type).unwrap_or_default();
                format!("array<{element}>")
            }
            Some("map") => {
                let key = map.get("key").map(hive_column_type).unwrap_or_default();
                let value = map.get("value").map(hive_column_type).unwrap_or_default();
                format!("map<{key},{value}>")
            }
            _ => "string".to_string(),
        },
        _ => "string".to_string(),
    }
}

fn hive_primitive_type(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "boolean" => "boolean".to_string(),
        "int" | "integer" => "int".to_string(),
        "long" => "bigint".to_string(),
        "float" => "float".to_string(),
        "double" => "double".to_string(),
        "date" => "date".to_string(),
        "timestamp" | "timestamptz" | "timestamp_ns" | "timestamptz_ns" => "timestamp".to_string(),
        "binary" => "binary".to_string(),
        // no native time or uuid column type
        "string" | "time" | "uuid" => "string".to_string(),
        other if other.starts_with("decimal") => other.replace(' ', ""),
        other if other.starts_with("fixed") => "binary".to_string(),
        _ => "string".to_string(),
    }
}
