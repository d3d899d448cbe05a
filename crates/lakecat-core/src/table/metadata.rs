//! Table metadata document.
//!
//! Mirrors the Iceberg v2 table metadata JSON closely enough to round-trip what
//! REST servers return and what the pointer catalogs write to storage.

use crate::properties::Properties;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Name of the branch that tracks the current snapshot.
pub const MAIN_BRANCH: &str = "main";

/// Partition field ids start above this value.
pub const PARTITION_DATA_ID_START: i32 = 1000;

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(rename = "format-version")]
    pub format_version: i32,
    #[serde(rename = "table-uuid")]
    pub table_uuid: String,
    pub location: String,
    #[serde(rename = "last-updated-ms")]
    pub last_updated_ms: i64,
    /// Highest field id assigned across all schemas
    #[serde(rename = "last-column-id")]
    pub last_column_id: i32,
    #[serde(default)]
    pub schemas: Vec<Schema>,
    #[serde(rename = "current-schema-id")]
    pub current_schema_id: i32,
    #[serde(default, rename = "partition-specs")]
    pub partition_specs: Vec<PartitionSpec>,
    #[serde(rename = "default-spec-id")]
    pub default_spec_id: i32,
    #[serde(rename = "last-partition-id")]
    pub last_partition_id: i32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(
        default,
        rename = "current-snapshot-id",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_snapshot_id: Option<i64>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default, rename = "snapshot-log")]
    pub snapshot_log: Vec<SnapshotLogEntry>,
    #[serde(default, rename = "metadata-log")]
    pub metadata_log: Vec<MetadataLogEntry>,
    #[serde(default, rename = "sort-orders")]
    pub sort_orders: Vec<SortOrder>,
    #[serde(rename = "default-sort-order-id")]
    pub default_sort_order_id: i32,
    #[serde(default)]
    pub refs: HashMap<String, SnapshotReference>,
    #[serde(default, rename = "last-sequence-number")]
    pub last_sequence_number: i64,
}

impl TableMetadata {
    /// Fresh v2 metadata for a new table.
    ///
    /// Missing partition spec and sort order default to unpartitioned and unsorted.
    pub fn new(
        schema: Schema,
        partition_spec: Option<PartitionSpec>,
        sort_order: Option<SortOrder>,
        location: impl Into<String>,
        properties: Properties,
    ) -> Self {
        let spec = partition_spec.unwrap_or_else(PartitionSpec::unpartitioned);
        let order = sort_order.unwrap_or_else(SortOrder::unsorted);

        Self {
            format_version: 2,
            table_uuid: uuid::Uuid::new_v4().to_string(),
            location: location.into(),
            last_updated_ms: chrono::Utc::now().timestamp_millis(),
            last_column_id: schema.highest_field_id(),
            current_schema_id: schema.schema_id,
            schemas: vec![schema],
            default_spec_id: spec.spec_id,
            last_partition_id: spec.last_assigned_field_id(),
            partition_specs: vec![spec],
            properties,
            current_snapshot_id: None,
            snapshots: Vec::new(),
            snapshot_log: Vec::new(),
            metadata_log: Vec::new(),
            default_sort_order_id: order.order_id,
            sort_orders: vec![order],
            refs: HashMap::new(),
            last_sequence_number: 0,
        }
    }

    pub fn current_schema(&self) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|s| s.schema_id == self.current_schema_id)
    }

    pub fn default_partition_spec(&self) -> Option<&PartitionSpec> {
        self.partition_specs
            .iter()
            .find(|s| s.spec_id == self.default_spec_id)
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let id = self.current_snapshot_id?;
        self.snapshot(id)
    }

    pub fn snapshot(&self, snapshot_id: i64) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.snapshot_id == snapshot_id)
    }

    /// Snapshot id a named ref points to. `main` falls back to the current snapshot.
    pub fn ref_snapshot_id(&self, ref_name: &str) -> Option<i64> {
        match self.refs.get(ref_name) {
            Some(reference) => Some(reference.snapshot_id),
            None if ref_name == MAIN_BRANCH => self.current_snapshot_id,
            None => None,
        }
    }
}

/// Iceberg schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "schema-id", default)]
    pub schema_id: i32,
    /// Always "struct"
    #[serde(rename = "type", default = "default_struct_type")]
    pub r#type: String,
    pub fields: Vec<SchemaField>,
    #[serde(default, rename = "identifier-field-ids")]
    pub identifier_field_ids: Vec<i32>,
}

fn default_struct_type() -> String {
    "struct".to_string()
}

impl Schema {
    pub fn new(schema_id: i32, fields: Vec<SchemaField>) -> Self {
        Self {
            schema_id,
            r#type: default_struct_type(),
            fields,
            identifier_field_ids: Vec::new(),
        }
    }

    /// Highest field id in the schema, including ids nested in struct, list and map types.
    pub fn highest_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|f| f.id.max(nested_max_id(&f.field_type)))
            .max()
            .unwrap_or(0)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn nested_max_id(field_type: &Value) -> i32 {
    let Value::Object(map) = field_type else {
        return 0;
    };

    let mut max = 0;
    for key in ["element-id", "key-id", "value-id", "id"] {
        if let Some(id) = map.get(key).and_then(Value::as_i64) {
            max = max.max(id as i32);
        }
    }
    for key in ["element", "key", "value", "type"] {
        if let Some(inner) = map.get(key) {
            max = max.max(nested_max_id(inner));
        }
    }
    if let Some(Value::Array(fields)) = map.get("fields") {
        for field in fields {
            max = max.max(nested_max_id(field));
        }
    }
    max
}

/// Schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub id: i32,
    pub name: String,
    /// Primitive type name or nested type object
    #[serde(rename = "type")]
    pub field_type: Value,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl SchemaField {
    /// Field with a primitive type such as `long` or `string`.
    pub fn primitive(id: i32, name: impl Into<String>, type_name: &str, required: bool) -> Self {
        Self {
            id,
            name: name.into(),
            field_type: Value::String(type_name.to_string()),
            required,
            doc: None,
        }
    }

    /// Type rendered as a string, for display and for Hive/Glue column types.
    pub fn type_string(&self) -> String {
        match &self.field_type {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("struct")
                .to_string(),
            other => other.to_string(),
        }
    }
}

/// Partition spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSpec {
    #[serde(rename = "spec-id")]
    pub spec_id: i32,
    #[serde(default)]
    pub fields: Vec<PartitionField>,
}

impl PartitionSpec {
    pub fn unpartitioned() -> Self {
        Self {
            spec_id: 0,
            fields: Vec::new(),
        }
    }

    /// Highest partition field id, or `999` when there are no fields.
    pub fn last_assigned_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|f| f.field_id)
            .max()
            .unwrap_or(PARTITION_DATA_ID_START - 1)
    }

    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Partition field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionField {
    #[serde(rename = "source-id")]
    pub source_id: i32,
    #[serde(rename = "field-id")]
    pub field_id: i32,
    pub name: String,
    /// identity, bucket[N], truncate[W], year, month, day, hour, void
    pub transform: String,
}

/// Sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOrder {
    #[serde(rename = "order-id")]
    pub order_id: i32,
    #[serde(default)]
    pub fields: Vec<SortField>,
}

impl SortOrder {
    pub fn unsorted() -> Self {
        Self {
            order_id: 0,
            fields: Vec::new(),
        }
    }
}

/// Sort field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub transform: String,
    #[serde(rename = "source-id")]
    pub source_id: i32,
    /// asc or desc
    pub direction: String,
    /// nulls-first or nulls-last
    #[serde(rename = "null-order")]
    pub null_order: String,
}

/// Snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "snapshot-id")]
    pub snapshot_id: i64,
    #[serde(skip_serializing_if = "Option::is_none", rename = "parent-snapshot-id")]
    pub parent_snapshot_id: Option<i64>,
    #[serde(rename = "sequence-number", default)]
    pub sequence_number: i64,
    #[serde(rename = "timestamp-ms")]
    pub timestamp_ms: i64,
    #[serde(rename = "manifest-list")]
    pub manifest_list: String,
    #[serde(default)]
    pub summary: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "schema-id")]
    pub schema_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLogEntry {
    #[serde(rename = "snapshot-id")]
    pub snapshot_id: i64,
    #[serde(rename = "timestamp-ms")]
    pub timestamp_ms: i64,
}

/// Previous metadata file of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataLogEntry {
    #[serde(rename = "metadata-file")]
    pub metadata_file: String,
    #[serde(rename = "timestamp-ms")]
    pub timestamp_ms: i64,
}

/// Named branch or tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotReference {
    #[serde(rename = "snapshot-id")]
    pub snapshot_id: i64,
    /// branch or tag
    #[serde(rename = "type")]
    pub ref_type: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "max-ref-age-ms")]
    pub max_ref_age_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "max-snapshot-age-ms")]
    pub max_snapshot_age_ms: Option<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "min-snapshots-to-keep"
    )]
    pub min_snapshots_to_keep: Option<i32>,
}
