//! Commit requirements and metadata updates.
//!
//! A commit carries a list of [`TableRequirement`]s checked against the table's
//! current metadata and a list of [`TableUpdate`]s applied in order to produce
//! the next metadata. Pointer catalogs run both locally through
//! [`stage_commit`]; the REST catalog sends them to the server unchanged.

use super::metadata::{
    MetadataLogEntry, PartitionSpec, Schema, Snapshot, SnapshotLogEntry, SnapshotReference,
    SortOrder, TableMetadata, MAIN_BRANCH,
};
use crate::properties::Properties;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Id placeholder meaning "the one added last in this commit".
pub const LAST_ADDED: i32 = -1;

/// Requirement checked before a commit is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TableRequirement {
    /// The table must not exist yet
    #[serde(rename = "assert-create")]
    AssertCreate,
    #[serde(rename = "assert-table-uuid")]
    AssertTableUuid { uuid: String },
    /// A branch or tag must point at the given snapshot, or not exist when `None`
    #[serde(rename = "assert-ref-snapshot-id")]
    AssertRefSnapshotId {
        #[serde(rename = "ref")]
        ref_name: String,
        #[serde(rename = "snapshot-id")]
        snapshot_id: Option<i64>,
    },
    #[serde(rename = "assert-last-assigned-field-id")]
    AssertLastAssignedFieldId {
        #[serde(rename = "last-assigned-field-id")]
        last_assigned_field_id: i32,
    },
    #[serde(rename = "assert-current-schema-id")]
    AssertCurrentSchemaId {
        #[serde(rename = "current-schema-id")]
        current_schema_id: i32,
    },
    #[serde(rename = "assert-last-assigned-partition-id")]
    AssertLastAssignedPartitionId {
        #[serde(rename = "last-assigned-partition-id")]
        last_assigned_partition_id: i32,
    },
    #[serde(rename = "assert-default-spec-id")]
    AssertDefaultSpecId {
        #[serde(rename = "default-spec-id")]
        default_spec_id: i32,
    },
    #[serde(rename = "assert-default-sort-order-id")]
    AssertDefaultSortOrderId {
        #[serde(rename = "default-sort-order-id")]
        default_sort_order_id: i32,
    },
}

fn mismatch(what: &str, expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Error {
    Error::CommitFailed(format!("{what} changed: expected {expected:?}, found {actual:?}"))
}

impl TableRequirement {
    /// Check the requirement against the current metadata, `None` when the table does not exist.
    pub fn validate(&self, current: Option<&TableMetadata>) -> Result<()> {
        let metadata = match (self, current) {
            (TableRequirement::AssertCreate, None) => return Ok(()),
            (TableRequirement::AssertCreate, Some(_)) => {
                return Err(Error::CommitFailed("table already exists".into()))
            }
            (_, None) => {
                return Err(Error::CommitFailed(
                    "requirement cannot be checked against a missing table".into(),
                ))
            }
            (_, Some(metadata)) => metadata,
        };

        match self {
            TableRequirement::AssertCreate => Ok(()),
            TableRequirement::AssertTableUuid { uuid } => {
                if !metadata.table_uuid.eq_ignore_ascii_case(uuid) {
                    return Err(mismatch("table uuid", uuid, &metadata.table_uuid));
                }
                Ok(())
            }
            TableRequirement::AssertRefSnapshotId {
                ref_name,
                snapshot_id,
            } => {
                let actual = metadata.ref_snapshot_id(ref_name);
                if actual != *snapshot_id {
                    return Err(mismatch(
                        &format!("ref {ref_name}"),
                        snapshot_id,
                        actual,
                    ));
                }
                Ok(())
            }
            TableRequirement::AssertLastAssignedFieldId {
                last_assigned_field_id,
            } => {
                if metadata.last_column_id != *last_assigned_field_id {
                    return Err(mismatch(
                        "last assigned field id",
                        last_assigned_field_id,
                        metadata.last_column_id,
                    ));
                }
                Ok(())
            }
            TableRequirement::AssertCurrentSchemaId { current_schema_id } => {
                if metadata.current_schema_id != *current_schema_id {
                    return Err(mismatch(
                        "current schema id",
                        current_schema_id,
                        metadata.current_schema_id,
                    ));
                }
                Ok(())
            }
            TableRequirement::AssertLastAssignedPartitionId {
                last_assigned_partition_id,
            } => {
                if metadata.last_partition_id != *last_assigned_partition_id {
                    return Err(mismatch(
                        "last assigned partition id",
                        last_assigned_partition_id,
                        metadata.last_partition_id,
                    ));
                }
                Ok(())
            }
            TableRequirement::AssertDefaultSpecId { default_spec_id } => {
                if metadata.default_spec_id != *default_spec_id {
                    return Err(mismatch(
                        "default spec id",
                        default_spec_id,
                        metadata.default_spec_id,
                    ));
                }
                Ok(())
            }
            TableRequirement::AssertDefaultSortOrderId {
                default_sort_order_id,
            } => {
                if metadata.default_sort_order_id != *default_sort_order_id {
                    return Err(mismatch(
                        "default sort order id",
                        default_sort_order_id,
                        metadata.default_sort_order_id,
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Metadata change applied by a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum TableUpdate {
    #[serde(rename = "assign-uuid")]
    AssignUuid { uuid: String },
    #[serde(rename = "upgrade-format-version")]
    UpgradeFormatVersion {
        #[serde(rename = "format-version")]
        format_version: i32,
    },
    #[serde(rename = "add-schema")]
    AddSchema {
        schema: Schema,
        #[serde(rename = "last-column-id", skip_serializing_if = "Option::is_none")]
        last_column_id: Option<i32>,
    },
    /// `schema_id` of -1 selects the schema added last
    #[serde(rename = "set-current-schema")]
    SetCurrentSchema {
        #[serde(rename = "schema-id")]
        schema_id: i32,
    },
    #[serde(rename = "add-spec")]
    AddSpec { spec: PartitionSpec },
    #[serde(rename = "set-default-spec")]
    SetDefaultSpec {
        #[serde(rename = "spec-id")]
        spec_id: i32,
    },
    #[serde(rename = "add-sort-order")]
    AddSortOrder {
        #[serde(rename = "sort-order")]
        sort_order: SortOrder,
    },
    #[serde(rename = "set-default-sort-order")]
    SetDefaultSortOrder {
        #[serde(rename = "sort-order-id")]
        sort_order_id: i32,
    },
    #[serde(rename = "add-snapshot")]
    AddSnapshot { snapshot: Snapshot },
    #[serde(rename = "set-snapshot-ref")]
    SetSnapshotRef {
        #[serde(rename = "ref-name")]
        ref_name: String,
        #[serde(rename = "snapshot-id")]
        snapshot_id: i64,
        #[serde(rename = "type")]
        ref_type: String,
        #[serde(skip_serializing_if = "Option::is_none", rename = "max-ref-age-ms")]
        max_ref_age_ms: Option<i64>,
        #[serde(
            skip_serializing_if = "Option::is_none",
            rename = "max-snapshot-age-ms"
        )]
        max_snapshot_age_ms: Option<i64>,
        #[serde(
            skip_serializing_if = "Option::is_none",
            rename = "min-snapshots-to-keep"
        )]
        min_snapshots_to_keep: Option<i32>,
    },
    #[serde(rename = "remove-snapshot-ref")]
    RemoveSnapshotRef {
        #[serde(rename = "ref-name")]
        ref_name: String,
    },
    #[serde(rename = "remove-snapshots")]
    RemoveSnapshots {
        #[serde(rename = "snapshot-ids")]
        snapshot_ids: Vec<i64>,
    },
    #[serde(rename = "set-location")]
    SetLocation { location: String },
    #[serde(rename = "set-properties")]
    SetProperties { updates: Properties },
    #[serde(rename = "remove-properties")]
    RemoveProperties { removals: Vec<String> },
}

fn resolve_id(requested: i32, last: Option<i32>, what: &str) -> Result<i32> {
    if requested != LAST_ADDED {
        return Ok(requested);
    }
    last.ok_or_else(|| Error::CommitFailed(format!("no {what} has been added")))
}

impl TableUpdate {
    /// Apply the update to `metadata` in place.
    pub fn apply(&self, metadata: &mut TableMetadata) -> Result<()> {
        match self {
            TableUpdate::AssignUuid { uuid } => {
                metadata.table_uuid = uuid.clone();
            }
            TableUpdate::UpgradeFormatVersion { format_version } => {
                if *format_version < metadata.format_version {
                    return Err(Error::CommitFailed(format!(
                        "cannot downgrade format version from {} to {}",
                        metadata.format_version, format_version
                    )));
                }
                metadata.format_version = *format_version;
            }
            TableUpdate::AddSchema {
                schema,
                last_column_id,
            } => {
                if metadata
                    .schemas
                    .iter()
                    .any(|s| s.schema_id == schema.schema_id)
                {
                    return Err(Error::CommitFailed(format!(
                        "schema {} already exists",
                        schema.schema_id
                    )));
                }
                let highest = last_column_id.unwrap_or_else(|| schema.highest_field_id());
                metadata.last_column_id = metadata.last_column_id.max(highest);
                metadata.schemas.push(schema.clone());
            }
            TableUpdate::SetCurrentSchema { schema_id } => {
                let last = metadata.schemas.last().map(|s| s.schema_id);
                let id = resolve_id(*schema_id, last, "schema")?;
                if !metadata.schemas.iter().any(|s| s.schema_id == id) {
                    return Err(Error::CommitFailed(format!("unknown schema {id}")));
                }
                metadata.current_schema_id = id;
            }
            TableUpdate::AddSpec { spec } => {
                if metadata
                    .partition_specs
                    .iter()
                    .any(|s| s.spec_id == spec.spec_id)
                {
                    return Err(Error::CommitFailed(format!(
                        "partition spec {} already exists",
                        spec.spec_id
                    )));
                }
                metadata.last_partition_id = metadata
                    .last_partition_id
                    .max(spec.last_assigned_field_id());
                metadata.partition_specs.push(spec.clone());
            }
            TableUpdate::SetDefaultSpec { spec_id } => {
                let last = metadata.partition_specs.last().map(|s| s.spec_id);
                let id = resolve_id(*spec_id, last, "partition spec")?;
                if !metadata.partition_specs.iter().any(|s| s.spec_id == id) {
                    return Err(Error::CommitFailed(format!("unknown partition spec {id}")));
                }
                metadata.default_spec_id = id;
            }
            TableUpdate::AddSortOrder { sort_order } => {
                if metadata
                    .sort_orders
                    .iter()
                    .any(|o| o.order_id == sort_order.order_id)
                {
                    return Err(Error::CommitFailed(format!(
                        "sort order {} already exists",
                        sort_order.order_id
                    )));
                }
                metadata.sort_orders.push(sort_order.clone());
            }
            TableUpdate::SetDefaultSortOrder { sort_order_id } => {
                let last = metadata.sort_orders.last().map(|o| o.order_id);
                let id = resolve_id(*sort_order_id, last, "sort order")?;
                if !metadata.sort_orders.iter().any(|o| o.order_id == id) {
                    return Err(Error::CommitFailed(format!("unknown sort order {id}")));
                }
                metadata.default_sort_order_id = id;
            }
            TableUpdate::AddSnapshot { snapshot } => {
                if metadata.snapshot(snapshot.snapshot_id).is_some() {
                    return Err(Error::CommitFailed(format!(
                        "snapshot {} already exists",
                        snapshot.snapshot_id
                    )));
                }
                metadata.last_sequence_number =
                    metadata.last_sequence_number.max(snapshot.sequence_number);
                metadata.last_updated_ms = snapshot.timestamp_ms;
                metadata.snapshots.push(snapshot.clone());
            }
            TableUpdate::SetSnapshotRef {
                ref_name,
                snapshot_id,
                ref_type,
                max_ref_age_ms,
                max_snapshot_age_ms,
                min_snapshots_to_keep,
            } => {
                let timestamp_ms = metadata
                    .snapshot(*snapshot_id)
                    .map(|s| s.timestamp_ms)
                    .ok_or_else(|| {
                        Error::CommitFailed(format!("unknown snapshot {snapshot_id}"))
                    })?;

                metadata.refs.insert(
                    ref_name.clone(),
                    SnapshotReference {
                        snapshot_id: *snapshot_id,
                        ref_type: ref_type.clone(),
                        max_ref_age_ms: *max_ref_age_ms,
                        max_snapshot_age_ms: *max_snapshot_age_ms,
                        min_snapshots_to_keep: *min_snapshots_to_keep,
                    },
                );

                if ref_name == MAIN_BRANCH {
                    metadata.current_snapshot_id = Some(*snapshot_id);
                    metadata.snapshot_log.push(SnapshotLogEntry {
                        snapshot_id: *snapshot_id,
                        timestamp_ms,
                    });
                }
            }
            TableUpdate::RemoveSnapshotRef { ref_name } => {
                metadata.refs.remove(ref_name);
                if ref_name == MAIN_BRANCH {
                    metadata.current_snapshot_id = None;
                }
            }
            TableUpdate::RemoveSnapshots { snapshot_ids } => {
                metadata
                    .snapshots
                    .retain(|s| !snapshot_ids.contains(&s.snapshot_id));
                metadata
                    .refs
                    .retain(|_, r| !snapshot_ids.contains(&r.snapshot_id));
                if metadata
                    .current_snapshot_id
                    .is_some_and(|id| snapshot_ids.contains(&id))
                {
                    metadata.current_snapshot_id = None;
                }
            }
            TableUpdate::SetLocation { location } => {
                metadata.location = location.trim_end_matches('/').to_string();
            }
            TableUpdate::SetProperties { updates } => {
                metadata
                    .properties
                    .extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            TableUpdate::RemoveProperties { removals } => {
                for key in removals {
                    metadata.properties.remove(key);
                }
            }
        }
        Ok(())
    }
}

/// Validate every requirement, then apply the updates to a copy of `current`.
///
/// Nothing is applied unless all requirements hold. `previous_location` is the
/// metadata file being replaced and is appended to the metadata log.
pub fn stage_commit(
    current: &TableMetadata,
    previous_location: &str,
    requirements: &[TableRequirement],
    updates: &[TableUpdate],
) -> Result<TableMetadata> {
    for requirement in requirements {
        requirement.validate(Some(current))?;
    }

    let mut next = current.clone();
    for update in updates {
        update.apply(&mut next)?;
    }

    next.last_updated_ms = next
        .last_updated_ms
        .max(chrono::Utc::now().timestamp_millis());
    if !previous_location.is_empty() {
        next.metadata_log.push(MetadataLogEntry {
            metadata_file: previous_location.to_string(),
            timestamp_ms: current.last_updated_ms,
        });
    }
    Ok(next)
}
