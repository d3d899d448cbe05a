//! Table model shared by every catalog backend.

mod commit;
mod metadata;

pub use commit::{stage_commit, TableRequirement, TableUpdate, LAST_ADDED};
pub use metadata::{
    MetadataLogEntry, PartitionField, PartitionSpec, Schema, SchemaField, Snapshot,
    SnapshotLogEntry, SnapshotReference, SortField, SortOrder, TableMetadata, MAIN_BRANCH,
    PARTITION_DATA_ID_START,
};

use crate::identifier::Identifier;
use crate::properties::Properties;

/// A table as loaded from a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    identifier: Identifier,
    metadata: TableMetadata,
    metadata_location: String,
    io_properties: Properties,
}

impl Table {
    pub fn new(
        identifier: Identifier,
        metadata: TableMetadata,
        metadata_location: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            metadata,
            metadata_location: metadata_location.into(),
            io_properties: Properties::new(),
        }
    }

    /// Attach storage properties used to read the table's files.
    pub fn with_io_properties(mut self, properties: Properties) -> Self {
        self.io_properties = properties;
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Location of the metadata file this table was loaded from.
    pub fn metadata_location(&self) -> &str {
        &self.metadata_location
    }

    pub fn io_properties(&self) -> &Properties {
        &self.io_properties
    }

    pub fn location(&self) -> &str {
        &self.metadata.location
    }

    pub fn current_snapshot_id(&self) -> Option<i64> {
        self.metadata.current_snapshot_id
    }

    pub fn properties(&self) -> &Properties {
        &self.metadata.properties
    }
}
