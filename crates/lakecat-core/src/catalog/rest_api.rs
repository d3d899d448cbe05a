//! Iceberg REST catalog wire types.
//!
//! Request and response bodies of the Apache Iceberg REST Catalog API.
//! See: https://iceberg.apache.org/spec/#iceberg-rest-catalog-api

use crate::identifier::Identifier;
use crate::properties::{Properties, PropertiesUpdateSummary};
use crate::table::{
    PartitionSpec, Schema, SortOrder, TableMetadata, TableRequirement, TableUpdate,
};
use serde::{Deserialize, Serialize};

/// Catalog configuration response (`GET /v1/config`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Defaults, overridden by client configuration
    #[serde(default)]
    pub defaults: Properties,
    /// Overrides, applied over client configuration
    #[serde(default)]
    pub overrides: Properties,
}

impl CatalogConfig {
    /// Effective configuration: server defaults, then `client`, then server overrides.
    pub fn merge(&self, client: &Properties) -> Properties {
        let mut merged = self.defaults.clone();
        merged.extend(client.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(self.overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// List namespaces response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListNamespacesResponse {
    /// Namespace identifiers
    pub namespaces: Vec<Vec<String>>,
    /// Continuation token for pagination
    #[serde(default, rename = "next-page-token")]
    pub next_page_token: Option<String>,
}

/// Create namespace request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNamespaceRequest {
    pub namespace: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
}

/// Create and load namespace response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceResponse {
    pub namespace: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
}

/// Update namespace properties request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNamespacePropertiesRequest {
    #[serde(default)]
    pub removals: Vec<String>,
    #[serde(default)]
    pub updates: Properties,
}

/// Update namespace properties response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNamespacePropertiesResponse {
    #[serde(default)]
    pub updated: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    /// Requested removals that were not present; omitted when empty
    #[serde(default)]
    pub missing: Option<Vec<String>>,
}

impl From<UpdateNamespacePropertiesResponse> for PropertiesUpdateSummary {
    fn from(response: UpdateNamespacePropertiesResponse) -> Self {
        PropertiesUpdateSummary {
            removed: response.removed,
            updated: response.updated,
            missing: response.missing.unwrap_or_default(),
        }
    }
}

/// List tables response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTablesResponse {
    pub identifiers: Vec<TableIdentifier>,
    /// Continuation token for pagination
    #[serde(default, rename = "next-page-token")]
    pub next_page_token: Option<String>,
}

/// Table identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableIdentifier {
    pub namespace: Vec<String>,
    pub name: String,
}

impl TableIdentifier {
    /// Wire form of a `namespace.table` identifier.
    pub fn from_identifier(identifier: &Identifier) -> crate::Result<Self> {
        let (namespace, name) = identifier.split_table()?;
        Ok(Self {
            namespace: namespace.into_segments(),
            name: name.to_string(),
        })
    }
}

impl From<TableIdentifier> for Identifier {
    fn from(ident: TableIdentifier) -> Self {
        Identifier::new(ident.namespace).child(ident.name)
    }
}

/// Create table request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub name: String,
    /// Table location; the catalog assigns one when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none", rename = "partition-spec")]
    pub partition_spec: Option<PartitionSpec>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "write-order")]
    pub write_order: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "stage-create")]
    pub stage_create: Option<bool>,
    #[serde(default)]
    pub properties: Properties,
}

/// Load table response, also returned by create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTableResponse {
    /// Absent for staged tables
    #[serde(default, rename = "metadata-location")]
    pub metadata_location: Option<String>,
    pub metadata: TableMetadata,
    /// Per-table IO configuration
    #[serde(default)]
    pub config: Properties,
}

/// Commit table request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTableRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<TableIdentifier>,
    /// Requirements for optimistic concurrency
    pub requirements: Vec<TableRequirement>,
    pub updates: Vec<TableUpdate>,
}

/// Commit table response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTableResponse {
    #[serde(rename = "metadata-location")]
    pub metadata_location: String,
    pub metadata: TableMetadata,
}

/// Rename table request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameTableRequest {
    pub source: TableIdentifier,
    pub destination: TableIdentifier,
}

/// Error body returned with non-2xx responses: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcebergErrorResponse {
    pub error: ErrorResponse,
}

/// Error model from the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Exception class name, e.g. `NoSuchTableException`
    #[serde(rename = "type")]
    pub error_type: String,
    /// HTTP status code
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

/// OAuth token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// OAuth error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{SchemaField, MAIN_BRANCH};

    #[test]
    fn test_config_merge_precedence() {
        let config = CatalogConfig {
            defaults: Properties::from([
                ("warehouse".to_string(), "default".to_string()),
                ("clients".to_string(), "4".to_string()),
            ]),
            overrides: Properties::from([("prefix".to_string(), "ws1".to_string())]),
        };
        let client = Properties::from([
            ("warehouse".to_string(), "mine".to_string()),
            ("prefix".to_string(), "ignored".to_string()),
        ]);

        let merged = config.merge(&client);
        assert_eq!(merged["warehouse"], "mine");
        assert_eq!(merged["clients"], "4");
        assert_eq!(merged["prefix"], "ws1");
    }

    #[test]
    fn test_create_table_request_serialization() {
        let request = CreateTableRequest {
            name: "events".to_string(),
            location: None,
            schema: Schema::new(0, vec![SchemaField::primitive(1, "id", "long", true)]),
            partition_spec: None,
            write_order: None,
            stage_create: None,
            properties: Properties::new(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["name"], "events");
        assert_eq!(json["schema"]["schema-id"], 0);
        assert!(json.get("location").is_none());
        assert!(json.get("partition-spec").is_none());
    }

    #[test]
    fn test_commit_request_serialization() {
        let request = CommitTableRequest {
            identifier: Some(TableIdentifier {
                namespace: vec!["db".to_string()],
                name: "events".to_string(),
            }),
            requirements: vec![TableRequirement::AssertRefSnapshotId {
                ref_name: MAIN_BRANCH.to_string(),
                snapshot_id: Some(99),
            }],
            updates: vec![TableUpdate::RemoveProperties {
                removals: vec!["k".to_string()],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requirements"][0]["type"], "assert-ref-snapshot-id");
        assert_eq!(json["requirements"][0]["ref"], "main");
        assert_eq!(json["updates"][0]["action"], "remove-properties");
        assert_eq!(json["identifier"]["namespace"][0], "db");
    }

    #[test]
    fn test_error_response_deserialization() {
        let json = r#"{
            "error": {
                "type": "NoSuchTableException",
                "code": 404,
                "message": "Table not found: db.table"
            }
        }"#;

        let error: IcebergErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(error.error.code, 404);
        assert_eq!(error.error.error_type, "NoSuchTableException");
        assert!(error.error.stack.is_none());
    }

    #[test]
    fn test_update_properties_response_without_missing() {
        let json = r#"{"updated": ["a"], "removed": []}"#;
        let response: UpdateNamespacePropertiesResponse = serde_json::from_str(json).unwrap();
        let summary = PropertiesUpdateSummary::from(response);
        assert_eq!(summary.updated, vec!["a".to_string()]);
        assert!(summary.missing.is_empty());
    }

    #[test]
    fn test_table_identifier_conversion() {
        let ident = Identifier::from(["a", "b", "t"]);
        let wire = TableIdentifier::from_identifier(&ident).unwrap();
        assert_eq!(wire.namespace, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(wire.name, "t");
        assert_eq!(Identifier::from(wire), ident);
        assert!(TableIdentifier::from_identifier(&Identifier::empty()).is_err());
    }
}
