//! Configuration structures for lakecat.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags.
//! `catalog.type` selects the backend; only that backend's section is read.
//!
//! ```toml
//! [catalog]
//! type = "rest"
//! name = "lake"
//! warehouse = "s3://bucket/warehouse"
//!
//! [catalog.rest]
//! uri = "http://localhost:8181"
//! credential = "client-id:client-secret"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use crate::catalog::CatalogType;
use crate::properties::Properties;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LakecatConfig {
    /// Catalog connection
    pub catalog: CatalogConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Catalog connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Backend type
    #[serde(rename = "type")]
    pub catalog_type: CatalogType,

    /// Catalog name, used by the REST config handshake and the SQL catalog rows
    #[serde(default = "default_catalog_name")]
    pub name: String,

    /// Warehouse root for default table locations
    #[serde(default)]
    pub warehouse: Option<String>,

    /// Object store properties for metadata files (`s3.region`, `s3.endpoint`, ...)
    #[serde(default)]
    pub io: Properties,

    /// REST catalog configuration
    #[serde(default)]
    pub rest: RestCatalogConfig,

    /// Hive metastore configuration
    #[serde(default)]
    pub hive: HiveCatalogConfig,

    /// AWS Glue configuration
    #[serde(default)]
    pub glue: GlueCatalogConfig,

    /// AWS DynamoDB configuration
    #[serde(default)]
    pub dynamodb: DynamoDbCatalogConfig,

    /// SQL catalog configuration
    #[serde(default)]
    pub sql: SqlCatalogConfig,
}

/// REST catalog configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RestCatalogConfig {
    /// Catalog base URI
    pub uri: Option<String>,

    /// Client credential (`client_id:client_secret` or a bare secret)
    #[serde(default)]
    pub credential: Option<String>,

    /// Pre-obtained bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Alternate OAuth2 token endpoint
    #[serde(default)]
    pub oauth2_token_endpoint: Option<String>,

    /// Fixed path prefix after `/v1/`
    #[serde(default)]
    pub prefix: Option<String>,

    /// Metadata location sent with the config handshake
    #[serde(default)]
    pub metadata_location: Option<String>,

    /// SigV4 request signing
    #[serde(default)]
    pub sigv4: Option<SigV4Config>,

    /// TLS overrides
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// SigV4 signing configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SigV4Config {
    /// Signing region; resolved from the AWS environment when unset
    #[serde(default)]
    pub region: Option<String>,

    /// Signing service, `execute-api` when unset
    #[serde(default)]
    pub service: Option<String>,
}

/// TLS configuration for the REST transport.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// PEM CA certificate added to the trust roots
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// PEM file holding the client certificate and private key
    #[serde(default)]
    pub client_identity: Option<PathBuf>,

    /// Skip server certificate verification
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Hive metastore configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HiveCatalogConfig {
    /// Metastore URI (thrift://host:port)
    pub uri: Option<String>,
}

/// AWS Glue catalog configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GlueCatalogConfig {
    /// AWS region
    #[serde(default)]
    pub region: Option<String>,

    /// Glue catalog ID (defaults to AWS account ID)
    #[serde(default)]
    pub catalog_id: Option<String>,

    /// Alternate Glue endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Additional AWS properties
    #[serde(default)]
    pub properties: Properties,
}

/// AWS DynamoDB catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DynamoDbCatalogConfig {
    /// AWS region
    #[serde(default)]
    pub region: Option<String>,

    /// DynamoDB table holding the catalog
    #[serde(default = "default_dynamodb_table")]
    pub table_name: String,

    /// Alternate DynamoDB endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Create the catalog table when it does not exist
    #[serde(default)]
    pub create_table: bool,

    /// Additional AWS properties
    #[serde(default)]
    pub properties: Properties,
}

impl Default for DynamoDbCatalogConfig {
    fn default() -> Self {
        Self {
            region: None,
            table_name: default_dynamodb_table(),
            endpoint: None,
            create_table: false,
            properties: Properties::new(),
        }
    }
}

/// SQL catalog configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SqlCatalogConfig {
    /// SQLite connection URI (`sqlite://catalog.db`, `sqlite::memory:`)
    pub uri: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default)]
    pub level: LogLevel,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

// Default value functions
fn default_catalog_name() -> String {
    "default".to_string()
}
fn default_dynamodb_table() -> String {
    crate::catalog::dynamodb::DEFAULT_TABLE_NAME.to_string()
}

impl LakecatConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: LakecatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        let catalog = &self.catalog;
        if catalog.name.is_empty() {
            return Err(crate::Error::Config("Catalog name must not be empty".into()));
        }

        match catalog.catalog_type {
            CatalogType::Rest => {
                if is_blank(&catalog.rest.uri) {
                    return Err(crate::Error::Config(
                        "REST catalog requires catalog.rest.uri".into(),
                    ));
                }
                if catalog.rest.credential.is_some() && catalog.rest.token.is_some() {
                    tracing::warn!("Both credential and token set; the token is used as-is");
                }
            }
            CatalogType::Hive => {
                if is_blank(&catalog.hive.uri) {
                    return Err(crate::Error::Config(
                        "Hive catalog requires catalog.hive.uri".into(),
                    ));
                }
            }
            CatalogType::Sql => {
                if is_blank(&catalog.sql.uri) {
                    return Err(crate::Error::Config(
                        "SQL catalog requires catalog.sql.uri".into(),
                    ));
                }
            }
            CatalogType::DynamoDb => {
                if catalog.dynamodb.table_name.is_empty() {
                    return Err(crate::Error::Config(
                        "DynamoDB table name must not be empty".into(),
                    ));
                }
            }
            CatalogType::Glue => {}
        }

        // Pointer catalogs need somewhere to put metadata for new tables
        if catalog.catalog_type != CatalogType::Rest && catalog.warehouse.is_none() {
            tracing::warn!(
                catalog_type = %catalog.catalog_type,
                "No warehouse configured; new tables need an explicit or namespace location"
            );
        }

        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_rest_config() {
        let config = LakecatConfig::from_toml(
            r#"
            [catalog]
            type = "rest"

            [catalog.rest]
            uri = "http://localhost:8181"
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog.catalog_type, CatalogType::Rest);
        assert_eq!(config.catalog.name, "default");
        assert_eq!(config.catalog.rest.uri.as_deref(), Some("http://localhost:8181"));
        assert!(config.catalog.rest.sigv4.is_none());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_config_validation_missing_uri() {
        for backend in ["rest", "hive", "sql"] {
            let toml = format!("[catalog]\ntype = \"{backend}\"\n");
            let err = LakecatConfig::from_toml(&toml).unwrap_err();
            assert!(matches!(err, crate::Error::Config(_)), "{backend}: {err}");
        }
    }

    #[test]
    fn test_unknown_catalog_type_rejected() {
        let err = LakecatConfig::from_toml("[catalog]\ntype = \"nessie\"\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_aws_sections() {
        let config = LakecatConfig::from_toml(
            r#"
            [catalog]
            type = "dynamodb"
            warehouse = "s3://bucket/wh"

            [catalog.dynamodb]
            region = "eu-west-1"
            create_table = true

            [catalog.dynamodb.properties]
            "client.session-token" = "token"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        let dynamodb = &config.catalog.dynamodb;
        assert_eq!(dynamodb.table_name, "iceberg");
        assert_eq!(dynamodb.region.as_deref(), Some("eu-west-1"));
        assert!(dynamodb.create_table);
        assert_eq!(dynamodb.properties["client.session-token"], "token");
        assert_eq!(config.logging.level.as_str(), "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [catalog]
            type = "sql"
            name = "local"
            warehouse = "file:///tmp/warehouse"

            [catalog.sql]
            uri = "sqlite::memory:"

            [catalog.io]
            "s3.region" = "us-east-1"
            "#
        )
        .unwrap();

        let config = LakecatConfig::from_file(file.path()).unwrap();
        assert_eq!(config.catalog.catalog_type, CatalogType::Sql);
        assert_eq!(config.catalog.name, "local");
        assert_eq!(config.catalog.io["s3.region"], "us-east-1");
    }

    #[test]
    fn test_missing_file() {
        let err = LakecatConfig::from_file(std::path::Path::new("/nonexistent/lakecat.toml"))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
