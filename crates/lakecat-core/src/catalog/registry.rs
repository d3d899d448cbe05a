//! Catalog factory registry.
//!
//! Builds a shared [`Catalog`] handle from a [`CatalogConfig`] by looking up the
//! factory registered for `catalog.type`. The default registry knows every
//! built-in backend:
//!
//! - REST Catalog
//! - Hive Metastore
//! - AWS Glue Catalog
//! - AWS DynamoDB Catalog
//! - SQL Catalog (SQLite)

use super::dynamodb::{DynamoDbCatalog, DYNAMODB_ENDPOINT, DYNAMODB_TABLE_NAME};
use super::glue::{GlueCatalog, GLUE_CATALOG_ID, GLUE_ENDPOINT};
use super::hive::HiveCatalog;
use super::rest::RestCatalog;
use super::sql::SqlCatalog;
use super::{Catalog, CatalogType};
use crate::config::{CatalogConfig, TlsConfig};
use crate::options::{
    with_auth_uri, with_aws_properties, with_credential, with_metadata_location,
    with_oauth_token, with_prefix, with_sigv4_region_svc, with_tls_config,
    with_warehouse_location, AwsCatalog, CatalogOption, TlsSettings, WarehouseCatalog,
};
use crate::properties::Properties;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Trait for creating catalog instances.
///
/// Implementations create and configure a catalog connection from the
/// catalog section of the configuration.
#[async_trait]
pub trait CatalogFactory: Send + Sync {
    /// Create a new catalog instance.
    async fn create(&self, config: &CatalogConfig) -> Result<Arc<dyn Catalog>>;

    /// Get the catalog type this factory creates.
    fn catalog_type(&self) -> CatalogType;

    /// Check if this factory supports the given configuration.
    fn supports(&self, config: &CatalogConfig) -> bool {
        self.catalog_type() == config.catalog_type
    }
}

/// Registry of catalog factories.
pub struct CatalogRegistry {
    factories: Vec<Box<dyn CatalogFactory>>,
}

impl CatalogRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Create a registry with every built-in backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RestCatalogFactory));
        registry.register(Box::new(HiveCatalogFactory));
        registry.register(Box::new(GlueCatalogFactory));
        registry.register(Box::new(DynamoDbCatalogFactory));
        registry.register(Box::new(SqlCatalogFactory));
        registry
    }

    /// Register a catalog factory. Later registrations for a type take precedence.
    pub fn register(&mut self, factory: Box<dyn CatalogFactory>) {
        self.factories.insert(0, factory);
    }

    /// Create a catalog instance based on configuration.
    ///
    /// Fails with `CatalogNotFound` when no factory supports the configured type.
    pub async fn create(&self, config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
        let factory = self
            .factories
            .iter()
            .find(|f| f.supports(config))
            .ok_or_else(|| Error::CatalogNotFound(config.catalog_type.to_string()))?;

        debug!(catalog_type = %config.catalog_type, name = %config.name, "Creating catalog");
        let catalog = factory.create(config).await?;
        info!(catalog_type = %config.catalog_type, name = %config.name, "Catalog ready");
        Ok(catalog)
    }

    /// Get the supported catalog types.
    pub fn supported_types(&self) -> Vec<CatalogType> {
        let mut types: Vec<CatalogType> = Vec::new();
        for factory in &self.factories {
            if !types.contains(&factory.catalog_type()) {
                types.push(factory.catalog_type());
            }
        }
        types
    }
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{what} must be set")))
}

fn warehouse_option<C: WarehouseCatalog>(
    config: &CatalogConfig,
) -> Option<CatalogOption<C>> {
    config
        .warehouse
        .as_ref()
        .map(|w| with_warehouse_location::<C>(w.clone()))
}

/// AWS properties from a backend section: explicit keys, then the object
/// store properties so metadata files use the same endpoint settings.
fn aws_properties(
    config: &CatalogConfig,
    region: &Option<String>,
    extra: &Properties,
    keyed: &[(&str, &Option<String>)],
) -> Properties {
    let mut properties = config.io.clone();
    properties.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    if let Some(region) = region {
        properties.insert("region".to_string(), region.clone());
    }
    for (key, value) in keyed {
        if let Some(value) = value {
            properties.insert(key.to_string(), value.clone());
        }
    }
    properties
}

fn aws_options<C: AwsCatalog>(
    config: &CatalogConfig,
    properties: Properties,
) -> Vec<CatalogOption<C>> {
    let mut options: Vec<CatalogOption<C>> = warehouse_option(config).into_iter().collect();
    options.push(with_aws_properties(properties));
    options
}

async fn tls_settings(tls: &TlsConfig) -> Result<TlsSettings> {
    let ca_cert_pem = match &tls.ca_cert {
        Some(path) => Some(tokio::fs::read(path).await?),
        None => None,
    };
    let client_identity_pem = match &tls.client_identity {
        Some(path) => Some(tokio::fs::read(path).await?),
        None => None,
    };
    Ok(TlsSettings {
        ca_cert_pem,
        client_identity_pem,
        insecure_skip_verify: tls.insecure_skip_verify,
    })
}

/// Factory for the REST catalog.
pub struct RestCatalogFactory;

#[async_trait]
impl CatalogFactory for RestCatalogFactory {
    async fn create(&self, config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
        let rest = &config.rest;
        let uri = required(&rest.uri, "catalog.rest.uri")?;

        let mut options: Vec<CatalogOption<RestCatalog>> =
            warehouse_option(config).into_iter().collect();
        if let Some(credential) = &rest.credential {
            options.push(with_credential(credential.clone()));
        }
        if let Some(token) = &rest.token {
            options.push(with_oauth_token(token.clone()));
        }
        if let Some(endpoint) = &rest.oauth2_token_endpoint {
            options.push(with_auth_uri(endpoint.clone()));
        }
        if let Some(prefix) = &rest.prefix {
            options.push(with_prefix(prefix.clone()));
        }
        if let Some(location) = &rest.metadata_location {
            options.push(with_metadata_location(location.clone()));
        }
        if let Some(sigv4) = &rest.sigv4 {
            options.push(with_sigv4_region_svc(
                sigv4.region.clone().unwrap_or_default(),
                sigv4.service.clone().unwrap_or_default(),
            ));
        }
        if let Some(tls) = &rest.tls {
            options.push(with_tls_config(tls_settings(tls).await?));
        }

        Ok(Arc::new(RestCatalog::new(&config.name, uri, options).await?))
    }

    fn catalog_type(&self) -> CatalogType {
        CatalogType::Rest
    }
}

/// Factory for the Hive Metastore catalog.
pub struct HiveCatalogFactory;

#[async_trait]
impl CatalogFactory for HiveCatalogFactory {
    async fn create(&self, config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
        let uri = required(&config.hive.uri, "catalog.hive.uri")?;
        let options = warehouse_option(config);
        Ok(Arc::new(HiveCatalog::new(uri, config.io.clone(), options)?))
    }

    fn catalog_type(&self) -> CatalogType {
        CatalogType::Hive
    }
}

/// Factory for the AWS Glue catalog.
pub struct GlueCatalogFactory;

#[async_trait]
impl CatalogFactory for GlueCatalogFactory {
    async fn create(&self, config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
        let glue = &config.glue;
        let properties = aws_properties(
            config,
            &glue.region,
            &glue.properties,
            &[(GLUE_CATALOG_ID, &glue.catalog_id), (GLUE_ENDPOINT, &glue.endpoint)],
        );
        Ok(Arc::new(GlueCatalog::new(aws_options(config, properties)).await?))
    }

    fn catalog_type(&self) -> CatalogType {
        CatalogType::Glue
    }
}

/// Factory for the AWS DynamoDB catalog.
pub struct DynamoDbCatalogFactory;

#[async_trait]
impl CatalogFactory for DynamoDbCatalogFactory {
    async fn create(&self, config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
        let dynamodb = &config.dynamodb;
        let table_name = Some(dynamodb.table_name.clone());
        let properties = aws_properties(
            config,
            &dynamodb.region,
            &dynamodb.properties,
            &[(DYNAMODB_TABLE_NAME, &table_name), (DYNAMODB_ENDPOINT, &dynamodb.endpoint)],
        );

        let catalog = DynamoDbCatalog::new(aws_options(config, properties)).await?;
        if dynamodb.create_table {
            catalog.ensure_catalog_table().await?;
        }
        Ok(Arc::new(catalog))
    }

    fn catalog_type(&self) -> CatalogType {
        CatalogType::DynamoDb
    }
}

/// Factory for the SQL catalog.
pub struct SqlCatalogFactory;

#[async_trait]
impl CatalogFactory for SqlCatalogFactory {
    async fn create(&self, config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
        let uri = required(&config.sql.uri, "catalog.sql.uri")?;
        let options = warehouse_option(config);
        Ok(Arc::new(
            SqlCatalog::new(&config.name, uri, config.io.clone(), options).await?,
        ))
    }

    fn catalog_type(&self) -> CatalogType {
        CatalogType::Sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LakecatConfig;
    use crate::identifier::Identifier;
    use tokio_util::sync::CancellationToken;

    fn catalog_config(toml: &str) -> CatalogConfig {
        LakecatConfig::from_toml(toml).unwrap().catalog
    }

    fn sql_config() -> CatalogConfig {
        catalog_config(
            r#"
            [catalog]
            type = "sql"
            warehouse = "memory:///warehouse"

            [catalog.sql]
            uri = "sqlite::memory:"
            "#,
        )
    }

    #[test]
    fn test_catalog_registry_creation() {
        let registry = CatalogRegistry::new();
        assert!(registry.supported_types().is_empty());
    }

    #[test]
    fn test_catalog_registry_with_defaults() {
        let registry = CatalogRegistry::with_defaults();
        let types = registry.supported_types();
        for catalog_type in CatalogType::ALL {
            assert!(types.contains(&catalog_type), "{catalog_type} missing");
        }
    }

    #[tokio::test]
    async fn test_unregistered_type_is_catalog_not_found() {
        let registry = CatalogRegistry::new();
        let err = registry.create(&sql_config()).await.err().expect("create should fail");
        assert!(matches!(err, Error::CatalogNotFound(ref t) if t == "sql"));
    }

    #[tokio::test]
    async fn test_sql_factory_builds_working_catalog() {
        let registry = CatalogRegistry::default();
        let catalog = registry.create(&sql_config()).await.unwrap();
        assert_eq!(catalog.catalog_type(), CatalogType::Sql);

        let ctx = CancellationToken::new();
        let ns = Identifier::from(["analytics"]);
        catalog
            .create_namespace(&ctx, &ns, &Properties::new())
            .await
            .unwrap();
        let namespaces = catalog
            .list_namespaces(&ctx, &Identifier::empty())
            .await
            .unwrap();
        assert_eq!(namespaces, vec![ns]);
    }

    #[tokio::test]
    async fn test_rest_factory_requires_uri() {
        let mut config = sql_config();
        config.catalog_type = CatalogType::Rest;

        let err = RestCatalogFactory.create(&config).await.err().expect("uri is required");
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_later_registration_wins() {
        struct Unavailable;

        #[async_trait]
        impl CatalogFactory for Unavailable {
            async fn create(&self, _config: &CatalogConfig) -> Result<Arc<dyn Catalog>> {
                Err(Error::Config("disabled".into()))
            }

            fn catalog_type(&self) -> CatalogType {
                CatalogType::Sql
            }
        }

        let mut registry = CatalogRegistry::with_defaults();
        registry.register(Box::new(Unavailable));
        assert_eq!(registry.supported_types().len(), CatalogType::ALL.len());

        let err = registry.create(&sql_config()).await.err().expect("create should fail");
        assert!(matches!(err, Error::Config(ref m) if m == "disabled"));
    }

    #[test]
    fn test_aws_properties_merge() {
        let config = catalog_config(
            r#"
            [catalog]
            type = "glue"

            [catalog.io]
            "s3.endpoint" = "http://localhost:9000"

            [catalog.glue]
            region = "us-east-2"
            catalog_id = "123456789012"

            [catalog.glue.properties]
            region = "ignored"
            "#,
        );

        let glue = &config.glue;
        let properties = aws_properties(
            &config,
            &glue.region,
            &glue.properties,
            &[(GLUE_CATALOG_ID, &glue.catalog_id), (GLUE_ENDPOINT, &glue.endpoint)],
        );
        assert_eq!(properties["region"], "us-east-2");
        assert_eq!(properties[GLUE_CATALOG_ID], "123456789012");
        assert_eq!(properties["s3.endpoint"], "http://localhost:9000");
        assert!(!properties.contains_key(GLUE_ENDPOINT));
    }
}
