//! Connection and table-creation options.
//!
//! Catalog constructors take a list of [`CatalogOption<C>`] values, where `C` is
//! the catalog type the option is valid for. A REST-only option such as
//! [`with_prefix`] produces a `CatalogOption<RestCatalog>` and therefore cannot be
//! handed to the Glue constructor. Options that several backends understand are
//! generic over the sealed [`WarehouseCatalog`] and [`AwsCatalog`] markers.
//!
//! Options are applied in order; when the same setting is given twice the last
//! one wins.

use crate::catalog::dynamodb::DynamoDbCatalog;
use crate::catalog::glue::GlueCatalog;
use crate::catalog::hive::HiveCatalog;
use crate::catalog::rest::RestCatalog;
use crate::catalog::sql::SqlCatalog;
use crate::properties::Properties;
use crate::table::{PartitionSpec, SortOrder};
use std::fmt;
use std::marker::PhantomData;

/// Default SigV4 service name for API Gateway fronted catalogs.
pub const DEFAULT_SIGV4_SERVICE: &str = "execute-api";

mod sealed {
    pub trait Sealed {}
}

/// Catalogs that accept a warehouse location.
pub trait WarehouseCatalog: sealed::Sealed {}

/// Catalogs backed by an AWS service client.
pub trait AwsCatalog: WarehouseCatalog {}

impl sealed::Sealed for RestCatalog {}
impl sealed::Sealed for GlueCatalog {}
impl sealed::Sealed for HiveCatalog {}
impl sealed::Sealed for DynamoDbCatalog {}
impl sealed::Sealed for SqlCatalog {}

impl WarehouseCatalog for RestCatalog {}
impl WarehouseCatalog for GlueCatalog {}
impl WarehouseCatalog for HiveCatalog {}
impl WarehouseCatalog for DynamoDbCatalog {}
impl WarehouseCatalog for SqlCatalog {}

impl AwsCatalog for GlueCatalog {}
impl AwsCatalog for DynamoDbCatalog {}

/// TLS overrides for the REST transport.
#[derive(Clone, Default)]
pub struct TlsSettings {
    /// PEM-encoded CA certificate added to the trust roots
    pub ca_cert_pem: Option<Vec<u8>>,
    /// PEM-encoded client certificate and private key
    pub client_identity_pem: Option<Vec<u8>>,
    /// Skip server certificate verification
    pub insecure_skip_verify: bool,
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("ca_cert_pem", &self.ca_cert_pem.as_ref().map(|_| "<pem>"))
            .field(
                "client_identity_pem",
                &self.client_identity_pem.as_ref().map(|_| "<redacted>"),
            )
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

/// SigV4 request signing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigV4Settings {
    /// Signing region; resolved from the AWS environment when unset
    pub region: Option<String>,
    /// Signing service name
    pub service: String,
}

/// Resolved connection configuration, built once per catalog instance.
#[derive(Clone, Default)]
pub struct ConnectionOptions {
    pub credential: Option<String>,
    pub oauth_token: Option<String>,
    pub tls: Option<TlsSettings>,
    pub warehouse_location: Option<String>,
    pub metadata_location: Option<String>,
    pub sigv4: Option<SigV4Settings>,
    pub auth_uri: Option<String>,
    pub prefix: Option<String>,
    pub aws_config: Option<aws_config::SdkConfig>,
    pub aws_properties: Properties,
}

impl ConnectionOptions {
    /// Apply options in order.
    pub fn resolve<C>(options: impl IntoIterator<Item = CatalogOption<C>>) -> Self {
        let mut resolved = Self::default();
        for option in options {
            (option.apply)(&mut resolved);
        }
        resolved
    }

    /// Look up an AWS property, trying each key in turn.
    pub fn aws_property(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.aws_properties.get(*key))
            .map(String::as_str)
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("warehouse_location", &self.warehouse_location)
            .field("metadata_location", &self.metadata_location)
            .field("sigv4", &self.sigv4)
            .field("auth_uri", &self.auth_uri)
            .field("prefix", &self.prefix)
            .field("aws_config", &self.aws_config.is_some())
            .field("aws_properties", &self.aws_properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A connection option valid for catalog type `C`.
pub struct CatalogOption<C> {
    apply: Box<dyn FnOnce(&mut ConnectionOptions) + Send>,
    _catalog: PhantomData<fn() -> C>,
}

impl<C> CatalogOption<C> {
    fn new(apply: impl FnOnce(&mut ConnectionOptions) + Send + 'static) -> Self {
        Self {
            apply: Box::new(apply),
            _catalog: PhantomData,
        }
    }
}

impl<C> fmt::Debug for CatalogOption<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CatalogOption")
    }
}

/// Client credential (`client_id:client_secret` or a bare secret) exchanged for a token.
pub fn with_credential(credential: impl Into<String>) -> CatalogOption<RestCatalog> {
    let credential = credential.into();
    CatalogOption::new(move |o| o.credential = Some(credential))
}

/// Pre-obtained bearer token; skips the token exchange.
pub fn with_oauth_token(token: impl Into<String>) -> CatalogOption<RestCatalog> {
    let token = token.into();
    CatalogOption::new(move |o| o.oauth_token = Some(token))
}

pub fn with_tls_config(tls: TlsSettings) -> CatalogOption<RestCatalog> {
    CatalogOption::new(move |o| o.tls = Some(tls))
}

/// Warehouse root used for default table locations.
pub fn with_warehouse_location<C: WarehouseCatalog>(location: impl Into<String>) -> CatalogOption<C> {
    let location = location.into();
    CatalogOption::new(move |o| o.warehouse_location = Some(location))
}

/// Metadata location sent with the REST config handshake.
pub fn with_metadata_location(location: impl Into<String>) -> CatalogOption<RestCatalog> {
    let location = location.into();
    CatalogOption::new(move |o| o.metadata_location = Some(location))
}

/// Sign requests with SigV4 for the `execute-api` service.
///
/// The region comes from the AWS environment when the client is built.
pub fn with_sigv4() -> CatalogOption<RestCatalog> {
    CatalogOption::new(|o| {
        o.sigv4 = Some(SigV4Settings {
            region: None,
            service: DEFAULT_SIGV4_SERVICE.to_string(),
        })
    })
}

/// Sign requests with SigV4 for an explicit region and service.
///
/// An empty service falls back to `execute-api`.
pub fn with_sigv4_region_svc(
    region: impl Into<String>,
    service: impl Into<String>,
) -> CatalogOption<RestCatalog> {
    let region = region.into();
    let service = service.into();
    CatalogOption::new(move |o| {
        let service = if service.is_empty() {
            DEFAULT_SIGV4_SERVICE.to_string()
        } else {
            service
        };
        o.sigv4 = Some(SigV4Settings {
            region: (!region.is_empty()).then_some(region),
            service,
        })
    })
}

/// Alternate token exchange endpoint.
pub fn with_auth_uri(uri: impl Into<String>) -> CatalogOption<RestCatalog> {
    let uri = uri.into();
    CatalogOption::new(move |o| o.auth_uri = Some(uri))
}

/// Path segment inserted after `/v1/` in every request.
pub fn with_prefix(prefix: impl Into<String>) -> CatalogOption<RestCatalog> {
    let prefix = prefix.into();
    CatalogOption::new(move |o| o.prefix = Some(prefix))
}

pub fn with_aws_config<C: AwsCatalog>(config: aws_config::SdkConfig) -> CatalogOption<C> {
    CatalogOption::new(move |o| o.aws_config = Some(config))
}

/// Free-form AWS properties such as `region`, `endpoint` or `glue.id`.
pub fn with_aws_properties<C: AwsCatalog>(properties: Properties) -> CatalogOption<C> {
    CatalogOption::new(move |o| o.aws_properties = properties)
}

/// Resolved table-creation settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTableOptions {
    /// Explicit table location, without a trailing `/`
    pub location: Option<String>,
    pub partition_spec: Option<PartitionSpec>,
    pub sort_order: Option<SortOrder>,
    pub properties: Properties,
}

impl CreateTableOptions {
    /// Apply options in order.
    pub fn resolve(options: impl IntoIterator<Item = CreateTableOption>) -> Self {
        let mut resolved = Self::default();
        for option in options {
            (option.0)(&mut resolved);
        }
        resolved
    }
}

/// A single `create_table` option.
pub struct CreateTableOption(Box<dyn FnOnce(&mut CreateTableOptions) + Send>);

impl fmt::Debug for CreateTableOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CreateTableOption")
    }
}

/// Explicit table location. Trailing `/` characters are stripped.
pub fn with_location(location: impl Into<String>) -> CreateTableOption {
    let location = location.into();
    CreateTableOption(Box::new(move |o| {
        let trimmed = location.trim_end_matches('/');
        o.location = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }))
}

pub fn with_partition_spec(spec: PartitionSpec) -> CreateTableOption {
    CreateTableOption(Box::new(move |o| o.partition_spec = Some(spec)))
}

pub fn with_sort_order(order: SortOrder) -> CreateTableOption {
    CreateTableOption(Box::new(move |o| o.sort_order = Some(order)))
}

pub fn with_properties(properties: Properties) -> CreateTableOption {
    CreateTableOption(Box::new(move |o| o.properties = properties))
}
