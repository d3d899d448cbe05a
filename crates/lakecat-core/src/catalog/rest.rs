//! Iceberg REST catalog client.
//!
//! Implements the Apache Iceberg REST Catalog API. On construction the client
//! exchanges a client credential for a bearer token when one is configured,
//! then performs the `GET /v1/config` handshake. Server defaults and overrides
//! from the handshake may set the path prefix, base URI and token.
//!
//! Multi-level namespaces travel in URL paths with their segments joined by the
//! unit separator (`0x1F`), percent-encoded.

use super::pointer;
use super::rest_api::{
    CatalogConfig, CommitTableRequest, CommitTableResponse, CreateNamespaceRequest,
    CreateTableRequest, IcebergErrorResponse, ListNamespacesResponse, ListTablesResponse,
    LoadTableResponse, NamespaceResponse, OAuthErrorResponse, OAuthTokenResponse,
    RenameTableRequest, TableIdentifier, UpdateNamespacePropertiesRequest,
    UpdateNamespacePropertiesResponse,
};
use super::{CatalogBackend, CatalogType};
use crate::identifier::Identifier;
use crate::options::{CatalogOption, ConnectionOptions, CreateTableOptions, SigV4Settings, TlsSettings};
use crate::properties::{check_for_overlap, Properties, PropertiesUpdateSummary};
use crate::table::{Schema, Table, TableMetadata, TableRequirement, TableUpdate};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningParams, SigningSettings};
use aws_sigv4::sign::v4;
use parking_lot::RwLock;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

/// Config key carrying a bearer token.
pub const CONFIG_TOKEN: &str = "token";
/// Config key carrying the warehouse location.
pub const CONFIG_WAREHOUSE: &str = "warehouse";
/// Config key carrying the pinned metadata location.
pub const CONFIG_METADATA_LOCATION: &str = "metadata_location";
/// Config key carrying the path prefix.
pub const CONFIG_PREFIX: &str = "prefix";
/// Config key carrying an alternate base URI.
pub const CONFIG_URI: &str = "uri";

const NAMESPACE_SEPARATOR: &str = "\u{1F}";
const DEFAULT_OAUTH_SCOPE: &str = "catalog";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// What a failed request was about, used to pick the sentinel for bare statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Namespace,
    Table,
}

/// Cached bearer token.
#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    /// `None` for tokens supplied directly, which never expire
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn permanent(token: String) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() >= expires_at)
            .unwrap_or(false)
    }
}

/// Signs outgoing requests with AWS SigV4.
struct SigV4Signer {
    region: String,
    service: String,
    credentials: SharedCredentialsProvider,
}

impl SigV4Signer {
    async fn load(settings: &SigV4Settings) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| Error::Config("SigV4 signing requires an AWS region".into()))?;
        let credentials = sdk_config
            .credentials_provider()
            .ok_or_else(|| Error::Config("SigV4 signing requires AWS credentials".into()))?;

        Ok(Self {
            region,
            service: settings.service.clone(),
            credentials,
        })
    }

    async fn sign(&self, request: &mut reqwest::Request) -> Result<()> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| Error::Config(format!("failed to resolve AWS credentials: {e}")))?;

        // The signature takes the Authorization header; keep the bearer token alongside
        if let Some(bearer) = request.headers_mut().remove(AUTHORIZATION) {
            request
                .headers_mut()
                .insert(HeaderName::from_static("original-authorization"), bearer);
        }

        let identity = credentials.into();
        let params: SigningParams = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| Error::Config(format!("invalid SigV4 parameters: {e}")))?
            .into();

        let headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .unwrap_or_default();

        let signable = SignableRequest::new(
            request.method().as_str(),
            request.url().as_str(),
            headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            SignableBody::Bytes(body),
        )
        .map_err(|e| Error::Config(format!("request cannot be signed: {e}")))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| Error::Config(format!("SigV4 signing failed: {e}")))?
            .into_parts();

        for (name, value) in instructions.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid signed header: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid signed header: {e}")))?;
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }
}

fn build_http_client(tls: Option<&TlsSettings>) -> Result<Client> {
    let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);

    if let Some(tls) = tls {
        if let Some(pem) = &tls.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| Error::Config(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(pem) = &tls.client_identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| Error::Config(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }
        if tls.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Path form of a namespace.
fn encode_namespace(namespace: &Identifier) -> String {
    urlencoding::encode(&namespace.join(NAMESPACE_SEPARATOR)).into_owned()
}

/// Map an error response to a catalog error.
///
/// The exception type in the body decides when present; otherwise the status
/// and what the request was about do.
fn handle_error_response(
    operation: &'static str,
    target: &Identifier,
    subject: Subject,
    status: StatusCode,
    body: &str,
) -> Error {
    let (error_type, message) = match serde_json::from_str::<IcebergErrorResponse>(body) {
        Ok(response) => (response.error.error_type, response.error.message),
        Err(_) => (String::new(), body.to_string()),
    };

    let not_found = || match subject {
        Subject::Namespace => Error::NoSuchNamespace(target.to_string()),
        Subject::Table => Error::NoSuchTable(target.to_string()),
    };
    let already_exists = || match subject {
        Subject::Namespace => Error::NamespaceAlreadyExists(target.to_string()),
        Subject::Table => Error::TableAlreadyExists(target.to_string()),
    };

    if error_type.contains("NoSuchTable") {
        return Error::NoSuchTable(target.to_string());
    }
    if error_type.contains("NoSuchNamespace") {
        let namespace = match subject {
            Subject::Namespace => target.clone(),
            Subject::Table => target.namespace(),
        };
        return Error::NoSuchNamespace(namespace.to_string());
    }
    if error_type.contains("NamespaceNotEmpty") {
        return Error::NamespaceNotEmpty(target.to_string());
    }
    if error_type.contains("CommitFailed") || error_type.contains("CommitStateUnknown") {
        return Error::CommitFailed(message);
    }
    if error_type.contains("AlreadyExists") {
        return already_exists();
    }

    match status {
        StatusCode::NOT_FOUND => not_found(),
        StatusCode::CONFLICT if operation == "commit_table" => Error::CommitFailed(message),
        StatusCode::CONFLICT => already_exists(),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::transport(
            operation,
            target,
            format!("not authorized ({status}): {message}"),
        ),
        _ => Error::transport(operation, target, format!("{status}: {message}")),
    }
}

async fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    target: impl Display,
    response: Response,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::Serialization(format!("{operation} response for {target}: {e}")))
}

/// Iceberg REST catalog.
pub struct RestCatalog {
    name: String,
    base_uri: String,
    prefix: Option<String>,
    client: Client,
    options: ConnectionOptions,
    /// Effective configuration after the handshake
    properties: Properties,
    token: RwLock<Option<CachedToken>>,
    signer: Option<SigV4Signer>,
}

impl std::fmt::Debug for RestCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestCatalog")
            .field("name", &self.name)
            .field("base_uri", &self.base_uri)
            .field("prefix", &self.prefix)
            .field("options", &self.options)
            .field("sigv4", &self.signer.is_some())
            .finish()
    }
}

impl RestCatalog {
    /// Connect to the REST catalog at `uri` and perform the config handshake.
    pub async fn new(
        name: impl Into<String>,
        uri: &str,
        options: impl IntoIterator<Item = CatalogOption<RestCatalog>>,
    ) -> Result<Self> {
        let name = name.into();
        let options = ConnectionOptions::resolve(options);
        let client = build_http_client(options.tls.as_ref())?;

        let signer = match &options.sigv4 {
            Some(settings) => Some(SigV4Signer::load(settings).await?),
            None => None,
        };

        let mut catalog = Self {
            name,
            base_uri: uri.trim_end_matches('/').to_string(),
            prefix: None,
            client,
            token: RwLock::new(options.oauth_token.clone().map(CachedToken::permanent)),
            properties: Properties::new(),
            signer,
            options,
        };

        if catalog.options.oauth_token.is_none() {
            if let Some(credential) = catalog.options.credential.clone() {
                catalog.exchange_credential(&credential).await?;
            }
        }

        let config = catalog.fetch_config().await?;
        catalog.apply_config(&config);

        info!(
            catalog = %catalog.name,
            uri = %catalog.base_uri,
            prefix = ?catalog.prefix,
            "REST catalog client initialized"
        );
        Ok(catalog)
    }

    /// Effective catalog configuration.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    fn client_properties(&self) -> Properties {
        let mut properties = Properties::new();
        if let Some(warehouse) = &self.options.warehouse_location {
            properties.insert(CONFIG_WAREHOUSE.to_string(), warehouse.clone());
        }
        if let Some(location) = &self.options.metadata_location {
            properties.insert(CONFIG_METADATA_LOCATION.to_string(), location.clone());
        }
        if let Some(prefix) = &self.options.prefix {
            properties.insert(CONFIG_PREFIX.to_string(), prefix.clone());
        }
        properties
    }

    async fn fetch_config(&self) -> Result<CatalogConfig> {
        let url = format!("{}/v1/config", self.base_uri);
        let mut request = self.authorized(self.client.get(&url)).await?;
        if let Some(warehouse) = &self.options.warehouse_location {
            request = request.query(&[(CONFIG_WAREHOUSE, warehouse)]);
        }

        let response = self.execute("load_config", &url, request).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(
                "load_config",
                &url,
                format!("{status}: {body}"),
            ));
        }

        let config: CatalogConfig = read_json("load_config", &url, response).await?;
        debug!(
            defaults = config.defaults.len(),
            overrides = config.overrides.len(),
            "Fetched REST catalog config"
        );
        Ok(config)
    }

    fn apply_config(&mut self, config: &CatalogConfig) {
        let merged = config.merge(&self.client_properties());

        self.prefix = merged
            .get(CONFIG_PREFIX)
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        if let Some(uri) = merged.get(CONFIG_URI) {
            self.base_uri = uri.trim_end_matches('/').to_string();
        }

        let token = self.token.get_mut();
        if token.is_none() {
            if let Some(value) = merged.get(CONFIG_TOKEN) {
                *token = Some(CachedToken::permanent(value.clone()));
            }
        }

        self.properties = merged;
    }

    /// Exchange a `client_id:client_secret` (or bare secret) credential for a token.
    async fn exchange_credential(&self, credential: &str) -> Result<()> {
        let (client_id, client_secret) = match credential.split_once(':') {
            Some((id, secret)) => (Some(id), secret),
            None => (None, credential),
        };

        let url = self
            .options
            .auth_uri
            .clone()
            .unwrap_or_else(|| format!("{}/v1/oauth/tokens", self.base_uri));

        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_secret", client_secret),
            ("scope", DEFAULT_OAUTH_SCOPE),
        ];
        if let Some(id) = client_id {
            form.push(("client_id", id));
        }

        let request = self.client.post(&url).form(&form);
        let response = self.execute("oauth_token", &url, request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OAuthErrorResponse>(&body) {
                Ok(e) => format!(
                    "{status}: {} {}",
                    e.error,
                    e.error_description.unwrap_or_default()
                ),
                Err(_) => format!("{status}: {body}"),
            };
            return Err(Error::transport("oauth_token", &url, message));
        }

        let token: OAuthTokenResponse = read_json("oauth_token", &url, response).await?;
        let expires_at = token.expires_in.map(|secs| {
            let lifetime = Duration::from_secs(secs.max(0) as u64);
            Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN)
        });

        *self.token.write() = Some(CachedToken {
            token: token.access_token,
            expires_at,
        });

        debug!(expires_in = ?token.expires_in, "OAuth2 token refreshed");
        Ok(())
    }

    /// Get authorization header value.
    async fn auth_header(&self) -> Result<Option<String>> {
        let needs_refresh = {
            let token = self.token.read();
            match token.as_ref() {
                Some(cached) => cached.is_expired(),
                None => false,
            }
        };

        if needs_refresh {
            if let Some(credential) = &self.options.credential {
                self.exchange_credential(credential).await?;
            }
        }

        let token = self.token.read();
        Ok(token.as_ref().map(|t| format!("Bearer {}", t.token)))
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.auth_header().await? {
            Some(auth) => request.header(AUTHORIZATION, auth),
            None => request,
        })
    }

    fn url(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/v1/{}/{}", self.base_uri, prefix, path),
            None => format!("{}/v1/{}", self.base_uri, path),
        }
    }

    /// Build a request with authentication.
    async fn build_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let request = self
            .client
            .request(method, self.url(path))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        self.authorized(request).await
    }

    /// Sign (when configured) and send a request.
    async fn execute(
        &self,
        operation: &'static str,
        target: impl Display,
        request: RequestBuilder,
    ) -> Result<Response> {
        let mut request = request
            .build()
            .map_err(|e| Error::transport(operation, &target, e))?;

        if let Some(signer) = &self.signer {
            signer.sign(&mut request).await?;
        }

        self.client
            .execute(request)
            .await
            .map_err(|e| Error::transport(operation, &target, e))
    }

    /// Send a request and map non-2xx responses to catalog errors.
    async fn send(
        &self,
        operation: &'static str,
        target: &Identifier,
        subject: Subject,
        request: RequestBuilder,
    ) -> Result<Response> {
        let response = self.execute(operation, target, request).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(handle_error_response(operation, target, subject, status, &body))
    }

    fn namespace_path(namespace: &Identifier) -> Result<String> {
        if namespace.is_empty() {
            return Err(Error::InvalidIdentifier("namespace must not be empty".into()));
        }
        Ok(format!("namespaces/{}", encode_namespace(namespace)))
    }

    fn table_path(identifier: &Identifier) -> Result<String> {
        let (namespace, name) = identifier.split_table()?;
        Ok(format!(
            "{}/tables/{}",
            Self::namespace_path(&namespace)?,
            urlencoding::encode(name)
        ))
    }

    fn table_from_response(
        identifier: &Identifier,
        response: LoadTableResponse,
        properties: &Properties,
    ) -> Table {
        let io_properties = pointer::merge_io_properties(&response.config, properties);
        Table::new(
            identifier.clone(),
            response.metadata,
            response.metadata_location.unwrap_or_default(),
        )
        .with_io_properties(io_properties)
    }
}

#[async_trait]
impl CatalogBackend for RestCatalog {
    fn catalog_type(&self) -> CatalogType {
        CatalogType::Rest
    }

    async fn create_table(
        &self,
        identifier: &Identifier,
        schema: Schema,
        options: CreateTableOptions,
    ) -> Result<Table> {
        let (namespace, name) = identifier.split_table()?;
        let path = format!("{}/tables", Self::namespace_path(&namespace)?);

        let body = CreateTableRequest {
            name: name.to_string(),
            location: options.location,
            schema,
            partition_spec: options.partition_spec,
            write_order: options.sort_order,
            stage_create: None,
            properties: options.properties,
        };

        let request = self.build_request(Method::POST, &path).await?.json(&body);
        let response = self
            .send("create_table", identifier, Subject::Table, request)
            .await?;
        let loaded: LoadTableResponse = read_json("create_table", identifier, response).await?;

        info!(table = %identifier, location = %loaded.metadata.location, "Created table");
        Ok(Self::table_from_response(identifier, loaded, &Properties::new()))
    }

    async fn commit_table(
        &self,
        table: &Table,
        requirements: &[TableRequirement],
        updates: &[TableUpdate],
    ) -> Result<(TableMetadata, String)> {
        let identifier = table.identifier();
        let body = CommitTableRequest {
            identifier: Some(TableIdentifier::from_identifier(identifier)?),
            requirements: requirements.to_vec(),
            updates: updates.to_vec(),
        };

        let request = self
            .build_request(Method::POST, &Self::table_path(identifier)?)
            .await?
            .json(&body);
        let response = self
            .send("commit_table", identifier, Subject::Table, request)
            .await?;
        let committed: CommitTableResponse =
            read_json("commit_table", identifier, response).await?;

        info!(table = %identifier, location = %committed.metadata_location, "Committed table metadata");
        Ok((committed.metadata, committed.metadata_location))
    }

    async fn list_tables(&self, namespace: &Identifier) -> Result<Vec<Identifier>> {
        let path = format!("{}/tables", Self::namespace_path(namespace)?);
        let mut identifiers = Vec::new();
        let mut page_token = String::new();

        loop {
            let request = self
                .build_request(Method::GET, &path)
                .await?
                .query(&[("pageToken", page_token.as_str())]);
            let response = self
                .send("list_tables", namespace, Subject::Namespace, request)
                .await?;
            let page: ListTablesResponse = read_json("list_tables", namespace, response).await?;

            identifiers.extend(page.identifiers.into_iter().map(Identifier::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => break,
            }
        }

        debug!(namespace = %namespace, count = identifiers.len(), "Listed tables");
        Ok(identifiers)
    }

    async fn load_table(&self, identifier: &Identifier, properties: &Properties) -> Result<Table> {
        let request = self
            .build_request(Method::GET, &Self::table_path(identifier)?)
            .await?;
        let response = self
            .send("load_table", identifier, Subject::Table, request)
            .await?;
        let loaded: LoadTableResponse = read_json("load_table", identifier, response).await?;

        debug!(table = %identifier, location = ?loaded.metadata_location, "Loaded table");
        Ok(Self::table_from_response(identifier, loaded, properties))
    }

    async fn drop_table(&self, identifier: &Identifier) -> Result<()> {
        let request = self
            .build_request(Method::DELETE, &Self::table_path(identifier)?)
            .await?
            .query(&[("purgeRequested", "false")]);
        self.send("drop_table", identifier, Subject::Table, request)
            .await?;

        info!(table = %identifier, "Dropped table");
        Ok(())
    }

    async fn rename_table(&self, from: &Identifier, to: &Identifier) -> Result<Table> {
        let body = RenameTableRequest {
            source: TableIdentifier::from_identifier(from)?,
            destination: TableIdentifier::from_identifier(to)?,
        };

        let request = self
            .build_request(Method::POST, "tables/rename")
            .await?
            .json(&body);
        self.send("rename_table", from, Subject::Table, request)
            .await
            .map_err(|e| match e {
                Error::NoSuchNamespace(_) => Error::NoSuchNamespace(to.namespace().to_string()),
                Error::TableAlreadyExists(_) => Error::TableAlreadyExists(to.to_string()),
                other => other,
            })?;

        info!(from = %from, to = %to, "Renamed table");
        CatalogBackend::load_table(self, to, &Properties::new()).await
    }

    async fn list_namespaces(&self, parent: &Identifier) -> Result<Vec<Identifier>> {
        let parent_param = parent.join(NAMESPACE_SEPARATOR);
        let mut namespaces = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut request = self
                .build_request(Method::GET, "namespaces")
                .await?
                .query(&[("pageToken", page_token.as_str())]);
            if !parent.is_empty() {
                request = request.query(&[("parent", parent_param.as_str())]);
            }

            let response = self
                .send("list_namespaces", parent, Subject::Namespace, request)
                .await?;
            let page: ListNamespacesResponse =
                read_json("list_namespaces", parent, response).await?;

            namespaces.extend(page.namespaces.into_iter().map(Identifier::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => break,
            }
        }

        debug!(parent = %parent, count = namespaces.len(), "Listed namespaces");
        Ok(namespaces)
    }

    async fn create_namespace(&self, namespace: &Identifier, properties: &Properties) -> Result<()> {
        if namespace.is_empty() {
            return Err(Error::InvalidIdentifier("namespace must not be empty".into()));
        }
        let body = CreateNamespaceRequest {
            namespace: namespace.segments().to_vec(),
            properties: properties.clone(),
        };

        let request = self
            .build_request(Method::POST, "namespaces")
            .await?
            .json(&body);
        self.send("create_namespace", namespace, Subject::Namespace, request)
            .await?;

        info!(namespace = %namespace, "Created namespace");
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &Identifier) -> Result<()> {
        let request = self
            .build_request(Method::DELETE, &Self::namespace_path(namespace)?)
            .await?;
        self.send("drop_namespace", namespace, Subject::Namespace, request)
            .await?;

        info!(namespace = %namespace, "Dropped namespace");
        Ok(())
    }

    async fn load_namespace_properties(&self, namespace: &Identifier) -> Result<Properties> {
        let request = self
            .build_request(Method::GET, &Self::namespace_path(namespace)?)
            .await?;
        let response = self
            .send("load_namespace_properties", namespace, Subject::Namespace, request)
            .await?;
        let loaded: NamespaceResponse =
            read_json("load_namespace_properties", namespace, response).await?;
        Ok(loaded.properties)
    }

    async fn update_namespace_properties(
        &self,
        namespace: &Identifier,
        removals: &[String],
        updates: &Properties,
    ) -> Result<PropertiesUpdateSummary> {
        check_for_overlap(removals, updates)?;

        let body = UpdateNamespacePropertiesRequest {
            removals: removals.to_vec(),
            updates: updates.clone(),
        };
        let path = format!("{}/properties", Self::namespace_path(namespace)?);

        let request = self.build_request(Method::POST, &path).await?.json(&body);
        let response = self
            .send("update_namespace_properties", namespace, Subject::Namespace, request)
            .await?;
        let summary: UpdateNamespacePropertiesResponse =
            read_json("update_namespace_properties", namespace, response).await?;

        info!(namespace = %namespace, "Updated namespace properties");
        Ok(summary.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::options::{with_credential, with_oauth_token, with_prefix, with_warehouse_location};
    use crate::table::SchemaField;
    use mockito::{Matcher, Server, ServerGuard};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const TOKEN: &str = "secret-token";

    async fn mock_config(server: &mut ServerGuard, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/v1/config")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    async fn connect(server: &ServerGuard) -> Arc<dyn Catalog> {
        let catalog = RestCatalog::new("test", &server.url(), vec![with_oauth_token(TOKEN)])
            .await
            .unwrap();
        Arc::new(catalog)
    }

    fn error_body(error_type: &str, code: u16) -> String {
        serde_json::json!({
            "error": {"type": error_type, "code": code, "message": "server said no"}
        })
        .to_string()
    }

    fn load_table_body(location: &str, config: Properties) -> String {
        let metadata = TableMetadata::new(
            Schema::new(0, vec![SchemaField::primitive(1, "id", "long", true)]),
            None,
            None,
            "s3://bucket/wh/db/events",
            Properties::new(),
        );
        serde_json::to_string(&LoadTableResponse {
            metadata_location: Some(location.to_string()),
            metadata,
            config,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_handshake_prefix_and_bearer_header() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, r#"{"defaults": {}, "overrides": {"prefix": "ws1"}}"#).await;
        let list = server
            .mock("GET", "/v1/ws1/namespaces")
            .match_header("Authorization", format!("Bearer {TOKEN}").as_str())
            .match_query(Matcher::UrlEncoded("pageToken".into(), "".into()))
            .with_status(200)
            .with_body(r#"{"namespaces": [["a"], ["b", "c"]]}"#)
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let namespaces = catalog
            .list_namespaces(&CancellationToken::new(), &Identifier::empty())
            .await
            .unwrap();

        assert_eq!(
            namespaces,
            vec![Identifier::from(["a"]), Identifier::from(["b", "c"])]
        );
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_prefix_option_and_warehouse_query() {
        let mut server = Server::new_async().await;
        let config = server
            .mock("GET", "/v1/config")
            .match_query(Matcher::UrlEncoded("warehouse".into(), "s3://wh".into()))
            .with_status(200)
            .with_body(r#"{"defaults": {"clients": "4"}, "overrides": {}}"#)
            .create_async()
            .await;
        let drop_ns = server
            .mock("DELETE", "/v1/catalogs/main/namespaces/db")
            .with_status(204)
            .create_async()
            .await;

        let catalog = RestCatalog::new(
            "test",
            &server.url(),
            vec![
                with_oauth_token(TOKEN),
                with_warehouse_location("s3://wh"),
                with_prefix("catalogs/main"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(catalog.properties().get("clients").map(String::as_str), Some("4"));
        assert_eq!(
            catalog.properties().get(CONFIG_WAREHOUSE).map(String::as_str),
            Some("s3://wh")
        );

        let catalog: Arc<dyn Catalog> = Arc::new(catalog);
        catalog
            .drop_namespace(&CancellationToken::new(), &Identifier::from(["db"]))
            .await
            .unwrap();

        config.assert_async().await;
        drop_ns.assert_async().await;
    }

    #[tokio::test]
    async fn test_credential_exchanged_for_token() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/v1/oauth/tokens")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cr3t".into()),
                Matcher::UrlEncoded("scope".into(), "catalog".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token": "exchanged", "token_type": "bearer", "expires_in": 3600}"#)
            .create_async()
            .await;
        let config = server
            .mock("GET", "/v1/config")
            .match_header("Authorization", "Bearer exchanged")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        RestCatalog::new("test", &server.url(), vec![with_credential("client:s3cr3t")])
            .await
            .unwrap();

        token.assert_async().await;
        config.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_from_config_defaults() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, r#"{"defaults": {"token": "from-server"}}"#).await;
        let load = server
            .mock("GET", "/v1/namespaces/db")
            .match_header("Authorization", "Bearer from-server")
            .with_status(200)
            .with_body(r#"{"namespace": ["db"], "properties": {"owner": "etl"}}"#)
            .create_async()
            .await;

        let catalog: Arc<dyn Catalog> = Arc::new(
            RestCatalog::new("test", &server.url(), Vec::new())
                .await
                .unwrap(),
        );
        let props = catalog
            .load_namespace_properties(&CancellationToken::new(), &Identifier::from(["db"]))
            .await
            .unwrap();

        assert_eq!(props.get("owner").map(String::as_str), Some("etl"));
        load.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_credential() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/v1/oauth/tokens")
            .with_status(401)
            .with_body(r#"{"error": "invalid_client", "error_description": "bad secret"}"#)
            .create_async()
            .await;

        let err = RestCatalog::new("test", &server.url(), vec![with_credential("nope")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { operation: "oauth_token", .. }));
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn test_multi_level_namespace_encoding_and_pagination() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, "{}").await;
        let first = server
            .mock("GET", "/v1/namespaces/a%1Fb/tables")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "".into()))
            .with_status(200)
            .with_body(
                r#"{"identifiers": [{"namespace": ["a", "b"], "name": "t1"}], "next-page-token": "p2"}"#,
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1/namespaces/a%1Fb/tables")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_body(r#"{"identifiers": [{"namespace": ["a", "b"], "name": "t2"}]}"#)
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let tables = catalog
            .list_tables(&CancellationToken::new(), &Identifier::from(["a", "b"]))
            .await
            .unwrap();

        assert_eq!(
            tables,
            vec![
                Identifier::from(["a", "b", "t1"]),
                Identifier::from(["a", "b", "t2"])
            ]
        );
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_namespaces_sends_parent() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, "{}").await;
        let list = server
            .mock("GET", "/v1/namespaces")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("parent".into(), "a\u{1F}b".into()),
                Matcher::UrlEncoded("pageToken".into(), "".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"namespaces": [["a", "b", "c"]]}"#)
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let namespaces = catalog
            .list_namespaces(&CancellationToken::new(), &Identifier::from(["a", "b"]))
            .await
            .unwrap();

        assert_eq!(namespaces, vec![Identifier::from(["a", "b", "c"])]);
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_bodies_map_to_sentinels() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, "{}").await;
        let _missing = server
            .mock("GET", "/v1/namespaces/db/tables/missing")
            .with_status(404)
            .with_body(error_body("NoSuchTableException", 404))
            .create_async()
            .await;
        let _exists = server
            .mock("POST", "/v1/namespaces")
            .with_status(409)
            .with_body(error_body("AlreadyExistsException", 409))
            .create_async()
            .await;
        let _not_empty = server
            .mock("DELETE", "/v1/namespaces/db")
            .with_status(409)
            .with_body(error_body("NamespaceNotEmptyException", 409))
            .create_async()
            .await;
        let _no_ns = server
            .mock("GET", "/v1/namespaces/ghost/tables")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(error_body("NoSuchNamespaceException", 404))
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let ctx = CancellationToken::new();

        let err = catalog
            .load_table(&ctx, &Identifier::from(["db", "missing"]), &Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchTable(ref t) if t == "db.missing"));

        let err = catalog
            .create_namespace(&ctx, &Identifier::from(["db"]), &Properties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NamespaceAlreadyExists(_)));

        let err = catalog
            .drop_namespace(&ctx, &Identifier::from(["db"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NamespaceNotEmpty(_)));

        let err = catalog
            .list_tables(&ctx, &Identifier::from(["ghost"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchNamespace(ref ns) if ns == "ghost"));
    }

    #[tokio::test]
    async fn test_load_table_merges_io_config() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, "{}").await;
        let config = Properties::from([
            ("s3.region".to_string(), "us-east-1".to_string()),
            ("s3.endpoint".to_string(), "http://minio:9000".to_string()),
        ]);
        let _load = server
            .mock("GET", "/v1/namespaces/db/tables/events")
            .with_status(200)
            .with_body(load_table_body("s3://bucket/wh/db/events/metadata/00000-a.metadata.json", config))
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let caller = Properties::from([("s3.region".to_string(), "eu-west-1".to_string())]);
        let table = catalog
            .load_table(&CancellationToken::new(), &Identifier::from(["db", "events"]), &caller)
            .await
            .unwrap();

        assert_eq!(table.identifier(), &Identifier::from(["db", "events"]));
        assert_eq!(table.location(), "s3://bucket/wh/db/events");
        assert_eq!(
            table.metadata_location(),
            "s3://bucket/wh/db/events/metadata/00000-a.metadata.json"
        );
        assert_eq!(table.io_properties()["s3.region"], "eu-west-1");
        assert_eq!(table.io_properties()["s3.endpoint"], "http://minio:9000");
    }

    #[tokio::test]
    async fn test_commit_table_and_conflict() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, "{}").await;
        let location = "s3://bucket/wh/db/events/metadata/00000-a.metadata.json";
        let _load = server
            .mock("GET", "/v1/namespaces/db/tables/events")
            .with_status(200)
            .with_body(load_table_body(location, Properties::new()))
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let ctx = CancellationToken::new();
        let table = catalog
            .load_table(&ctx, &Identifier::from(["db", "events"]), &Properties::new())
            .await
            .unwrap();

        let committed = serde_json::json!({
            "metadata-location": "s3://bucket/wh/db/events/metadata/00001-b.metadata.json",
            "metadata": table.metadata(),
        });
        let commit = server
            .mock("POST", "/v1/namespaces/db/tables/events")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "identifier": {"namespace": ["db"], "name": "events"},
                "updates": [{"action": "set-properties", "updates": {"k": "v"}}],
            })))
            .with_status(200)
            .with_body(committed.to_string())
            .create_async()
            .await;

        let updates = [TableUpdate::SetProperties {
            updates: Properties::from([("k".to_string(), "v".to_string())]),
        }];
        let (_, new_location) = catalog
            .commit_table(&ctx, &table, &[], &updates)
            .await
            .unwrap();
        assert!(new_location.contains("/00001-"));
        commit.assert_async().await;
        drop(commit);

        let _conflict = server
            .mock("POST", "/v1/namespaces/db/tables/events")
            .with_status(409)
            .with_body(error_body("CommitFailedException", 409))
            .create_async()
            .await;
        let err = catalog
            .commit_table(&ctx, &table, &[], &updates)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommitFailed(_)));
    }

    #[tokio::test]
    async fn test_rename_table_loads_destination() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, "{}").await;
        let rename = server
            .mock("POST", "/v1/tables/rename")
            .match_body(Matcher::Json(serde_json::json!({
                "source": {"namespace": ["db"], "name": "old"},
                "destination": {"namespace": ["db"], "name": "new"},
            })))
            .with_status(204)
            .create_async()
            .await;
        let _load = server
            .mock("GET", "/v1/namespaces/db/tables/new")
            .with_status(200)
            .with_body(load_table_body("s3://b/m.json", Properties::new()))
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let table = catalog
            .rename_table(
                &CancellationToken::new(),
                &Identifier::from(["db", "old"]),
                &Identifier::from(["db", "new"]),
            )
            .await
            .unwrap();

        assert_eq!(table.identifier(), &Identifier::from(["db", "new"]));
        rename.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_namespace_properties() {
        let mut server = Server::new_async().await;
        let _config = mock_config(&mut server, "{}").await;
        let update = server
            .mock("POST", "/v1/namespaces/db/properties")
            .match_body(Matcher::Json(serde_json::json!({
                "removals": ["gone", "absent"],
                "updates": {"owner": "etl"},
            })))
            .with_status(200)
            .with_body(r#"{"updated": ["owner"], "removed": ["gone"], "missing": ["absent"]}"#)
            .create_async()
            .await;

        let catalog = connect(&server).await;
        let ctx = CancellationToken::new();
        let summary = catalog
            .update_namespace_properties(
                &ctx,
                &Identifier::from(["db"]),
                &["gone".to_string(), "absent".to_string()],
                &Properties::from([("owner".to_string(), "etl".to_string())]),
            )
            .await
            .unwrap();
        assert_eq!(summary.removed, vec!["gone".to_string()]);
        assert_eq!(summary.updated, vec!["owner".to_string()]);
        assert_eq!(summary.missing, vec!["absent".to_string()]);
        update.assert_async().await;

        // Conflicts are rejected before any request is sent
        let err = catalog
            .update_namespace_properties(
                &ctx,
                &Identifier::from(["db"]),
                &["owner".to_string()],
                &Properties::from([("owner".to_string(), "x".to_string())]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PropertiesConflict { .. }));
        update.assert_async().await;
    }

    #[test]
    fn test_handle_error_response_without_body() {
        let table = Identifier::from(["db", "t"]);
        assert!(matches!(
            handle_error_response("load_table", &table, Subject::Table, StatusCode::NOT_FOUND, ""),
            Error::NoSuchTable(_)
        ));
        assert!(matches!(
            handle_error_response("commit_table", &table, Subject::Table, StatusCode::CONFLICT, ""),
            Error::CommitFailed(_)
        ));
        assert!(matches!(
            handle_error_response("create_table", &table, Subject::Table, StatusCode::CONFLICT, ""),
            Error::TableAlreadyExists(_)
        ));
        assert!(matches!(
            handle_error_response(
                "load_table",
                &table,
                Subject::Table,
                StatusCode::INTERNAL_SERVER_ERROR,
                "boom"
            ),
            Error::Transport { operation: "load_table", .. }
        ));
    }

    #[test]
    fn test_namespace_path_encoding() {
        assert_eq!(
            RestCatalog::namespace_path(&Identifier::from(["a", "b c"])).unwrap(),
            "namespaces/a%1Fb%20c"
        );
        assert_eq!(
            RestCatalog::table_path(&Identifier::from(["db", "my table"])).unwrap(),
            "namespaces/db/tables/my%20table"
        );
        assert!(RestCatalog::namespace_path(&Identifier::empty()).is_err());
    }

    #[test]
    fn test_cached_token_expiry() {
        assert!(!CachedToken::permanent("t".into()).is_expired());
        let expired = CachedToken {
            token: "t".into(),
            expires_at: Some(Instant::now()),
        };
        assert!(expired.is_expired());
    }
}
