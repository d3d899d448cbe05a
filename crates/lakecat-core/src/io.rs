//! Metadata file IO.
//!
//! Pointer catalogs (Glue, Hive, DynamoDB, SQL) keep only a pointer to the
//! current metadata file; the file itself lives in object storage and is read
//! and written through [`FileIo`].

use crate::identifier::Identifier;
use crate::properties::Properties;
use crate::table::TableMetadata;
use crate::{Error, Result};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// S3 property keys understood when building an S3 store.
pub const S3_REGION: &str = "s3.region";
pub const S3_ENDPOINT: &str = "s3.endpoint";
pub const S3_ACCESS_KEY_ID: &str = "s3.access-key-id";
pub const S3_SECRET_ACCESS_KEY: &str = "s3.secret-access-key";
pub const S3_SESSION_TOKEN: &str = "s3.session-token";

/// Reads and writes table metadata files.
///
/// Stores are created lazily per `scheme://authority` and reused, so an
/// in-memory store keeps its contents for the lifetime of the `FileIo`.
#[derive(Clone)]
pub struct FileIo {
    properties: Properties,
    stores: Arc<Mutex<HashMap<String, Arc<dyn ObjectStore>>>>,
}

impl std::fmt::Debug for FileIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIo")
            .field("stores", &self.stores.lock().keys().cloned().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for FileIo {
    fn default() -> Self {
        Self::new(Properties::new())
    }
}

impl FileIo {
    pub fn new(properties: Properties) -> Self {
        Self {
            properties,
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn read_metadata(&self, location: &str) -> Result<TableMetadata> {
        let (store, path) = self.resolve(location)?;
        let bytes = store
            .get(&path)
            .await
            .map_err(|e| Error::Storage(format!("failed to read {location}: {e}")))?
            .bytes()
            .await
            .map_err(|e| Error::Storage(format!("failed to read {location}: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn write_metadata(&self, location: &str, metadata: &TableMetadata) -> Result<()> {
        let (store, path) = self.resolve(location)?;
        let body = Bytes::from(serde_json::to_vec(metadata)?);
        store
            .put(&path, PutPayload::from_bytes(body))
            .await
            .map_err(|e| Error::Storage(format!("failed to write {location}: {e}")))?;
        debug!(location = %location, "Wrote table metadata");
        Ok(())
    }

    pub async fn delete(&self, location: &str) -> Result<()> {
        let (store, path) = self.resolve(location)?;
        store
            .delete(&path)
            .await
            .map_err(|e| Error::Storage(format!("failed to delete {location}: {e}")))?;
        Ok(())
    }

    /// Object store and path for a location.
    fn resolve(&self, location: &str) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
        let url = match Url::parse(location) {
            Ok(url) => url,
            // Plain filesystem path
            Err(_) => {
                let store = self.cached("file://", || Ok(Arc::new(LocalFileSystem::new()) as _))?;
                return Ok((store, ObjectPath::from(location)));
            }
        };

        let path = ObjectPath::from_url_path(url.path())
            .map_err(|e| Error::Storage(format!("invalid path in {location}: {e}")))?;
        let key = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());

        let store = match url.scheme() {
            "memory" => self.cached(&key, || Ok(Arc::new(InMemory::new()) as _))?,
            "file" => self.cached(&key, || Ok(Arc::new(LocalFileSystem::new()) as _))?,
            "s3" | "s3a" => self.cached(&key, || self.create_s3_store(&url))?,
            _ => self.cached(&key, || {
                let (store, _) = object_store::parse_url_opts(&url, self.properties.iter())
                    .map_err(|e| Error::Storage(format!("unsupported location {location}: {e}")))?;
                Ok(Arc::from(store))
            })?,
        };
        Ok((store, path))
    }

    fn cached(
        &self,
        key: &str,
        build: impl FnOnce() -> Result<Arc<dyn ObjectStore>>,
    ) -> Result<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(key) {
            return Ok(Arc::clone(store));
        }
        let store = build()?;
        stores.insert(key.to_string(), Arc::clone(&store));
        Ok(store)
    }

    fn create_s3_store(&self, url: &Url) -> Result<Arc<dyn ObjectStore>> {
        let bucket = url
            .host_str()
            .ok_or_else(|| Error::Storage(format!("missing bucket in {url}")))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(region) = self.properties.get(S3_REGION) {
            builder = builder.with_region(region);
        }
        if let Some(access_key) = self.properties.get(S3_ACCESS_KEY_ID) {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = self.properties.get(S3_SECRET_ACCESS_KEY) {
            builder = builder.with_secret_access_key(secret_key);
        }
        if let Some(token) = self.properties.get(S3_SESSION_TOKEN) {
            builder = builder.with_token(token);
        }
        if let Some(endpoint) = self.properties.get(S3_ENDPOINT) {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| Error::Storage(format!("failed to create S3 store: {e}")))?;
        Ok(Arc::new(store))
    }
}

/// Location for the next metadata file of a table.
pub fn new_metadata_location(table_location: &str, version: u32) -> String {
    format!(
        "{}/metadata/{:05}-{}.metadata.json",
        table_location.trim_end_matches('/'),
        version,
        uuid::Uuid::new_v4()
    )
}

/// Version number encoded in a metadata file name, if any.
pub fn parse_metadata_version(metadata_location: &str) -> Option<u32> {
    let file_name = metadata_location.rsplit('/').next()?;
    let (version, _) = file_name.split_once('-')?;
    version.parse().ok()
}

/// Version to use for the metadata file that replaces `previous`.
pub fn next_metadata_version(previous: &str) -> u32 {
    parse_metadata_version(previous).map_or(0, |v| v + 1)
}

/// Default table location: `<warehouse>/<namespace segments>/<table>`.
pub fn default_table_location(warehouse: &str, namespace: &Identifier, table: &str) -> String {
    let mut location = warehouse.trim_end_matches('/').to_string();
    for segment in namespace.segments() {
        location.push('/');
        location.push_str(segment);
    }
    location.push('/');
    location.push_str(table);
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Schema, SchemaField};

    #[test]
    fn test_metadata_location_naming() {
        let location = new_metadata_location("s3://bucket/wh/db/t/", 3);
        assert!(location.starts_with("s3://bucket/wh/db/t/metadata/00003-"));
        assert!(location.ends_with(".metadata.json"));
        assert_eq!(parse_metadata_version(&location), Some(3));
        assert_eq!(next_metadata_version(&location), 4);
    }

    #[test]
    fn test_unversioned_location() {
        assert_eq!(parse_metadata_version("s3://b/t/metadata/v1.metadata.json"), None);
        assert_eq!(next_metadata_version(""), 0);
    }

    #[test]
    fn test_default_table_location() {
        let ns = Identifier::from(["sales", "emea"]);
        assert_eq!(
            default_table_location("s3://bucket/wh/", &ns, "orders"),
            "s3://bucket/wh/sales/emea/orders"
        );
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let io = FileIo::default();
        let metadata = TableMetadata::new(
            Schema::new(0, vec![SchemaField::primitive(1, "id", "long", true)]),
            None,
            None,
            "memory:///wh/db/t",
            Properties::new(),
        );
        let location = new_metadata_location(&metadata.location, 0);

        io.write_metadata(&location, &metadata).await.unwrap();
        let read = io.read_metadata(&location).await.unwrap();
        assert_eq!(read, metadata);

        io.delete(&location).await.unwrap();
        assert!(matches!(
            io.read_metadata(&location).await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_local_filesystem_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let table_location = format!("file://{}/db/t", dir.path().display());
        let metadata = TableMetadata::new(
            Schema::new(0, vec![SchemaField::primitive(1, "id", "long", true)]),
            None,
            None,
            table_location.clone(),
            Properties::new(),
        );
        let location = new_metadata_location(&table_location, 0);

        let io = FileIo::default();
        io.write_metadata(&location, &metadata).await.unwrap();
        assert_eq!(io.read_metadata(&location).await.unwrap(), metadata);
    }
}
