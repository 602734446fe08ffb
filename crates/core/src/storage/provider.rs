//! Object store provider trait and the OpenDAL-backed implementation.

use async_trait::async_trait;
use bytes::Bytes;
use opendal::{Operator, services};

use fable_shared::config::{BackendSettings, ProviderSettings};

use super::error::StorageError;

/// Result of storing a blob.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Storage key the blob was written under.
    pub key: String,
    /// Public URL hint for the blob (not the serving URL).
    pub public_url_hint: String,
    /// Content type the blob was stored with.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// Metadata about a stored blob.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Size in bytes.
    pub size: u64,
    /// Content type, if the backend recorded one.
    pub content_type: Option<String>,
    /// Last modification time (RFC 3339), if the backend recorded one.
    pub last_modified: Option<String>,
    /// Entity tag, if the backend recorded one.
    pub etag: Option<String>,
}

/// A named blob storage capability.
///
/// Implementations must make `delete` idempotent: deleting a key that no
/// longer exists is not an error. Callers retrying a delete must not fail on
/// the second attempt.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stable provider name, recorded as `storage_provider` on catalog rows.
    fn name(&self) -> &str;

    /// Store a blob under `key`.
    ///
    /// On failure the caller must not assume partial success left no data
    /// behind; a compensating delete is safe either way.
    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Public URL hint for a key. Pure and idempotent, never mutates.
    fn url(&self, key: &str) -> String;

    /// Read a blob's bytes.
    async fn read(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Delete a blob. Safe to call on a key that no longer exists.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Stat a blob. Fails with [`StorageError::NotFound`] if missing.
    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError>;
}

/// OpenDAL-backed object store.
pub struct OpendalStore {
    name: String,
    operator: Operator,
    public_url_base: Option<String>,
}

impl OpendalStore {
    /// Create a store from provider settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, StorageError> {
        let operator = build_operator(&settings.backend)?;
        Ok(Self {
            name: settings.name.clone(),
            operator,
            public_url_base: settings.public_url_base.clone(),
        })
    }

    /// Create a store from an existing operator (used in tests).
    #[must_use]
    pub fn new(name: impl Into<String>, operator: Operator) -> Self {
        Self {
            name: name.into(),
            operator,
            public_url_base: None,
        }
    }

    /// Create an in-memory store (tests and local development).
    ///
    /// # Errors
    ///
    /// Returns an error if the operator cannot be built.
    pub fn in_memory(name: impl Into<String>) -> Result<Self, StorageError> {
        let operator = Operator::new(services::Memory::default())
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();
        Ok(Self::new(name, operator))
    }
}

/// Build an OpenDAL operator from backend settings.
fn build_operator(backend: &BackendSettings) -> Result<Operator, StorageError> {
    match backend {
        BackendSettings::S3 {
            endpoint,
            bucket,
            access_key_id,
            secret_access_key,
            region,
        } => {
            let builder = services::S3::default()
                .endpoint(endpoint)
                .bucket(bucket)
                .access_key_id(access_key_id)
                .secret_access_key(secret_access_key)
                .region(region);

            Ok(Operator::new(builder)
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish())
        }
        BackendSettings::AzureBlob {
            account,
            access_key,
            container,
        } => {
            let builder = services::Azblob::default()
                .account_name(account)
                .account_key(access_key)
                .container(container);

            Ok(Operator::new(builder)
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish())
        }
        BackendSettings::LocalFs { root } => {
            let builder = services::Fs::default().root(
                root.to_str()
                    .ok_or_else(|| StorageError::configuration("invalid path"))?,
            );

            Ok(Operator::new(builder)
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish())
        }
        BackendSettings::Memory => Ok(Operator::new(services::Memory::default())
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish()),
    }
}

#[async_trait]
impl ObjectStore for OpendalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let size = data.len() as u64;
        self.operator
            .write(key, data)
            .await
            .map_err(StorageError::from)?;

        Ok(StoredObject {
            key: key.to_string(),
            public_url_hint: self.url(key),
            content_type: content_type.to_string(),
            size,
        })
    }

    fn url(&self, key: &str) -> String {
        match &self.public_url_base {
            Some(base) => format!("{}/{key}", base.trim_end_matches('/')),
            None => format!("{}:{key}", self.name),
        }
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let buffer = self.operator.read(key).await.map_err(StorageError::from)?;
        Ok(buffer.to_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // OpenDAL delete succeeds on a missing key, which gives us the
        // idempotent-delete contract for free.
        self.operator.delete(key).await.map_err(StorageError::from)
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let meta = self.operator.stat(key).await.map_err(StorageError::from)?;

        Ok(ObjectMetadata {
            size: meta.content_length(),
            content_type: meta.content_type().map(String::from),
            last_modified: meta.last_modified().map(|t| t.to_string()),
            etag: meta.etag().map(String::from),
        })
    }
}
