//! Blob storage for uploaded PDFs.
//!
//! Every document records which backend holds its bytes. [`StorageRegistry`]
//! keeps one [`BlobStore`] per configured [`StorageType`] and dispatches on the
//! type stored with the document, so old uploads stay readable after the
//! default backend changes.

mod database;
mod http;
mod local;

pub use database::PgBlobStore;
pub use http::HttpBlobStore;
pub use local::LocalFileStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::documents::StorageType;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("stored file {0} not found")]
    NotFound(String),

    #[error("invalid storage reference: {0}")]
    InvalidReference(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn storage_type(&self) -> StorageType;

    /// Store the bytes and return an opaque reference.
    async fn put(&self, data: Vec<u8>, filename: &str) -> StorageResult<String>;

    async fn get(&self, reference: &str) -> StorageResult<Vec<u8>>;

    /// Returns false when nothing was stored under `reference`.
    async fn delete(&self, reference: &str) -> StorageResult<bool>;
}

/// Backends keyed by the storage type recorded on each document.
pub struct StorageRegistry {
    stores: HashMap<StorageType, Arc<dyn BlobStore>>,
    default_type: StorageType,
}

impl StorageRegistry {
    /// Registry whose default backend receives new uploads.
    pub fn new(default_store: Arc<dyn BlobStore>) -> Self {
        let default_type = default_store.storage_type();
        let mut stores = HashMap::new();
        stores.insert(default_type, default_store);
        Self {
            stores,
            default_type,
        }
    }

    /// Register an additional backend so documents stored there stay readable.
    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.stores.insert(store.storage_type(), store);
        self
    }

    pub fn default_type(&self) -> StorageType {
        self.default_type
    }

    pub fn store_for(&self, storage_type: StorageType) -> StorageResult<&Arc<dyn BlobStore>> {
        self.stores.get(&storage_type).ok_or_else(|| {
            StorageError::Unavailable(format!("no {storage_type} storage backend configured"))
        })
    }

    /// Store new upload bytes with the default backend.
    pub async fn put(&self, data: Vec<u8>, filename: &str) -> StorageResult<(StorageType, String)> {
        let store = self.store_for(self.default_type)?;
        let reference = store.put(data, filename).await?;
        Ok((self.default_type, reference))
    }

    pub async fn get(&self, storage_type: StorageType, reference: &str) -> StorageResult<Vec<u8>> {
        self.store_for(storage_type)?.get(reference).await
    }

    pub async fn delete(&self, storage_type: StorageType, reference: &str) -> StorageResult<bool> {
        self.store_for(storage_type)?.delete(reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_dispatches_on_storage_type() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StorageRegistry::new(Arc::new(LocalFileStore::new(dir.path())));
        assert_eq!(registry.default_type(), StorageType::Local);

        let (storage_type, reference) = registry.put(b"%PDF-1.4".to_vec(), "a.pdf").await.unwrap();
        assert_eq!(storage_type, StorageType::Local);
        assert_eq!(
            registry.get(StorageType::Local, &reference).await.unwrap(),
            b"%PDF-1.4"
        );
        assert!(registry.delete(StorageType::Local, &reference).await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StorageRegistry::new(Arc::new(LocalFileStore::new(dir.path())));
        assert!(matches!(
            registry.get(StorageType::BlobService, "abc").await,
            Err(StorageError::Unavailable(_))
        ));
    }
}
