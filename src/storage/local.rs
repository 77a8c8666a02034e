use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{BlobStore, StorageError, StorageResult};
use crate::domain::documents::StorageType;

/// Files under a single root directory; references are generated file names.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, reference: &str) -> StorageResult<PathBuf> {
        let valid = !reference.is_empty()
            && !reference.starts_with('.')
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(reference))
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "pdf".to_string())
}

#[async_trait]
impl BlobStore for LocalFileStore {
    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }

    async fn put(&self, data: Vec<u8>, filename: &str) -> StorageResult<String> {
        tokio::fs::create_dir_all(&self.root).await?;
        let reference = format!("{}.{}", Uuid::new_v4(), extension_of(filename));
        let path = self.path_for(&reference)?;
        tokio::fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), "Stored file locally");
        Ok(reference)
    }

    async fn get(&self, reference: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, reference: &str) -> StorageResult<bool> {
        let path = self.path_for(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("uploads"));

        let reference = store.put(b"bytes".to_vec(), "Informe.PDF").await.unwrap();
        assert!(reference.ends_with(".pdf"));
        assert_eq!(store.get(&reference).await.unwrap(), b"bytes");

        assert!(store.delete(&reference).await.unwrap());
        assert!(!store.delete(&reference).await.unwrap());
        assert!(matches!(
            store.get(&reference).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        for reference in ["../etc/passwd", "a/b.pdf", "..", ""] {
            assert!(matches!(
                store.get(reference).await,
                Err(StorageError::InvalidReference(_))
            ));
        }
    }
}
