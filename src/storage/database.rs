use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BlobStore, StorageError, StorageResult};
use crate::domain::documents::StorageType;

/// PDF bytes kept in the `document_blobs` table.
pub struct PgBlobStore {
    pool: PgPool,
}

impl PgBlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_reference(reference: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(reference).map_err(|_| StorageError::InvalidReference(reference.to_string()))
}

#[async_trait]
impl BlobStore for PgBlobStore {
    fn storage_type(&self) -> StorageType {
        StorageType::Database
    }

    async fn put(&self, data: Vec<u8>, filename: &str) -> StorageResult<String> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO document_blobs (id, filename, data) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(filename)
            .bind(data)
            .execute(&self.pool)
            .await?;
        Ok(id.to_string())
    }

    async fn get(&self, reference: &str) -> StorageResult<Vec<u8>> {
        let id = parse_reference(reference)?;
        sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM document_blobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(reference.to_string()))
    }

    async fn delete(&self, reference: &str) -> StorageResult<bool> {
        let id = parse_reference(reference)?;
        let result = sqlx::query("DELETE FROM document_blobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
