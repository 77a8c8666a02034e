use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use uuid::Uuid;

use super::{DocumentStore, RepositoryError, RepositoryResult};
use crate::analysis::StructuredAnalysis;
use crate::domain::documents::{ConversationEntry, Document, DocumentStatus, StorageType};

const DOCUMENT_COLUMNS: &str = "id, title, description, filename, storage_ref, storage_type, \
     file_size, status, extracted_text, structured_analysis, ai_analysis_text, analysis_version, \
     processing_started, processing_completed, processing_error, conversation, created_at, updated_at";

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &PgRow) -> RepositoryResult<Document> {
    let id: Uuid = row.try_get("id")?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<DocumentStatus>()
        .map_err(RepositoryError::Corrupt)?;

    let storage_type: String = row.try_get("storage_type")?;
    let storage_type = storage_type
        .parse::<StorageType>()
        .map_err(RepositoryError::Corrupt)?;

    // Analyses written by an older layout are treated as missing so they get regenerated.
    let structured_analysis = row
        .try_get::<Option<serde_json::Value>, _>("structured_analysis")?
        .and_then(|value| match serde_json::from_value::<StructuredAnalysis>(value) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                tracing::warn!(document_id = %id, error = %e, "Discarding unreadable stored analysis");
                None
            }
        });

    let Json(conversation) = row.try_get::<Json<Vec<ConversationEntry>>, _>("conversation")?;

    Ok(Document {
        id,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        filename: row.try_get("filename")?,
        storage_ref: row.try_get("storage_ref")?,
        storage_type,
        file_size: row.try_get("file_size")?,
        status,
        extracted_text: row.try_get("extracted_text")?,
        structured_analysis,
        ai_analysis_text: row.try_get("ai_analysis_text")?,
        analysis_version: row.try_get("analysis_version")?,
        processing_started: row.try_get("processing_started")?,
        processing_completed: row.try_get("processing_completed")?,
        processing_error: row.try_get("processing_error")?,
        conversation,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound(id))?;

        row_to_document(&row)
    }

    async fn insert(&self, document: &Document) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (
                id, title, description, filename, storage_ref, storage_type, file_size,
                status, extracted_text, structured_analysis, ai_analysis_text, analysis_version,
                processing_started, processing_completed, processing_error, conversation,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.filename)
        .bind(&document.storage_ref)
        .bind(document.storage_type.as_str())
        .bind(document.file_size)
        .bind(document.status.as_str())
        .bind(&document.extracted_text)
        .bind(document.structured_analysis.as_ref().map(Json))
        .bind(&document.ai_analysis_text)
        .bind(document.analysis_version)
        .bind(document.processing_started)
        .bind(document.processing_completed)
        .bind(&document.processing_error)
        .bind(Json(&document.conversation))
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Duplicate(document.id));
        }
        Ok(())
    }

    async fn save(&self, document: &Document) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET
                title = $2,
                description = $3,
                filename = $4,
                storage_ref = $5,
                storage_type = $6,
                file_size = $7,
                status = $8,
                extracted_text = $9,
                structured_analysis = $10,
                ai_analysis_text = $11,
                analysis_version = $12,
                processing_started = $13,
                processing_completed = $14,
                processing_error = $15,
                updated_at = $16
            WHERE id = $1
            "#,
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.filename)
        .bind(&document.storage_ref)
        .bind(document.storage_type.as_str())
        .bind(document.file_size)
        .bind(document.status.as_str())
        .bind(&document.extracted_text)
        .bind(document.structured_analysis.as_ref().map(Json))
        .bind(&document.ai_analysis_text)
        .bind(document.analysis_version)
        .bind(document.processing_started)
        .bind(document.processing_completed)
        .bind(&document.processing_error)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(document.id));
        }
        Ok(())
    }

    async fn list(&self, offset: u32, limit: u32) -> RepositoryResult<(Vec<Document>, u64)> {
        let rows_query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let (rows, total) = tokio::try_join!(
            sqlx::query(&rows_query)
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&self.pool),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents").fetch_one(&self.pool),
        )?;

        let documents = rows
            .iter()
            .map(row_to_document)
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok((documents, total.max(0) as u64))
    }

    async fn append_conversation(
        &self,
        id: Uuid,
        entries: &[ConversationEntry],
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET conversation = conversation || $2::jsonb, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(entries))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        crate::db::health_check(&self.pool).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
