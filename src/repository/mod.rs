//! Persistence of document records.
//!
//! The [`DocumentStore`] trait is the only way the pipeline and the HTTP layer
//! touch documents. Writes replace whole records; conversation entries are the
//! one exception and go through [`DocumentStore::append_conversation`] so a
//! concurrent save never drops chat history.

mod memory;
mod postgres;

pub use memory::InMemoryDocumentStore;
pub use postgres::PgDocumentStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::documents::{ConversationEntry, Document};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("document {0} already exists")]
    Duplicate(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document>;

    async fn insert(&self, document: &Document) -> RepositoryResult<()>;

    /// Replace every stored field except the conversation log.
    async fn save(&self, document: &Document) -> RepositoryResult<()>;

    /// Newest first, with the total number of documents.
    async fn list(&self, offset: u32, limit: u32) -> RepositoryResult<(Vec<Document>, u64)>;

    /// Append entries in order.
    async fn append_conversation(
        &self,
        id: Uuid,
        entries: &[ConversationEntry],
    ) -> RepositoryResult<()>;

    /// Returns false when the record did not exist.
    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;

    async fn health_check(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str;
}
