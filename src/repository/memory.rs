use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::{DocumentStore, RepositoryError, RepositoryResult};
use crate::domain::documents::{ConversationEntry, Document};

/// Process-local store used without a database and in tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document> {
        self.documents
            .read()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn insert(&self, document: &Document) -> RepositoryResult<()> {
        let mut documents = self.documents.write();
        if documents.contains_key(&document.id) {
            return Err(RepositoryError::Duplicate(document.id));
        }
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn save(&self, document: &Document) -> RepositoryResult<()> {
        let mut documents = self.documents.write();
        let stored = documents
            .get_mut(&document.id)
            .ok_or(RepositoryError::NotFound(document.id))?;

        let conversation = std::mem::take(&mut stored.conversation);
        *stored = document.clone();
        stored.conversation = conversation;
        Ok(())
    }

    async fn list(&self, offset: u32, limit: u32) -> RepositoryResult<(Vec<Document>, u64)> {
        let documents = self.documents.read();
        let mut all: Vec<&Document> = documents.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((page, documents.len() as u64))
    }

    async fn append_conversation(
        &self,
        id: Uuid,
        entries: &[ConversationEntry],
    ) -> RepositoryResult<()> {
        let mut documents = self.documents.write();
        let stored = documents.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        stored.conversation.extend_from_slice(entries);
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.documents.write().remove(&id).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::documents::{DocumentStatus, StorageType};
    use chrono::Duration;

    fn document(title: &str) -> Document {
        Document::new(
            title.to_string(),
            None,
            format!("{title}.pdf"),
            format!("{title}-ref"),
            StorageType::Local,
            3,
        )
    }

    #[tokio::test]
    async fn test_insert_get_and_duplicate() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a");
        store.insert(&doc).await.unwrap();
        assert_eq!(store.get(doc.id).await.unwrap().title, "a");
        assert!(matches!(
            store.insert(&doc).await,
            Err(RepositoryError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_save_keeps_conversation() {
        let store = InMemoryDocumentStore::new();
        let mut doc = document("a");
        store.insert(&doc).await.unwrap();
        store
            .append_conversation(doc.id, &[ConversationEntry::user("hola")])
            .await
            .unwrap();

        doc.status = DocumentStatus::Completed;
        store.save(&doc).await.unwrap();

        let stored = store.get(doc.id).await.unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert_eq!(stored.conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_save_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        assert!(matches!(
            store.save(&document("x")).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_total() {
        let store = InMemoryDocumentStore::new();
        let mut older = document("older");
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = document("newer");
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();

        let (page, total) = store.list(0, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "newer");

        let (page, _) = store.list(1, 10).await.unwrap();
        assert_eq!(page[0].title, "older");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a");
        store.insert(&doc).await.unwrap();
        assert!(store.delete(doc.id).await.unwrap());
        assert!(!store.delete(doc.id).await.unwrap());
        assert!(store.is_empty());
    }
}
