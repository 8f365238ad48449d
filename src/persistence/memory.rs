//! In-process document store
//!
//! Applies the same rules as the remote service: documents start at version
//! 1, a write presenting any other version than the stored one is a
//! conflict, and accepted writes bump the version by one.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::persistence::api::{Document, DocumentApi, UpdateOutcome};

/// A [`DocumentApi`] backed by a map.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<Uuid, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Document>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the document for a project at version 1.
    pub fn create(&self, project_id: Uuid, content_md: impl Into<String>) -> Document {
        let document = Document {
            id: Uuid::new_v4(),
            project_id,
            content_md: content_md.into(),
            version: 1,
            updated_at: Utc::now(),
        };
        self.documents().insert(document.id, document.clone());
        document
    }

    /// Current stored state of a document.
    pub fn get(&self, document_id: Uuid) -> Option<Document> {
        self.documents().get(&document_id).cloned()
    }

    /// Write as another session would, bumping the version without a check.
    pub fn overwrite_externally(&self, document_id: Uuid, content_md: impl Into<String>) -> Result<Document> {
        let mut documents = self.documents();
        let document = documents
            .get_mut(&document_id)
            .ok_or_else(|| Error::DocumentNotFound {
                id: document_id.to_string(),
            })?;
        document.content_md = content_md.into();
        document.version += 1;
        document.updated_at = Utc::now();
        Ok(document.clone())
    }
}

#[async_trait]
impl DocumentApi for MemoryDocumentStore {
    async fn fetch_for_project(&self, project_id: Uuid) -> Result<Document> {
        self.documents()
            .values()
            .find(|doc| doc.project_id == project_id)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound {
                id: format!("project {}", project_id),
            })
    }

    async fn update(&self, document_id: Uuid, content_md: &str, version: i64) -> Result<UpdateOutcome> {
        let mut documents = self.documents();
        let document = documents
            .get_mut(&document_id)
            .ok_or_else(|| Error::DocumentNotFound {
                id: document_id.to_string(),
            })?;

        if document.version != version {
            debug!(
                "Rejecting write to {}: expected version {}, stored {}",
                document_id, version, document.version
            );
            return Ok(UpdateOutcome::Conflict);
        }

        document.content_md = content_md.to_string();
        document.version += 1;
        document.updated_at = Utc::now();
        Ok(UpdateOutcome::Saved(document.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_for_project() {
        let store = MemoryDocumentStore::new();
        let project = Uuid::new_v4();
        let created = store.create(project, "# Doc");

        let fetched = store.fetch_for_project(project).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_project() {
        let store = MemoryDocumentStore::new();
        let err = store.fetch_for_project(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_with_current_version() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Uuid::new_v4(), "old");

        match store.update(doc.id, "new", 1).await.unwrap() {
            UpdateOutcome::Saved(saved) => {
                assert_eq!(saved.version, 2);
                assert_eq!(saved.content_md, "new");
            }
            UpdateOutcome::Conflict => panic!("Expected save"),
        }
        assert!(store.get(doc.id).unwrap().updated_at >= doc.updated_at);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let store = MemoryDocumentStore::new();
        let doc = store.create(Uuid::new_v4(), "old");
        store.overwrite_externally(doc.id, "theirs").unwrap();

        let outcome = store.update(doc.id, "mine", 1).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict);

        let stored = store.get(doc.id).unwrap();
        assert_eq!(stored.content_md, "theirs");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_document() {
        let store = MemoryDocumentStore::new();
        let err = store.update(Uuid::new_v4(), "x", 1).await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound { .. }));
    }
}
