//! Document service contract
//!
//! The remote store owns documents and versions them. Every write presents
//! the version the client last observed; the store rejects stale writes with
//! a conflict instead of overwriting.
//!
//! Endpoints:
//! - `GET /projects/{projectId}/document` returns the project's document
//! - `PUT /documents/{id}` with an `X-Document-Version` header and an
//!   [`UpdateDocumentRequest`] body returns the updated document, or 409 on a
//!   version mismatch

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Request header carrying the expected document version.
pub const VERSION_HEADER: &str = "X-Document-Version";

/// A persisted markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    pub content_md: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Body of a document update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub content_md: String,
}

/// Error body returned by the store.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Result of a write the store answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The write was accepted; carries the stored document and its new version
    Saved(Document),
    /// The presented version was stale
    Conflict,
}

impl UpdateOutcome {
    /// Interpret a raw PUT response.
    pub fn from_response(document_id: Uuid, status: u16, body: &str) -> Result<Self> {
        match status {
            200 => Ok(UpdateOutcome::Saved(serde_json::from_str(body)?)),
            409 => Ok(UpdateOutcome::Conflict),
            404 => Err(Error::DocumentNotFound {
                id: document_id.to_string(),
            }),
            _ => Err(Error::Server {
                status,
                message: error_message(body),
            }),
        }
    }
}

/// Prefer the detailed message, then the short error, then the raw body.
fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Access to the remote document store.
#[async_trait]
pub trait DocumentApi: Send + Sync + 'static {
    /// Fetch the document belonging to a project.
    async fn fetch_for_project(&self, project_id: Uuid) -> Result<Document>;

    /// Write new content, presenting the last observed version.
    async fn update(&self, document_id: Uuid, content_md: &str, version: i64) -> Result<UpdateOutcome>;
}
