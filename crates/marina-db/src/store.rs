use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use marina_core::AppError;

/// One document from a named collection. `data` is the full hierarchical
/// body; scans never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

/// Outcome of a conditional URL-field update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Field held the expected old URL and was rewritten.
    Updated,
    /// Field exists but no longer holds the expected old URL; nothing written.
    Unchanged,
    /// Document is gone.
    MissingDocument,
    /// Path no longer resolves inside the document.
    MissingField,
}

/// Document-store collaborator. Queried per named collection for all
/// documents, written to via individual field updates in the repair path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, AppError>;

    async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<Document>, AppError>;

    /// Set the field at `path` to `new_url`, but only while it still holds
    /// `expected_old`. Re-applying the same replacement is therefore a no-op,
    /// which is what makes repair idempotent under redelivery.
    async fn update_url_field(
        &self,
        collection: &str,
        doc_id: &str,
        path: &str,
        expected_old: &str,
        new_url: &str,
    ) -> Result<FieldUpdate, AppError>;
}
