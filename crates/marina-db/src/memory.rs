//! In-memory document store for tests and single-process runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use marina_core::fieldpath::{get_path, parse_path, set_path};
use marina_core::AppError;

use crate::store::{Document, DocumentStore, FieldUpdate};

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, serde_json::Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, doc_id: &str, data: serde_json::Value) {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(doc_id.to_string(), data);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<Document>, AppError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        Ok(collections.get(collection).and_then(|docs| {
            docs.get(doc_id).map(|data| Document {
                id: doc_id.to_string(),
                data: data.clone(),
            })
        }))
    }

    async fn update_url_field(
        &self,
        collection: &str,
        doc_id: &str,
        path: &str,
        expected_old: &str,
        new_url: &str,
    ) -> Result<FieldUpdate, AppError> {
        let segments =
            parse_path(path).map_err(|e| AppError::InvalidInput(format!("Bad path: {}", e)))?;

        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        let Some(data) = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(doc_id))
        else {
            return Ok(FieldUpdate::MissingDocument);
        };

        match get_path(data, &segments) {
            None => Ok(FieldUpdate::MissingField),
            Some(current) if current.as_str() == Some(expected_old) => {
                set_path(data, &segments, serde_json::Value::String(new_url.to_string()));
                Ok(FieldUpdate::Updated)
            }
            Some(_) => Ok(FieldUpdate::Unchanged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_unknown_collection_is_empty() {
        let store = MemoryDocumentStore::new();
        assert!(store.list_documents("yacht_profiles").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conditional_update_semantics() {
        let store = MemoryDocumentStore::new();
        store.insert(
            "yacht_profiles",
            "yp-1",
            json!({"mainImage": "blob:https://host/abc"}),
        );

        let outcome = store
            .update_url_field(
                "yacht_profiles",
                "yp-1",
                "mainImage",
                "blob:https://host/abc",
                "https://cdn/ph.jpg",
            )
            .await
            .unwrap();
        assert_eq!(outcome, FieldUpdate::Updated);

        // Same task redelivered: field no longer holds the old URL.
        let outcome = store
            .update_url_field(
                "yacht_profiles",
                "yp-1",
                "mainImage",
                "blob:https://host/abc",
                "https://cdn/ph.jpg",
            )
            .await
            .unwrap();
        assert_eq!(outcome, FieldUpdate::Unchanged);

        let doc = store.get_document("yacht_profiles", "yp-1").await.unwrap().unwrap();
        assert_eq!(doc.data["mainImage"], "https://cdn/ph.jpg");
    }

    #[tokio::test]
    async fn missing_document_and_field() {
        let store = MemoryDocumentStore::new();
        store.insert("yacht_profiles", "yp-1", json!({"name": "Etoile"}));

        assert_eq!(
            store
                .update_url_field("yacht_profiles", "gone", "mainImage", "x", "y")
                .await
                .unwrap(),
            FieldUpdate::MissingDocument
        );
        assert_eq!(
            store
                .update_url_field("yacht_profiles", "yp-1", "mainImage", "x", "y")
                .await
                .unwrap(),
            FieldUpdate::MissingField
        );
    }
}
