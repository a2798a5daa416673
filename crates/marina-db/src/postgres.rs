//! Postgres-backed document store
//!
//! Documents live in a `documents` table keyed by (collection, id) with a
//! JSONB body. Field updates read the row `FOR UPDATE`, apply the conditional
//! rewrite in Rust, and write the body back inside the same transaction.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use marina_core::fieldpath::{get_path, parse_path, set_path};
use marina_core::AppError;

use crate::store::{Document, DocumentStore, FieldUpdate};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_document(
        &self,
        collection: &str,
        doc_id: &str,
        data: &serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(doc_id)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[tracing::instrument(skip(self))]
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1
            ORDER BY id
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Document {
                id: row.get("id"),
                data: row.get("data"),
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<Document>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Document {
            id: row.get("id"),
            data: row.get("data"),
        }))
    }

    #[tracing::instrument(skip(self))]
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

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for field update")?;

        let row = sqlx::query(
            r#"
            SELECT data
            FROM documents
            WHERE collection = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(collection)
        .bind(doc_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            return Ok(FieldUpdate::MissingDocument);
        };

        let mut data: serde_json::Value = row.get("data");
        let outcome = match get_path(&data, &segments) {
            None => FieldUpdate::MissingField,
            Some(current) if current.as_str() == Some(expected_old) => {
                set_path(
                    &mut data,
                    &segments,
                    serde_json::Value::String(new_url.to_string()),
                );
                FieldUpdate::Updated
            }
            Some(_) => FieldUpdate::Unchanged,
        };

        if outcome == FieldUpdate::Updated {
            sqlx::query(
                r#"
                UPDATE documents
                SET data = $3, updated_at = NOW()
                WHERE collection = $1 AND id = $2
                "#,
            )
            .bind(collection)
            .bind(doc_id)
            .bind(&data)
            .execute(&mut *tx)
            .await?;
            tx.commit()
                .await
                .context("Failed to commit field update")?;
            tracing::info!(
                collection = collection,
                doc_id = doc_id,
                path = path,
                "URL field updated"
            );
        } else {
            tx.rollback().await.ok();
        }

        Ok(outcome)
    }
}
