//! Repair worker
//!
//! Subscribes to the repair topic and applies one field rewrite per task:
//! recompute the replacement, then write it only while the field still holds
//! the old URL. Redelivered tasks therefore converge to `AlreadyFixed`
//! instead of clobbering newer data. Every handled task produces one result
//! message on the result topic.

use std::sync::Arc;

use async_trait::async_trait;

use marina_core::models::{
    RepairOutcome, RepairResult, RepairTask, REPAIR_RESULT_TOPIC, REPAIR_TOPIC,
};
use marina_core::{AppError, Config, PlaceholderCatalog, TaskError, TaskResultExt};
use marina_db::{DocumentStore, FieldUpdate};
use marina_queue::{Message, MessageHandler, Queue, SubscriptionHandle};
use marina_validator::repair_url;

pub struct RepairWorker;

impl RepairWorker {
    /// Register the worker on the repair topic. The returned handle stops
    /// consumption; in-flight tasks run to completion.
    pub async fn start(
        queue: Arc<dyn Queue>,
        store: Arc<dyn DocumentStore>,
        config: &Config,
    ) -> Result<SubscriptionHandle, AppError> {
        queue.ensure_topic(REPAIR_TOPIC).await?;
        queue.ensure_topic(REPAIR_RESULT_TOPIC).await?;

        let handler = Arc::new(RepairHandler {
            store,
            queue: queue.clone(),
            catalog: PlaceholderCatalog::new(&config.placeholder_base_url),
            public_base_url: config.public_base_url.clone(),
        });

        tracing::info!("Repair worker starting");
        Ok(queue.subscribe(REPAIR_TOPIC, handler).await?)
    }
}

struct RepairHandler {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn Queue>,
    catalog: PlaceholderCatalog,
    public_base_url: String,
}

impl RepairHandler {
    async fn apply(&self, task: &RepairTask) -> Result<RepairResult, TaskError> {
        let new_url = repair_url(task, &self.catalog, &self.public_base_url);

        // Already in repaired form; nothing to write.
        if new_url == task.old_url {
            return Ok(result(task, Some(new_url), RepairOutcome::AlreadyFixed, None));
        }

        let update = self
            .store
            .update_url_field(
                &task.collection,
                &task.doc_id,
                &task.path,
                &task.old_url,
                &new_url,
            )
            .await;

        match update {
            Ok(FieldUpdate::Updated) => {
                tracing::info!(
                    collection = %task.collection,
                    doc_id = %task.doc_id,
                    path = %task.path,
                    new_url = %new_url,
                    "Repaired URL field"
                );
                Ok(result(task, Some(new_url), RepairOutcome::Fixed, None))
            }
            Ok(FieldUpdate::Unchanged) => Ok(result(
                task,
                None,
                RepairOutcome::AlreadyFixed,
                Some("field no longer holds the original URL".to_string()),
            )),
            Ok(FieldUpdate::MissingDocument) => Ok(result(
                task,
                None,
                RepairOutcome::Skipped,
                Some("document no longer exists".to_string()),
            )),
            Ok(FieldUpdate::MissingField) => Ok(result(
                task,
                None,
                RepairOutcome::Skipped,
                Some("field path no longer resolves".to_string()),
            )),
            Err(e) if e.is_recoverable() => Err(TaskError::recoverable(anyhow::Error::from(e))),
            Err(e) => Ok(result(
                task,
                None,
                RepairOutcome::Failed,
                Some(e.to_string()),
            )),
        }
    }
}

fn result(
    task: &RepairTask,
    new_url: Option<String>,
    outcome: RepairOutcome,
    detail: Option<String>,
) -> RepairResult {
    RepairResult {
        task: task.clone(),
        new_url,
        outcome,
        detail,
    }
}

#[async_trait]
impl MessageHandler for RepairHandler {
    async fn handle(&self, message: &Message) -> Result<(), TaskError> {
        let task: RepairTask = serde_json::from_value(message.payload.clone()).map_err(|e| {
            tracing::error!(
                message_id = %message.id,
                error = %e,
                "Dropping unparsable repair task"
            );
            TaskError::unrecoverable(anyhow::Error::from(e))
        })?;

        let result = self.apply(&task).await?;

        // A lost result publish nacks the whole task; the repair itself is
        // idempotent, so redelivery converges instead of double-writing.
        self.queue
            .publish(
                REPAIR_RESULT_TOPIC,
                serde_json::to_value(&result).unrecoverable()?,
            )
            .await
            .map_err(|e| TaskError::recoverable(anyhow::Error::from(e)))?;

        Ok(())
    }
}
