//! Topic/subscription queue abstraction
//!
//! Decouples task production from consumption with at-least-once delivery.
//! A handler's `Ok` acknowledges the message; a recoverable `Err` nacks it
//! for redelivery after the configured deadline; an unrecoverable `Err`
//! acknowledges and drops it so a poison message is not redelivered forever.
//!
//! Two implementations: [`MemoryQueue`] for tests and single-process runs,
//! [`PgQueue`] for durable cross-process delivery. Callers hold an
//! `Arc<dyn Queue>` and never depend on the transport.

pub mod error;
pub mod memory;
pub mod pg;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use marina_core::config::QueueBackend;
use marina_core::{Config, TaskError};

pub use error::QueueError;
pub use memory::{MemoryQueue, MemoryQueueConfig};
pub use pg::{PgQueue, PgQueueConfig};

/// One delivered message. `delivery_count` starts at 1 and grows with each
/// redelivery.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub payload: Value,
    pub delivery_count: u32,
}

/// Consumer callback. Invoked once per delivered message; different messages
/// may be handled concurrently, a single message never is.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<(), TaskError>;
}

/// Active subscription. Dropping the handle without `close()` leaves the
/// delivery loop running for the life of the process.
pub struct SubscriptionHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: tokio::task::JoinHandle<()>,
}

impl SubscriptionHandle {
    pub(crate) fn new(shutdown_tx: mpsc::Sender<()>, join: tokio::task::JoinHandle<()>) -> Self {
        Self { shutdown_tx, join }
    }

    /// Deregister the consumer and wait for its delivery loop to exit.
    /// In-flight handler invocations run to completion.
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.join.await;
    }
}

#[async_trait]
pub trait Queue: Send + Sync {
    /// Idempotent: creating a topic that already exists is a no-op.
    async fn ensure_topic(&self, topic: &str) -> Result<(), QueueError>;

    /// Durably store a message until a consumer acknowledges it.
    async fn publish(&self, topic: &str, payload: Value) -> Result<Uuid, QueueError>;

    /// Register a consumer. See [`MessageHandler`] for ack/nack semantics.
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionHandle, QueueError>;

    /// Best-effort backlog size, for progress display only. Implementations
    /// may return [`QueueError::Unsupported`]; callers must not rely on the
    /// value for correctness.
    async fn depth(&self, topic: &str) -> Result<u64, QueueError>;

    /// Destructive: drops queued AND in-flight messages for the topic.
    /// Rarely used; there is no clear-without-redeliver in the transport.
    async fn purge(&self, topic: &str) -> Result<(), QueueError>;
}

/// Build the queue selected by configuration.
pub fn create_queue(
    config: &Config,
    pool: Option<sqlx::PgPool>,
) -> Result<Arc<dyn Queue>, QueueError> {
    match config.queue_backend {
        QueueBackend::Memory => {
            tracing::info!("Initializing in-memory queue");
            Ok(Arc::new(MemoryQueue::new(MemoryQueueConfig {
                redelivery: config.queue_redelivery,
                poll_interval: config.queue_poll_interval,
                concurrency: config.worker_concurrency,
            })))
        }
        QueueBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                QueueError::Transport("Postgres queue requires a database pool".to_string())
            })?;
            tracing::info!("Initializing Postgres queue");
            Ok(Arc::new(PgQueue::new(
                pool,
                PgQueueConfig {
                    redelivery: config.queue_redelivery,
                    poll_interval: config.queue_poll_interval,
                    concurrency: config.worker_concurrency,
                    ..Default::default()
                },
            )))
        }
    }
}
