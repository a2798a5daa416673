//! Postgres-backed queue
//!
//! Messages live in the `queue_messages` table. Claims use
//! `FOR UPDATE SKIP LOCKED` so concurrent consumers never receive the same
//! message, publishes fire `pg_notify` to wake subscribers early, and a
//! periodic reaper returns claims whose consumer died to the ready state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::{PgPool, Row};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::QueueError;
use crate::{Message, MessageHandler, Queue, SubscriptionHandle};

const NOTIFY_CHANNEL: &str = "marina_queue_message";

#[derive(Debug, Clone)]
pub struct PgQueueConfig {
    pub redelivery: Duration,
    pub poll_interval: Duration,
    pub concurrency: usize,
    /// How often lapsed claims are swept back to ready.
    pub stale_reap_interval: Duration,
}

impl Default for PgQueueConfig {
    fn default() -> Self {
        Self {
            redelivery: Duration::from_secs(300),
            poll_interval: Duration::from_millis(1000),
            concurrency: 4,
            stale_reap_interval: Duration::from_secs(60),
        }
    }
}

pub struct PgQueue {
    pool: PgPool,
    config: PgQueueConfig,
}

impl PgQueue {
    pub fn new(pool: PgPool, config: PgQueueConfig) -> Self {
        Self { pool, config }
    }

    /// Claim the next visible message for a topic. The row stays claimed
    /// until acked, nacked, or reaped after the redelivery deadline.
    async fn claim_next(
        pool: &PgPool,
        topic: &str,
    ) -> Result<Option<Message>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            WITH next AS (
                SELECT id
                FROM queue_messages
                WHERE topic = $1
                  AND status = 'ready'
                  AND visible_at <= NOW()
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE queue_messages q
            SET status = 'claimed',
                claimed_at = NOW(),
                delivery_count = delivery_count + 1
            FROM next
            WHERE q.id = next.id
            RETURNING q.id, q.payload, q.delivery_count
            "#,
        )
        .bind(topic)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|row| Message {
            id: row.get("id"),
            topic: topic.to_string(),
            payload: row.get("payload"),
            delivery_count: row.get::<i32, _>("delivery_count") as u32,
        }))
    }

    async fn ack(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM queue_messages WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn nack(pool: &PgPool, id: Uuid, redelivery: Duration) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE queue_messages
            SET status = 'ready',
                claimed_at = NULL,
                visible_at = NOW() + make_interval(secs => $2)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(redelivery.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Return claims older than the redelivery deadline to the ready state.
    /// Covers consumers that crashed between claim and ack.
    async fn reap_stale(
        pool: &PgPool,
        topic: &str,
        redelivery: Duration,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE queue_messages
            SET status = 'ready',
                claimed_at = NULL,
                visible_at = NOW()
            WHERE topic = $1
              AND status = 'claimed'
              AND claimed_at < NOW() - make_interval(secs => $2)
            "#,
        )
        .bind(topic)
        .bind(redelivery.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn handle_one(
        pool: PgPool,
        handler: Arc<dyn MessageHandler>,
        message: Message,
        redelivery: Duration,
    ) {
        match handler.handle(&message).await {
            Ok(()) => {
                if let Err(e) = Self::ack(&pool, message.id).await {
                    tracing::error!(message_id = %message.id, error = %e, "Failed to ack message");
                }
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    message_id = %message.id,
                    topic = %message.topic,
                    error = %e,
                    "Handler failed, message will be redelivered"
                );
                if let Err(e) = Self::nack(&pool, message.id, redelivery).await {
                    tracing::error!(message_id = %message.id, error = %e, "Failed to nack message");
                }
            }
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    topic = %message.topic,
                    error = %e,
                    "Handler failed unrecoverably, dropping message"
                );
                if let Err(e) = Self::ack(&pool, message.id).await {
                    tracing::error!(message_id = %message.id, error = %e, "Failed to drop message");
                }
            }
        }
    }

    /// Listen on the notify channel, forwarding wakeups to the delivery loop.
    /// Reconnects with backoff when the listener connection drops.
    fn spawn_listener(pool: PgPool, wake_tx: mpsc::Sender<()>) {
        tokio::spawn(async move {
            loop {
                let mut listener = match PgListener::connect_with(&pool).await {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::warn!(error = %e, "Queue listener connect failed, retrying");
                        sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };
                if let Err(e) = listener.listen(NOTIFY_CHANNEL).await {
                    tracing::warn!(error = %e, "Queue listener subscribe failed, retrying");
                    sleep(Duration::from_secs(5)).await;
                    continue;
                }
                loop {
                    match listener.recv().await {
                        Ok(_) => {
                            if wake_tx.try_send(()).is_err() && wake_tx.is_closed() {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Queue listener dropped, reconnecting");
                            break;
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl Queue for PgQueue {
    async fn ensure_topic(&self, _topic: &str) -> Result<(), QueueError> {
        // Topics are just a column value; the table exists via migrations.
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Value) -> Result<Uuid, QueueError> {
        let row = sqlx::query(
            r#"
            INSERT INTO queue_messages (topic, payload)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(topic)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?;
        let id: Uuid = row.get("id");

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(topic)
            .execute(&self.pool)
            .await?;

        tracing::debug!(message_id = %id, topic = topic, "Published message");
        Ok(id)
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionHandle, QueueError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let (wake_tx, mut wake_rx) = mpsc::channel(1);
        Self::spawn_listener(self.pool.clone(), wake_tx);

        let pool = self.pool.clone();
        let topic = topic.to_string();
        let config = self.config.clone();

        let join = tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(config.concurrency));
            let mut last_reap = tokio::time::Instant::now();
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = wake_rx.recv() => {}
                    _ = sleep(config.poll_interval) => {}
                }

                if last_reap.elapsed() >= config.stale_reap_interval {
                    last_reap = tokio::time::Instant::now();
                    match Self::reap_stale(&pool, &topic, config.redelivery).await {
                        Ok(0) => {}
                        Ok(n) => {
                            tracing::warn!(topic = %topic, count = n, "Requeued stale claims")
                        }
                        Err(e) => tracing::error!(error = %e, "Stale claim sweep failed"),
                    }
                }

                loop {
                    let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                        break;
                    };
                    let message = match Self::claim_next(&pool, &topic).await {
                        Ok(Some(message)) => message,
                        Ok(None) => {
                            drop(permit);
                            break;
                        }
                        Err(e) => {
                            tracing::error!(topic = %topic, error = %e, "Failed to claim message");
                            drop(permit);
                            break;
                        }
                    };

                    let pool = pool.clone();
                    let handler = handler.clone();
                    let redelivery = config.redelivery;
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::handle_one(pool, handler, message, redelivery).await;
                    });
                }
            }
            tracing::debug!(topic = %topic, "Subscription loop stopped");
        });

        Ok(SubscriptionHandle::new(shutdown_tx, join))
    }

    /// Counts ready rows only. In-flight claims are excluded, so the value
    /// lags reality; that is fine for progress display.
    async fn depth(&self, topic: &str) -> Result<u64, QueueError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS depth FROM queue_messages WHERE topic = $1 AND status = 'ready'",
        )
        .bind(topic)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("depth") as u64)
    }

    async fn purge(&self, topic: &str) -> Result<(), QueueError> {
        let result = sqlx::query("DELETE FROM queue_messages WHERE topic = $1")
            .bind(topic)
            .execute(&self.pool)
            .await?;
        tracing::warn!(
            topic = topic,
            count = result.rows_affected(),
            "Queue purged"
        );
        Ok(())
    }
}
