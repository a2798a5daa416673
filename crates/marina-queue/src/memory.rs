//! In-memory queue
//!
//! Single-process transport for tests and local runs. Claimed messages carry
//! a redelivery deadline; a handler that nacks (or never finishes) sees the
//! message again once the deadline lapses. `depth` is exact here.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::QueueError;
use crate::{Message, MessageHandler, Queue, SubscriptionHandle};

#[derive(Debug, Clone)]
pub struct MemoryQueueConfig {
    pub redelivery: Duration,
    pub poll_interval: Duration,
    pub concurrency: usize,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            redelivery: Duration::from_secs(300),
            poll_interval: Duration::from_millis(20),
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: Uuid,
    payload: Value,
    delivery_count: u32,
}

#[derive(Default)]
struct TopicState {
    ready: VecDeque<StoredMessage>,
    inflight: HashMap<Uuid, (StoredMessage, Instant)>,
}

type Topics = Arc<Mutex<HashMap<String, TopicState>>>;

pub struct MemoryQueue {
    topics: Topics,
    notify: Arc<Notify>,
    config: MemoryQueueConfig,
}

impl MemoryQueue {
    pub fn new(config: MemoryQueueConfig) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            notify: Arc::new(Notify::new()),
            config,
        }
    }

    /// Requeue expired in-flight messages, then claim the next ready one.
    fn claim(topics: &Topics, topic: &str, redelivery: Duration) -> Option<Message> {
        let mut topics = topics.lock().unwrap_or_else(|e| e.into_inner());
        let state = topics.get_mut(topic)?;

        let now = Instant::now();
        let expired: Vec<Uuid> = state
            .inflight
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some((message, _)) = state.inflight.remove(&id) {
                tracing::warn!(message_id = %id, topic = topic, "Redelivering expired message");
                state.ready.push_back(message);
            }
        }

        let mut message = state.ready.pop_front()?;
        message.delivery_count += 1;
        state
            .inflight
            .insert(message.id, (message.clone(), now + redelivery));

        Some(Message {
            id: message.id,
            topic: topic.to_string(),
            payload: message.payload,
            delivery_count: message.delivery_count,
        })
    }

    fn ack(topics: &Topics, topic: &str, id: Uuid) {
        let mut topics = topics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = topics.get_mut(topic) {
            state.inflight.remove(&id);
        }
    }

    fn nack(topics: &Topics, topic: &str, id: Uuid, redelivery: Duration) {
        let mut topics = topics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = topics.get_mut(topic) {
            if let Some(entry) = state.inflight.get_mut(&id) {
                entry.1 = Instant::now() + redelivery;
            }
        }
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn ensure_topic(&self, topic: &str) -> Result<(), QueueError> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.entry(topic.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Value) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        {
            let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
            topics
                .entry(topic.to_string())
                .or_default()
                .ready
                .push_back(StoredMessage {
                    id,
                    payload,
                    delivery_count: 0,
                });
        }
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionHandle, QueueError> {
        self.ensure_topic(topic).await?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let topics = self.topics.clone();
        let notify = self.notify.clone();
        let topic = topic.to_string();
        let config = self.config.clone();

        let join = tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(config.concurrency));
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = notify.notified() => {}
                    _ = sleep(config.poll_interval) => {}
                }

                loop {
                    let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                        break;
                    };
                    let Some(message) = Self::claim(&topics, &topic, config.redelivery) else {
                        drop(permit);
                        break;
                    };

                    let handler = handler.clone();
                    let topics = topics.clone();
                    let topic = topic.clone();
                    let redelivery = config.redelivery;
                    tokio::spawn(async move {
                        let _permit = permit;
                        match handler.handle(&message).await {
                            Ok(()) => Self::ack(&topics, &topic, message.id),
                            Err(e) if e.is_recoverable() => {
                                tracing::warn!(
                                    message_id = %message.id,
                                    topic = %topic,
                                    error = %e,
                                    "Handler failed, message will be redelivered"
                                );
                                Self::nack(&topics, &topic, message.id, redelivery);
                            }
                            Err(e) => {
                                tracing::error!(
                                    message_id = %message.id,
                                    topic = %topic,
                                    error = %e,
                                    "Handler failed unrecoverably, dropping message"
                                );
                                Self::ack(&topics, &topic, message.id);
                            }
                        }
                    });
                }
            }
            tracing::debug!(topic = %topic, "Subscription loop stopped");
        });

        Ok(SubscriptionHandle::new(shutdown_tx, join))
    }

    async fn depth(&self, topic: &str) -> Result<u64, QueueError> {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let state = topics
            .get(topic)
            .ok_or_else(|| QueueError::UnknownTopic(topic.to_string()))?;
        Ok((state.ready.len() + state.inflight.len()) as u64)
    }

    async fn purge(&self, topic: &str) -> Result<(), QueueError> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.insert(topic.to_string(), TopicState::default());
        tracing::warn!(topic = topic, "Queue purged, in-flight messages dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marina_core::TaskError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> MemoryQueueConfig {
        MemoryQueueConfig {
            redelivery: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            concurrency: 4,
        }
    }

    struct CountingHandler {
        calls: AtomicU32,
        fail_first: bool,
        recoverable: bool,
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, _message: &Message) -> Result<(), TaskError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 && self.fail_first {
                let err = anyhow::anyhow!("induced failure");
                return Err(if self.recoverable {
                    TaskError::recoverable(err)
                } else {
                    TaskError::unrecoverable(err)
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_then_consume_acks() {
        let queue = MemoryQueue::new(fast_config());
        queue.publish("t", json!({"n": 1})).await.unwrap();

        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: false,
            recoverable: false,
        });
        let sub = queue.subscribe("t", handler.clone()).await.unwrap();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.depth("t").await.unwrap(), 0);
        sub.close().await;
    }

    #[tokio::test]
    async fn recoverable_failure_redelivers() {
        let queue = MemoryQueue::new(fast_config());
        queue.publish("t", json!({"n": 1})).await.unwrap();

        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: true,
            recoverable: true,
        });
        let sub = queue.subscribe("t", handler.clone()).await.unwrap();

        sleep(Duration::from_millis(300)).await;
        assert!(handler.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(queue.depth("t").await.unwrap(), 0);
        sub.close().await;
    }

    #[tokio::test]
    async fn unrecoverable_failure_drops_message() {
        let queue = MemoryQueue::new(fast_config());
        queue.publish("t", json!({"n": 1})).await.unwrap();

        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: true,
            recoverable: false,
        });
        let sub = queue.subscribe("t", handler.clone()).await.unwrap();

        sleep(Duration::from_millis(300)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.depth("t").await.unwrap(), 0);
        sub.close().await;
    }

    #[tokio::test]
    async fn ensure_topic_is_idempotent() {
        let queue = MemoryQueue::new(fast_config());
        queue.ensure_topic("t").await.unwrap();
        queue.ensure_topic("t").await.unwrap();
        assert_eq!(queue.depth("t").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn depth_counts_ready_and_unknown_topic_errors() {
        let queue = MemoryQueue::new(fast_config());
        queue.publish("t", json!({"n": 1})).await.unwrap();
        queue.publish("t", json!({"n": 2})).await.unwrap();
        assert_eq!(queue.depth("t").await.unwrap(), 2);
        assert!(matches!(
            queue.depth("missing").await,
            Err(QueueError::UnknownTopic(_))
        ));
    }

    #[tokio::test]
    async fn purge_drops_everything() {
        let queue = MemoryQueue::new(fast_config());
        queue.publish("t", json!({"n": 1})).await.unwrap();
        queue.purge("t").await.unwrap();
        assert_eq!(queue.depth("t").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn closed_subscription_stops_consuming() {
        let queue = MemoryQueue::new(fast_config());
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            fail_first: false,
            recoverable: false,
        });
        let sub = queue.subscribe("t", handler.clone()).await.unwrap();
        sub.close().await;

        queue.publish("t", json!({"n": 1})).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.depth("t").await.unwrap(), 1);
    }
}
