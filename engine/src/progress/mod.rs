//! Progress Broadcaster
//!
//! Bridges pipeline execution to a streaming consumer: the orchestrator
//! publishes one status event per stage into a per-session queue, and a
//! single consumer drains the queue until the stream-complete sentinel
//! arrives, at which point the queue is removed from the registry.
//!
//! Delivery is FIFO within a session; there is no cross-session ordering.
//! Queues are unbounded and a slow consumer never blocks the producer.
//! If no consumer ever subscribes, a session's queue stays registered and
//! keeps accumulating events until something drains it past the sentinel.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Events that can be published for a session's progress stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Human-readable stage status line
    Status(String),

    /// Stream-complete sentinel; exactly one per pipeline invocation
    Done,
}

struct SessionQueue {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    /// Taken by the first subscriber; a session has one consumer.
    rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
}

impl SessionQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

type QueueRegistry = Arc<Mutex<HashMap<String, SessionQueue>>>;

/// Registry mapping session ids to their progress queues.
///
/// Cloning yields another handle on the same registry; subscriptions keep
/// the registry alive so the sentinel can deregister the queue.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    queues: QueueRegistry,
}

impl ProgressBroadcaster {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Enqueue an event for the session, lazily creating its queue.
    pub async fn publish(&self, session_id: &str, event: ProgressEvent) {
        let mut queues = self.queues.lock().await;
        let queue = queues
            .entry(session_id.to_string())
            .or_insert_with(SessionQueue::new);
        // The receiver may already have been taken and dropped by a
        // disconnected consumer; such events are simply lost.
        let _ = queue.tx.send(event);
    }

    /// Obtain the consumer handle for the session, lazily creating its
    /// queue. Only the first subscriber receives events; a later call for
    /// the same live queue yields an already-finished subscription.
    pub async fn subscribe(&self, session_id: &str) -> ProgressSubscription {
        let mut queues = self.queues.lock().await;
        let queue = queues
            .entry(session_id.to_string())
            .or_insert_with(SessionQueue::new);
        ProgressSubscription {
            session_id: session_id.to_string(),
            rx: queue.rx.take(),
            queues: Arc::clone(&self.queues),
        }
    }

    /// Whether a queue is currently registered for the session.
    pub async fn is_registered(&self, session_id: &str) -> bool {
        self.queues.lock().await.contains_key(session_id)
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-consumer handle over one session's progress queue.
pub struct ProgressSubscription {
    session_id: String,
    rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
    queues: QueueRegistry,
}

impl ProgressSubscription {
    /// Await the next status line.
    ///
    /// Returns `None` once the sentinel has been consumed; at that point
    /// the session's queue has been removed from the registry and any
    /// subsequent publish starts a fresh queue.
    pub async fn next(&mut self) -> Option<String> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Some(ProgressEvent::Status(line)) => Some(line),
            Some(ProgressEvent::Done) | None => {
                self.rx = None;
                let mut queues = self.queues.lock().await;
                queues.remove(&self.session_id);
                tracing::debug!(session_id = %self.session_id, "progress stream closed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_then_subscribe_is_fifo() {
        let bus = Arc::new(ProgressBroadcaster::new());
        bus.publish("s1", ProgressEvent::Status("one".into())).await;
        bus.publish("s1", ProgressEvent::Status("two".into())).await;
        bus.publish("s1", ProgressEvent::Done).await;

        let mut sub = bus.subscribe("s1").await;
        assert_eq!(sub.next().await.as_deref(), Some("one"));
        assert_eq!(sub.next().await.as_deref(), Some("two"));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sentinel_deregisters_queue() {
        let bus = Arc::new(ProgressBroadcaster::new());
        bus.publish("s1", ProgressEvent::Done).await;
        assert!(bus.is_registered("s1").await);

        let mut sub = bus.subscribe("s1").await;
        assert!(sub.next().await.is_none());
        assert!(!bus.is_registered("s1").await);

        // Finished subscriptions stay finished.
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_before_publish() {
        let bus = Arc::new(ProgressBroadcaster::new());
        let mut sub = bus.subscribe("s1").await;

        let producer = Arc::clone(&bus);
        let handle = tokio::spawn(async move {
            producer
                .publish("s1", ProgressEvent::Status("live".into()))
                .await;
            producer.publish("s1", ProgressEvent::Done).await;
        });

        assert_eq!(sub.next().await.as_deref(), Some("live"));
        assert!(sub.next().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let bus = Arc::new(ProgressBroadcaster::new());
        bus.publish("a", ProgressEvent::Status("for a".into())).await;
        bus.publish("b", ProgressEvent::Status("for b".into())).await;
        bus.publish("a", ProgressEvent::Done).await;
        bus.publish("b", ProgressEvent::Done).await;

        let mut sub_a = bus.subscribe("a").await;
        let mut sub_b = bus.subscribe("b").await;
        assert_eq!(sub_a.next().await.as_deref(), Some("for a"));
        assert_eq!(sub_b.next().await.as_deref(), Some("for b"));
        assert!(sub_a.next().await.is_none());
        assert!(sub_b.next().await.is_none());
    }

    #[tokio::test]
    async fn test_second_subscriber_gets_finished_handle() {
        let bus = Arc::new(ProgressBroadcaster::new());
        let _first = bus.subscribe("s1").await;
        let mut second = bus.subscribe("s1").await;
        assert!(second.next().await.is_none());
    }
}
