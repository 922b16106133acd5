//! In-process topic-based publish/subscribe bus.
//!
//! Every subscriber gets its own bounded queue, so a stalled consumer can
//! only lose its own payloads and never blocks the publisher or other
//! subscribers. When a queue is full the newest payload is dropped for that
//! subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};

/// Errors returned by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The bus was shut down and accepts no new subscribers.
    Closed,
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::Closed => write!(f, "Bus is closed"),
        }
    }
}

impl std::error::Error for BusError {}

struct Slot<T> {
    tx: mpsc::Sender<T>,
    dropped: Arc<AtomicU64>,
}

struct Topics<T> {
    closed: bool,
    subscribers: HashMap<String, HashMap<u64, Slot<T>>>,
}

struct Shared<T> {
    topics: RwLock<Topics<T>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl<T> Shared<T> {
    fn remove(&self, topic: &str, id: u64) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slots) = topics.subscribers.get_mut(topic) {
            slots.remove(&id);
            if slots.is_empty() {
                topics.subscribers.remove(topic);
            }
        }
    }
}

/// Topic-keyed broadcaster. Cheap to clone; clones share subscribers.
pub struct Bus<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Bus<T> {
    /// Creates a bus whose subscribers buffer up to `capacity` payloads.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                topics: RwLock::new(Topics {
                    closed: false,
                    subscribers: HashMap::new(),
                }),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Delivers `payload` to every subscriber currently attached to `topic`.
    ///
    /// Never waits. Returns the number of subscribers that accepted it;
    /// publishing to a topic nobody listens on is a no-op.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        let topics = self.shared.topics.read().unwrap_or_else(PoisonError::into_inner);
        let Some(slots) = topics.subscribers.get(topic) else {
            tracing::trace!(topic, "Publish with no subscribers");
            return 0;
        };

        let mut delivered = 0;
        for (id, slot) in slots {
            match slot.tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    slot.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(topic, subscriber = id, "Subscriber queue full, dropping payload");
                }
                // Receiver is mid-release; its slot is about to go away.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Attaches a new subscriber to `topic`.
    ///
    /// The subscription only sees payloads published after this call.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription<T>, BusError> {
        let mut topics = self.shared.topics.write().unwrap_or_else(PoisonError::into_inner);
        if topics.closed {
            return Err(BusError::Closed);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.shared.capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        topics.subscribers.entry(topic.to_string()).or_default().insert(
            id,
            Slot {
                tx,
                dropped: Arc::clone(&dropped),
            },
        );

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            rx,
            shared: Arc::clone(&self.shared),
            dropped,
            released: false,
        })
    }

    /// Number of subscribers attached to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.shared
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .get(topic)
            .map_or(0, HashMap::len)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.shared
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    /// Shuts the bus down.
    ///
    /// Every live subscription ends and later subscribe calls fail.
    pub fn close(&self) {
        let mut topics = self.shared.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics.closed = true;
        topics.subscribers.clear();
        tracing::info!("Bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }
}

/// A live binding to one topic.
///
/// Released by [`Subscription::unsubscribe`] or on drop.
pub struct Subscription<T> {
    id: u64,
    topic: String,
    rx: mpsc::Receiver<T>,
    shared: Arc<Shared<T>>,
    dropped: Arc<AtomicU64>,
    released: bool,
}

impl<T> Subscription<T> {
    /// Waits for the next payload.
    ///
    /// Returns `None` once unsubscribed or after the bus is closed.
    /// Cancel safe.
    pub async fn next(&mut self) -> Option<T> {
        if self.released {
            return None;
        }
        self.rx.recv().await
    }

    /// Detaches from the topic. Idempotent.
    ///
    /// Anything still queued is discarded, so nothing is observed after
    /// this returns.
    pub fn unsubscribe(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.shared.remove(&self.topic, self.id);
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payloads dropped because this subscriber's queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn bus() -> Bus<u32> {
        Bus::new(16)
    }

    async fn assert_idle(sub: &mut Subscription<u32>) {
        assert!(timeout(Duration::from_millis(20), sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_publish_order() {
        let bus = bus();
        let mut sub = bus.subscribe("room").unwrap();

        assert_eq!(bus.publish("room", 1), 1);
        assert_eq!(bus.publish("room", 2), 1);
        assert_eq!(bus.publish("room", 3), 1);

        assert_eq!(sub.next().await, Some(1));
        assert_eq!(sub.next().await, Some(2));
        assert_eq!(sub.next().await, Some(3));
        assert_idle(&mut sub).await;
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_payloads() {
        let bus = bus();
        assert_eq!(bus.publish("room", 1), 0);

        let mut sub = bus.subscribe("room").unwrap();
        bus.publish("room", 2);

        assert_eq!(sub.next().await, Some(2));
        assert_idle(&mut sub).await;
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_a_copy() {
        let bus = bus();
        let mut a = bus.subscribe("room").unwrap();
        let mut b = bus.subscribe("room").unwrap();

        assert_eq!(bus.publish("room", 7), 2);

        assert_eq!(a.next().await, Some(7));
        assert_eq!(b.next().await, Some(7));
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = bus();
        let mut one = bus.subscribe("one").unwrap();
        let mut two = bus.subscribe("two").unwrap();

        bus.publish("one", 1);

        assert_eq!(one.next().await, Some(1));
        assert_idle(&mut two).await;
    }

    #[tokio::test]
    async fn test_no_delivery_after_unsubscribe() {
        let bus = bus();
        let mut sub = bus.subscribe("room").unwrap();

        bus.publish("room", 1);
        sub.unsubscribe();
        bus.publish("room", 2);

        assert!(sub.is_released());
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_restores_count() {
        let bus = bus();
        let _other = bus.subscribe("room").unwrap();
        let before = bus.subscriber_count("room");

        let mut sub = bus.subscribe("room").unwrap();
        assert_eq!(sub.topic(), "room");
        assert_eq!(bus.subscriber_count("room"), before + 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(bus.subscriber_count("room"), before);

        drop(sub);
        assert_eq!(bus.subscriber_count("room"), before);
    }

    #[tokio::test]
    async fn test_drop_releases_and_empty_topic_is_removed() {
        let bus = bus();
        let sub = bus.subscribe("room").unwrap();
        assert_eq!(bus.topic_count(), 1);

        drop(sub);

        assert_eq!(bus.subscriber_count("room"), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_without_blocking() {
        let bus = Bus::new(2);
        let mut stalled = bus.subscribe("room").unwrap();
        let mut healthy = bus.subscribe("room").unwrap();

        assert_eq!(bus.publish("room", 1), 2);
        assert_eq!(healthy.next().await, Some(1));
        assert_eq!(bus.publish("room", 2), 2);
        assert_eq!(healthy.next().await, Some(2));
        assert_eq!(bus.publish("room", 3), 1);
        assert_eq!(healthy.next().await, Some(3));

        assert_eq!(stalled.dropped(), 1);
        assert_eq!(stalled.next().await, Some(1));
        assert_eq!(stalled.next().await, Some(2));
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions_and_rejects_new_ones() {
        let bus = bus();
        let mut sub = bus.subscribe("room").unwrap();

        bus.close();

        assert!(bus.is_closed());
        assert_eq!(sub.next().await, None);
        assert_eq!(bus.subscribe("room").unwrap_err(), BusError::Closed);
        assert_eq!(bus.publish("room", 1), 0);
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_and_publish() {
        let bus = bus();
        let mut handles = Vec::new();

        for _ in 0..8 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let sub = bus.subscribe("room").unwrap();
                    bus.publish("room", 1);
                    drop(sub);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(bus.subscriber_count("room"), 0);
        assert_eq!(bus.topic_count(), 0);
    }
}
