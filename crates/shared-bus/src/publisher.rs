//! # Message Publisher
//!
//! Defines the publishing side of the bus and the in-memory implementation.

use crate::events::BusMessage;
use crate::subject;
use crate::subscriber::{MessageSubscriber, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing messages to the bus.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish `data` on a literal `subject`.
    ///
    /// # Returns
    ///
    /// The number of active subscriptions the message was handed to.
    async fn publish(&self, subject: &str, data: Bytes) -> usize;

    /// Get the total number of messages published.
    fn messages_published(&self) -> u64;
}

/// A full bus: can publish and subscribe.
pub trait MessageBus: MessagePublisher + MessageSubscriber {}

impl<T: MessagePublisher + MessageSubscriber> MessageBus for T {}

/// In-memory implementation of the bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Suitable for a single gateway instance and for tests; a clustered
/// deployment plugs a networked bus in behind the same traits.
pub struct InMemoryMessageBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Active subscription count by pattern.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Get the number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of live subscriptions for an exact pattern.
    #[must_use]
    pub fn pattern_subscriptions(&self, pattern: &str) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.get(pattern).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSubscriber for InMemoryMessageBus {
    fn subscribe(&self, pattern: &str) -> Subscription {
        let receiver = self.sender.subscribe();

        // Track subscription
        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(pattern.to_string()).or_insert(0) += 1;
        }

        debug!(pattern = %pattern, "New bus subscription");

        Subscription::new(receiver, pattern.to_string(), self.subscriptions.clone())
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn publish(&self, subject_name: &str, data: Bytes) -> usize {
        if subject::has_wildcards(subject_name) {
            warn!(subject = %subject_name, "Refusing to publish on a wildcard subject");
            return 0;
        }

        // Always increment counter (publish was attempted)
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(BusMessage::new(subject_name, data)) {
            Ok(receiver_count) => {
                debug!(
                    subject = %subject_name,
                    receivers = receiver_count,
                    "Bus message published"
                );
                receiver_count
            }
            Err(_) => {
                // No receivers - message is dropped
                debug!(subject = %subject_name, "Bus message dropped (no receivers)");
                0
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
