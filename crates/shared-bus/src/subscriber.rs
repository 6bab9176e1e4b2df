//! # Message Subscriber
//!
//! Defines the subscription side of the bus.

use crate::events::BusMessage;
use crate::subject;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed.
    #[error("Message bus closed")]
    Closed,
}

/// Trait for subscribing to subjects on the bus.
pub trait MessageSubscriber: Send + Sync {
    /// Subscribe to every subject matching `pattern`.
    fn subscribe(&self, pattern: &str) -> Subscription;
}

/// A subscription handle for receiving bus messages.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<BusMessage>,

    /// Subject pattern for this subscription.
    pattern: String,

    /// Reference to subscription tracking (for cleanup).
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(
        receiver: broadcast::Receiver<BusMessage>,
        pattern: String,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    ) -> Self {
        Self {
            receiver,
            pattern,
            subscriptions,
        }
    }

    /// Receive the next message whose subject matches the pattern.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            let message = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(
                        pattern = %self.pattern,
                        lagged = count,
                        "Subscriber lagged, some bus messages dropped"
                    );
                    continue;
                }
            };

            if subject::matches(&self.pattern, &message.subject) {
                return Some(message);
            }
        }
    }

    /// Try to receive the next matching message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available and matched
    /// - `Ok(None)` - No message available
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        loop {
            let message = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if subject::matches(&self.pattern, &message.subject) {
                return Ok(Some(message));
            }
        }
    }

    /// Get the pattern for this subscription.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.pattern) else {
            debug!(pattern = %self.pattern, "Bus subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.pattern);
        }
        debug!(pattern = %self.pattern, "Bus subscription dropped");
    }
}
