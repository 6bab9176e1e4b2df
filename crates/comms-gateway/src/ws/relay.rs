//! Topic relay: broadcast groups keyed by topic.

use super::connection::Connection;
use crate::domain::connection_id::ConnectionId;
use crate::domain::types::SYSTEM_ALIAS;
use crate::middleware::metrics::GatewayMetrics;
use crate::protocol::{encode_server, ServerMessage, SubscriptionMessage};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Topic membership and fan-out
pub struct TopicRelay {
    /// Members by topic
    topics: DashMap<String, HashMap<ConnectionId, Arc<Connection>>>,
    /// Topics by connection, for cleanup on close
    by_connection: DashMap<ConnectionId, HashSet<String>>,
    metrics: Arc<GatewayMetrics>,
}

impl TopicRelay {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            topics: DashMap::new(),
            by_connection: DashMap::new(),
            metrics,
        }
    }

    /// Join `topic`. Returns false if already a member.
    pub fn subscribe(&self, connection: &Arc<Connection>, topic: &str) -> bool {
        let id = connection.id();
        let added = self
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(id, Arc::clone(connection))
            .is_none();
        self.by_connection
            .entry(id)
            .or_default()
            .insert(topic.to_string());

        if added {
            debug!(connection_id = %id, topic = %topic, "Subscribed");
        }
        added
    }

    /// Leave `topic`. Returns false if not a member.
    pub fn unsubscribe(&self, connection: &Connection, topic: &str) -> bool {
        let id = connection.id();
        let removed = self
            .topics
            .get_mut(topic)
            .map(|mut members| members.remove(&id).is_some())
            .unwrap_or(false);
        self.topics.remove_if(topic, |_, members| members.is_empty());

        if let Some(mut topics) = self.by_connection.get_mut(&id) {
            topics.remove(topic);
        }

        if removed {
            debug!(connection_id = %id, topic = %topic, "Unsubscribed");
        }
        removed
    }

    /// Relay `payload` to every topic in `topics`, stamped with the sender's
    /// alias. Duplicates each produce their own broadcast. The sender never
    /// receives its own message. Returns the total number of deliveries.
    pub fn publish(&self, sender: &Connection, topics: &[String], payload: &[u8]) -> usize {
        let alias = sender.alias().unwrap_or(SYSTEM_ALIAS);
        topics
            .iter()
            .map(|topic| {
                let frame = encode_server(ServerMessage::SubscriptionMessage(
                    SubscriptionMessage {
                        sender: alias,
                        topic: topic.clone(),
                        body: payload.to_vec(),
                    },
                ));
                self.broadcast(topic, frame, payload.len(), Some(sender.id()))
            })
            .sum()
    }

    /// Send an encoded frame to every member of `topic` except `exclude`.
    ///
    /// Failed sends never close the recipient; its backlog is recorded
    /// instead. Returns the number of successful deliveries.
    pub fn broadcast(
        &self,
        topic: &str,
        frame: Bytes,
        payload_len: usize,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let recipients: Vec<Arc<Connection>> = match self.topics.get(topic) {
            Some(members) => members
                .iter()
                .filter(|(id, _)| Some(**id) != exclude)
                .map(|(_, connection)| Arc::clone(connection))
                .collect(),
            None => Vec::new(),
        };

        let mut delivered = 0;
        for recipient in recipients {
            if recipient.send(frame.clone()) {
                delivered += 1;
                continue;
            }
            if recipient.is_closed() {
                continue;
            }
            let buffered = recipient.buffered_amount();
            warn!(
                connection_id = %recipient.id(),
                topic = %topic,
                buffered,
                "Outbound queue full, frame dropped"
            );
            if let Some(alias) = recipient.alias() {
                self.metrics.observe_buffered_amount(alias, buffered);
            }
        }

        self.metrics.record_outgoing(delivered, payload_len);
        debug!(topic = %topic, recipients = delivered, "Broadcast");
        delivered
    }

    /// Drop every membership of a closed connection.
    pub fn remove_connection(&self, id: &ConnectionId) {
        let Some((_, topics)) = self.by_connection.remove(id) else {
            return;
        };
        for topic in &topics {
            if let Some(mut members) = self.topics.get_mut(topic) {
                members.remove(id);
            }
            self.topics.remove_if(topic, |_, members| members.is_empty());
        }
        debug!(connection_id = %id, topics = topics.len(), "Removed all subscriptions for connection");
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|m| m.len()).unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}
