//! Bus bridge: cluster bus ↔ client wire protocol.
//!
//! Inbound bus events are addressed by raw address; clients only know
//! aliases. The bridge rewrites one into the other, drops anything that
//! references a peer not connected to this instance, and broadcasts the
//! result on the topic named by the subject with the bus prefix stripped.
//! Outbound, it publishes peer lifecycle events keyed by verified address.

use crate::domain::alias::AliasRegistry;
use crate::domain::error::BridgeError;
use crate::domain::types::Alias;
use crate::middleware::metrics::GatewayMetrics;
use crate::protocol::{encode_server, IslandChanged, JoinIsland, LeftIsland, ServerMessage};
use crate::ws::relay::TopicRelay;
use bytes::Bytes;
use prost::Message;
use shared_bus::{
    subject, BusEventKind, BusMessage, IslandChangedMessage, JoinIslandMessage,
    LeftIslandMessage, MessageBus, MessagePublisher, MessageSubscriber,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Translates between the cluster bus and connected clients.
pub struct BusBridge {
    bus: Arc<dyn MessageBus>,
    aliases: Arc<AliasRegistry>,
    relay: Arc<TopicRelay>,
    metrics: Arc<GatewayMetrics>,
}

impl BusBridge {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        aliases: Arc<AliasRegistry>,
        relay: Arc<TopicRelay>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            bus,
            aliases,
            relay,
            metrics,
        }
    }

    /// Subscribe to every inbound family and spawn one loop per pattern.
    ///
    /// Subscriptions are live when this returns. Loops stop when `shutdown`
    /// is cancelled or the bus closes.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        BusEventKind::ALL
            .into_iter()
            .map(|kind| {
                let mut subscription = self.bus.subscribe(&kind.pattern());
                let bridge = Arc::clone(self);
                let shutdown = shutdown.clone();

                tokio::spawn(async move {
                    info!(pattern = %subscription.pattern(), "[BusBridge] Started listening");
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            message = subscription.recv() => match message {
                                Some(message) => bridge.dispatch(kind, &message),
                                None => {
                                    warn!(pattern = %subscription.pattern(), "[BusBridge] Bus closed, shutting down");
                                    break;
                                }
                            },
                        }
                    }
                })
            })
            .collect()
    }

    /// Handle one notification; failures only affect this notification.
    pub fn dispatch(&self, kind: BusEventKind, message: &BusMessage) {
        match self.handle(kind, message) {
            Ok(recipients) => {
                self.metrics.record_bus_forwarded();
                debug!(
                    subject = %message.subject,
                    kind = kind.as_str(),
                    recipients,
                    "Bus event forwarded"
                );
            }
            Err(BridgeError::UnknownAlias(address)) => {
                self.metrics.record_bus_dropped();
                debug!(subject = %message.subject, address = %address, "Bus event for unknown peer dropped");
            }
            Err(e) => {
                self.metrics.record_bus_dropped();
                warn!(subject = %message.subject, error = %e, "Bus event dropped");
            }
        }
    }

    /// Translate and broadcast one notification. Returns the number of
    /// clients it reached.
    pub fn handle(&self, kind: BusEventKind, message: &BusMessage) -> Result<usize, BridgeError> {
        let topic = subject::strip_prefix(&message.subject)
            .ok_or_else(|| BridgeError::InvalidSubject(message.subject.clone()))?;

        let outbound = match kind {
            BusEventKind::IslandChanged => {
                let event = IslandChangedMessage::decode(message.data.clone())?;
                let peers = event
                    .peers
                    .iter()
                    .filter_map(|(address, position)| {
                        self.aliases.lookup(address).map(|alias| (alias, *position))
                    })
                    .collect();
                ServerMessage::IslandChanged(IslandChanged {
                    island_id: event.island_id,
                    conn_str: event.conn_str,
                    from_island_id: event.from_island_id,
                    peers,
                })
            }
            BusEventKind::PeerJoin => {
                let event = JoinIslandMessage::decode(message.data.clone())?;
                let peer_id = self.alias_of(&event.peer_id)?;
                ServerMessage::JoinIsland(JoinIsland {
                    island_id: event.island_id,
                    peer_id,
                })
            }
            BusEventKind::PeerLeft => {
                let event = LeftIslandMessage::decode(message.data.clone())?;
                let peer_id = self.alias_of(&event.peer_id)?;
                ServerMessage::LeftIsland(LeftIsland {
                    island_id: event.island_id,
                    peer_id,
                })
            }
        };

        // System-originated: nobody is excluded
        let frame = encode_server(outbound);
        let len = frame.len();
        Ok(self.relay.broadcast(topic, frame, len, None))
    }

    fn alias_of(&self, address: &str) -> Result<Alias, BridgeError> {
        self.aliases
            .lookup(address)
            .ok_or_else(|| BridgeError::UnknownAlias(address.to_string()))
    }

    /// Announce a newly authenticated peer.
    pub async fn peer_connected(&self, address: &str) {
        let receivers = self
            .bus
            .publish(&subject::peer_connect(address), Bytes::new())
            .await;
        debug!(address = %address, receivers, "Published peer connect");
    }

    /// Forward a heartbeat payload verbatim.
    pub async fn peer_heartbeat(&self, address: &str, payload: Bytes) {
        self.bus
            .publish(&subject::peer_heartbeat(address), payload)
            .await;
    }

    /// Announce a peer whose connection closed.
    pub async fn peer_disconnected(&self, address: &str) {
        let receivers = self
            .bus
            .publish(&subject::peer_disconnect(address), Bytes::new())
            .await;
        debug!(address = %address, receivers, "Published peer disconnect");
    }
}
