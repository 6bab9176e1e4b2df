//! Connection gateway: the transport callbacks.
//!
//! The transport calls [`Gateway::on_open`], [`Gateway::on_message`] and
//! [`Gateway::on_close`] with the same `Arc<Connection>`. None of them block:
//! the handshake runs on its own task and every send is a non-waiting queue
//! push.

use super::channel::HandshakeChannel;
use super::connection::Connection;
use super::handshake::run_handshake;
use super::relay::TopicRelay;
use crate::auth::SignatureVerifier;
use crate::domain::alias::AliasRegistry;
use crate::domain::error::HandshakeError;
use crate::domain::types::Stage;
use crate::ipc::bus_adapter::BusBridge;
use crate::middleware::metrics::GatewayMetrics;
use crate::protocol::{decode_client, encode_server, ClientMessage, ServerMessage, Welcome};
use bytes::Bytes;
use shared_bus::MessageBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A frame as delivered by the transport
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Binary(Bytes),
    Text(String),
}

/// Shared state behind every client connection
pub struct Gateway {
    aliases: Arc<AliasRegistry>,
    relay: Arc<TopicRelay>,
    bridge: Arc<BusBridge>,
    verifier: Arc<dyn SignatureVerifier>,
    metrics: Arc<GatewayMetrics>,
    handshake_timeout: Duration,
    outbound_buffer: usize,
    /// Parent of every connection's close token
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        verifier: Arc<dyn SignatureVerifier>,
        metrics: Arc<GatewayMetrics>,
        handshake_timeout: Duration,
        outbound_buffer: usize,
    ) -> Self {
        let aliases = Arc::new(AliasRegistry::new());
        let relay = Arc::new(TopicRelay::new(Arc::clone(&metrics)));
        let bridge = Arc::new(BusBridge::new(
            bus,
            Arc::clone(&aliases),
            Arc::clone(&relay),
            Arc::clone(&metrics),
        ));

        Self {
            aliases,
            relay,
            bridge,
            verifier,
            metrics,
            handshake_timeout,
            outbound_buffer,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn aliases(&self) -> &Arc<AliasRegistry> {
        &self.aliases
    }

    pub fn relay(&self) -> &Arc<TopicRelay> {
        &self.relay
    }

    pub fn bridge(&self) -> &Arc<BusBridge> {
        &self.bridge
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// New connection record sized for this gateway's outbound buffer.
    pub fn connect(&self) -> (Arc<Connection>, mpsc::Receiver<Bytes>) {
        Connection::with_cancel(self.outbound_buffer, self.shutdown.child_token())
    }

    /// Cancelled by [`shutdown`](Self::shutdown). Bus loops stop on it too.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Close every connection, current and future.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Socket opened: attach the handshake channel now, so no frame is lost,
    /// then run the handshake on its own task.
    pub fn on_open(self: &Arc<Self>, connection: &Arc<Connection>) -> JoinHandle<()> {
        self.metrics.record_connect();
        let channel = HandshakeChannel::attach(Arc::clone(connection));
        let gateway = Arc::clone(self);
        let connection = Arc::clone(connection);

        tokio::spawn(async move {
            let outcome = run_handshake(
                &connection,
                channel,
                gateway.verifier.as_ref(),
                gateway.handshake_timeout,
            )
            .await;

            match outcome {
                Ok(address) => gateway.complete_handshake(&connection, address).await,
                Err(e) => gateway.fail_handshake(&connection, e),
            }
        })
    }

    async fn complete_handshake(&self, connection: &Arc<Connection>, address: String) {
        if connection.is_closed() || connection.is_finalized() {
            debug!(connection_id = %connection.id(), address = %address, "Handshake finished after close");
            return;
        }

        let alias = self.aliases.assign_or_reuse(&address);
        connection.set_alias(alias);

        // READY first: frames sent right after Welcome must not reach the
        // detached handshake mailbox
        connection.set_ready();
        let welcome = encode_server(ServerMessage::Welcome(Welcome { alias }));
        if !connection.send(welcome) {
            connection.set_linear();
            self.aliases.release(&address);
            self.fail_handshake(connection, HandshakeError::WelcomeNotSent);
            return;
        }

        self.metrics.record_handshake_success();
        info!(
            connection_id = %connection.id(),
            alias,
            address = %address,
            "Peer authenticated"
        );
        self.bridge.peer_connected(&address).await;

        if !connection.mark_connected() {
            // Close-time cleanup ran while connect was being published
            self.aliases.release(&address);
            self.bridge.peer_disconnected(&address).await;
            debug!(connection_id = %connection.id(), alias, "Closed while announcing, disconnect published");
        }
    }

    fn fail_handshake(&self, connection: &Connection, e: HandshakeError) {
        self.metrics.record_handshake_failure(e.kind());
        match &e {
            HandshakeError::AuthenticationFailed(reason) => warn!(
                connection_id = %connection.id(),
                reason = reason.as_deref().unwrap_or("unknown"),
                "Authentication failed"
            ),
            _ => error!(connection_id = %connection.id(), error = %e, "Handshake failed"),
        }
        connection.close();
    }

    /// Inbound frame. LINEAR frames go only to the handshake channel.
    pub async fn on_message(&self, connection: &Arc<Connection>, frame: InboundFrame) {
        let data = match frame {
            InboundFrame::Binary(data) => data,
            InboundFrame::Text(text) => {
                self.metrics.record_incoming(text.len());
                debug!(connection_id = %connection.id(), "protocol error: data is not binary");
                return;
            }
        };
        self.metrics.record_incoming(data.len());

        if connection.is_closed() {
            return;
        }

        match connection.stage() {
            Stage::Linear => HandshakeChannel::enqueue(connection, &data),
            Stage::Ready => self.handle_ready(connection, &data).await,
        }
    }

    async fn handle_ready(&self, connection: &Arc<Connection>, data: &[u8]) {
        let message = match decode_client(data) {
            Ok(message) => message,
            Err(e) => {
                error!(connection_id = %connection.id(), error = %e, "Undecodable frame, closing");
                connection.close();
                return;
            }
        };

        match message {
            ClientMessage::Heartbeat(heartbeat) => {
                if let Some(address) = connection.address() {
                    self.bridge
                        .peer_heartbeat(address, Bytes::from(heartbeat.payload))
                        .await;
                }
            }
            ClientMessage::PublishRequest(request) => {
                self.relay
                    .publish(connection, &request.topics, &request.payload);
            }
            ClientMessage::SubscribeRequest(request) => {
                self.relay.subscribe(connection, &request.topic);
            }
            ClientMessage::UnsubscribeRequest(request) => {
                self.relay.unsubscribe(connection, &request.topic);
            }
            ClientMessage::SignedChallengeResponse(_) => {
                debug!(connection_id = %connection.id(), "Signed challenge response after handshake, ignored");
            }
        }
    }

    /// Socket closed. Safe to call more than once.
    pub async fn on_close(&self, connection: &Arc<Connection>) {
        let Some(connected) = connection.finalize() else {
            return;
        };
        connection.close();
        self.relay.remove_connection(&connection.id());
        self.metrics.record_disconnect();
        if let Some(alias) = connection.alias() {
            self.metrics.clear_buffered_amount(alias);
        }

        // Peers never announced are cleaned up by their handshake task
        let (true, Some(alias), Some(address)) =
            (connected, connection.alias(), connection.address())
        else {
            info!(connection_id = %connection.id(), "WebSocket connection closed");
            return;
        };

        self.aliases.release(address);
        self.bridge.peer_disconnected(address).await;
        info!(
            connection_id = %connection.id(),
            alias,
            address = %address,
            "WebSocket connection closed"
        );
    }
}
