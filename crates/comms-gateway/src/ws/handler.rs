//! axum WebSocket driver.
//!
//! Splits the socket into a writer task draining the connection's outbound
//! queue and a reader loop feeding the gateway callbacks.

use super::connection::Connection;
use super::gateway::{Gateway, InboundFrame};
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drives one upgraded socket until it closes
pub struct WebSocketHandler {
    gateway: Arc<Gateway>,
}

impl WebSocketHandler {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Handle a WebSocket connection
    pub async fn handle(self, socket: WebSocket) {
        let (connection, outbound) = self.gateway.connect();
        info!(connection_id = %connection.id(), "New WebSocket connection");

        let (sink, mut stream) = socket.split();
        let writer = tokio::spawn(write_loop(Arc::clone(&connection), sink, outbound));

        let handshake = self.gateway.on_open(&connection);

        loop {
            tokio::select! {
                _ = connection.cancel_token().cancelled() => break,
                message = stream.next() => match message {
                    Some(Ok(Message::Binary(data))) => {
                        self.gateway
                            .on_message(&connection, InboundFrame::Binary(Bytes::from(data)))
                            .await;
                    }
                    Some(Ok(Message::Text(text))) => {
                        self.gateway
                            .on_message(&connection, InboundFrame::Text(text))
                            .await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pongs are answered by the protocol layer
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection_id = %connection.id(), "WebSocket close received");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection_id = %connection.id(), error = %e, "WebSocket error");
                        break;
                    }
                },
            }
        }

        self.gateway.on_close(&connection).await;

        // Both finish promptly once the connection is closed
        if let Err(e) = handshake.await {
            warn!(connection_id = %connection.id(), error = %e, "Handshake task failed");
        }
        if let Err(e) = writer.await {
            warn!(connection_id = %connection.id(), error = %e, "Writer task failed");
        }
    }
}

async fn write_loop(
    connection: Arc<Connection>,
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Bytes>,
) {
    loop {
        tokio::select! {
            biased;
            _ = connection.cancel_token().cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(Message::Binary(frame.to_vec())).await {
                    debug!(connection_id = %connection.id(), error = %e, "Send failed");
                    break;
                }
            }
        }
    }

    connection.close();
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}
