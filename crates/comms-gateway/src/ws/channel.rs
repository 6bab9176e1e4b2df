//! Pull-style reads over a connection's pushed frames.
//!
//! While a connection is LINEAR the transport pushes every inbound frame
//! into [`HandshakeChannel::enqueue`]. The handshake pulls decoded messages
//! with [`HandshakeChannel::read`], racing a deadline.

use super::connection::Connection;
use crate::domain::error::HandshakeError;
use crate::protocol::{decode_client, ClientMessage, DecodeError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handshake-scoped mailbox for one connection.
///
/// Detaches from the connection exactly once: on `close` or on drop,
/// whichever comes first.
pub struct HandshakeChannel {
    connection: Arc<Connection>,
    receiver: mpsc::UnboundedReceiver<Result<ClientMessage, DecodeError>>,
    attached: bool,
}

impl HandshakeChannel {
    /// Attach a fresh mailbox to `connection`. Frames enqueued from now on
    /// are buffered until read.
    pub fn attach(connection: Arc<Connection>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        connection.install_mailbox(sender);
        Self {
            connection,
            receiver,
            attached: true,
        }
    }

    /// Transport side: decode and buffer one raw frame.
    ///
    /// A frame that does not decode is still delivered (as an error) and the
    /// connection is closed. Frames arriving with no channel attached are
    /// dropped.
    pub fn enqueue(connection: &Connection, frame: &[u8]) {
        let Some(mailbox) = connection.mailbox() else {
            debug!(
                connection_id = %connection.id(),
                "Handshake frame with no channel attached, dropped"
            );
            return;
        };

        let decoded = decode_client(frame);
        let failed = decoded.is_err();
        if let Err(e) = &decoded {
            warn!(connection_id = %connection.id(), error = %e, "Undecodable handshake frame");
        }

        // The reader may already be gone; the frame is simply never consumed
        let _ = mailbox.send(decoded);

        if failed {
            connection.close();
        }
    }

    /// Next decoded message, or an error if `timeout` elapses, the connection
    /// closes, or the frame did not decode.
    pub async fn read(&mut self, timeout: Duration) -> Result<ClientMessage, HandshakeError> {
        // Buffered frames win over a close that raced them
        if let Ok(item) = self.receiver.try_recv() {
            return Ok(item?);
        }

        let cancel = self.connection.cancel_token().clone();
        tokio::select! {
            biased;
            item = tokio::time::timeout(timeout, self.receiver.recv()) => match item {
                Ok(Some(decoded)) => Ok(decoded?),
                Ok(None) => Err(HandshakeError::ChannelClosed),
                Err(_) => Err(HandshakeError::Timeout),
            },
            _ = cancel.cancelled() => Err(HandshakeError::ChannelClosed),
        }
    }

    /// Detach from the connection. Idempotent.
    pub fn close(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.connection.take_mailbox();
            self.receiver.close();
            debug!(connection_id = %self.connection.id(), "Handshake channel closed");
        }
    }
}

impl Drop for HandshakeChannel {
    fn drop(&mut self) {
        self.close();
    }
}
