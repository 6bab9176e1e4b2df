//! Per-socket state record.
//!
//! Every transport callback receives the same `Arc<Connection>`; nothing is
//! looked up through global listener maps.

use crate::domain::connection_id::ConnectionId;
use crate::domain::types::{Alias, Stage};
use crate::protocol::{ClientMessage, DecodeError};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Decoded handshake frames, in arrival order.
pub(crate) type Mailbox = mpsc::UnboundedSender<Result<ClientMessage, DecodeError>>;

/// Announcement state, guarded together so a close and a `connect`
/// announcement cannot interleave unseen.
#[derive(Debug, Default)]
struct Lifecycle {
    /// `connect` was published for this socket
    connected: bool,
    /// Close-time cleanup has started
    finalized: bool,
}

/// One accepted client socket.
pub struct Connection {
    id: ConnectionId,
    stage: RwLock<Stage>,
    /// 0 until a handshake assigns one
    alias: AtomicU32,
    address: OnceLock<String>,
    outbound: mpsc::Sender<Bytes>,
    /// Present only while a handshake channel is attached
    mailbox: Mutex<Option<Mailbox>>,
    /// Cancelled on close, or when the owning gateway shuts down
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl Connection {
    /// Create a connection whose outbound queue holds at most `capacity` frames.
    ///
    /// The receiver half belongs to the transport writer.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        Self::with_cancel(capacity, CancellationToken::new())
    }

    /// Like [`new`](Self::new), closing when `cancel` is cancelled.
    pub fn with_cancel(
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (outbound, receiver) = mpsc::channel(capacity.max(1));
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            stage: RwLock::new(Stage::Linear),
            alias: AtomicU32::new(0),
            address: OnceLock::new(),
            outbound,
            mailbox: Mutex::new(None),
            cancel,
            lifecycle: Mutex::new(Lifecycle::default()),
        });
        (connection, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn stage(&self) -> Stage {
        *self.stage.read()
    }

    pub(crate) fn set_ready(&self) {
        *self.stage.write() = Stage::Ready;
    }

    pub(crate) fn set_linear(&self) {
        *self.stage.write() = Stage::Linear;
    }

    pub fn alias(&self) -> Option<Alias> {
        match self.alias.load(Ordering::SeqCst) {
            0 => None,
            alias => Some(alias),
        }
    }

    pub(crate) fn set_alias(&self, alias: Alias) {
        self.alias.store(alias, Ordering::SeqCst);
    }

    /// Verified, normalized address. Set once by a successful handshake.
    pub fn address(&self) -> Option<&str> {
        self.address.get().map(String::as_str)
    }

    /// Returns false if an address was already set.
    pub(crate) fn set_address(&self, address: String) -> bool {
        self.address.set(address).is_ok()
    }

    /// Queue a frame without waiting. False if the connection is closed or
    /// its outbound queue is full.
    pub fn send(&self, frame: Bytes) -> bool {
        if self.is_closed() {
            return false;
        }
        self.outbound.try_send(frame).is_ok()
    }

    /// Frames queued but not yet written by the transport.
    pub fn buffered_amount(&self) -> usize {
        self.outbound.max_capacity() - self.outbound.capacity()
    }

    /// Ask the transport to close the socket. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancelled once `close` runs or the gateway shuts down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Record that `connect` was published. False if close-time cleanup
    /// already started, in which case the caller owns the disconnect.
    pub(crate) fn mark_connected(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.finalized {
            return false;
        }
        lifecycle.connected = true;
        true
    }

    /// Start close-time cleanup. `None` for every caller but the first,
    /// which learns whether `connect` had been published.
    pub(crate) fn finalize(&self) -> Option<bool> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.finalized {
            return None;
        }
        lifecycle.finalized = true;
        Some(lifecycle.connected)
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.lifecycle.lock().finalized
    }

    pub(crate) fn install_mailbox(&self, mailbox: Mailbox) {
        *self.mailbox.lock() = Some(mailbox);
    }

    pub(crate) fn take_mailbox(&self) -> Option<Mailbox> {
        self.mailbox.lock().take()
    }

    pub(crate) fn mailbox(&self) -> Option<Mailbox> {
        self.mailbox.lock().clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("stage", &self.stage())
            .field("alias", &self.alias())
            .field("address", &self.address())
            .field("closed", &self.is_closed())
            .finish()
    }
}
