// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Comms Gateway - realtime messaging for connected clients.
//!
//! Clients hold one WebSocket each, prove ownership of an address with a
//! signed challenge, then exchange topic-addressed messages with each other
//! and with the cluster bus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          COMMS GATEWAY                                │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  /status  /metrics            /service (WebSocket, binary frames)     │
//! │                                     │                                 │
//! │                        ┌────────────┴────────────┐                    │
//! │                        │         Gateway         │                    │
//! │                        │  open / message / close │                    │
//! │                        └──┬──────────┬────────┬──┘                    │
//! │            LINEAR         │          │ READY  │                       │
//! │   ┌───────────────────────┴──┐  ┌────┴─────┐  │                       │
//! │   │ HandshakeChannel +       │  │  Topic   │  │                       │
//! │   │ challenge / verifier     │  │  Relay   │  │                       │
//! │   └──────────┬───────────────┘  └────┬─────┘  │                       │
//! │              │   AliasRegistry       │        │                       │
//! │              └──────────┬────────────┘        │                       │
//! │                    ┌────┴──────────────────────┴──┐                   │
//! │                    │          Bus Bridge          │                   │
//! │                    └──────────────┬───────────────┘                   │
//! └───────────────────────────────────┼──────────────────────────────────┘
//!                                     │
//!                              Cluster Bus (client-proto.*)
//! ```
//!
//! # Connection lifecycle
//!
//! 1. Open: the gateway sends `ChallengeRequired` and waits up to the
//!    handshake timeout for a `SignedChallengeResponse`.
//! 2. The auth chain is verified; the address gets an alias and the client
//!    gets `Welcome`. A `connect` event goes out on the bus.
//! 3. READY: subscribe, unsubscribe, publish and heartbeat frames.
//! 4. Close: relay memberships are dropped, the alias is released and a
//!    `disconnect` event goes out on the bus.
//!
//! Any failure before READY closes the socket without an error payload.
//!
//! # Usage
//!
//! ```ignore
//! use comms_gateway::{EcdsaChainVerifier, GatewayConfig, MessagingService};
//! use shared_bus::InMemoryMessageBus;
//!
//! let config = GatewayConfig::default();
//! let verifier = Arc::new(EcdsaChainVerifier::new(&config.eth_network));
//! let service = MessagingService::new(config, Arc::new(InMemoryMessageBus::new()), verifier)?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod domain;
pub mod ipc;
pub mod middleware;
pub mod protocol;
pub mod service;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for public API
pub use auth::{
    AuthChain, AuthLink, AuthLinkType, EcdsaChainVerifier, SignatureVerifier, VerificationResult,
};
pub use domain::config::GatewayConfig;
pub use domain::error::{BridgeError, GatewayError, HandshakeError};
pub use domain::types::*;
pub use ipc::BusBridge;
pub use middleware::GatewayMetrics;
pub use service::MessagingService;
pub use ws::{Connection, Gateway, TopicRelay};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
