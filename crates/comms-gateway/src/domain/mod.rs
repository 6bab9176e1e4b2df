//! Domain types for the messaging gateway.
//!
//! Configuration, identities, the alias registry and error types.

pub mod alias;
pub mod config;
pub mod connection_id;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use alias::AliasRegistry;
pub use config::{ConfigError, GatewayConfig};
pub use connection_id::ConnectionId;
pub use error::{BridgeError, GatewayError, HandshakeError};
pub use types::*;
