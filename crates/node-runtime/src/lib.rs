//! # Node Runtime
//!
//! Process bootstrap for the comms gateway: configuration from the
//! environment and service wiring. The binary in `main.rs` only adds logging
//! and signal handling on top.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use comms_gateway::{EcdsaChainVerifier, GatewayConfig, MessagingService};
use shared_bus::InMemoryMessageBus;
use tracing::info;

/// Build the messaging service with the in-process bus and the built-in
/// ECDSA verifier.
pub fn build_service(config: GatewayConfig) -> Result<MessagingService> {
    info!(
        host = %config.http.host,
        port = config.http.port,
        eth_network = %config.eth_network,
        "Creating messaging service"
    );

    let bus = Arc::new(InMemoryMessageBus::new());
    let verifier = Arc::new(EcdsaChainVerifier::new(config.eth_network.clone()));

    MessagingService::new(config, bus, verifier).context("invalid gateway configuration")
}
