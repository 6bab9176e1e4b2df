//! Configuration loading.
//!
//! Defaults come from [`GatewayConfig::default`]; environment variables
//! override them one by one. Malformed values are logged and ignored.

use comms_gateway::GatewayConfig;
use tracing::{info, warn};

pub const ENV_HOST: &str = "HTTP_SERVER_HOST";
pub const ENV_PORT: &str = "HTTP_SERVER_PORT";
pub const ENV_WS_PATH: &str = "WS_PATH";
pub const ENV_HANDSHAKE_TIMEOUT_MS: &str = "HANDSHAKE_TIMEOUT_MS";
pub const ENV_ETH_NETWORK: &str = "ETH_NETWORK";
pub const ENV_COMMIT_HASH: &str = "COMMIT_HASH";

/// Load configuration from the process environment.
pub fn load_config() -> GatewayConfig {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration from any key lookup.
pub fn load_config_from(lookup: impl Fn(&str) -> Option<String>) -> GatewayConfig {
    let mut config = GatewayConfig::default();

    if let Some(host) = lookup(ENV_HOST) {
        match host.parse() {
            Ok(h) => config.http.host = h,
            Err(_) => warn!(value = %host, "{ENV_HOST} is not an IP address, ignored"),
        }
    }
    if let Some(port) = lookup(ENV_PORT) {
        match port.parse() {
            Ok(p) => config.http.port = p,
            Err(_) => warn!(value = %port, "{ENV_PORT} is not a port number, ignored"),
        }
    }
    if let Some(path) = lookup(ENV_WS_PATH) {
        config.websocket.path = path;
    }
    if let Some(timeout) = lookup(ENV_HANDSHAKE_TIMEOUT_MS) {
        match timeout.parse() {
            Ok(t) => config.handshake.timeout_ms = t,
            Err(_) => warn!(value = %timeout, "{ENV_HANDSHAKE_TIMEOUT_MS} is not a number, ignored"),
        }
    }
    if let Some(network) = lookup(ENV_ETH_NETWORK) {
        config.eth_network = network;
    }
    if let Some(commit) = lookup(ENV_COMMIT_HASH) {
        if !commit.is_empty() {
            info!(commit_hash = %commit, "Loaded commit hash from environment");
            config.commit_hash = Some(commit);
        }
    }

    config
}
