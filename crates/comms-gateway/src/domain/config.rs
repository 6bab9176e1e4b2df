//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 5000;

/// Default signed challenge deadline
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 1000;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration (status, metrics and the WebSocket upgrade)
    pub http: HttpConfig,
    /// WebSocket endpoint configuration
    pub websocket: WebSocketConfig,
    /// Handshake configuration
    pub handshake: HandshakeConfig,
    /// Ethereum network the signature verifier targets
    pub eth_network: String,
    /// Build commit reported by `/status`
    pub commit_hash: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            websocket: WebSocketConfig::default(),
            handshake: HandshakeConfig::default(),
            eth_network: "mainnet".to_string(),
            commit_hash: None,
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if !self.websocket.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.websocket.path.clone()));
        }

        if self.websocket.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        if self.websocket.outbound_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "outbound_buffer cannot be 0".into(),
            ));
        }

        if self.handshake.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "handshake timeout cannot be 0".into(),
            ));
        }

        if self.eth_network.trim().is_empty() {
            return Err(ConfigError::Invalid("eth_network cannot be empty".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 5000)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: DEFAULT_PORT,
        }
    }
}

/// WebSocket endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Upgrade path
    pub path: String,
    /// Maximum inbound frame size in bytes
    pub max_message_size: usize,
    /// Outbound frames queued per connection before sends are rejected
    pub outbound_buffer: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: "/service".to_string(),
            max_message_size: 1024 * 1024,
            outbound_buffer: 1024,
        }
    }
}

/// Handshake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Deadline for the signed challenge response, in milliseconds
    pub timeout_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

impl HandshakeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Port 0 is not a valid listen port
    #[error("invalid port: 0")]
    InvalidPort,
    /// WebSocket path must be absolute
    #[error("invalid websocket path: {0}")]
    InvalidPath(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
