//! Gateway error types.
//!
//! Clients never see these: every per-connection failure ends in an abrupt
//! socket close. They exist for logging, metrics and tests.

use crate::protocol::DecodeError;

/// Reasons a handshake did not reach READY.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The transport did not accept the challenge frame
    #[error("cannot send challenge")]
    ChallengeNotSent,

    /// The transport did not accept the welcome frame
    #[error("cannot send welcome")]
    WelcomeNotSent,

    /// No signed response before the deadline
    #[error("timed out waiting for signed challenge response")]
    Timeout,

    /// The connection closed before a response arrived
    #[error("connection closed during handshake")]
    ChannelClosed,

    /// Any variant other than a signed challenge response
    #[error("invalid protocol: expected signedChallenge, got {0}")]
    UnexpectedMessage(&'static str),

    /// The frame was not a well-formed client message
    #[error("invalid protocol: {0}")]
    Decode(#[from] DecodeError),

    /// The auth chain document could not be used
    #[error("malformed auth chain: {0}")]
    MalformedAuthChain(String),

    /// The claimed address is not usable as an identity
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    /// The verifier rejected the chain
    #[error("authentication failed")]
    AuthenticationFailed(Option<String>),
}

impl HandshakeError {
    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChallengeNotSent | Self::WelcomeNotSent => "send_failure",
            Self::Timeout => "timeout",
            Self::ChannelClosed => "closed",
            Self::UnexpectedMessage(_) | Self::Decode(_) | Self::InvalidAddress(_) => {
                "protocol_violation"
            }
            Self::MalformedAuthChain(_) | Self::AuthenticationFailed(_) => {
                "authentication_failure"
            }
        }
    }
}

/// Failures translating a single bus notification. Never fatal to the subscription.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Payload was not a valid bus message
    #[error("malformed bus payload: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The referenced peer has no alias on this instance
    #[error("no local alias for {0}")]
    UnknownAlias(String),

    /// Subject outside the gateway namespace or of an unknown family
    #[error("unexpected subject: {0}")]
    InvalidSubject(String),
}

/// Gateway-level errors (service lifecycle)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::domain::config::ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(#[from] std::io::Error),
}
