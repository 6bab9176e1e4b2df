//! Client connections: state, handshake, relay and the axum driver.

pub mod channel;
pub mod connection;
pub mod gateway;
pub mod handler;
pub mod handshake;
pub mod relay;

pub use channel::HandshakeChannel;
pub use connection::Connection;
pub use gateway::{Gateway, InboundFrame};
pub use handler::WebSocketHandler;
pub use handshake::{new_challenge, run_handshake, validate_address, CHALLENGE_PREFIX};
pub use relay::TopicRelay;
