//! Encode/decode for the two client wire families.
//!
//! Pure functions: no allocation pools, no side effects.

use super::messages::{ClientMessage, ClientPacket, ServerMessage, ServerPacket};
use bytes::Bytes;
use prost::Message;

/// A frame that is not a well-formed wire message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not valid protobuf for the packet type
    #[error("malformed frame: {0}")]
    Malformed(#[from] prost::DecodeError),

    /// Well-formed packet carrying no known variant
    #[error("frame carries no known message variant")]
    MissingMessage,
}

pub fn encode_server(message: ServerMessage) -> Bytes {
    Bytes::from(
        ServerPacket {
            message: Some(message),
        }
        .encode_to_vec(),
    )
}

pub fn decode_server(frame: &[u8]) -> Result<ServerMessage, DecodeError> {
    ServerPacket::decode(frame)?
        .message
        .ok_or(DecodeError::MissingMessage)
}

pub fn encode_client(message: ClientMessage) -> Bytes {
    Bytes::from(
        ClientPacket {
            message: Some(message),
        }
        .encode_to_vec(),
    )
}

pub fn decode_client(frame: &[u8]) -> Result<ClientMessage, DecodeError> {
    ClientPacket::decode(frame)?
        .message
        .ok_or(DecodeError::MissingMessage)
}
