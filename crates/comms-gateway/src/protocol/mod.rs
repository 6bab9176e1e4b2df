//! Client wire protocol: message types and codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_client, decode_server, encode_client, encode_server, DecodeError};
pub use messages::*;
