//! Challenge-response handshake: LINEAR → READY or LINEAR → closed.

use super::channel::HandshakeChannel;
use super::connection::Connection;
use crate::auth::{AuthChain, SignatureVerifier};
use crate::domain::error::HandshakeError;
use crate::domain::types::normalize_address;
use crate::protocol::{encode_server, ChallengeRequired, ClientMessage, ServerMessage};
use rand::rngs::OsRng;
use rand::RngCore;
use shared_bus::subject;
use std::time::Duration;
use tracing::debug;

/// Prefix of every challenge token
pub const CHALLENGE_PREFIX: &str = "dcl-";

/// Fresh, unpredictable challenge token.
pub fn new_challenge() -> String {
    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);
    format!("{CHALLENGE_PREFIX}{}", hex::encode(nonce))
}

/// Normalize a claimed address and check it is usable as a single bus
/// subject token.
pub fn validate_address(raw: &str) -> Result<String, HandshakeError> {
    let address = normalize_address(raw);
    if !subject::is_literal_token(&address) {
        return Err(HandshakeError::InvalidAddress(address));
    }
    Ok(address)
}

/// Run the handshake over an attached channel.
///
/// On success the connection's address is set and the verified address is
/// returned. The channel is detached on every exit path. The caller closes
/// the connection on error.
pub async fn run_handshake(
    connection: &Connection,
    mut channel: HandshakeChannel,
    verifier: &dyn SignatureVerifier,
    timeout: Duration,
) -> Result<String, HandshakeError> {
    let challenge = new_challenge();
    let frame = encode_server(ServerMessage::ChallengeRequired(ChallengeRequired {
        challenge_to_sign: challenge.clone(),
    }));
    if !connection.send(frame) {
        return Err(HandshakeError::ChallengeNotSent);
    }
    debug!(connection_id = %connection.id(), "Challenge sent");

    let response = match channel.read(timeout).await? {
        ClientMessage::SignedChallengeResponse(response) => response,
        other => return Err(HandshakeError::UnexpectedMessage(other.name())),
    };
    channel.close();

    let chain = AuthChain::from_json(&response.auth_chain_json)
        .map_err(|e| HandshakeError::MalformedAuthChain(e.to_string()))?;
    let claimed = chain
        .claimed_address()
        .ok_or_else(|| HandshakeError::MalformedAuthChain("empty auth chain".into()))?;
    let address = validate_address(claimed)?;

    let result = verifier.verify(&challenge, &chain).await;
    if !result.ok {
        return Err(HandshakeError::AuthenticationFailed(result.message));
    }

    if !connection.set_address(address.clone()) {
        return Err(HandshakeError::MalformedAuthChain(
            "connection already authenticated".into(),
        ));
    }
    Ok(address)
}
