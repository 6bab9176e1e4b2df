//! Built-in ECDSA auth chain verifier.
//!
//! Walks the chain from the `SIGNER` link, recovering each EIP-191
//! `personal_sign` signature with secp256k1 and checking it against the
//! current authority. Ephemeral links hand authority to a short-lived key.

use super::{AuthChain, AuthLinkType, SignatureVerifier, VerificationResult};
use crate::domain::types::normalize_address;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, VerifyOnly};
use sha3::{Digest, Keccak256};
use tracing::debug;

const EPHEMERAL_ADDRESS_PREFIX: &str = "Ephemeral address:";
const EXPIRATION_PREFIX: &str = "Expiration:";

/// Verifies `SIGNER → ECDSA_EPHEMERAL* → ECDSA_SIGNED_ENTITY` chains offline.
pub struct EcdsaChainVerifier {
    secp: Secp256k1<VerifyOnly>,
    network: String,
}

impl EcdsaChainVerifier {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            secp: Secp256k1::verification_only(),
            network: network.into(),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    fn check(
        &self,
        expected_payload: &str,
        chain: &AuthChain,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let (first, rest) = chain
            .links()
            .split_first()
            .ok_or_else(|| "empty auth chain".to_string())?;

        if first.kind != AuthLinkType::Signer {
            return Err("auth chain must start with a SIGNER link".into());
        }
        let Some((last, middle)) = rest.split_last() else {
            return Err("auth chain has no signed entity".into());
        };

        let mut authority = normalize_address(&first.payload);

        for link in middle {
            match link.kind {
                AuthLinkType::EcdsaEphemeral => {
                    let signer = self.recover(&link.payload, &link.signature)?;
                    if signer != authority {
                        return Err(format!(
                            "ephemeral link signed by {signer}, expected {authority}"
                        ));
                    }
                    let (ephemeral, expiration) = parse_ephemeral_payload(&link.payload)?;
                    if expiration <= now {
                        return Err(format!("ephemeral key expired at {expiration}"));
                    }
                    authority = ephemeral;
                }
                AuthLinkType::EcdsaEip1654Ephemeral | AuthLinkType::EcdsaEip1654SignedEntity => {
                    return Err("EIP-1654 links need an RPC provider".into());
                }
                AuthLinkType::Signer | AuthLinkType::EcdsaSignedEntity => {
                    return Err(format!("unexpected {:?} link inside the chain", link.kind));
                }
            }
        }

        match last.kind {
            AuthLinkType::EcdsaSignedEntity => {}
            AuthLinkType::EcdsaEip1654SignedEntity => {
                return Err("EIP-1654 links need an RPC provider".into());
            }
            other => return Err(format!("auth chain ends with {other:?}")),
        }
        if last.payload != expected_payload {
            return Err("signed entity does not match the challenge".into());
        }
        let signer = self.recover(&last.payload, &last.signature)?;
        if signer != authority {
            return Err(format!(
                "signed entity signed by {signer}, expected {authority}"
            ));
        }
        Ok(())
    }

    /// Recover the lower-case `0x` address that `personal_sign`ed `message`.
    fn recover(&self, message: &str, signature: &str) -> Result<String, String> {
        let raw = hex::decode(signature.trim_start_matches("0x"))
            .map_err(|e| format!("signature is not hex: {e}"))?;
        if raw.len() != 65 {
            return Err(format!("signature must be 65 bytes, got {}", raw.len()));
        }

        let v = match raw[64] {
            0 | 27 => 0,
            1 | 28 => 1,
            other => return Err(format!("invalid recovery byte: {other}")),
        };
        let rec_id = RecoveryId::from_i32(v).map_err(|e| format!("invalid recovery id: {e}"))?;
        let signature = RecoverableSignature::from_compact(&raw[..64], rec_id)
            .map_err(|e| format!("invalid signature: {e}"))?;
        let digest = Message::from_digest(eip191_hash(message));
        let public_key = self
            .secp
            .recover_ecdsa(&digest, &signature)
            .map_err(|e| format!("signature recovery failed: {e}"))?;

        Ok(address_of(&public_key))
    }
}

#[async_trait]
impl SignatureVerifier for EcdsaChainVerifier {
    async fn verify(&self, expected_payload: &str, chain: &AuthChain) -> VerificationResult {
        match self.check(expected_payload, chain, Utc::now()) {
            Ok(()) => VerificationResult::ok(),
            Err(reason) => {
                debug!(network = %self.network, %reason, "Auth chain rejected");
                VerificationResult::rejected(reason)
            }
        }
    }
}

/// Keccak-256 of the EIP-191 prefixed message.
fn eip191_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Lower-case `0x` Ethereum address of a public key.
pub fn address_of(public_key: &PublicKey) -> String {
    let uncompressed = public_key.serialize_uncompressed();
    let mut hasher = Keccak256::new();
    hasher.update(&uncompressed[1..]); // Skip the 0x04 prefix
    let hash = hasher.finalize();
    format!("0x{}", hex::encode(&hash[12..]))
}

/// EIP-191 `personal_sign`: 65-byte `r || s || v` hex signature, `v` in {27, 28}.
pub fn personal_sign(secret_key: &SecretKey, message: &str) -> String {
    let secp = Secp256k1::signing_only();
    let digest = Message::from_digest(eip191_hash(message));
    let (rec_id, compact) = secp
        .sign_ecdsa_recoverable(&digest, secret_key)
        .serialize_compact();

    let mut raw = [0u8; 65];
    raw[..64].copy_from_slice(&compact);
    raw[64] = 27 + rec_id.to_i32() as u8;
    format!("0x{}", hex::encode(raw))
}

/// Payload an owner signs to delegate to an ephemeral key.
pub fn ephemeral_payload(ephemeral_address: &str, expiration: DateTime<Utc>) -> String {
    format!(
        "Decentraland Login\n{EPHEMERAL_ADDRESS_PREFIX} {ephemeral_address}\n{EXPIRATION_PREFIX} {}",
        expiration.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

fn parse_ephemeral_payload(payload: &str) -> Result<(String, DateTime<Utc>), String> {
    let mut address = None;
    let mut expiration = None;

    for line in payload.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix(EPHEMERAL_ADDRESS_PREFIX) {
            address = Some(normalize_address(value));
        } else if let Some(value) = line.strip_prefix(EXPIRATION_PREFIX) {
            let parsed = DateTime::parse_from_rfc3339(value.trim())
                .map_err(|e| format!("invalid expiration: {e}"))?;
            expiration = Some(parsed.with_timezone(&Utc));
        }
    }

    match (address, expiration) {
        (Some(address), Some(expiration)) if !address.is_empty() => Ok((address, expiration)),
        _ => Err("ephemeral payload missing address or expiration".into()),
    }
}
