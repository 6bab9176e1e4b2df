//! Authentication chains and the signature verifier seam.
//!
//! The handshake only needs a yes/no answer for "does this chain prove
//! ownership of its first address and sign this challenge". Anything that
//! can answer that plugs in behind [`SignatureVerifier`].

pub mod ecdsa;

pub use ecdsa::{address_of, ephemeral_payload, personal_sign, EcdsaChainVerifier};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kind of a single link in an auth chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthLinkType {
    #[serde(rename = "SIGNER")]
    Signer,
    #[serde(rename = "ECDSA_EPHEMERAL")]
    EcdsaEphemeral,
    #[serde(rename = "ECDSA_SIGNED_ENTITY")]
    EcdsaSignedEntity,
    #[serde(rename = "ECDSA_EIP_1654_EPHEMERAL")]
    EcdsaEip1654Ephemeral,
    #[serde(rename = "ECDSA_EIP_1654_SIGNED_ENTITY")]
    EcdsaEip1654SignedEntity,
}

/// One link of an auth chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthLink {
    #[serde(rename = "type")]
    pub kind: AuthLinkType,
    pub payload: String,
    #[serde(default)]
    pub signature: String,
}

impl AuthLink {
    pub fn signer(address: impl Into<String>) -> Self {
        Self {
            kind: AuthLinkType::Signer,
            payload: address.into(),
            signature: String::new(),
        }
    }
}

/// Ordered proof document linking a signature to a claimed address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthChain(pub Vec<AuthLink>);

impl AuthChain {
    pub fn new(links: Vec<AuthLink>) -> Self {
        Self(links)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        // A Vec of plain string fields cannot fail to serialize
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn links(&self) -> &[AuthLink] {
        &self.0
    }

    /// Address claimed by the first link, as written.
    pub fn claimed_address(&self) -> Option<&str> {
        self.0.first().map(|link| link.payload.as_str())
    }
}

/// Verifier verdict. `message` is a diagnostic for server logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub ok: bool,
    pub message: Option<String>,
}

impl VerificationResult {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// Checks that `chain` proves ownership of its first address and that its
/// final link signs `expected_payload`.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, expected_payload: &str, chain: &AuthChain) -> VerificationResult;
}
