//! Shared fixtures for unit tests.

use crate::auth::{AuthChain, SignatureVerifier, VerificationResult};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use shared_bus::{InMemoryMessageBus, MessagePublisher, MessageSubscriber, Subscription};
use std::sync::Arc;
use tokio::sync::Notify;

/// Verifier with a fixed verdict that records the challenges it saw.
pub struct StaticVerifier {
    verdict: VerificationResult,
    challenges: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl StaticVerifier {
    pub fn accepting() -> Self {
        Self {
            verdict: VerificationResult::ok(),
            challenges: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            verdict: VerificationResult::rejected(reason),
            ..Self::accepting()
        }
    }

    /// Accepting verifier that waits for `gate` before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::accepting()
        }
    }

    pub fn challenges(&self) -> Vec<String> {
        self.challenges.lock().clone()
    }
}

#[async_trait]
impl SignatureVerifier for StaticVerifier {
    async fn verify(&self, expected_payload: &str, _chain: &AuthChain) -> VerificationResult {
        self.challenges.lock().push(expected_payload.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.verdict.clone()
    }
}

/// In-memory bus that holds `connect` publishes until `gate` is notified.
pub struct GatedBus {
    inner: Arc<InMemoryMessageBus>,
    gate: Arc<Notify>,
}

impl GatedBus {
    pub fn new(inner: Arc<InMemoryMessageBus>, gate: Arc<Notify>) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl MessagePublisher for GatedBus {
    async fn publish(&self, subject: &str, data: Bytes) -> usize {
        if subject.ends_with(".connect") {
            self.gate.notified().await;
        }
        self.inner.publish(subject, data).await
    }

    fn messages_published(&self) -> u64 {
        self.inner.messages_published()
    }
}

impl MessageSubscriber for GatedBus {
    fn subscribe(&self, pattern: &str) -> Subscription {
        self.inner.subscribe(pattern)
    }
}
