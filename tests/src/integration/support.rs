//! Test harness: signing identities, a WebSocket client and a served gateway.

use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use comms_gateway::auth::{address_of, ephemeral_payload, personal_sign};
use comms_gateway::protocol::{
    decode_server, encode_client, ClientMessage, ServerMessage, SignedChallengeResponse,
};
use comms_gateway::{
    AuthChain, AuthLink, AuthLinkType, EcdsaChainVerifier, GatewayConfig, MessagingService,
};
use futures::{SinkExt, StreamExt};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use shared_bus::InMemoryMessageBus;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Upper bound for any single wait in these tests
pub const WAIT: Duration = Duration::from_secs(2);

/// A secp256k1 identity with its Ethereum address.
pub struct Identity {
    pub secret: SecretKey,
    pub address: String,
}

impl Identity {
    /// Deterministic key from a non-zero seed byte.
    pub fn from_seed(seed: u8) -> Self {
        let secret = SecretKey::from_slice(&[seed; 32]).expect("valid secret key");
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        Self {
            secret,
            address: address_of(&public),
        }
    }

    /// `SIGNER → ECDSA_SIGNED_ENTITY` chain over `challenge`.
    pub fn direct_chain(&self, challenge: &str) -> AuthChain {
        AuthChain::new(vec![
            AuthLink::signer(&self.address),
            AuthLink {
                kind: AuthLinkType::EcdsaSignedEntity,
                payload: challenge.to_string(),
                signature: personal_sign(&self.secret, challenge),
            },
        ])
    }

    /// `SIGNER → ECDSA_EPHEMERAL → ECDSA_SIGNED_ENTITY` chain, the ephemeral
    /// key valid for `ttl`.
    pub fn ephemeral_chain(&self, ephemeral: &Identity, challenge: &str, ttl: ChronoDuration) -> AuthChain {
        let delegation = ephemeral_payload(&ephemeral.address, Utc::now() + ttl);
        AuthChain::new(vec![
            AuthLink::signer(&self.address),
            AuthLink {
                kind: AuthLinkType::EcdsaEphemeral,
                signature: personal_sign(&self.secret, &delegation),
                payload: delegation,
            },
            AuthLink {
                kind: AuthLinkType::EcdsaSignedEntity,
                payload: challenge.to_string(),
                signature: personal_sign(&ephemeral.secret, challenge),
            },
        ])
    }
}

pub fn signed_response(chain: &AuthChain) -> ClientMessage {
    ClientMessage::SignedChallengeResponse(SignedChallengeResponse {
        auth_chain_json: chain.to_json(),
    })
}

/// Minimal binary-frame WebSocket client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, path: &str) -> Self {
        let url = format!("ws://{addr}{path}");
        let (ws, _) = timeout(WAIT, connect_async(url))
            .await
            .expect("connect timeout")
            .expect("connect");
        Self { ws }
    }

    pub async fn send(&mut self, message: ClientMessage) {
        let frame: Bytes = encode_client(message);
        self.ws
            .send(Message::Binary(frame.to_vec()))
            .await
            .expect("send");
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .expect("send text");
    }

    /// Next server message, or None if the socket closed.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            let next = timeout(WAIT, self.ws.next()).await.expect("recv timeout");
            match next {
                Some(Ok(Message::Binary(data))) => {
                    return Some(decode_server(&data).expect("decodable server frame"))
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Like `recv` but returns None after `wait` instead of panicking.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<ServerMessage> {
        timeout(wait, self.recv()).await.ok().flatten()
    }

    pub async fn challenge(&mut self) -> String {
        match self.recv().await {
            Some(ServerMessage::ChallengeRequired(c)) => c.challenge_to_sign,
            other => panic!("expected challenge, got {other:?}"),
        }
    }

    /// Full handshake with a direct signature. Returns the assigned alias.
    pub async fn authenticate(&mut self, identity: &Identity) -> u32 {
        let challenge = self.challenge().await;
        self.send(signed_response(&identity.direct_chain(&challenge)))
            .await;
        self.welcome().await
    }

    pub async fn welcome(&mut self) -> u32 {
        match self.recv().await {
            Some(ServerMessage::Welcome(w)) => w.alias,
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    /// Drain until the server closes the socket. Panics if it stays open.
    pub async fn expect_closed(&mut self) {
        timeout(WAIT, async {
            while self.recv().await.is_some() {}
        })
        .await
        .expect("socket should close");
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// A gateway served on an ephemeral local port.
pub struct ServedGateway {
    pub service: Arc<MessagingService>,
    pub bus: Arc<InMemoryMessageBus>,
    pub addr: SocketAddr,
    pub path: String,
    task: JoinHandle<()>,
}

impl ServedGateway {
    pub async fn start(config: GatewayConfig) -> Self {
        Self::start_on(config, Arc::new(InMemoryMessageBus::new())).await
    }

    pub async fn start_on(config: GatewayConfig, bus: Arc<InMemoryMessageBus>) -> Self {
        let path = config.websocket.path.clone();
        let verifier = Arc::new(EcdsaChainVerifier::new(config.eth_network.clone()));
        let subscribers_before = bus.subscriber_count();
        let service = Arc::new(
            MessagingService::new(config, bus.clone(), verifier).expect("valid config"),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let task = {
            let service = service.clone();
            tokio::spawn(async move {
                service.serve(listener).await.expect("serve");
            })
        };

        // Bridge subscriptions are registered synchronously at serve start
        timeout(WAIT, async {
            while bus.subscriber_count() < subscribers_before + 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("bus bridge subscribed");

        Self {
            service,
            bus,
            addr,
            path,
            task,
        }
    }

    pub async fn client(&self) -> TestClient {
        TestClient::connect(self.addr, &self.path).await
    }

    pub async fn stop(self) {
        self.service.shutdown();
        let _ = timeout(WAIT, self.task).await;
    }
}

/// Loopback config with a short handshake deadline.
pub fn test_config(handshake_timeout_ms: u64) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.http.host = [127, 0, 0, 1].into();
    config.handshake.timeout_ms = handshake_timeout_ms;
    config
}
