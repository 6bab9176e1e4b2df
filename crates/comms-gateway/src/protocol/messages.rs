//! Client wire messages.
//!
//! One WebSocket binary frame carries exactly one packet. A packet wraps a
//! single `oneof`; a packet without a recognised variant is a decode error.

use crate::domain::types::Alias;
use shared_bus::Position;
use std::collections::HashMap;

// Client → server

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClientPacket {
    #[prost(oneof = "ClientMessage", tags = "1, 2, 3, 4, 5")]
    pub message: Option<ClientMessage>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ClientMessage {
    #[prost(message, tag = "1")]
    SignedChallengeResponse(SignedChallengeResponse),
    #[prost(message, tag = "2")]
    Heartbeat(Heartbeat),
    #[prost(message, tag = "3")]
    PublishRequest(PublishRequest),
    #[prost(message, tag = "4")]
    SubscribeRequest(SubscribeRequest),
    #[prost(message, tag = "5")]
    UnsubscribeRequest(UnsubscribeRequest),
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedChallengeResponse(_) => "signedChallengeResponse",
            Self::Heartbeat(_) => "heartbeat",
            Self::PublishRequest(_) => "publishRequest",
            Self::SubscribeRequest(_) => "subscribeRequest",
            Self::UnsubscribeRequest(_) => "unsubscribeRequest",
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SignedChallengeResponse {
    /// JSON-encoded auth chain whose final link signs the challenge
    #[prost(string, tag = "1")]
    pub auth_chain_json: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Heartbeat {
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PublishRequest {
    #[prost(string, repeated, tag = "1")]
    pub topics: Vec<String>,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubscribeRequest {
    #[prost(string, tag = "1")]
    pub topic: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UnsubscribeRequest {
    #[prost(string, tag = "1")]
    pub topic: String,
}

// Server → client

#[derive(Clone, PartialEq, prost::Message)]
pub struct ServerPacket {
    #[prost(oneof = "ServerMessage", tags = "1, 2, 3, 4, 5, 6")]
    pub message: Option<ServerMessage>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ServerMessage {
    #[prost(message, tag = "1")]
    ChallengeRequired(ChallengeRequired),
    #[prost(message, tag = "2")]
    Welcome(Welcome),
    #[prost(message, tag = "3")]
    SubscriptionMessage(SubscriptionMessage),
    #[prost(message, tag = "4")]
    IslandChanged(IslandChanged),
    #[prost(message, tag = "5")]
    JoinIsland(JoinIsland),
    #[prost(message, tag = "6")]
    LeftIsland(LeftIsland),
}

impl ServerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChallengeRequired(_) => "challengeRequired",
            Self::Welcome(_) => "welcome",
            Self::SubscriptionMessage(_) => "subscriptionMessage",
            Self::IslandChanged(_) => "islandChanged",
            Self::JoinIsland(_) => "joinIsland",
            Self::LeftIsland(_) => "leftIsland",
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChallengeRequired {
    #[prost(string, tag = "1")]
    pub challenge_to_sign: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Welcome {
    #[prost(uint32, tag = "1")]
    pub alias: Alias,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubscriptionMessage {
    #[prost(uint32, tag = "1")]
    pub sender: Alias,
    #[prost(string, tag = "2")]
    pub topic: String,
    #[prost(bytes = "vec", tag = "3")]
    pub body: Vec<u8>,
}

/// Client-facing island change: peers are keyed by alias.
#[derive(Clone, PartialEq, prost::Message)]
pub struct IslandChanged {
    #[prost(string, tag = "1")]
    pub island_id: String,
    #[prost(string, tag = "2")]
    pub conn_str: String,
    #[prost(string, tag = "3")]
    pub from_island_id: String,
    #[prost(map = "uint32, message", tag = "4")]
    pub peers: HashMap<Alias, Position>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct JoinIsland {
    #[prost(string, tag = "1")]
    pub island_id: String,
    #[prost(uint32, tag = "2")]
    pub peer_id: Alias,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LeftIsland {
    #[prost(string, tag = "1")]
    pub island_id: String,
    #[prost(uint32, tag = "2")]
    pub peer_id: Alias,
}
