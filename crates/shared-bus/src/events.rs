//! # Bus Messages
//!
//! Wire types that flow over the cluster bus. Peers are addressed by their
//! verified address; per-instance aliases never leave the gateway.
//!
//! Payloads are protobuf encoded (`prost`), so any bus participant can speak
//! them without sharing Rust types.

use crate::subject;
use bytes::Bytes;
use std::collections::HashMap;

/// A raw message as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Fully qualified subject (including the namespace prefix).
    pub subject: String,
    /// Opaque payload.
    pub data: Bytes,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            data: data.into(),
        }
    }
}

/// A peer position inside an island.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Position {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub z: f32,
}

/// A peer was moved to another island.
///
/// `peers` is keyed by address.
#[derive(Clone, PartialEq, prost::Message)]
pub struct IslandChangedMessage {
    #[prost(string, tag = "1")]
    pub island_id: String,
    #[prost(string, tag = "2")]
    pub conn_str: String,
    #[prost(string, tag = "3")]
    pub from_island_id: String,
    #[prost(map = "string, message", tag = "4")]
    pub peers: HashMap<String, Position>,
}

/// A peer joined an island.
#[derive(Clone, PartialEq, prost::Message)]
pub struct JoinIslandMessage {
    #[prost(string, tag = "1")]
    pub island_id: String,
    #[prost(string, tag = "2")]
    pub peer_id: String,
}

/// A peer left an island.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LeftIslandMessage {
    #[prost(string, tag = "1")]
    pub island_id: String,
    #[prost(string, tag = "2")]
    pub peer_id: String,
}

/// Inbound bus event families the gateway subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEventKind {
    /// `<island>.island_changed`
    IslandChanged,
    /// `island.<island>.peer_join`
    PeerJoin,
    /// `island.<island>.peer_left`
    PeerLeft,
}

impl BusEventKind {
    /// Every inbound family, in subscription order.
    pub const ALL: [BusEventKind; 3] = [Self::IslandChanged, Self::PeerJoin, Self::PeerLeft];

    /// Fully qualified subscription pattern for this family.
    #[must_use]
    pub fn pattern(&self) -> String {
        match self {
            Self::IslandChanged => subject::prefixed("*.island_changed"),
            Self::PeerJoin => subject::prefixed("island.*.peer_join"),
            Self::PeerLeft => subject::prefixed("island.*.peer_left"),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IslandChanged => "island_changed",
            Self::PeerJoin => "peer_join",
            Self::PeerLeft => "peer_left",
        }
    }
}
