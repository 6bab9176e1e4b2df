//! # Shared Bus - Cluster Message Bus
//!
//! The gateway never talks to other gateway instances directly. Everything that
//! crosses the instance boundary goes through the cluster bus, addressed by
//! subject.
//!
//! ## Subject Namespace
//!
//! ```text
//! client-proto.<island>.island_changed        (inbound)
//! client-proto.island.<island>.peer_join      (inbound)
//! client-proto.island.<island>.peer_left      (inbound)
//! client-proto.peer.<address>.connect         (outbound)
//! client-proto.peer.<address>.heartbeat       (outbound)
//! client-proto.peer.<address>.disconnect      (outbound)
//! ```
//!
//! Every subject lives under [`SUBJECT_PREFIX`]. Client relay topics are the bus
//! subject with the prefix stripped, so a client-chosen topic string is never a
//! bus subject.
//!
//! ## Pub/Sub
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Gateway A   │                    │  Gateway B   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │     Bus      │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe(pattern)
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subject;
pub mod subscriber;

// Re-export main types
pub use events::{
    BusEventKind, BusMessage, IslandChangedMessage, JoinIslandMessage, LeftIslandMessage, Position,
};
pub use publisher::{InMemoryMessageBus, MessageBus, MessagePublisher};
pub use subject::SUBJECT_PREFIX;
pub use subscriber::{MessageSubscriber, Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
