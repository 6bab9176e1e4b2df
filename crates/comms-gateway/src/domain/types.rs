//! Core domain types shared by the handshake, relay and bus bridge.

/// Process-local identity of a verified address.
///
/// Aliases are small so that relay frames stay compact; the full address only
/// crosses the cluster bus.
pub type Alias = u32;

/// Sender alias used for bus-originated (system) messages. Never assigned to a client.
pub const SYSTEM_ALIAS: Alias = 0;

/// Connection protocol stage.
///
/// A connection starts in `Linear` (frames feed the handshake) and moves to
/// `Ready` exactly once; a failed handshake closes it instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Linear,
    Ready,
}

/// Canonical form of an address: trimmed and lower-cased.
pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_lowercase()
}
