//! # Subjects
//!
//! Subject construction and NATS-style wildcard matching.
//!
//! - `*` matches exactly one token
//! - `>` matches one or more trailing tokens and must be the last token

/// Namespace reserved for gateway traffic on the cluster bus.
pub const SUBJECT_PREFIX: &str = "client-proto.";

/// Token separator.
const SEPARATOR: char = '.';

/// Prepend the namespace prefix to a relative subject.
#[must_use]
pub fn prefixed(relative: &str) -> String {
    format!("{SUBJECT_PREFIX}{relative}")
}

/// Strip the namespace prefix, yielding the relay topic clients subscribe to.
///
/// Returns `None` for subjects outside the namespace, or when nothing remains.
#[must_use]
pub fn strip_prefix(subject: &str) -> Option<&str> {
    subject
        .strip_prefix(SUBJECT_PREFIX)
        .filter(|rest| !rest.is_empty())
}

/// `client-proto.peer.<address>.connect`
#[must_use]
pub fn peer_connect(address: &str) -> String {
    prefixed(&format!("peer.{address}.connect"))
}

/// `client-proto.peer.<address>.disconnect`
#[must_use]
pub fn peer_disconnect(address: &str) -> String {
    prefixed(&format!("peer.{address}.disconnect"))
}

/// `client-proto.peer.<address>.heartbeat`
#[must_use]
pub fn peer_heartbeat(address: &str) -> String {
    prefixed(&format!("peer.{address}.heartbeat"))
}

/// Whether `token` can be embedded as a single literal subject token.
#[must_use]
pub fn is_literal_token(token: &str) -> bool {
    !token.is_empty()
        && !token
            .chars()
            .any(|c| c == SEPARATOR || c == '*' || c == '>' || c.is_whitespace())
}

/// Whether `subject` contains wildcards (and therefore cannot be published to).
#[must_use]
pub fn has_wildcards(subject: &str) -> bool {
    subject
        .split(SEPARATOR)
        .any(|token| token == "*" || token == ">")
}

/// Match a literal subject against a subscription pattern.
#[must_use]
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split(SEPARATOR).peekable();
    let mut subject_tokens = subject.split(SEPARATOR);

    while let Some(expected) = pattern_tokens.next() {
        if expected == ">" {
            // Tail wildcard: only valid in last position, needs at least one token
            return pattern_tokens.peek().is_none() && subject_tokens.next().is_some();
        }

        let Some(actual) = subject_tokens.next() else {
            return false;
        };

        if expected != "*" && expected != actual {
            return false;
        }
    }

    subject_tokens.next().is_none()
}
