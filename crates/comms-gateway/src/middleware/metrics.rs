//! Gateway metrics.
//!
//! Plain atomics and a couple of labelled maps, rendered as Prometheus text
//! exposition for `GET /metrics`.

use crate::domain::types::Alias;
use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

#[derive(Debug, Clone)]
struct BuildInfo {
    commit_hash: String,
    eth_network: String,
}

/// Messaging gateway metrics
#[derive(Default)]
pub struct GatewayMetrics {
    // Connections
    pub connections: AtomicU64,

    // Client traffic
    pub incoming_messages: AtomicU64,
    pub incoming_bytes: AtomicU64,
    pub outgoing_messages: AtomicU64,
    pub outgoing_bytes: AtomicU64,

    // Handshake outcomes
    pub handshake_success: AtomicU64,
    handshake_failures: DashMap<&'static str, u64>,

    // Bus bridge
    pub bus_forwarded: AtomicU64,
    pub bus_dropped: AtomicU64,

    // Last observed outbound backlog per alias, set on failed sends
    buffered_amount: DashMap<Alias, u64>,

    build_info: OnceLock<BuildInfo>,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record build labels. Only the first call takes effect.
    pub fn set_build_info(&self, commit_hash: Option<&str>, eth_network: &str) {
        let _ = self.build_info.set(BuildInfo {
            commit_hash: commit_hash.unwrap_or("unknown").to_string(),
            eth_network: eth_network.to_string(),
        });
    }

    pub fn record_connect(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        // Saturating: never wrap below zero
        let _ = self
            .connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record an inbound frame of `bytes` length
    pub fn record_incoming(&self, bytes: usize) {
        self.incoming_messages.fetch_add(1, Ordering::Relaxed);
        self.incoming_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record one broadcast: `recipients` copies of a `payload_len` body
    pub fn record_outgoing(&self, recipients: usize, payload_len: usize) {
        self.outgoing_messages
            .fetch_add(recipients as u64, Ordering::Relaxed);
        self.outgoing_bytes
            .fetch_add((recipients * payload_len) as u64, Ordering::Relaxed);
    }

    pub fn record_handshake_success(&self) {
        self.handshake_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handshake_failure(&self, kind: &'static str) {
        *self.handshake_failures.entry(kind).or_insert(0) += 1;
    }

    pub fn handshake_failures(&self, kind: &str) -> u64 {
        self.handshake_failures.get(kind).map(|n| *n).unwrap_or(0)
    }

    pub fn record_bus_forwarded(&self) {
        self.bus_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bus_dropped(&self) {
        self.bus_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_buffered_amount(&self, alias: Alias, amount: usize) {
        self.buffered_amount.insert(alias, amount as u64);
    }

    pub fn clear_buffered_amount(&self, alias: Alias) {
        self.buffered_amount.remove(&alias);
    }

    pub fn buffered_amount(&self, alias: Alias) -> Option<u64> {
        self.buffered_amount.get(&alias).map(|n| *n)
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        counter(
            &mut output,
            "comms_gateway_connections",
            "Open client connections",
            "gauge",
            self.connections.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "comms_gateway_incoming_messages_total",
            "Frames received from clients",
            "counter",
            self.incoming_messages.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "comms_gateway_incoming_bytes_total",
            "Bytes received from clients",
            "counter",
            self.incoming_bytes.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "comms_gateway_outgoing_messages_total",
            "Broadcast deliveries to clients",
            "counter",
            self.outgoing_messages.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "comms_gateway_outgoing_bytes_total",
            "Broadcast payload bytes delivered to clients",
            "counter",
            self.outgoing_bytes.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "comms_gateway_handshake_success_total",
            "Completed handshakes",
            "counter",
            self.handshake_success.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            output,
            "# HELP comms_gateway_handshake_failures_total Failed handshakes by reason\n\
             # TYPE comms_gateway_handshake_failures_total counter"
        );
        let mut failures: Vec<(&'static str, u64)> = self
            .handshake_failures
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        failures.sort_unstable();
        for (kind, count) in failures {
            let _ = writeln!(
                output,
                "comms_gateway_handshake_failures_total{{reason=\"{kind}\"}} {count}"
            );
        }

        counter(
            &mut output,
            "comms_gateway_bus_forwarded_total",
            "Bus events broadcast to clients",
            "counter",
            self.bus_forwarded.load(Ordering::Relaxed),
        );
        counter(
            &mut output,
            "comms_gateway_bus_dropped_total",
            "Bus events dropped (decode failure or unknown peer)",
            "counter",
            self.bus_dropped.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            output,
            "# HELP comms_gateway_buffered_amount Outbound backlog observed on failed send\n\
             # TYPE comms_gateway_buffered_amount gauge"
        );
        let mut buffered: Vec<(Alias, u64)> = self
            .buffered_amount
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        buffered.sort_unstable();
        for (alias, amount) in buffered {
            let _ = writeln!(
                output,
                "comms_gateway_buffered_amount{{alias=\"{alias}\"}} {amount}"
            );
        }

        if let Some(info) = self.build_info.get() {
            let _ = writeln!(
                output,
                "# HELP comms_gateway_build_info Build information\n\
                 # TYPE comms_gateway_build_info gauge\n\
                 comms_gateway_build_info{{commit_hash=\"{}\",eth_network=\"{}\"}} 1",
                info.commit_hash, info.eth_network
            );
        }

        output
    }
}

fn counter(output: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    let _ = writeln!(
        output,
        "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}"
    );
}
