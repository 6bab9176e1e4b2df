//! Cross-crate flows: WebSocket clients, gateway and cluster bus.

pub mod support;

mod bus_flows;
mod e2e_websocket;
