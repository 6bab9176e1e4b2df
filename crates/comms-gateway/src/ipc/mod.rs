//! Cluster bus integration.

pub mod bus_adapter;

pub use bus_adapter::BusBridge;
