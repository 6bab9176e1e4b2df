//! Cross-cutting concerns for the HTTP surface.

pub mod metrics;

pub use metrics::GatewayMetrics;
