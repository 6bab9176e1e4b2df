//! # Comms Gateway Node
//!
//! The main entry point for the messaging gateway.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (defaults + environment)
//! 3. Build the messaging service (bus, verifier, gateway)
//! 4. Serve until Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::{build_service, config::load_config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Comms Gateway v{}", comms_gateway::VERSION);
    info!("===========================================");

    // Load configuration
    let config = load_config();
    let service = std::sync::Arc::new(build_service(config)?);

    let mut server = {
        let service = std::sync::Arc::clone(&service);
        tokio::spawn(async move { service.start().await })
    };

    info!("Gateway is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Received shutdown signal");
            service.shutdown();
        }
        result = &mut server => {
            // Server exited on its own (bind failure or fatal error)
            return match result.context("server task panicked")? {
                Ok(()) => Ok(()),
                Err(e) => {
                    error!(error = %e, "Server error");
                    Err(e.into())
                }
            };
        }
    }

    server
        .await
        .context("server task panicked")?
        .context("server shut down with an error")?;
    info!("Gateway stopped");
    Ok(())
}
