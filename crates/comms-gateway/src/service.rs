//! Messaging service: HTTP surface plus the bus bridge loops.

use crate::auth::SignatureVerifier;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::GatewayMetrics;
use crate::ws::{Gateway, WebSocketHandler};
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use shared_bus::MessageBus;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Messaging gateway service
pub struct MessagingService {
    config: GatewayConfig,
    gateway: Arc<Gateway>,
    metrics: Arc<GatewayMetrics>,
}

impl MessagingService {
    /// Create a new messaging service
    pub fn new(
        config: GatewayConfig,
        bus: Arc<dyn MessageBus>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let metrics = Arc::new(GatewayMetrics::new());
        metrics.set_build_info(config.commit_hash.as_deref(), &config.eth_network);

        let gateway = Arc::new(Gateway::new(
            bus,
            verifier,
            Arc::clone(&metrics),
            config.handshake.timeout(),
            config.websocket.outbound_buffer,
        ));

        Ok(Self {
            config,
            gateway,
            metrics,
        })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// `/status`, `/metrics` and the WebSocket upgrade path
    pub fn router(&self) -> Router {
        let state = AppState {
            gateway: Arc::clone(&self.gateway),
            metrics: Arc::clone(&self.metrics),
            commit_hash: self.config.commit_hash.clone(),
            max_message_size: self.config.websocket.max_message_size,
        };

        Router::new()
            .route("/status", get(status))
            .route("/metrics", get(metrics))
            .route(&self.config.websocket.path, get(upgrade))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }

    /// Serve on an already bound listener until [`shutdown`](Self::shutdown).
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let shutdown = self.gateway.shutdown_token().clone();
        let bridge_tasks = self.gateway.bridge().spawn(shutdown.clone());

        info!(
            addr = %listener.local_addr()?,
            path = %self.config.websocket.path,
            "Messaging gateway listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await?;

        shutdown.cancel();
        for task in bridge_tasks {
            let _ = task.await;
        }
        info!("Messaging gateway stopped");
        Ok(())
    }

    /// Bind the configured address and serve
    pub async fn start(&self) -> Result<(), GatewayError> {
        let listener = TcpListener::bind(self.config.http_addr()).await?;
        self.serve(listener).await
    }

    /// Trigger graceful shutdown. Open sockets are closed as well.
    pub fn shutdown(&self) {
        self.gateway.shutdown();
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
    metrics: Arc<GatewayMetrics>,
    commit_hash: Option<String>,
    max_message_size: usize,
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "commitHash": state.commit_hash }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| WebSocketHandler::new(state.gateway).handle(socket))
}
