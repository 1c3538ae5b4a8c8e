//! Read-only HTTP status endpoint.

use std::sync::Arc;

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::get,
    },
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use crate::state::GatewayState;

/// Build the status router (shared between startup and tests).
pub fn build_status_app(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/shards", get(shards_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` fires.
pub async fn serve_status(
    listener: TcpListener,
    state: Arc<GatewayState>,
    shutdown: CancellationToken,
) {
    let addr = listener.local_addr().ok();
    let app = build_status_app(state);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        warn!(error = %e, "status endpoint failed");
    }
    if let Some(addr) = addr {
        info!(%addr, "status endpoint closed");
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "hostname": state.hostname,
        "protocol": rhea_protocol::PROTOCOL_VERSION,
        "store": state.authenticator.repository().backend(),
        "shards": state.registry.count().await,
        "uptime_secs": state.uptime_secs(),
    }))
}

async fn shards_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.registry.snapshot().await)
}
