//! Health and metrics HTTP endpoint.
//!
//! - `/healthz`: process is up
//! - `/readyz`: the bastion watcher has started
//! - `/metrics`: Prometheus text exposition

use crate::error::ControllerError;
use crate::metrics::Metrics;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[derive(Clone)]
pub struct ServerState {
    pub metrics: Arc<Metrics>,
    pub ready: Arc<AtomicBool>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serves the router until the task is dropped.
pub async fn serve(address: SocketAddr, state: ServerState) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Serving health and metrics on {}", address);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ServerState>) -> Response {
    if state.ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "watcher not started").into_response()
    }
}

async fn metrics(State(state): State<ServerState>) -> Response {
    match state.metrics.gather() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
