//! Local status endpoint.
//!
//! Serves the engine snapshot as JSON, the metrics registry in text format,
//! and a liveness check.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use livedash_core::{EngineSnapshot, LiveEngine};
use tracing::info;

use crate::metrics::encode_metrics;

pub fn create_router(engine: Arc<LiveEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .with_state(engine)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, engine: Arc<LiveEngine>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status endpoint listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(engine))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(engine): State<Arc<LiveEngine>>) -> Json<EngineSnapshot> {
    Json(engine.snapshot().await)
}

async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
