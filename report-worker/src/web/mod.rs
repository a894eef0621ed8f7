//! Health endpoint.
//!
//! Only the worker's liveness is reported. The server is started in
//! non-production deployments so local tooling and container probes can see
//! the process is up.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

/// Health check endpoint.
pub async fn health(State(service): State<Arc<str>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: service.to_string(),
    })
}

pub fn router(service_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::<str>::from(service_name))
}

/// Serve the health endpoint until `shutdown` resolves.
pub async fn serve<F>(port: u16, service_name: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind health endpoint")?;

    info!(address = %addr, "health_server_listening");

    axum::serve(listener, router(service_name))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Health server error")?;

    Ok(())
}
