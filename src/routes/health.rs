// src/routes/health.rs
//! Liveness endpoint for the temperature service.
//!
//! `/health` lets container orchestrators and CI check that the process is
//! up and answering HTTP. It does not touch the time-series store.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Subrouter with `GET /health`, generic over the gateway state type.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
