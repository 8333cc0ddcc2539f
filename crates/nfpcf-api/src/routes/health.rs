//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cached_profiles: u64,
}

/// Health check handler. Liveness only: the NRF is not probed.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::counter!("nfpcf_health_checks_total").increment(1);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cached_profiles: state.cache.stats().profile_count,
    })
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
}
