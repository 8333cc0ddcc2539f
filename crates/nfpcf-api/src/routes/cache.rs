//! Cache administration routes

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use nfpcf_core::CacheStats;
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub ttl_secs: u64,
    pub discovery_tier: &'static str,
}

/// GET /api/v1/cache/stats
async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.cache.stats();

    let lookups = stats.hit_count + stats.miss_count;
    let hit_rate = if lookups > 0 {
        stats.hit_count as f64 / lookups as f64
    } else {
        0.0
    };

    Json(CacheStatsResponse {
        stats,
        hit_rate,
        ttl_secs: state.cache.config().ttl.as_secs(),
        discovery_tier: state.coordinator.config().discovery_tier.as_str(),
    })
}

/// DELETE /api/v1/cache
async fn clear_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("Clearing cache");

    let count = state.cache.clear();

    Json(serde_json::json!({
        "cleared": count
    }))
}

/// POST /api/v1/cache/cleanup
async fn cleanup_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("Running cache cleanup");

    let count = state.cache.evict_expired();

    Json(serde_json::json!({
        "cleaned": count
    }))
}

/// Create cache routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cache/stats", get(cache_stats))
        .route("/api/v1/cache", delete(clear_cache))
        .route("/api/v1/cache/cleanup", post(cleanup_cache))
}
