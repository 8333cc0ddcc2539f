//! API routes

mod cache;
mod health;
pub mod metrics;
mod nf_discovery;
mod nf_management;

use axum::{Router, http::Uri};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::{AppState, MetricsHandle};

pub use nf_management::NF_INSTANCES_PATH;

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // SBI surface (Nnrf_NFManagement / Nnrf_NFDiscovery)
        .merge(nf_management::routes())
        .merge(nf_discovery::routes())
        // Cache administration
        .merge(cache::routes())
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router.fallback(not_found)
}
