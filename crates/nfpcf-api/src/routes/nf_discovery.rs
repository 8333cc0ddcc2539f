//! NF discovery route (Nnrf_NFDiscovery)

use axum::{
    Json, Router,
    extract::{RawQuery, State},
    routing::get,
};
use nfpcf_core::DiscoveryQuery;
use nfpcf_proxy::SearchResult;
use tracing::debug;
use url::form_urlencoded;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /nnrf-disc/v1/nf-instances?target-nf-type=..&requester-nf-type=..
async fn discover(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<SearchResult>, ApiError> {
    let raw = raw.unwrap_or_default();
    debug!("GET NF discovery: {}", raw);

    let query = DiscoveryQuery::from_pairs(
        form_urlencoded::parse(raw.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
    )
    .map_err(nfpcf_core::CoreError::from)?;

    let result = state.coordinator.discover(&query).await?;
    Ok(Json(result))
}

/// Create NF discovery routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/nnrf-disc/v1/nf-instances", get(discover))
}
