//! NF management routes (Nnrf_NFManagement)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::put,
};
use bytes::Bytes;
use nfpcf_proxy::NfProfile;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

pub const NF_INSTANCES_PATH: &str = "/nnrf-nfm/v1/nf-instances";

/// PUT /nnrf-nfm/v1/nf-instances/{id} - Register
async fn register(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    debug!("PUT NF instance: {}", nf_instance_id);

    let profile = decode_profile(&nf_instance_id, &body)?;

    match state.coordinator.register(&nf_instance_id, profile).await? {
        Some(profile) => {
            let location = format!("{}/{}", NF_INSTANCES_PATH, profile.nf_instance_id);
            let mut response = (StatusCode::CREATED, Json(profile)).into_response();
            if let Ok(value) = HeaderValue::from_str(&location) {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Ok(response)
        }
        None => Ok(StatusCode::OK.into_response()),
    }
}

/// GET /nnrf-nfm/v1/nf-instances/{id}
async fn get_instance(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
) -> Result<Json<NfProfile>, ApiError> {
    debug!("GET NF instance: {}", nf_instance_id);

    let profile = state.coordinator.get(&nf_instance_id).await?;
    Ok(Json(profile))
}

/// DELETE /nnrf-nfm/v1/nf-instances/{id} - Deregister
async fn deregister(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    debug!("DELETE NF instance: {}", nf_instance_id);

    state.coordinator.deregister(&nf_instance_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /nnrf-nfm/v1/nf-instances/{id} - Update with a JSON patch document
async fn update(
    State(state): State<AppState>,
    Path(nf_instance_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    debug!("PATCH NF instance: {}", nf_instance_id);

    match state.coordinator.update(&nf_instance_id, body).await? {
        Some(profile) => Ok(Json(profile).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Decode a registration body, taking the instance id from the path
fn decode_profile(nf_instance_id: &str, body: &[u8]) -> Result<NfProfile, ApiError> {
    let mut value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    let Some(object) = value.as_object_mut() else {
        return Err(ApiError::InvalidBody("NF profile must be a JSON object".to_string()));
    };
    object.insert(
        "nfInstanceId".to_string(),
        Value::String(nf_instance_id.to_string()),
    );

    serde_json::from_value(value).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

/// Create NF management routes
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/nnrf-nfm/v1/nf-instances/{nf_instance_id}",
        put(register)
            .get(get_instance)
            .delete(deregister)
            .patch(update)
            .fallback(method_not_allowed),
    )
}
