//! API error types
//!
//! Every failure is answered with a 3GPP `ProblemDetails` body.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use nfpcf_core::CoreError;
use nfpcf_proxy::ProblemDetails;
use thiserror::Error;

pub const PROBLEM_JSON: &str = "application/problem+json";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed request body: {0}")]
    InvalidBody(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl ApiError {
    /// The problem document sent back to the client
    pub fn problem(&self) -> ProblemDetails {
        match self {
            ApiError::InvalidBody(msg) => {
                ProblemDetails::new(400, "INVALID_MSG_FORMAT").with_detail(msg.clone())
            }
            ApiError::MethodNotAllowed => ProblemDetails {
                title: Some("Method Not Allowed".to_string()),
                status: Some(405),
                ..Default::default()
            },
            ApiError::NotFound(path) => {
                ProblemDetails::new(404, "RESOURCE_URI_STRUCTURE_NOT_FOUND").with_detail(path.clone())
            }
            ApiError::Core(e) => match e {
                CoreError::Problem(problem) => problem.clone(),
                CoreError::MissingParameter(param) => {
                    ProblemDetails::new(400, "MANDATORY_QUERY_PARAM_MISSING")
                        .with_detail(e.to_string())
                        .with_invalid_param(param, "mandatory parameter missing")
                }
                CoreError::InvalidQuery(q) => ProblemDetails::new(400, "INVALID_QUERY_PARAM")
                    .with_detail(e.to_string())
                    .with_invalid_param(&q.param, &q.reason),
                CoreError::Proxy(_) | CoreError::Timeout(_) => {
                    ProblemDetails::new(500, "SYSTEM_FAILURE").with_detail(e.to_string())
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        problem_response(self.problem())
    }
}

/// Render a problem with its own status, falling back to 500 for nonsense codes
pub fn problem_response(problem: ProblemDetails) -> Response {
    let status =
        StatusCode::from_u16(problem.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (status, Json(problem)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
    response
}
