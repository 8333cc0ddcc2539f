//! Core error types

use nfpcf_proxy::ProblemDetails;
use std::time::Duration;
use thiserror::Error;

use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Proxy error: {0}")]
    Proxy(#[from] nfpcf_proxy::ProxyError),

    /// A structured failure reported by the NRF, relayed as-is
    #[error("NRF problem: {} {}", .0.status_code(), .0.cause.as_deref().unwrap_or("UNSPECIFIED"))]
    Problem(ProblemDetails),

    #[error("Missing mandatory query parameter: {0}")]
    MissingParameter(&'static str),

    #[error(transparent)]
    InvalidQuery(#[from] QueryError),

    #[error("NRF did not answer within {0:?}")]
    Timeout(Duration),
}

impl CoreError {
    /// Whether the failure originated in talking to the NRF rather than in the request
    pub fn is_system_failure(&self) -> bool {
        matches!(self, CoreError::Proxy(_) | CoreError::Timeout(_))
    }
}
