//! Proxy error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid NRF URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decode NRF response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected status from NRF: {0}")]
    UnexpectedStatus(u16),
}
