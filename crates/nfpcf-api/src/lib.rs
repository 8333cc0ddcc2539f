//! NFPCF REST API
//!
//! This crate provides the Axum-based HTTP surface for NFPCF: the NRF-style
//! NF management and discovery endpoints plus health, metrics and cache
//! administration.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
