//! NFPCF Backend Registry Client
//!
//! This crate provides the client for communicating with the backend NRF,
//! along with the NF profile and problem-details wire models shared by the
//! rest of the workspace.

pub mod client;
pub mod error;
pub mod models;

pub use client::{NrfBackend, NrfClient, NrfClientConfig, NrfResponse};
pub use error::ProxyError;
pub use models::{
    DnnSmfInfoItem, InvalidParam, NfProfile, ProblemDetails, SearchResult, SmfInfo, Snssai,
    SnssaiSmfInfoItem,
};
