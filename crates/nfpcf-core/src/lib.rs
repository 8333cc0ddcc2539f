//! NFPCF core logic
//!
//! This crate provides the profile cache, discovery match predicates, and the
//! request coordinator that decides when the NRF has to be consulted.

pub mod cache;
pub mod coordinator;
pub mod error;
pub mod query;

pub use cache::{
    CacheConfig, CacheStats, EvictionTask, MatchPolicy, MatchPredicate, ProfileCache,
    RequesterMatchMode, SnssaiMatchMode, spawn_eviction_task,
};
pub use coordinator::{
    CoordinatorConfig, DiscoveryTier, ParseDiscoveryTierError, RequestCoordinator,
};
pub use error::CoreError;
pub use query::{DiscoveryQuery, QueryError, SearchKey};
