//! Profile cache module

mod manager;
mod policy;

pub use manager::{CacheConfig, CacheStats, EvictionTask, ProfileCache, spawn_eviction_task};
pub use policy::{
    DnnMatch, MatchPolicy, MatchPredicate, ParseMatchModeError, RequesterMatchMode,
    RequesterTypeMatch, SnssaiMatch, SnssaiMatchMode,
};
