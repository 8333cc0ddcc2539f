//! Profile cache implementation

use chrono::{DateTime, Utc};
use nfpcf_proxy::{NfProfile, SearchResult};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::{MatchPolicy, RequesterMatchMode, SnssaiMatchMode};
use crate::query::{DiscoveryQuery, SearchKey};

/// Expiry used when `now + ttl` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Upper bound on the sweep period
const MAX_EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Configuration for the profile cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of every cached profile and discovery result
    pub ttl: Duration,
    /// S-NSSAI comparison used by `search`
    pub snssai_match: SnssaiMatchMode,
    /// Requester compatibility rule used by `search`
    pub requester_match: RequesterMatchMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            snssai_match: SnssaiMatchMode::default(),
            requester_match: RequesterMatchMode::default(),
        }
    }
}

impl CacheConfig {
    /// Sweep period of the eviction task: half the TTL, capped at an hour
    pub fn eviction_interval(&self) -> Duration {
        (self.ttl / 2)
            .max(Duration::from_millis(1))
            .min(MAX_EVICTION_INTERVAL)
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub profile_count: u64,
    pub type_count: u64,
    pub search_result_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub evicted_count: u64,
    pub last_eviction_at: Option<DateTime<Utc>>,
}

struct ProfileRecord {
    profile: NfProfile,
    expires_at: Instant,
}

struct SearchResultEntry {
    result: SearchResult,
    expires_at: Instant,
}

#[derive(Default)]
struct CacheState {
    profiles: HashMap<String, ProfileRecord>,
    /// NF type -> instance ids, in insertion order
    type_index: HashMap<String, Vec<String>>,
    search_results: HashMap<SearchKey, SearchResultEntry>,
    last_eviction_at: Option<DateTime<Utc>>,
}

impl CacheState {
    fn index_insert(&mut self, nf_type: &str, nf_instance_id: &str) {
        let ids = self.type_index.entry(nf_type.to_string()).or_default();
        if !ids.iter().any(|id| id == nf_instance_id) {
            ids.push(nf_instance_id.to_string());
        }
    }

    fn index_remove(&mut self, nf_type: &str, nf_instance_id: &str) {
        if let Some(ids) = self.type_index.get_mut(nf_type) {
            ids.retain(|id| id != nf_instance_id);
            if ids.is_empty() {
                self.type_index.remove(nf_type);
            }
        }
    }

    /// Remove a profile record together with its index membership
    fn remove_profile(&mut self, nf_instance_id: &str) -> bool {
        match self.profiles.remove(nf_instance_id) {
            Some(record) => {
                if let Some(nf_type) = record.profile.nf_type() {
                    self.index_remove(nf_type, nf_instance_id);
                }
                true
            }
            None => false,
        }
    }

    fn insert_profile(&mut self, profile: NfProfile, expires_at: Instant) {
        let id = profile.nf_instance_id.clone();

        let previous_type = self
            .profiles
            .get(&id)
            .and_then(|record| record.profile.nf_type())
            .map(str::to_string);
        if let Some(previous) = previous_type {
            if Some(previous.as_str()) != profile.nf_type() {
                self.index_remove(&previous, &id);
            }
        }

        if let Some(nf_type) = profile.nf_type() {
            let nf_type = nf_type.to_string();
            self.index_insert(&nf_type, &id);
        }

        self.profiles.insert(id, ProfileRecord { profile, expires_at });
    }
}

/// In-memory cache of NF profiles and discovery results.
///
/// All three structures sit behind one reader/writer lock. Reads never hand
/// out an entry past its expiry, whether or not the sweep has run yet.
pub struct ProfileCache {
    config: CacheConfig,
    policy: MatchPolicy,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
}

impl ProfileCache {
    /// Create a cache using the built-in predicates selected by `config`
    pub fn new(config: CacheConfig) -> Self {
        let policy = MatchPolicy::from_modes(config.snssai_match, config.requester_match);
        Self::with_policy(config, policy)
    }

    /// Create a cache with a caller-supplied match policy
    pub fn with_policy(config: CacheConfig, policy: MatchPolicy) -> Self {
        info!(
            "Initializing profile cache (ttl: {:?}, snssai: {}, requester: {}, predicates: {:?})",
            config.ttl,
            config.snssai_match.as_str(),
            config.requester_match.as_str(),
            policy.names()
        );

        Self {
            config,
            policy,
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn expiry_from_now(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.config.ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }

    /// Insert or replace a profile, resetting its TTL
    pub fn put(&self, profile: NfProfile) {
        let expires_at = self.expiry_from_now();
        debug!("Caching NF profile: {}", profile.nf_instance_id);

        let mut state = self.state.write();
        state.insert_profile(profile, expires_at);
        record_profile_gauge(&state);
    }

    /// Insert several profiles under a single write lock
    pub fn put_many(&self, profiles: impl IntoIterator<Item = NfProfile>) {
        let expires_at = self.expiry_from_now();

        let mut state = self.state.write();
        for profile in profiles {
            debug!("Caching NF profile: {}", profile.nf_instance_id);
            state.insert_profile(profile, expires_at);
        }
        record_profile_gauge(&state);
    }

    /// Get a live profile. Expired and never-cached look the same.
    pub fn get(&self, nf_instance_id: &str) -> Option<NfProfile> {
        let now = Instant::now();
        let state = self.state.read();

        match state.profiles.get(nf_instance_id) {
            Some(record) if now <= record.expires_at => {
                self.record_hit();
                Some(record.profile.clone())
            }
            _ => {
                self.record_miss();
                None
            }
        }
    }

    /// Remove a profile and every discovery result listing it.
    /// Returns whether the profile itself was cached.
    pub fn delete(&self, nf_instance_id: &str) -> bool {
        let mut state = self.state.write();
        let removed = state.remove_profile(nf_instance_id);
        if removed {
            debug!("Invalidated NF profile: {}", nf_instance_id);
            record_profile_gauge(&state);
        }

        let before = state.search_results.len();
        state.search_results.retain(|_, entry| {
            !entry
                .result
                .nf_instances
                .iter()
                .any(|profile| profile.nf_instance_id == nf_instance_id)
        });
        let dropped = before - state.search_results.len();
        if dropped > 0 {
            debug!(
                "Invalidated {} discovery result(s) listing {}",
                dropped, nf_instance_id
            );
        }

        removed
    }

    /// Find live profiles of the query's target type that pass the match policy.
    ///
    /// Results follow index insertion order. A query without a target type
    /// matches nothing.
    pub fn search(&self, query: &DiscoveryQuery) -> Vec<NfProfile> {
        let Some(target) = query.target_nf_type() else {
            return Vec::new();
        };

        let now = Instant::now();
        let state = self.state.read();

        let results: Vec<NfProfile> = state
            .type_index
            .get(target)
            .into_iter()
            .flatten()
            .filter_map(|id| state.profiles.get(id))
            .filter(|record| now <= record.expires_at)
            .filter(|record| self.policy.matches(&record.profile, query))
            .map(|record| record.profile.clone())
            .collect();

        if results.is_empty() {
            self.record_miss();
        } else {
            self.record_hit();
        }
        results
    }

    /// Read the coarse discovery-result entry for the query's fingerprint
    pub fn get_search_result(&self, query: &DiscoveryQuery) -> Option<SearchResult> {
        let key = query.search_key();
        let now = Instant::now();
        let state = self.state.read();

        match state.search_results.get(&key) {
            Some(entry) if now <= entry.expires_at => {
                self.record_hit();
                Some(entry.result.clone())
            }
            _ => {
                self.record_miss();
                None
            }
        }
    }

    /// Store a whole discovery result under the query's fingerprint
    pub fn set_search_result(&self, query: &DiscoveryQuery, result: SearchResult) {
        let key = query.search_key();
        let expires_at = self.expiry_from_now();
        debug!("Caching discovery result for {}", key);

        self.state
            .write()
            .search_results
            .insert(key, SearchResultEntry { result, expires_at });
    }

    /// Remove every expired profile and discovery result
    pub fn evict_expired(&self) -> u64 {
        let now = Instant::now();
        let mut state = self.state.write();

        let expired: Vec<String> = state
            .profiles
            .iter()
            .filter(|(_, record)| now > record.expires_at)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            state.remove_profile(id);
        }

        let results_before = state.search_results.len();
        state.search_results.retain(|_, entry| now <= entry.expires_at);
        let removed = (expired.len() + results_before - state.search_results.len()) as u64;

        state.last_eviction_at = Some(Utc::now());
        record_profile_gauge(&state);
        drop(state);

        if removed > 0 {
            self.evicted.fetch_add(removed, Ordering::Relaxed);
            metrics::counter!("nfpcf_cache_evicted_total").increment(removed);
            debug!("Evicted {} expired cache entries", removed);
        }
        removed
    }

    /// Drop everything in both tiers
    pub fn clear(&self) -> u64 {
        let mut state = self.state.write();
        let count = (state.profiles.len() + state.search_results.len()) as u64;
        state.profiles.clear();
        state.type_index.clear();
        state.search_results.clear();
        record_profile_gauge(&state);

        info!("Cleared {} cache entries", count);
        count
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            profile_count: state.profiles.len() as u64,
            type_count: state.type_index.len() as u64,
            search_result_count: state.search_results.len() as u64,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            evicted_count: self.evicted.load(Ordering::Relaxed),
            last_eviction_at: state.last_eviction_at,
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

fn record_profile_gauge(state: &CacheState) {
    metrics::gauge!("nfpcf_cached_profiles").set(state.profiles.len() as f64);
}

/// Handle to the background eviction task.
///
/// Dropping the handle cancels the task; [`EvictionTask::shutdown`] also waits
/// for it to finish.
pub struct EvictionTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl EvictionTask {
    /// Stop the task and wait for it to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Eviction task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for EvictionTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawn the periodic sweep for `cache`, every [`CacheConfig::eviction_interval`].
///
/// The task only holds a weak reference and exits once the cache is gone.
pub fn spawn_eviction_task(cache: &Arc<ProfileCache>) -> EvictionTask {
    let period = cache.config.eviction_interval();
    let weak: Weak<ProfileCache> = Arc::downgrade(cache);
    let token = CancellationToken::new();
    let cancelled = token.clone();

    info!("Starting background eviction task (interval: {:?})", period);

    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick (which fires immediately)
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(cache) = weak.upgrade() else {
                break;
            };
            let removed = cache.evict_expired();
            if removed > 0 {
                info!("Scheduled eviction removed {} expired entries", removed);
            }
        }

        debug!("Eviction task stopped");
    });

    EvictionTask {
        token,
        handle: Some(handle),
    }
}
