//! Cache-aside coordination between the profile cache and the NRF

use bytes::Bytes;
use nfpcf_proxy::{NfProfile, NrfBackend, NrfResponse, ProxyError, SearchResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::ProfileCache;
use crate::error::CoreError;
use crate::query::DiscoveryQuery;

/// Error type for parsing a discovery tier
#[derive(Debug, Clone)]
pub struct ParseDiscoveryTierError(String);

impl fmt::Display for ParseDiscoveryTierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid discovery tier: {}", self.0)
    }
}

impl std::error::Error for ParseDiscoveryTierError {}

/// Which cache tier answers discovery reads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryTier {
    /// Per-profile search over the type index
    #[default]
    Profile,
    /// Whole results keyed by target and requester NF type
    Query,
}

impl DiscoveryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryTier::Profile => "profile",
            DiscoveryTier::Query => "query",
        }
    }
}

impl fmt::Display for DiscoveryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryTier {
    type Err = ParseDiscoveryTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profile" => Ok(DiscoveryTier::Profile),
            "query" => Ok(DiscoveryTier::Query),
            _ => Err(ParseDiscoveryTierError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub discovery_tier: DiscoveryTier,
    /// Deadline for every individual NRF call
    pub backend_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            discovery_tier: DiscoveryTier::default(),
            backend_timeout: Duration::from_secs(10),
        }
    }
}

/// Applies the caching and invalidation rules for each NF management and
/// discovery operation.
///
/// Backend calls never run under the cache lock: every cache access here is a
/// short synchronous call made before or after the awaited NRF request.
pub struct RequestCoordinator {
    cache: Arc<ProfileCache>,
    backend: Arc<dyn NrfBackend>,
    config: CoordinatorConfig,
}

impl RequestCoordinator {
    pub fn new(
        cache: Arc<ProfileCache>,
        backend: Arc<dyn NrfBackend>,
        config: CoordinatorConfig,
    ) -> Self {
        info!(
            "Request coordinator ready (discovery tier: {}, backend timeout: {:?})",
            config.discovery_tier, config.backend_timeout
        );
        Self {
            cache,
            backend,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ProfileCache> {
        &self.cache
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ==================== NF Management ====================

    /// Register a profile with the NRF. The cache is left untouched; it is
    /// filled by discovery only.
    pub async fn register(
        &self,
        nf_instance_id: &str,
        mut profile: NfProfile,
    ) -> Result<Option<NfProfile>, CoreError> {
        if profile.nf_instance_id != nf_instance_id {
            debug!(
                "Overriding body instance id {:?} with path id {}",
                profile.nf_instance_id, nf_instance_id
            );
            profile.nf_instance_id = nf_instance_id.to_string();
        }

        let registered = self
            .call("register", self.backend.register_profile(&profile))
            .await?;
        info!("Registered NF instance: {}", nf_instance_id);
        Ok(registered)
    }

    /// Fetch a single profile straight from the NRF
    pub async fn get(&self, nf_instance_id: &str) -> Result<NfProfile, CoreError> {
        self.call("get", self.backend.fetch_profile(nf_instance_id))
            .await
    }

    /// Invalidate, then deregister. A failed NRF call does not restore the entry.
    pub async fn deregister(&self, nf_instance_id: &str) -> Result<(), CoreError> {
        self.cache.delete(nf_instance_id);

        self.call("deregister", self.backend.remove_profile(nf_instance_id))
            .await?;
        info!("Deregistered NF instance: {}", nf_instance_id);
        Ok(())
    }

    /// Invalidate, then apply a JSON patch document at the NRF
    pub async fn update(
        &self,
        nf_instance_id: &str,
        patch: Bytes,
    ) -> Result<Option<NfProfile>, CoreError> {
        self.cache.delete(nf_instance_id);

        let updated = self
            .call("update", self.backend.patch_profile(nf_instance_id, patch))
            .await?;
        info!("Updated NF instance: {}", nf_instance_id);
        Ok(updated)
    }

    // ==================== NF Discovery ====================

    /// Answer a discovery query from the configured cache tier, falling back
    /// to the NRF on a miss.
    pub async fn discover(&self, query: &DiscoveryQuery) -> Result<SearchResult, CoreError> {
        if let Some(param) = query.missing_mandatory() {
            return Err(CoreError::MissingParameter(param));
        }

        let tier = self.config.discovery_tier;
        let cached = match tier {
            DiscoveryTier::Profile => {
                let profiles = self.cache.search(query);
                (!profiles.is_empty()).then(|| SearchResult::from_profiles(profiles))
            }
            DiscoveryTier::Query => self.cache.get_search_result(query),
        };

        if let Some(result) = cached {
            debug!(
                "Discovery cache hit for {} ({} tier, {} instances)",
                query.search_key(),
                tier,
                result.nf_instances.len()
            );
            metrics::counter!("nfpcf_discovery_cache_hits_total", "tier" => tier.as_str())
                .increment(1);
            return Ok(result);
        }

        debug!(
            "Discovery cache miss for {} ({} tier), querying NRF",
            query.search_key(),
            tier
        );
        metrics::counter!("nfpcf_discovery_cache_misses_total", "tier" => tier.as_str())
            .increment(1);

        let result = self
            .call("discover", self.backend.query_profiles(query.params()))
            .await?;

        self.cache.put_many(result.nf_instances.iter().cloned());
        if tier == DiscoveryTier::Query {
            self.cache.set_search_result(query, result.clone());
        }

        info!(
            "Cached {} NF instances discovered for {}",
            result.nf_instances.len(),
            query.search_key()
        );
        Ok(result)
    }

    /// Run one NRF call under the configured deadline, folding problems and
    /// transport failures into [`CoreError`].
    async fn call<T, F>(&self, operation: &'static str, request: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<NrfResponse<T>, ProxyError>>,
    {
        let outcome = tokio::time::timeout(self.config.backend_timeout, request).await;

        let error = match outcome {
            Ok(Ok(NrfResponse::Success(value))) => return Ok(value),
            Ok(Ok(NrfResponse::Problem(problem))) => {
                warn!(
                    "NRF {} returned problem: status={} cause={:?}",
                    operation,
                    problem.status_code(),
                    problem.cause
                );
                return Err(CoreError::Problem(problem));
            }
            Ok(Err(e)) => {
                warn!("NRF {} failed: {}", operation, e);
                CoreError::Proxy(e)
            }
            Err(_) => {
                warn!(
                    "NRF {} timed out after {:?}",
                    operation, self.config.backend_timeout
                );
                CoreError::Timeout(self.config.backend_timeout)
            }
        };

        metrics::counter!("nfpcf_backend_errors_total", "operation" => operation).increment(1);
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use async_trait::async_trait;
    use nfpcf_proxy::ProblemDetails;
    use parking_lot::Mutex;

    /// What the fake NRF does when called
    #[derive(Clone)]
    enum Script {
        Ok,
        Problem(ProblemDetails),
        Fail,
        Hang,
    }

    struct MockNrf {
        script: Mutex<Script>,
        instances: Mutex<Vec<NfProfile>>,
        calls: Mutex<Vec<String>>,
        /// Cache inspected at call time, for ordering checks
        watched: Mutex<Option<Arc<ProfileCache>>>,
        cached_at_call: Mutex<Vec<bool>>,
    }

    impl MockNrf {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                instances: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                watched: Mutex::new(None),
                cached_at_call: Mutex::new(Vec::new()),
            })
        }

        fn with_instances(script: Script, instances: Vec<NfProfile>) -> Arc<Self> {
            let mock = Self::new(script);
            *mock.instances.lock() = instances;
            mock
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        async fn respond<T>(&self, call: String, id: &str, value: T) -> Result<NrfResponse<T>, ProxyError> {
            self.calls.lock().push(call);
            let watched = self.watched.lock().clone();
            if let Some(cache) = watched {
                self.cached_at_call.lock().push(cache.get(id).is_some());
            }

            let script = self.script.lock().clone();
            match script {
                Script::Ok => Ok(NrfResponse::Success(value)),
                Script::Problem(problem) => Ok(NrfResponse::Problem(problem)),
                Script::Fail => Err(ProxyError::UnexpectedStatus(502)),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(NrfResponse::Success(value))
                }
            }
        }
    }

    #[async_trait]
    impl NrfBackend for MockNrf {
        async fn register_profile(
            &self,
            profile: &NfProfile,
        ) -> Result<NrfResponse<Option<NfProfile>>, ProxyError> {
            let id = profile.nf_instance_id.clone();
            self.respond(format!("register:{}", id), &id, Some(profile.clone()))
                .await
        }

        async fn fetch_profile(
            &self,
            nf_instance_id: &str,
        ) -> Result<NrfResponse<NfProfile>, ProxyError> {
            let profile = NfProfile::new(nf_instance_id, Some("AMF"));
            self.respond(format!("fetch:{}", nf_instance_id), nf_instance_id, profile)
                .await
        }

        async fn remove_profile(&self, nf_instance_id: &str) -> Result<NrfResponse<()>, ProxyError> {
            self.respond(format!("remove:{}", nf_instance_id), nf_instance_id, ())
                .await
        }

        async fn patch_profile(
            &self,
            nf_instance_id: &str,
            _patch: Bytes,
        ) -> Result<NrfResponse<Option<NfProfile>>, ProxyError> {
            self.respond(format!("patch:{}", nf_instance_id), nf_instance_id, None)
                .await
        }

        async fn query_profiles(
            &self,
            query: &[(String, String)],
        ) -> Result<NrfResponse<SearchResult>, ProxyError> {
            let rendered: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            let result = SearchResult::from_profiles(self.instances.lock().clone());
            self.respond(format!("query:{}", rendered.join("&")), "", result)
                .await
        }
    }

    fn setup(mock: Arc<MockNrf>, tier: DiscoveryTier) -> RequestCoordinator {
        let cache = Arc::new(ProfileCache::new(CacheConfig {
            ttl: Duration::from_secs(60),
            ..Default::default()
        }));
        RequestCoordinator::new(
            cache,
            mock,
            CoordinatorConfig {
                discovery_tier: tier,
                backend_timeout: Duration::from_secs(2),
            },
        )
    }

    fn query(pairs: &[(&str, &str)]) -> DiscoveryQuery {
        DiscoveryQuery::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn amf_from_smf() -> DiscoveryQuery {
        query(&[("target-nf-type", "AMF"), ("requester-nf-type", "SMF")])
    }

    fn ids(result: &SearchResult) -> Vec<&str> {
        result
            .nf_instances
            .iter()
            .map(|p| p.nf_instance_id.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_discover_miss_populates_cache() {
        let mock = MockNrf::with_instances(
            Script::Ok,
            vec![NfProfile::new("X", Some("AMF")), NfProfile::new("Y", Some("AMF"))],
        );
        let coordinator = setup(mock.clone(), DiscoveryTier::Profile);

        let result = coordinator.discover(&amf_from_smf()).await.unwrap();
        assert_eq!(ids(&result), vec!["X", "Y"]);
        assert_eq!(mock.calls().len(), 1);

        let found = coordinator.cache().search(&query(&[("target-nf-type", "AMF")]));
        assert_eq!(found.len(), 2);

        // Served from cache without another backend call
        let again = coordinator.discover(&amf_from_smf()).await.unwrap();
        assert_eq!(ids(&again), vec!["X", "Y"]);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_single_cached_match_short_circuits() {
        let mock = MockNrf::with_instances(Script::Ok, vec![NfProfile::new("remote", Some("AMF"))]);
        let coordinator = setup(mock.clone(), DiscoveryTier::Profile);
        coordinator.cache().put(NfProfile::new("local", Some("AMF")));

        let result = coordinator.discover(&amf_from_smf()).await.unwrap();
        assert_eq!(ids(&result), vec!["local"]);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_discover_forwards_query_verbatim() {
        let mock = MockNrf::new(Script::Ok);
        let coordinator = setup(mock.clone(), DiscoveryTier::Profile);

        let q = query(&[
            ("target-nf-type", "SMF"),
            ("requester-nf-type", "AMF"),
            ("dnn", "internet"),
        ]);
        let result = coordinator.discover(&q).await.unwrap();
        assert!(result.nf_instances.is_empty());
        assert_eq!(
            mock.calls(),
            vec!["query:target-nf-type=SMF&requester-nf-type=AMF&dnn=internet"]
        );
    }

    #[tokio::test]
    async fn test_discover_missing_parameters() {
        let mock = MockNrf::new(Script::Ok);
        let coordinator = setup(mock.clone(), DiscoveryTier::Profile);

        let err = coordinator
            .discover(&query(&[("target-nf-type", "AMF")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingParameter("requester-nf-type")));

        let err = coordinator
            .discover(&query(&[("requester-nf-type", "AMF")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingParameter("target-nf-type")));

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_discover_failure_caches_nothing() {
        let mock = MockNrf::with_instances(Script::Fail, vec![NfProfile::new("X", Some("AMF"))]);
        let coordinator = setup(mock.clone(), DiscoveryTier::Query);

        let err = coordinator.discover(&amf_from_smf()).await.unwrap_err();
        assert!(err.is_system_failure());

        let stats = coordinator.cache().stats();
        assert_eq!(stats.profile_count, 0);
        assert_eq!(stats.search_result_count, 0);
    }

    #[tokio::test]
    async fn test_discover_relays_problem() {
        let problem = ProblemDetails::new(403, "NF_TYPE_NOT_ALLOWED");
        let mock = MockNrf::new(Script::Problem(problem.clone()));
        let coordinator = setup(mock, DiscoveryTier::Profile);

        match coordinator.discover(&amf_from_smf()).await {
            Err(CoreError::Problem(relayed)) => assert_eq!(relayed, problem),
            other => panic!("expected relayed problem, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_timeout_leaves_cache_untouched() {
        let mock = MockNrf::with_instances(Script::Hang, vec![NfProfile::new("X", Some("AMF"))]);
        let coordinator = setup(mock, DiscoveryTier::Query);

        let err = coordinator.discover(&amf_from_smf()).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout(d) if d == Duration::from_secs(2)));
        assert_eq!(coordinator.cache().stats().profile_count, 0);
        assert_eq!(coordinator.cache().stats().search_result_count, 0);
    }

    #[tokio::test]
    async fn test_query_tier() {
        let mock = MockNrf::with_instances(Script::Ok, vec![NfProfile::new("X", Some("AMF"))]);
        let coordinator = setup(mock.clone(), DiscoveryTier::Query);

        coordinator.discover(&amf_from_smf()).await.unwrap();
        assert_eq!(coordinator.cache().stats().search_result_count, 1);
        // Profiles are stored individually as well
        assert!(coordinator.cache().get("X").is_some());

        // Same fingerprint, different DNN: answered by the coarse entry
        let narrower = query(&[
            ("target-nf-type", "AMF"),
            ("requester-nf-type", "SMF"),
            ("dnn", "ims"),
        ]);
        let result = coordinator.discover(&narrower).await.unwrap();
        assert_eq!(ids(&result), vec!["X"]);
        assert_eq!(mock.calls().len(), 1);

        // A different requester is a miss even though X is cached per profile
        let other = query(&[("target-nf-type", "AMF"), ("requester-nf-type", "NEF")]);
        coordinator.discover(&other).await.unwrap();
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_deregister_invalidates_before_forwarding() {
        for script in [Script::Ok, Script::Fail, Script::Problem(ProblemDetails::new(404, "CONTEXT_NOT_FOUND"))] {
            let mock = MockNrf::new(script.clone());
            let coordinator = setup(mock.clone(), DiscoveryTier::Profile);
            *mock.watched.lock() = Some(coordinator.cache().clone());
            coordinator.cache().put(NfProfile::new("A", Some("UDM")));

            let outcome = coordinator.deregister("A").await;
            assert_eq!(outcome.is_ok(), matches!(script, Script::Ok));

            assert_eq!(*mock.cached_at_call.lock(), vec![false]);
            assert!(coordinator.cache().get("A").is_none());
        }
    }

    #[tokio::test]
    async fn test_update_invalidates_before_forwarding() {
        let mock = MockNrf::new(Script::Fail);
        let coordinator = setup(mock.clone(), DiscoveryTier::Profile);
        *mock.watched.lock() = Some(coordinator.cache().clone());
        coordinator.cache().put(NfProfile::new("A", Some("UDM")));

        let patch = Bytes::from_static(br#"[{"op":"replace","path":"/nfStatus","value":"SUSPENDED"}]"#);
        assert!(coordinator.update("A", patch).await.is_err());

        assert_eq!(*mock.cached_at_call.lock(), vec![false]);
        assert!(coordinator.cache().get("A").is_none());
    }

    #[tokio::test]
    async fn test_query_tier_invalidation_reaches_cached_results() {
        let patch = Bytes::from_static(br#"[{"op":"replace","path":"/load","value":90}]"#);

        for deregister in [true, false] {
            let mock = MockNrf::with_instances(Script::Ok, vec![NfProfile::new("X", Some("AMF"))]);
            let coordinator = setup(mock.clone(), DiscoveryTier::Query);

            coordinator.discover(&amf_from_smf()).await.unwrap();
            assert_eq!(coordinator.cache().stats().search_result_count, 1);

            if deregister {
                coordinator.deregister("X").await.unwrap();
            } else {
                coordinator.update("X", patch.clone()).await.unwrap();
            }
            assert_eq!(coordinator.cache().stats().search_result_count, 0);

            coordinator.discover(&amf_from_smf()).await.unwrap();
            let queries = mock
                .calls()
                .iter()
                .filter(|call| call.starts_with("query:"))
                .count();
            assert_eq!(queries, 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_refetches_after_ttl() {
        for tier in [DiscoveryTier::Profile, DiscoveryTier::Query] {
            let mock = MockNrf::with_instances(Script::Ok, vec![NfProfile::new("X", Some("AMF"))]);
            let coordinator = setup(mock.clone(), tier);

            coordinator.discover(&amf_from_smf()).await.unwrap();
            tokio::time::advance(Duration::from_secs(30)).await;
            coordinator.discover(&amf_from_smf()).await.unwrap();
            assert_eq!(mock.calls().len(), 1, "{} tier refetched early", tier);

            // 61s after the first fill
            tokio::time::advance(Duration::from_secs(31)).await;
            let result = coordinator.discover(&amf_from_smf()).await.unwrap();
            assert_eq!(ids(&result), vec!["X"]);
            assert_eq!(mock.calls().len(), 2, "{} tier served an expired entry", tier);
        }
    }

    #[tokio::test]
    async fn test_register_uses_path_id_and_skips_cache() {
        let mock = MockNrf::new(Script::Ok);
        let coordinator = setup(mock.clone(), DiscoveryTier::Profile);

        let registered = coordinator
            .register("from-path", NfProfile::new("from-body", Some("SMF")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(registered.nf_instance_id, "from-path");
        assert_eq!(mock.calls(), vec!["register:from-path"]);
        assert_eq!(coordinator.cache().stats().profile_count, 0);
    }

    #[tokio::test]
    async fn test_get_bypasses_cache() {
        let mock = MockNrf::new(Script::Ok);
        let coordinator = setup(mock.clone(), DiscoveryTier::Profile);
        coordinator.cache().put(NfProfile::new("A", Some("UDM")));

        let profile = coordinator.get("A").await.unwrap();
        assert_eq!(profile.nf_type(), Some("AMF"));
        assert_eq!(mock.calls(), vec!["fetch:A"]);
    }

    #[test]
    fn test_discovery_tier_parsing() {
        assert_eq!("Profile".parse::<DiscoveryTier>().unwrap(), DiscoveryTier::Profile);
        assert_eq!("query".parse::<DiscoveryTier>().unwrap(), DiscoveryTier::Query);
        let err = "merged".parse::<DiscoveryTier>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid discovery tier: merged");
        assert_eq!(DiscoveryTier::default(), DiscoveryTier::Profile);
    }
}
