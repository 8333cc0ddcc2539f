//! NRF backend client

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ProxyError;
use crate::models::{NfProfile, ProblemDetails, SearchResult};

const NF_MANAGEMENT_PATH: [&str; 3] = ["nnrf-nfm", "v1", "nf-instances"];
const NF_DISCOVERY_PATH: [&str; 3] = ["nnrf-disc", "v1", "nf-instances"];

/// Decoded answer from the NRF: either the expected payload or a structured
/// problem. Transport-level failures travel separately as [`ProxyError`].
#[derive(Debug, Clone, PartialEq)]
pub enum NrfResponse<T> {
    Success(T),
    Problem(ProblemDetails),
}

/// Operations the cache coordinator needs from the backend registry
#[async_trait]
pub trait NrfBackend: Send + Sync {
    /// PUT a profile. `None` means the NRF accepted it without echoing a body.
    async fn register_profile(
        &self,
        profile: &NfProfile,
    ) -> Result<NrfResponse<Option<NfProfile>>, ProxyError>;

    /// GET a single profile
    async fn fetch_profile(&self, nf_instance_id: &str)
    -> Result<NrfResponse<NfProfile>, ProxyError>;

    /// DELETE a profile
    async fn remove_profile(&self, nf_instance_id: &str) -> Result<NrfResponse<()>, ProxyError>;

    /// PATCH a profile with a JSON patch document
    async fn patch_profile(
        &self,
        nf_instance_id: &str,
        patch: Bytes,
    ) -> Result<NrfResponse<Option<NfProfile>>, ProxyError>;

    /// Run a discovery query, forwarding the query pairs verbatim
    async fn query_profiles(
        &self,
        query: &[(String, String)],
    ) -> Result<NrfResponse<SearchResult>, ProxyError>;
}

/// NRF client configuration
#[derive(Clone, Debug)]
pub struct NrfClientConfig {
    /// Base URL of the backend NRF
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Speak HTTP/2 without upgrade negotiation (h2c), as SBI peers expect
    pub http2_prior_knowledge: bool,
}

/// reqwest-based NRF client
pub struct NrfClient {
    base: Url,
    client: Client,
}

impl NrfClient {
    /// Create a new NRF client
    pub fn new(config: NrfClientConfig) -> Result<Self, ProxyError> {
        let base = Url::parse(&config.url).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidUrl(config.url));
        }

        let mut builder = Client::builder().timeout(config.timeout);
        if config.http2_prior_knowledge {
            builder = builder.http2_prior_knowledge();
        }
        let client = builder.build()?;

        info!("Created NRF client for {}", base);

        Ok(Self { base, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn instance_url(&self, nf_instance_id: &str) -> Url {
        let mut segments = NF_MANAGEMENT_PATH.to_vec();
        segments.push(nf_instance_id);
        self.endpoint(&segments)
    }
}

/// Decode a JSON success body
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProxyError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Interpret a non-success response as problem details, if the body is one
async fn problem<T>(response: Response) -> Result<NrfResponse<T>, ProxyError> {
    let status = response.status();
    let body = response.bytes().await?;

    match serde_json::from_slice::<ProblemDetails>(&body) {
        Ok(mut problem) => {
            problem.status.get_or_insert(status.as_u16());
            warn!(
                "NRF returned problem: status={}, cause={}",
                problem.status_code(),
                problem.cause.as_deref().unwrap_or("-")
            );
            Ok(NrfResponse::Problem(problem))
        }
        Err(_) => Err(ProxyError::UnexpectedStatus(status.as_u16())),
    }
}

#[async_trait]
impl NrfBackend for NrfClient {
    async fn register_profile(
        &self,
        profile: &NfProfile,
    ) -> Result<NrfResponse<Option<NfProfile>>, ProxyError> {
        let url = self.instance_url(&profile.nf_instance_id);
        debug!("Registering NF instance: {}", url);

        let response = self.client.put(url).json(profile).send().await?;
        debug!("Register response: {} ({:?})", response.status(), response.version());

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let profile: NfProfile = decode(response).await?;
                debug!("Registered NF instance {}", profile.nf_instance_id);
                Ok(NrfResponse::Success(Some(profile)))
            }
            StatusCode::NO_CONTENT => Ok(NrfResponse::Success(None)),
            _ => problem(response).await,
        }
    }

    async fn fetch_profile(
        &self,
        nf_instance_id: &str,
    ) -> Result<NrfResponse<NfProfile>, ProxyError> {
        let url = self.instance_url(nf_instance_id);
        debug!("Fetching NF instance: {}", url);

        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(NrfResponse::Success(decode(response).await?)),
            StatusCode::NOT_FOUND => match problem(response).await {
                Ok(found) => Ok(found),
                Err(ProxyError::UnexpectedStatus(_)) => Ok(NrfResponse::Problem(
                    ProblemDetails::new(404, "CONTEXT_NOT_FOUND"),
                )),
                Err(e) => Err(e),
            },
            _ => problem(response).await,
        }
    }

    async fn remove_profile(&self, nf_instance_id: &str) -> Result<NrfResponse<()>, ProxyError> {
        let url = self.instance_url(nf_instance_id);
        debug!("Deregistering NF instance: {}", url);

        let response = self.client.delete(url).send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(NrfResponse::Success(())),
            _ => problem(response).await,
        }
    }

    async fn patch_profile(
        &self,
        nf_instance_id: &str,
        patch: Bytes,
    ) -> Result<NrfResponse<Option<NfProfile>>, ProxyError> {
        let url = self.instance_url(nf_instance_id);
        debug!("Updating NF instance: {}", url);

        let response = self
            .client
            .patch(url)
            .header("Content-Type", "application/json-patch+json")
            .body(patch)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(NrfResponse::Success(Some(decode(response).await?))),
            StatusCode::NO_CONTENT => Ok(NrfResponse::Success(None)),
            _ => problem(response).await,
        }
    }

    async fn query_profiles(
        &self,
        query: &[(String, String)],
    ) -> Result<NrfResponse<SearchResult>, ProxyError> {
        let url = self.endpoint(&NF_DISCOVERY_PATH);
        debug!("Querying NRF discovery: {} {:?}", url, query);

        let response = self.client.get(url).query(query).send().await?;
        debug!("Discovery response: {} ({:?})", response.status(), response.version());

        match response.status() {
            StatusCode::OK => {
                let result: SearchResult = decode(response).await?;
                debug!("NRF discovery found {} NF instances", result.nf_instances.len());
                Ok(NrfResponse::Success(result))
            }
            _ => problem(response).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> NrfClient {
        NrfClient::new(NrfClientConfig {
            url: server.uri(),
            timeout: Duration::from_secs(5),
            http2_prior_knowledge: false,
        })
        .unwrap()
    }

    fn profile_json(id: &str, nf_type: &str) -> serde_json::Value {
        json!({"nfInstanceId": id, "nfType": nf_type, "nfStatus": "REGISTERED"})
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = NrfClient::new(NrfClientConfig {
            url: "ftp://nrf.local".to_string(),
            timeout: Duration::from_secs(1),
            http2_prior_knowledge: false,
        });
        assert!(matches!(result, Err(ProxyError::InvalidUrl(_))));
    }

    #[test]
    fn test_instance_url_keeps_base_path() {
        let client = NrfClient::new(NrfClientConfig {
            url: "http://nrf.local:8000/prefix/".to_string(),
            timeout: Duration::from_secs(1),
            http2_prior_knowledge: false,
        })
        .unwrap();

        assert_eq!(
            client.instance_url("abc").as_str(),
            "http://nrf.local:8000/prefix/nnrf-nfm/v1/nf-instances/abc"
        );
        assert_eq!(
            client.endpoint(&NF_DISCOVERY_PATH).as_str(),
            "http://nrf.local:8000/prefix/nnrf-disc/v1/nf-instances"
        );
    }

    #[tokio::test]
    async fn test_register_created() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/nnrf-nfm/v1/nf-instances/amf-1"))
            .and(body_json(profile_json("amf-1", "AMF")))
            .respond_with(ResponseTemplate::new(201).set_body_json(profile_json("amf-1", "AMF")))
            .expect(1)
            .mount(&server)
            .await;

        let profile: NfProfile = serde_json::from_value(profile_json("amf-1", "AMF")).unwrap();
        let response = client_for(&server).register_profile(&profile).await.unwrap();

        assert_eq!(response, NrfResponse::Success(Some(profile)));
    }

    #[tokio::test]
    async fn test_register_problem_is_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"status": 409, "cause": "CONFLICT"})),
            )
            .mount(&server)
            .await;

        let profile = NfProfile::new("amf-1", Some("AMF"));
        let response = client_for(&server).register_profile(&profile).await.unwrap();

        assert_eq!(response, NrfResponse::Problem(ProblemDetails::new(409, "CONFLICT")));
    }

    #[tokio::test]
    async fn test_fetch_bare_404_becomes_context_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nnrf-nfm/v1/nf-instances/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let response = client_for(&server).fetch_profile("missing").await.unwrap();
        assert_eq!(
            response,
            NrfResponse::Problem(ProblemDetails::new(404, "CONTEXT_NOT_FOUND"))
        );
    }

    #[tokio::test]
    async fn test_fetch_undecodable_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_profile("x").await;
        assert!(matches!(result, Err(ProxyError::Decode(_))));
    }

    #[tokio::test]
    async fn test_remove_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/nnrf-nfm/v1/nf-instances/smf-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).remove_profile("smf-1").await.unwrap();
        assert_eq!(response, NrfResponse::Success(()));
    }

    #[tokio::test]
    async fn test_remove_unexpected_status_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result = client_for(&server).remove_profile("smf-1").await;
        assert!(matches!(result, Err(ProxyError::UnexpectedStatus(502))));
    }

    #[tokio::test]
    async fn test_patch_sends_json_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/nnrf-nfm/v1/nf-instances/udm-1"))
            .and(header("content-type", "application/json-patch+json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let patch = Bytes::from_static(br#"[{"op":"replace","path":"/nfStatus","value":"SUSPENDED"}]"#);
        let response = client_for(&server).patch_profile("udm-1", patch).await.unwrap();
        assert_eq!(response, NrfResponse::Success(None));
    }

    #[tokio::test]
    async fn test_query_forwards_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nnrf-disc/v1/nf-instances"))
            .and(query_param("target-nf-type", "AMF"))
            .and(query_param("requester-nf-type", "SMF"))
            .and(query_param("dnn", "internet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "validityPeriod": 100,
                "nfInstances": [profile_json("x", "AMF"), profile_json("y", "AMF")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = vec![
            ("target-nf-type".to_string(), "AMF".to_string()),
            ("requester-nf-type".to_string(), "SMF".to_string()),
            ("dnn".to_string(), "internet".to_string()),
        ];
        let response = client_for(&server).query_profiles(&query).await.unwrap();

        match response {
            NrfResponse::Success(result) => {
                assert_eq!(result.validity_period, Some(100));
                let ids: Vec<&str> = result
                    .nf_instances
                    .iter()
                    .map(|p| p.nf_instance_id.as_str())
                    .collect();
                assert_eq!(ids, vec!["x", "y"]);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_problem_without_status_takes_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"cause": "INVALID_QUERY_PARAM"})),
            )
            .mount(&server)
            .await;

        let response = client_for(&server).query_profiles(&[]).await.unwrap();
        assert_eq!(
            response,
            NrfResponse::Problem(ProblemDetails::new(400, "INVALID_QUERY_PARAM"))
        );
    }
}
