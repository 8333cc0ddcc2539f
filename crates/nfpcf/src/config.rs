//! Configuration loading and validation

use anyhow::{Context, Result, bail};
use nfpcf_core::{DiscoveryTier, RequesterMatchMode, SnssaiMatchMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Longest accepted cache TTL: one year
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub info: InfoConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nrf: NrfConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Descriptive information, logged at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoConfig {
    #[serde(default = "default_info_version")]
    pub version: String,
    #[serde(default = "default_info_description")]
    pub description: String,
}

/// SBI listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Backend NRF configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NrfConfig {
    #[serde(default = "default_nrf_url")]
    pub url: String,
    /// Deadline for every NRF request, in seconds
    #[serde(default = "default_nrf_timeout_secs")]
    pub timeout_secs: u64,
    /// Use cleartext HTTP/2 without an upgrade round trip
    #[serde(default = "default_http2_prior_knowledge")]
    pub http2_prior_knowledge: bool,
}

/// Profile cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub discovery_tier: DiscoveryTier,
    #[serde(default)]
    pub snssai_match: SnssaiMatchMode,
    #[serde(default)]
    pub requester_match: RequesterMatchMode,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            version: default_info_version(),
            description: default_info_description(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for NrfConfig {
    fn default() -> Self {
        Self {
            url: default_nrf_url(),
            timeout_secs: default_nrf_timeout_secs(),
            http2_prior_knowledge: default_http2_prior_knowledge(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            discovery_tier: DiscoveryTier::default(),
            snssai_match: SnssaiMatchMode::default(),
            requester_match: RequesterMatchMode::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_info_version() -> String {
    "1.0.0".to_string()
}

fn default_info_description() -> String {
    "NF Profile Cache Function".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_nrf_url() -> String {
    "http://127.0.0.10:8000".to_string()
}

fn default_nrf_timeout_secs() -> u64 {
    10
}

fn default_http2_prior_knowledge() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a file, falling back to defaults when it is absent
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be greater than zero");
        }
        if self.cache.ttl_secs > MAX_TTL_SECS {
            bail!(
                "cache.ttl_secs must be at most {} (one year), got {}",
                MAX_TTL_SECS,
                self.cache.ttl_secs
            );
        }
        if self.nrf.timeout_secs == 0 {
            bail!("nrf.timeout_secs must be greater than zero");
        }

        let url = Url::parse(&self.nrf.url)
            .with_context(|| format!("Invalid nrf.url: {}", self.nrf.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("nrf.url must use http or https, got {}", url.scheme());
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            bail!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            );
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn nrf_timeout(&self) -> Duration {
        Duration::from_secs(self.nrf.timeout_secs)
    }
}
