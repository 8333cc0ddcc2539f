//! NFPCF - NF profile cache in front of an NRF

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig};
use nfpcf_api::{AppState, create_router};
use nfpcf_core::{
    CacheConfig, CoordinatorConfig, ProfileCache, RequestCoordinator, spawn_eviction_task,
};
use nfpcf_proxy::{NrfClient, NrfClientConfig};

/// NFPCF - caching proxy for NRF management and discovery
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/nfpcf.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "NFPCF_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "NFPCF_PORT")]
    port: Option<u16>,

    /// Backend NRF base URL
    #[arg(long, env = "NFPCF_NRF_URL")]
    nrf_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(url) = args.nrf_url {
        config.nrf.url = url;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging);

    info!(
        "Starting NFPCF v{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        config.info.description,
        config.info.version
    );

    let metrics_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(Arc::new(handle)),
        Err(e) => {
            warn!("Prometheus recorder not installed, /metrics disabled: {}", e);
            None
        }
    };

    // Backend NRF client
    let nrf = Arc::new(NrfClient::new(NrfClientConfig {
        url: config.nrf.url.clone(),
        timeout: config.nrf_timeout(),
        http2_prior_knowledge: config.nrf.http2_prior_knowledge,
    })?);

    // Profile cache and its eviction sweep
    let cache = Arc::new(ProfileCache::new(CacheConfig {
        ttl: config.cache_ttl(),
        snssai_match: config.cache.snssai_match,
        requester_match: config.cache.requester_match,
    }));
    let eviction = spawn_eviction_task(&cache);

    let coordinator = Arc::new(RequestCoordinator::new(
        cache,
        nrf,
        CoordinatorConfig {
            discovery_tier: config.cache.discovery_tier,
            backend_timeout: config.nrf_timeout(),
        },
    ));

    let state = AppState::new(coordinator);
    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.bind_address, config.server.port
            )
        })?;

    info!("Listening on {}", addr);
    info!("Backend NRF: {}", config.nrf.url);
    info!("Cache TTL: {:?}", config.cache_ttl());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    eviction.shutdown().await;
    served?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
