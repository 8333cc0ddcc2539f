//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use nfpcf_core::{ProfileCache, RequestCoordinator};
use std::sync::Arc;

/// Handle used to render the Prometheus exposition
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RequestCoordinator>,
    pub cache: Arc<ProfileCache>,
}

impl AppState {
    pub fn new(coordinator: Arc<RequestCoordinator>) -> Self {
        let cache = coordinator.cache().clone();
        Self { coordinator, cache }
    }
}
