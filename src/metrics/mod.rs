//! Prometheus metrics for the registration service.
//!
//! The recorder is installed once per process; its handle is kept so the HTTP
//! server can render the exposition text at `/metrics`.

pub mod registration;

pub use registration::RegistrationMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                RegistrationMetrics::describe();
                info!("Prometheus recorder installed");
            }
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    }
}

/// Render the current metrics, if a recorder was installed
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}
