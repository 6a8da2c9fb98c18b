use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static HANDLE: OnceLock<MetricsHandle> = OnceLock::new();

/// Renders the Prometheus text exposition of everything recorded through
/// the `metrics` facade.
#[derive(Clone)]
pub struct MetricsHandle {
    inner: Option<PrometheusHandle>,
}

impl MetricsHandle {
    pub fn render(&self) -> String {
        match &self.inner {
            Some(handle) => handle.render(),
            None => "# Metrics recorder not installed\n".to_string(),
        }
    }
}

/// Install the global Prometheus recorder.
///
/// Safe to call more than once; the first installation wins and later
/// calls return the same handle.
pub fn init_metrics() -> MetricsHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => MetricsHandle {
                inner: Some(handle),
            },
            Err(e) => {
                tracing::error!("Failed to install Prometheus recorder: {}", e);
                MetricsHandle { inner: None }
            }
        })
        .clone()
}
