use async_trait::async_trait;

use crate::metric::{HostMetrics, Metric, Window};
use crate::result::MetricResult;

/// Contract between a metrics backend adapter and the polling orchestrator
///
/// Implementations hold only immutable configuration, so a single instance
/// may be shared across tasks and called concurrently.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name the provider was registered under.
    fn name(&self) -> &'static str;

    /// Fetch metrics of a single host over the window.
    async fn fetch_host_metrics(&self, host: &str, window: &Window) -> MetricResult<Vec<Metric>>;

    /// Fetch metrics of every host reporting to the backend.
    async fn fetch_all_hosts_metrics(&self, window: &Window) -> MetricResult<HostMetrics>;

    /// Lightweight liveness probe, returns the backend status code.
    async fn health(&self) -> Result<u16, Self::Error>;
}
