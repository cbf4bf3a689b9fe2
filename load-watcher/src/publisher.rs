use load_watcher_core::{HostMetrics, Window};
use metrics::{describe_gauge, gauge, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tracing::debug;

pub const OBSERVED_VALUE: &str = "loadwatcher_observed_value";
const OBSERVED_VALUE_HELP: &str = "Observed metric value from load-watcher cache.";

/// Receives host metric snapshots for republishing
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, snapshot: &HostMetrics, window: &Window);
}

/// Republishes snapshots as `loadwatcher_observed_value` gauges
///
/// Each instance owns its own recorder, nothing is installed globally. The
/// owner serves [`ObservedGauges::render`] wherever it exposes metrics.
pub struct ObservedGauges {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl ObservedGauges {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        with_local_recorder(&recorder, || {
            describe_gauge!(OBSERVED_VALUE, OBSERVED_VALUE_HELP);
        });
        Self { recorder, handle }
    }

    /// Text exposition of every gauge published so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for ObservedGauges {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for ObservedGauges {
    fn publish(&self, snapshot: &HostMetrics, window: &Window) {
        with_local_recorder(&self.recorder, || {
            for (host, metrics) in snapshot {
                for m in metrics {
                    gauge!(
                        OBSERVED_VALUE,
                        "host" => host.clone(),
                        "name" => m.name.clone(),
                        "type" => m.category.as_str(),
                        "operator" => m.operator.as_str(),
                        "window" => window.duration.clone()
                    )
                    .set(m.value);
                }
            }
        });
        debug!("published observed metrics for {} host(s)", snapshot.len());
    }
}
