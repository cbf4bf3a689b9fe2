use load_watcher_core::{HostMetrics, Metric, MetricOperator, NAMESPACE_LABEL, POD_LABEL};
use tracing::{error, warn};

use crate::catalog;
use crate::executor::QueryData;
use crate::query::HOST_LABEL;

/// Convert a raw query result into metric records grouped by host.
///
/// Only instant vectors carry per-host samples; any other result type is
/// logged and yields no records. Samples without an `instance` label are
/// grouped under the empty host.
pub fn normalize(
    data: &QueryData,
    metric: &str,
    operator: MetricOperator,
    rollup: &str,
) -> HostMetrics {
    let mut by_host = HostMetrics::new();

    let samples = match data {
        QueryData::Vector(samples) => samples,
        other => {
            error!(
                "unexpected {} result for {}, expected vector",
                other.result_type(),
                metric
            );
            return by_host;
        }
    };

    let class = catalog::classify(metric);
    let keep_labels = class.strategy.keeps_workload_labels();

    for sample in samples {
        let value = match sample.value.1.parse::<f64>() {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "skipping sample of {} with unparsable value {:?}: {}",
                    metric, sample.value.1, e
                );
                continue;
            }
        };

        let mut record = Metric::new(metric, class.category, operator, rollup, value);
        if keep_labels {
            for key in [POD_LABEL, NAMESPACE_LABEL] {
                if let Some(v) = sample.metric.get(key) {
                    record = record.with_label(key, v.as_str());
                }
            }
        }

        let host = sample.metric.get(HOST_LABEL).cloned().unwrap_or_default();
        by_host.entry(host).or_default().push(record);
    }

    by_host
}
