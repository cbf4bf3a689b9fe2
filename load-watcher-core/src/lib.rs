//! Load-Watcher-Core
//!
//! Shared metric model and the provider contract used by the load-watcher services

pub mod metric;
pub use metric::{
    dedup_metrics, HostMetrics, Metric, MetricCategory, MetricOperator, Window, NAMESPACE_LABEL,
    POD_LABEL,
};

pub mod result;
pub use result::{FetchError, MetricResult};

mod provider;
pub use provider::MetricsProvider;
