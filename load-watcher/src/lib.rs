//! Load-Watcher
//!
//! Load-Watcher -- Prometheus metrics provider feeding the load-aware scheduler

pub mod catalog;

pub mod config;
pub use config::{PodFilter, ProviderConfig, ProviderOpts, QueryMode, TrustStrategy};

pub mod errors;
pub use errors::{ConfigError, QueryError};

pub mod executor;
pub use executor::{PromClient, QueryExecutor};

mod normalize;
pub use normalize::normalize;

mod provider;
pub use provider::PrometheusProvider;

mod publisher;
pub use publisher::{ObservedGauges, TelemetrySink, OBSERVED_VALUE};

pub mod query;

mod transport;
pub use transport::build_client;

pub use load_watcher_core::{
    FetchError, HostMetrics, Metric, MetricCategory, MetricOperator, MetricResult,
    MetricsProvider, Window,
};
