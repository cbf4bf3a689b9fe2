use std::sync::Arc;

use async_trait::async_trait;
use load_watcher_core::{
    dedup_metrics, HostMetrics, Metric, MetricOperator, MetricResult, MetricsProvider, Window,
};
use tracing::{error, info};

use crate::catalog;
use crate::config::{ProviderConfig, ProviderOpts, QueryMode, PROM_CLIENT_NAME};
use crate::errors::{ConfigError, QueryError};
use crate::executor::{PromClient, QueryExecutor};
use crate::normalize::normalize;
use crate::query::{latest_query, windowed_query, Aggregation, Target, LATEST_RANGE};

/// One query of a fetch, with what is needed to normalize its result
struct PlannedQuery {
    promql: String,
    metric: &'static str,
    operator: MetricOperator,
    rollup: String,
}

/// Metrics provider backed by a Prometheus server
///
/// Holds only the configuration fixed at construction; every fetch is
/// call-local and queries run sequentially in a fixed order.
#[derive(Clone)]
pub struct PrometheusProvider {
    config: Arc<ProviderConfig>,
    executor: Arc<dyn QueryExecutor>,
}

impl PrometheusProvider {
    /// Build a provider talking HTTP to the configured Prometheus.
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        let http = crate::transport::build_client(&config)?;
        let client = PromClient::new(http, config.address.clone());
        info!(
            "prometheus provider ready: address={}, mode={:?}, minimal={}, recording_rules={}",
            config.address,
            config.mode,
            config.uses_minimal_set(),
            config.uses_recording_rules()
        );
        Ok(Self::with_executor(config, Arc::new(client)))
    }

    /// Resolve the configuration from the options and the process environment.
    pub fn from_env(opts: ProviderOpts) -> Result<Self, ConfigError> {
        Self::new(ProviderConfig::from_env(opts)?)
    }

    pub fn with_executor(config: ProviderConfig, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            config: Arc::new(config),
            executor,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Queries of one fetch, outer loop over the operator variant, inner over metrics.
    fn plan(&self, target: Target<'_>, window: &Window) -> Vec<PlannedQuery> {
        let metrics = catalog::metric_set(&self.config);
        match self.config.mode {
            QueryMode::Latest => metrics
                .into_iter()
                .map(|metric| PlannedQuery {
                    promql: latest_query(&self.config.pod_filter, target, metric),
                    metric,
                    operator: MetricOperator::Latest,
                    rollup: LATEST_RANGE.to_string(),
                })
                .collect(),
            QueryMode::Windowed => {
                let mut planned = Vec::with_capacity(Aggregation::ALL.len() * metrics.len());
                for aggregation in Aggregation::ALL {
                    for &metric in &metrics {
                        planned.push(PlannedQuery {
                            promql: windowed_query(target, metric, aggregation, &window.duration),
                            metric,
                            operator: aggregation.operator(),
                            rollup: window.duration.clone(),
                        });
                    }
                }
                planned
            }
        }
    }

    /// Run every planned query, keeping the results of the ones that succeed.
    async fn run<F>(&self, queries: Vec<PlannedQuery>, mut collect: F) -> Vec<String>
    where
        F: FnMut(HostMetrics) + Send,
    {
        let mut errors = Vec::new();
        for query in queries {
            match self.executor.execute(&query.promql).await {
                Ok(data) => {
                    let by_host = normalize(&data, query.metric, query.operator, &query.rollup);
                    collect(by_host);
                }
                Err(e) => {
                    error!("error querying Prometheus for query {}: {}", query.promql, e);
                    errors.push(format!("{}: {}", query.promql, e));
                }
            }
        }
        errors
    }

    pub async fn fetch_host_metrics(
        &self,
        host: &str,
        window: &Window,
    ) -> MetricResult<Vec<Metric>> {
        let queries = self.plan(Target::Host(host), window);
        let attempted = queries.len();

        let mut metrics = Vec::new();
        let errors = self
            .run(queries, |mut by_host| {
                if let Some(records) = by_host.remove(host) {
                    metrics.extend(dedup_metrics(records));
                }
            })
            .await;

        MetricResult::with_errors(metrics, errors, attempted)
    }

    pub async fn fetch_all_hosts_metrics(&self, window: &Window) -> MetricResult<HostMetrics> {
        let queries = self.plan(Target::AllHosts, window);
        let attempted = queries.len();

        let mut hosts = HostMetrics::new();
        let errors = self
            .run(queries, |by_host| {
                for (host, records) in by_host {
                    hosts.entry(host).or_default().extend(dedup_metrics(records));
                }
            })
            .await;

        MetricResult::with_errors(hosts, errors, attempted)
    }

    pub async fn health(&self) -> Result<u16, QueryError> {
        self.executor.probe().await
    }
}

#[async_trait]
impl MetricsProvider for PrometheusProvider {
    type Error = QueryError;

    fn name(&self) -> &'static str {
        PROM_CLIENT_NAME
    }

    async fn fetch_host_metrics(&self, host: &str, window: &Window) -> MetricResult<Vec<Metric>> {
        PrometheusProvider::fetch_host_metrics(self, host, window).await
    }

    async fn fetch_all_hosts_metrics(&self, window: &Window) -> MetricResult<HostMetrics> {
        PrometheusProvider::fetch_all_hosts_metrics(self, window).await
    }

    async fn health(&self) -> Result<u16, QueryError> {
        PrometheusProvider::health(self).await
    }
}
