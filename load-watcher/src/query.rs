//! PromQL query synthesis
//!
//! Pure functions from (configuration, target, metric key, mode) to a query
//! string. Nothing here touches the network, the same inputs always yield the
//! same query.

use load_watcher_core::MetricOperator;

use crate::catalog::{self, Strategy};
use crate::config::PodFilter;

/// Label identifying the host a series was scraped from.
pub const HOST_LABEL: &str = "instance";
/// Label used by older exporters for the pod name.
pub const LEGACY_POD_LABEL: &str = "pod_name";
/// Range of the rate/increase wrappers used in latest mode.
pub const LATEST_RANGE: &str = "1m";

/// Hosts a query is scoped to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    AllHosts,
    Host(&'a str),
}

impl<'a> Target<'a> {
    /// Host name to filter on, `None` for all hosts or an empty name.
    pub fn host(&self) -> Option<&'a str> {
        match *self {
            Target::Host(host) if !host.is_empty() => Some(host),
            _ => None,
        }
    }
}

/// Range-vector aggregation applied in windowed mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    Average,
    StdDev,
}

impl Aggregation {
    /// Query order of the windowed variants.
    pub const ALL: [Aggregation; 2] = [Aggregation::Average, Aggregation::StdDev];

    pub fn function(&self) -> &'static str {
        match self {
            Aggregation::Average => "avg_over_time",
            Aggregation::StdDev => "stddev_over_time",
        }
    }

    pub fn operator(&self) -> MetricOperator {
        match self {
            Aggregation::Average => MetricOperator::Average,
            Aggregation::StdDev => MetricOperator::StdDev,
        }
    }
}

/// Label matcher block, renders to nothing when no matcher was added
#[derive(Clone, Debug, Default)]
pub struct Selector {
    matchers: Vec<String>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector narrowing to the target host, if any.
    pub fn for_target(target: Target<'_>) -> Self {
        Self::new().exact_opt(HOST_LABEL, target.host())
    }

    pub fn exact(mut self, label: &str, value: &str) -> Self {
        let value = escape_label_value(value);
        self.matchers.push(format!("{}=\"{}\"", label, value));
        self
    }

    pub fn exact_opt(self, label: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.exact(label, value),
            None => self,
        }
    }

    pub fn regex(mut self, label: &str, pattern: &str) -> Self {
        let pattern = escape_label_value(pattern);
        self.matchers.push(format!("{}=~\"{}\"", label, pattern));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn render(&self) -> String {
        if self.matchers.is_empty() {
            return String::new();
        }
        format!("{{{}}}", self.matchers.join(","))
    }

    /// `metric` followed by the rendered selector.
    pub fn apply(&self, metric: &str) -> String {
        format!("{}{}", metric, self.render())
    }
}

/// Quote a label value as a PromQL double-quoted string body.
///
/// Regex patterns go through the same escaping, so `web-\d+` reaches the
/// backend as the regex `web-\d+`.
fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Windowed aggregate: `avg_over_time(metric{instance="host"}[window])`.
pub fn windowed_query(
    target: Target<'_>,
    metric: &str,
    aggregation: Aggregation,
    window: &str,
) -> String {
    format!(
        "{}({}[{}])",
        aggregation.function(),
        Selector::for_target(target).apply(metric),
        window
    )
}

/// Latest-value query, dispatched on the catalog strategy of the metric.
pub fn latest_query(filter: &PodFilter, target: Target<'_>, metric: &str) -> String {
    match catalog::classify(metric).strategy {
        Strategy::NodeRule | Strategy::Gauge => Selector::for_target(target).apply(metric),
        Strategy::WorkloadRule => workload_rule_query(filter, metric),
        Strategy::ServingRule => match filter.pod_pattern() {
            Some(pattern) => pod_regex_selector(filter, "pod", &pattern).apply(metric),
            None => metric.to_string(),
        },
        Strategy::NodeIncrease { counter } => format!(
            "sum by (instance) (increase({}[{}]))",
            Selector::for_target(target).apply(counter),
            LATEST_RANGE
        ),
        Strategy::WorkloadRate { counter } => format!(
            "sum by (pod,instance) (rate({}[{}]))",
            workload_selector(filter, target).apply(counter),
            LATEST_RANGE
        ),
        Strategy::WorkloadIncrease { counter } => format!(
            "sum by (pod,instance) (increase({}[{}]))",
            workload_selector(filter, target).apply(counter),
            LATEST_RANGE
        ),
        Strategy::Counter => format!(
            "sum by (instance) (rate({}[{}]))",
            Selector::for_target(target).apply(metric),
            LATEST_RANGE
        ),
    }
}

/// Workload rules are matched on both pod label conventions and merged with `or`.
fn workload_rule_query(filter: &PodFilter, rule: &str) -> String {
    let Some(pattern) = filter.pod_pattern() else {
        return rule.to_string();
    };
    let left = pod_regex_selector(filter, "pod", &pattern).apply(rule);
    let right = pod_regex_selector(filter, LEGACY_POD_LABEL, &pattern).apply(rule);
    format!("sum by (pod,instance) (({}) or ({}))", left, right)
}

fn pod_regex_selector(filter: &PodFilter, label: &str, pattern: &str) -> Selector {
    Selector::new()
        .regex(label, pattern)
        .exact_opt("namespace", filter.namespace.as_deref())
}

/// Host, namespace and pod matchers for per-workload counters.
///
/// An explicit pod regex wins over an exact pod name.
fn workload_selector(filter: &PodFilter, target: Target<'_>) -> Selector {
    let selector = Selector::for_target(target)
        .exact_opt("namespace", filter.namespace.as_deref());
    match (&filter.pod_regex, &filter.pod) {
        (Some(pattern), _) => selector.regex("pod", pattern),
        (None, Some(pod)) => selector.exact("pod", pod),
        (None, None) => selector,
    }
}
