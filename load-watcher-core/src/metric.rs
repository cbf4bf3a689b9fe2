use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Label carrying the workload (pod) a record belongs to.
pub const POD_LABEL: &str = "pod";
/// Label carrying the namespace of the workload.
pub const NAMESPACE_LABEL: &str = "namespace";

/// Metrics grouped by host identifier.
pub type HostMetrics = BTreeMap<String, Vec<Metric>>;

/// Resource category a metric describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricCategory {
    #[serde(rename = "CPU")]
    Cpu,
    Memory,
    Storage,
    Bandwidth,
    Energy,
    Unknown,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Cpu => "CPU",
            MetricCategory::Memory => "Memory",
            MetricCategory::Storage => "Storage",
            MetricCategory::Bandwidth => "Bandwidth",
            MetricCategory::Energy => "Energy",
            MetricCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the value of a metric was derived from the raw series
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricOperator {
    #[serde(rename = "AVG")]
    Average,
    #[serde(rename = "STD")]
    StdDev,
    Latest,
    Unknown,
}

impl MetricOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricOperator::Average => "AVG",
            MetricOperator::StdDev => "STD",
            MetricOperator::Latest => "Latest",
            MetricOperator::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MetricOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized metric record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub category: MetricCategory,
    pub operator: MetricOperator,
    pub rollup: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        category: MetricCategory,
        operator: MetricOperator,
        rollup: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            operator,
            rollup: rollup.into(),
            value,
            labels: None,
        }
    }

    /// Attach a label, creating the label map on first use.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// Key used to detect duplicate records: the name, qualified by pod when present.
    pub fn identity_key(&self) -> String {
        match self.label(POD_LABEL) {
            Some(pod) => format!("{}|pod={}", self.name, pod),
            None => self.name.clone(),
        }
    }
}

/// Keeps the first record for every identity key, preserving relative order.
pub fn dedup_metrics(metrics: Vec<Metric>) -> Vec<Metric> {
    if metrics.len() <= 1 {
        return metrics;
    }
    let mut seen = HashSet::with_capacity(metrics.len());
    metrics
        .into_iter()
        .filter(|m| seen.insert(m.identity_key()))
        .collect()
}

/// Look-back window of a metrics request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// PromQL duration, e.g. `5m`
    pub duration: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
}

impl Window {
    pub fn new(duration: impl Into<String>) -> Self {
        Self {
            duration: duration.into(),
            start: 0,
            end: 0,
        }
    }
}

impl Default for Window {
    fn default() -> Self {
        Window::new("15m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str, value: f64) -> Metric {
        Metric::new(
            name,
            MetricCategory::Cpu,
            MetricOperator::Latest,
            "1m",
            value,
        )
    }

    #[test]
    fn identity_key_includes_pod_label() {
        let plain = metric("cpu", 1.0);
        assert_eq!(plain.identity_key(), "cpu");

        let scoped = metric("cpu", 1.0).with_label(POD_LABEL, "web-0");
        assert_eq!(scoped.identity_key(), "cpu|pod=web-0");

        // namespace alone does not qualify the key
        let ns_only = metric("cpu", 1.0).with_label(NAMESPACE_LABEL, "prod");
        assert_eq!(ns_only.identity_key(), "cpu");
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let input = vec![
            metric("b", 1.0),
            metric("a", 2.0).with_label(POD_LABEL, "p1"),
            metric("b", 3.0),
            metric("a", 4.0).with_label(POD_LABEL, "p2"),
            metric("a", 5.0).with_label(POD_LABEL, "p1"),
            metric("c", 6.0),
        ];

        let out = dedup_metrics(input);
        let values: Vec<f64> = out.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn dedup_is_stable_under_permutation() {
        let first = metric("x", 1.0).with_label(POD_LABEL, "p");
        let second = metric("x", 2.0).with_label(POD_LABEL, "p");
        let other = metric("y", 3.0);

        let permutations = vec![
            vec![first.clone(), second.clone(), other.clone()],
            vec![second.clone(), other.clone(), first.clone()],
            vec![other.clone(), first.clone(), second.clone()],
        ];

        for input in permutations {
            let expected: Vec<Metric> = {
                let winner = input.iter().find(|m| m.name == "x").cloned().unwrap();
                input
                    .iter()
                    .filter(|m| m.name != "x" || **m == winner)
                    .cloned()
                    .collect()
            };
            assert_eq!(dedup_metrics(input), expected);
        }
    }

    #[test]
    fn serializes_with_wire_names() {
        let m = Metric::new(
            "instance:node_cpu:ratio",
            MetricCategory::Cpu,
            MetricOperator::Average,
            "5m",
            0.25,
        );
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "CPU");
        assert_eq!(json["operator"], "AVG");
        assert_eq!(json["rollup"], "5m");
        assert!(json.get("labels").is_none());

        let back: Metric = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }
}
