//! Metric catalog
//!
//! Every metric key the provider knows about maps to a [`MetricSpec`]: the
//! resource category of its records and the strategy used to turn it into a
//! PromQL query in latest mode. Keys that are not in the table fall back to
//! name heuristics (see [`classify`]).

use load_watcher_core::MetricCategory;
use load_watcher_core::MetricCategory::{Bandwidth, Cpu, Energy, Memory, Storage, Unknown};

use crate::config::ProviderConfig;

// Node metrics from node-exporter recording rules
pub const NODE_CPU: &str = "instance:node_cpu:ratio";
pub const NODE_MEMORY: &str = "instance:node_memory_utilisation:ratio";
pub const NODE_TRANSMIT_BYTES: &str = "instance:node_network_transmit_bytes:rate:sum";
pub const NODE_TRANSMIT_DROP: &str = "instance:node_network_transmit_drop_excluding_lo:rate5m";
pub const NODE_RECEIVE_BYTES: &str = "instance:node_network_receive_bytes:rate:sum";
pub const NODE_RECEIVE_DROP: &str = "instance:node_network_receive_drop_excluding_lo:rate5m";
pub const NODE_DISK_IO: &str = "instance_device:node_disk_io_time_seconds:rate5m";

// Energy exporters
pub const SCAPH_HOST_POWER: &str = "scaph_host_power_microwatts";
pub const SCAPH_HOST_JOULES: &str = "scaph_host_energy_microjoules";
pub const KEPLER_NODE_CORE_JOULES: &str = "kepler_node_core_joules_total";
pub const KEPLER_NODE_UNCORE_JOULES: &str = "kepler_node_uncore_joules_total";
pub const KEPLER_NODE_DRAM_JOULES: &str = "kepler_node_dram_joules_total";
pub const KEPLER_NODE_PACKAGE_JOULES: &str = "kepler_node_package_joules_total";
pub const KEPLER_NODE_OTHER_JOULES: &str = "kepler_node_other_joules_total";
pub const KEPLER_NODE_GPU_JOULES: &str = "kepler_node_gpu_joules_total";
pub const KEPLER_NODE_PLATFORM_JOULES: &str = "kepler_node_platform_joules_total";
pub const KEPLER_NODE_ENERGY_STAT: &str = "kepler_node_energy_stat";

// Workload counters wrapped by pseudo metrics
pub const CONTAINER_CPU_SECONDS: &str = "container_cpu_usage_seconds_total";
pub const KEPLER_CONTAINER_JOULES: &str = "kepler_container_joules_total";

// Pseudo metrics, latest mode only
pub const KEPLER_NODE_PLATFORM_JOULES_INCR_1M: &str =
    "kepler_node_platform_joules_total__increase1m";
pub const CONTAINER_CPU_RATE_1M: &str = "container_cpu_usage_seconds_total__rate1m";
pub const KEPLER_CONTAINER_JOULES_RATE_1M: &str = "kepler_container_joules_total__rate1m";
pub const KEPLER_CONTAINER_JOULES_INCR_1M: &str = "kepler_container_joules_total__increase1m";

// Recording rules, used when WATCH_RECORDING_RULES=true
pub const RULE_NODE_CPU: &str = "kepler:cpu_rate:1m:by_node";
pub const RULE_NODE_POWER: &str = "kepler:node_platform_watt:1m:by_node";
pub const RULE_NODE_ENERGY: &str = "kepler:node_platform_joules:1m:by_node";
pub const RULE_APP_CPU: &str = "kepler:container_torchserve_cpu_rate:1m";
pub const RULE_APP_POWER: &str = "kepler:container_torchserve_watt:1m";
pub const RULE_APP_ENERGY: &str = "kepler:container_torchserve_joules:1m";
pub const RULE_TS_LATENCY: &str = "ts:latency:1m:ms";
pub const RULE_TS_THROUGHPUT: &str = "ts:throughput:1m:rps";

/// How a metric key is turned into a latest-mode query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Node-scoped recording rule, optionally narrowed to one instance
    NodeRule,
    /// Workload recording rule matched on both pod label conventions
    WorkloadRule,
    /// Serving recording rule matched on the `pod` label only
    ServingRule,
    /// One minute increase of a node counter, summed by instance
    NodeIncrease { counter: &'static str },
    /// One minute rate of a workload counter, summed by pod and instance
    WorkloadRate { counter: &'static str },
    /// One minute increase of a workload counter, summed by pod and instance
    WorkloadIncrease { counter: &'static str },
    /// Monotonic counter, one minute rate summed by instance
    Counter,
    /// Plain instant selector
    Gauge,
}

impl Strategy {
    /// Workload pseudo metrics keep their `pod` / `namespace` labels.
    pub fn keeps_workload_labels(&self) -> bool {
        matches!(
            self,
            Strategy::WorkloadRate { .. } | Strategy::WorkloadIncrease { .. }
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub category: MetricCategory,
    pub strategy: Strategy,
}

const fn spec(name: &'static str, category: MetricCategory, strategy: Strategy) -> MetricSpec {
    MetricSpec {
        name,
        category,
        strategy,
    }
}

pub const CATALOG: &[MetricSpec] = &[
    spec(NODE_CPU, Cpu, Strategy::Gauge),
    spec(NODE_MEMORY, Memory, Strategy::Gauge),
    spec(NODE_TRANSMIT_BYTES, Bandwidth, Strategy::Gauge),
    spec(NODE_TRANSMIT_DROP, Bandwidth, Strategy::Gauge),
    spec(NODE_RECEIVE_BYTES, Bandwidth, Strategy::Gauge),
    spec(NODE_RECEIVE_DROP, Bandwidth, Strategy::Gauge),
    spec(NODE_DISK_IO, Storage, Strategy::Gauge),
    spec(SCAPH_HOST_POWER, Energy, Strategy::Gauge),
    spec(SCAPH_HOST_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_CORE_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_UNCORE_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_DRAM_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_PACKAGE_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_OTHER_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_GPU_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_PLATFORM_JOULES, Energy, Strategy::Counter),
    spec(KEPLER_NODE_ENERGY_STAT, Energy, Strategy::Gauge),
    spec(
        KEPLER_NODE_PLATFORM_JOULES_INCR_1M,
        Energy,
        Strategy::NodeIncrease {
            counter: KEPLER_NODE_PLATFORM_JOULES,
        },
    ),
    spec(
        CONTAINER_CPU_RATE_1M,
        Cpu,
        Strategy::WorkloadRate {
            counter: CONTAINER_CPU_SECONDS,
        },
    ),
    spec(
        KEPLER_CONTAINER_JOULES_RATE_1M,
        Energy,
        Strategy::WorkloadRate {
            counter: KEPLER_CONTAINER_JOULES,
        },
    ),
    spec(
        KEPLER_CONTAINER_JOULES_INCR_1M,
        Energy,
        Strategy::WorkloadIncrease {
            counter: KEPLER_CONTAINER_JOULES,
        },
    ),
    spec(RULE_NODE_CPU, Cpu, Strategy::NodeRule),
    spec(RULE_NODE_POWER, Energy, Strategy::NodeRule),
    spec(RULE_NODE_ENERGY, Energy, Strategy::NodeRule),
    spec(RULE_APP_CPU, Cpu, Strategy::WorkloadRule),
    spec(RULE_APP_POWER, Energy, Strategy::WorkloadRule),
    spec(RULE_APP_ENERGY, Energy, Strategy::WorkloadRule),
    spec(RULE_TS_LATENCY, Unknown, Strategy::ServingRule),
    spec(RULE_TS_THROUGHPUT, Unknown, Strategy::ServingRule),
];

/// Metrics queried in windowed mode and in latest mode without the minimal profile.
pub const FULL_SET: &[&str] = &[
    NODE_CPU,
    NODE_MEMORY,
    NODE_TRANSMIT_BYTES,
    NODE_TRANSMIT_DROP,
    NODE_RECEIVE_BYTES,
    NODE_RECEIVE_DROP,
    NODE_DISK_IO,
    SCAPH_HOST_POWER,
    SCAPH_HOST_JOULES,
    KEPLER_NODE_CORE_JOULES,
    KEPLER_NODE_UNCORE_JOULES,
    KEPLER_NODE_DRAM_JOULES,
    KEPLER_NODE_PACKAGE_JOULES,
    KEPLER_NODE_OTHER_JOULES,
    KEPLER_NODE_GPU_JOULES,
    KEPLER_NODE_PLATFORM_JOULES,
    KEPLER_NODE_ENERGY_STAT,
];

/// Category and query strategy of a metric key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub category: MetricCategory,
    pub strategy: Strategy,
}

pub fn lookup(name: &str) -> Option<&'static MetricSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

/// Classify a metric key, falling back to name heuristics for unknown keys.
///
/// The heuristics are best effort: a new exporter metric whose name does not
/// follow the `_joules_total` counter convention is treated as a gauge. Add
/// such metrics to [`CATALOG`] rather than relying on the fallback.
pub fn classify(name: &str) -> Classification {
    match lookup(name) {
        Some(spec) => Classification {
            category: spec.category,
            strategy: spec.strategy,
        },
        None => Classification {
            category: guess_category(name),
            strategy: if is_counter_metric(name) {
                Strategy::Counter
            } else {
                Strategy::Gauge
            },
        },
    }
}

pub fn guess_category(name: &str) -> MetricCategory {
    if name.contains("_joules") {
        Energy
    } else if name.contains("cpu") {
        Cpu
    } else {
        Unknown
    }
}

pub fn is_counter_metric(name: &str) -> bool {
    name.ends_with("_joules_total") || name == SCAPH_HOST_JOULES
}

/// Metric keys queried for the configuration, in query order.
pub fn metric_set(config: &ProviderConfig) -> Vec<&'static str> {
    if !config.uses_minimal_set() {
        return FULL_SET.to_vec();
    }

    let scoped = config.pod_filter.is_active();
    let mut metrics = Vec::new();
    if config.uses_recording_rules() {
        metrics.extend([RULE_NODE_CPU, RULE_NODE_POWER, RULE_NODE_ENERGY]);
        if scoped {
            metrics.extend([RULE_APP_CPU, RULE_APP_POWER, RULE_APP_ENERGY]);
            if config.include_serving {
                metrics.extend([RULE_TS_LATENCY, RULE_TS_THROUGHPUT]);
            }
        }
    } else {
        metrics.extend([
            NODE_CPU,
            KEPLER_NODE_PLATFORM_JOULES,
            KEPLER_NODE_PLATFORM_JOULES_INCR_1M,
        ]);
        if scoped {
            metrics.extend([
                CONTAINER_CPU_RATE_1M,
                KEPLER_CONTAINER_JOULES_RATE_1M,
                KEPLER_CONTAINER_JOULES_INCR_1M,
            ]);
        }
    }
    metrics
}
