//! Provider configuration resolved from construction options and the environment
//!
//! The resolved [`ProviderConfig`] is immutable and shared read-only by every call.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::errors::ConfigError;

/// Name the Prometheus provider is registered under.
pub const PROM_CLIENT_NAME: &str = "Prometheus";
pub const DEFAULT_PROM_ADDRESS: &str = "http://prometheus-k8s:9090";
/// CA bundle mounted into every pod by the service account admission.
pub const K8S_POD_CA_FILE_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

// Construction options
pub const METRICS_PROVIDER_NAME_ENV: &str = "METRICS_PROVIDER_NAME";
pub const METRICS_PROVIDER_ADDRESS_ENV: &str = "METRICS_PROVIDER_ADDRESS";
pub const METRICS_PROVIDER_TOKEN_ENV: &str = "METRICS_PROVIDER_TOKEN";
pub const INSECURE_SKIP_VERIFY_ENV: &str = "INSECURE_SKIP_VERIFY";

// Provider behaviour
pub const WATCH_MODE_ENV: &str = "WATCH_MODE";
pub const WATCH_POD_ENV: &str = "WATCH_POD";
pub const WATCH_NAMESPACE_ENV: &str = "WATCH_NAMESPACE";
pub const WATCH_POD_REGEX_ENV: &str = "WATCH_POD_REGEX";
pub const WATCH_MINIMAL_ENV: &str = "WATCH_MINIMAL";
pub const WATCH_RECORDING_RULES_ENV: &str = "WATCH_RECORDING_RULES";
pub const WATCH_INCLUDE_TS_ENV: &str = "WATCH_INCLUDE_TS";
pub const ENABLE_OPENSHIFT_AUTH_ENV: &str = "ENABLE_OPENSHIFT_AUTH";

/// Options the orchestrator passes when constructing a provider
#[derive(Clone, Debug, Default)]
pub struct ProviderOpts {
    pub name: String,
    pub address: Option<String>,
    pub auth_token: Option<String>,
    pub insecure_skip_verify: bool,
}

impl ProviderOpts {
    pub fn prometheus() -> Self {
        Self {
            name: PROM_CLIENT_NAME.to_string(),
            ..Default::default()
        }
    }

    /// Read the options from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            name: lookup(METRICS_PROVIDER_NAME_ENV).unwrap_or_default(),
            address: lookup(METRICS_PROVIDER_ADDRESS_ENV).filter(|v| !v.is_empty()),
            auth_token: lookup(METRICS_PROVIDER_TOKEN_ENV).filter(|v| !v.is_empty()),
            insecure_skip_verify: is_true(lookup(INSECURE_SKIP_VERIFY_ENV)),
        }
    }
}

/// Which family of queries the provider issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// `avg_over_time` / `stddev_over_time` over the request window
    #[default]
    Windowed,
    /// Latest instant values, rates over one minute for counters
    Latest,
}

/// How the backend's TLS certificate is verified
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum TrustStrategy {
    #[default]
    Default,
    InsecureSkipVerify,
    /// Trust only the CA bundle at the given path, authenticate with the bearer token
    ServiceAccountCa { ca_path: PathBuf },
}

/// Bearer credential, redacted in debug output
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Workload scoping for application-level queries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodFilter {
    pub pod: Option<String>,
    pub pod_regex: Option<String>,
    pub namespace: Option<String>,
}

impl PodFilter {
    /// True when either an exact pod name or a pod regex is configured.
    pub fn is_active(&self) -> bool {
        self.pod.is_some() || self.pod_regex.is_some()
    }

    /// Regex matching the watched pod; an exact name is anchored.
    pub fn pod_pattern(&self) -> Option<String> {
        match (&self.pod_regex, &self.pod) {
            (Some(re), _) => Some(re.clone()),
            (None, Some(pod)) => Some(format!("^{}$", pod)),
            (None, None) => None,
        }
    }
}

/// Immutable provider behaviour fixed at construction
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub address: String,
    pub bearer_token: Option<BearerToken>,
    pub trust: TrustStrategy,
    pub mode: QueryMode,
    /// Reduced metric set for the agent profile, latest mode only
    pub minimal: bool,
    /// Use precomputed recording rules, minimal latest mode only
    pub recording_rules: bool,
    /// Add serving latency/throughput rules when a pod filter is active
    pub include_serving: bool,
    pub pod_filter: PodFilter,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_PROM_ADDRESS.to_string(),
            bearer_token: None,
            trust: TrustStrategy::Default,
            mode: QueryMode::Windowed,
            minimal: false,
            recording_rules: false,
            include_serving: false,
            pod_filter: PodFilter::default(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the configuration from options and the process environment.
    pub fn from_env(opts: ProviderOpts) -> Result<Self, ConfigError> {
        Self::resolve(opts, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration from options and an environment lookup.
    pub fn resolve<F>(opts: ProviderOpts, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if opts.name != PROM_CLIENT_NAME {
            return Err(ConfigError::ProviderMismatch {
                expected: PROM_CLIENT_NAME.to_string(),
                found: opts.name,
            });
        }

        let mode = match lookup(WATCH_MODE_ENV) {
            Some(mode) if mode.eq_ignore_ascii_case("latest") => QueryMode::Latest,
            _ => QueryMode::Windowed,
        };

        let trust = if lookup(ENABLE_OPENSHIFT_AUTH_ENV).is_some() {
            TrustStrategy::ServiceAccountCa {
                ca_path: PathBuf::from(K8S_POD_CA_FILE_PATH),
            }
        } else if opts.insecure_skip_verify {
            TrustStrategy::InsecureSkipVerify
        } else {
            TrustStrategy::Default
        };

        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Ok(Self {
            address: opts
                .address
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_PROM_ADDRESS.to_string()),
            bearer_token: opts
                .auth_token
                .filter(|t| !t.is_empty())
                .map(BearerToken::new),
            trust,
            mode,
            minimal: is_true(lookup(WATCH_MINIMAL_ENV)),
            recording_rules: is_true(lookup(WATCH_RECORDING_RULES_ENV)),
            include_serving: is_true(lookup(WATCH_INCLUDE_TS_ENV)),
            pod_filter: PodFilter {
                pod: non_empty(WATCH_POD_ENV),
                pod_regex: non_empty(WATCH_POD_REGEX_ENV),
                namespace: non_empty(WATCH_NAMESPACE_ENV),
            },
        })
    }

    pub fn is_latest(&self) -> bool {
        self.mode == QueryMode::Latest
    }

    /// Minimal set only applies in latest mode.
    pub fn uses_minimal_set(&self) -> bool {
        self.is_latest() && self.minimal
    }

    /// Recording rules only apply to the minimal latest set.
    pub fn uses_recording_rules(&self) -> bool {
        self.uses_minimal_set() && self.recording_rules
    }
}

/// Resolve from a fixed map, mostly useful for tests and embedding.
pub fn lookup_in(vars: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| vars.get(key).cloned()
}

fn is_true(value: Option<String>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn rejects_foreign_provider_name() {
        let opts = ProviderOpts {
            name: "SignalFx".to_string(),
            ..Default::default()
        };
        let err = ProviderConfig::resolve(opts, |_| None).unwrap_err();
        assert!(
            matches!(err, ConfigError::ProviderMismatch { ref found, .. } if found == "SignalFx")
        );
    }

    #[test]
    fn defaults_to_windowed_mode_and_default_address() {
        let cfg = ProviderConfig::resolve(ProviderOpts::prometheus(), |_| None).unwrap();
        assert_eq!(cfg.mode, QueryMode::Windowed);
        assert_eq!(cfg.address, DEFAULT_PROM_ADDRESS);
        assert_eq!(cfg.trust, TrustStrategy::Default);
        assert!(cfg.bearer_token.is_none());
        assert!(!cfg.pod_filter.is_active());
    }

    #[test]
    fn latest_mode_is_case_insensitive() {
        let vars = env(&[(WATCH_MODE_ENV, "LaTeSt"), (WATCH_MINIMAL_ENV, "TRUE")]);
        let cfg = ProviderConfig::resolve(ProviderOpts::prometheus(), lookup_in(&vars)).unwrap();
        assert!(cfg.is_latest());
        assert!(cfg.uses_minimal_set());
    }

    #[test]
    fn minimal_and_rules_ignored_in_windowed_mode() {
        let vars = env(&[
            (WATCH_MINIMAL_ENV, "true"),
            (WATCH_RECORDING_RULES_ENV, "true"),
        ]);
        let cfg = ProviderConfig::resolve(ProviderOpts::prometheus(), lookup_in(&vars)).unwrap();
        assert!(cfg.minimal);
        assert!(!cfg.uses_minimal_set());
        assert!(!cfg.uses_recording_rules());
    }

    #[test]
    fn openshift_auth_selects_ca_strategy_over_insecure() {
        let vars = env(&[(ENABLE_OPENSHIFT_AUTH_ENV, "")]);
        let opts = ProviderOpts {
            insecure_skip_verify: true,
            auth_token: Some("tok-3f9a".to_string()),
            ..ProviderOpts::prometheus()
        };
        let cfg = ProviderConfig::resolve(opts, lookup_in(&vars)).unwrap();
        assert_eq!(
            cfg.trust,
            TrustStrategy::ServiceAccountCa {
                ca_path: PathBuf::from(K8S_POD_CA_FILE_PATH)
            }
        );
        let token = cfg.bearer_token.as_ref().map(|t| t.expose());
        assert_eq!(token, Some("tok-3f9a"));
        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("tok-3f9a"));
        assert!(debug.contains("BearerToken(***)"));
    }

    #[test]
    fn pod_regex_takes_precedence_over_exact_name() {
        let filter = PodFilter {
            pod: Some("web-0".to_string()),
            pod_regex: Some("web-.*".to_string()),
            namespace: None,
        };
        assert_eq!(filter.pod_pattern().as_deref(), Some("web-.*"));

        let exact = PodFilter {
            pod: Some("web-0".to_string()),
            ..Default::default()
        };
        assert_eq!(exact.pod_pattern().as_deref(), Some("^web-0$"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let vars = env(&[(WATCH_POD_ENV, ""), (WATCH_NAMESPACE_ENV, "ml")]);
        let cfg = ProviderConfig::resolve(ProviderOpts::prometheus(), lookup_in(&vars)).unwrap();
        assert!(cfg.pod_filter.pod.is_none());
        assert_eq!(cfg.pod_filter.namespace.as_deref(), Some("ml"));
    }

    #[test]
    fn opts_read_from_lookup() {
        let vars = env(&[
            (METRICS_PROVIDER_NAME_ENV, PROM_CLIENT_NAME),
            (METRICS_PROVIDER_ADDRESS_ENV, "https://prom.example:9091"),
            (INSECURE_SKIP_VERIFY_ENV, "true"),
        ]);
        let opts = ProviderOpts::from_lookup(lookup_in(&vars));
        assert_eq!(opts.address.as_deref(), Some("https://prom.example:9091"));
        assert!(opts.auth_token.is_none());
        assert!(opts.insecure_skip_verify);

        let cfg = ProviderConfig::resolve(opts, |_| None).unwrap();
        assert_eq!(cfg.trust, TrustStrategy::InsecureSkipVerify);
    }
}
