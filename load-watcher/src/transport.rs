use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Certificate, Client, Url};
use tracing::info;

use crate::config::{ProviderConfig, TrustStrategy};
use crate::errors::ConfigError;

const DIAL_TIMEOUT: Duration = Duration::from_secs(30);
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Build the authenticated HTTP client used to talk to the backend
pub fn build_client(config: &ProviderConfig) -> Result<Client, ConfigError> {
    let url = parse_address(&config.address)?;

    let mut builder = Client::builder()
        .connect_timeout(DIAL_TIMEOUT)
        .tcp_keepalive(KEEP_ALIVE);

    match &config.trust {
        TrustStrategy::Default => {}
        TrustStrategy::InsecureSkipVerify => {
            info!("TLS verification disabled for {}", url);
            builder = builder.danger_accept_invalid_certs(true);
        }
        TrustStrategy::ServiceAccountCa { ca_path } => {
            let certs = load_ca_file(ca_path)?;
            info!(
                "trusting {} CA certificate(s) from {} for {}",
                certs.len(),
                ca_path.display(),
                url
            );
            builder = builder.tls_built_in_root_certs(false);
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
    }

    if let Some(token) = &config.bearer_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
            .map_err(|e| ConfigError::InvalidToken(e.to_string()))?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }

    builder.build().map_err(ConfigError::Client)
}

/// Parse the backend address, only http(s) endpoints are accepted.
pub fn parse_address(address: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(address).map_err(|e| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidAddress {
            address: address.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}

/// Read a PEM bundle and return every certificate in it.
pub fn load_ca_file(path: &Path) -> Result<Vec<Certificate>, ConfigError> {
    let pem = std::fs::read(path).map_err(|source| ConfigError::CaBundleRead {
        path: path.to_path_buf(),
        source,
    })?;

    let certs = Certificate::from_pem_bundle(&pem).map_err(|e| ConfigError::CaBundleInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if certs.is_empty() {
        return Err(ConfigError::CaBundleInvalid {
            path: path.to_path_buf(),
            reason: "failed to append CA certificate to the pool".to_string(),
        });
    }
    Ok(certs)
}
