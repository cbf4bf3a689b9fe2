use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::QueryError;

/// Upper bound for a single backend query.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// `(unix timestamp, value)` as encoded by the Prometheus HTTP API
pub type SamplePair = (f64, String);

/// Envelope of every Prometheus HTTP API response
#[derive(Debug, Deserialize)]
pub struct PromResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Query result, tagged by `resultType`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryData {
    Vector(Vec<VectorSample>),
    Matrix(Vec<RangeSeries>),
    Scalar(SamplePair),
    String(SamplePair),
}

impl QueryData {
    pub fn result_type(&self) -> &'static str {
        match self {
            QueryData::Vector(_) => "vector",
            QueryData::Matrix(_) => "matrix",
            QueryData::Scalar(_) => "scalar",
            QueryData::String(_) => "string",
        }
    }
}

/// One series of an instant vector
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VectorSample {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    pub value: SamplePair,
}

/// One series of a range vector
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

/// Runs queries against the metrics backend
///
/// Implementations never retry; the caller decides what to do with a failure.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Evaluate an instant query at the current time.
    async fn execute(&self, query: &str) -> Result<QueryData, QueryError>;

    /// Liveness probe, returns the HTTP status code on success.
    async fn probe(&self) -> Result<u16, QueryError>;
}

/// Prometheus HTTP API client
#[derive(Clone, Debug)]
pub struct PromClient {
    http: Client,
    address: String,
    timeout: Duration,
}

impl PromClient {
    pub fn new(http: Client, address: impl Into<String>) -> Self {
        Self {
            http,
            address: address.into().trim_end_matches('/').to_string(),
            timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn query_instant(&self, query: &str) -> Result<QueryData, QueryError> {
        let url = format!("{}/api/v1/query", self.address);
        let resp = self
            .http
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        decode_response(status, &body)
    }
}

#[async_trait]
impl QueryExecutor for PromClient {
    async fn execute(&self, query: &str) -> Result<QueryData, QueryError> {
        match tokio::time::timeout(self.timeout, self.query_instant(query)).await {
            Err(_) => Err(QueryError::Timeout(self.timeout)),
            Ok(result) => result,
        }
    }

    async fn probe(&self) -> Result<u16, QueryError> {
        let fut = self.http.head(&self.address).send();
        let resp = match tokio::time::timeout(self.timeout, fut).await {
            Err(_) => return Err(QueryError::Timeout(self.timeout)),
            Ok(resp) => resp?,
        };
        match resp.status() {
            StatusCode::OK => Ok(StatusCode::OK.as_u16()),
            other => Err(QueryError::Unhealthy(other.as_u16())),
        }
    }
}

/// Decode an API response body, surfacing backend errors and logging warnings.
pub fn decode_response(status: StatusCode, body: &[u8]) -> Result<QueryData, QueryError> {
    let resp: PromResponse = match serde_json::from_slice(body) {
        Ok(resp) => resp,
        Err(_) if !status.is_success() => return Err(QueryError::Status(status.as_u16())),
        Err(e) => return Err(e.into()),
    };

    if resp.status != "success" {
        return Err(QueryError::Backend {
            error_type: resp.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: resp.error.unwrap_or_default(),
        });
    }
    if !resp.warnings.is_empty() {
        warn!("Warnings: {:?}", resp.warnings);
    }

    let data = resp.data.ok_or_else(|| QueryError::Backend {
        error_type: "bad_data".to_string(),
        message: "response carries no data".to_string(),
    })?;
    debug!("result ({}): {:?}", data.result_type(), data);
    Ok(data)
}
