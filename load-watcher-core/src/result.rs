use serde::Serialize;
use thiserror::Error;

/// Aggregate failure of a batch of metric queries
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{failed} of {attempted} metric queries failed, last error: {last}")]
    PartialFailure {
        failed: usize,
        attempted: usize,
        last: String,
    },
}

/// Metric query result with the errors of the sub-queries that failed
///
/// `data` always holds the best available subset, even when `errors` is not empty.
#[derive(Clone, Debug, Serialize)]
pub struct MetricResult<T> {
    pub data: T,
    pub errors: Vec<String>,
    pub attempted: usize,
}

impl<T> MetricResult<T> {
    pub fn new(data: T, attempted: usize) -> Self {
        Self {
            data,
            errors: Vec::new(),
            attempted,
        }
    }

    pub fn with_errors(data: T, errors: Vec<String>, attempted: usize) -> Self {
        Self {
            data,
            errors,
            attempted,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when every attempted sub-query failed.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.errors.len() >= self.attempted
    }

    pub fn aggregate_error(&self) -> Option<FetchError> {
        let last = self.errors.last()?;
        Some(FetchError::PartialFailure {
            failed: self.errors.len(),
            attempted: self.attempted,
            last: last.clone(),
        })
    }

    /// Split into the data and the optional aggregate error.
    pub fn into_parts(self) -> (T, Option<FetchError>) {
        let err = self.aggregate_error();
        (self.data, err)
    }

    /// Strict view: the data only when no sub-query failed.
    pub fn into_result(self) -> Result<T, FetchError> {
        match self.aggregate_error() {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    /// Lenient view: the data plus any partial-failure error, rejected only
    /// when every sub-query failed.
    pub fn into_best_effort(self) -> Result<(T, Option<FetchError>), FetchError> {
        let all_failed = self.all_failed();
        match self.into_parts() {
            (_, Some(err)) if all_failed => Err(err),
            parts => Ok(parts),
        }
    }
}
