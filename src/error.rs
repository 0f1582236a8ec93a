use std::time::Duration;
use thiserror::Error;

/// Failure of a single call to the text-generation backend, classified once
/// at the adapter boundary so retry logic never inspects message text.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend failure: {0}")]
    Fatal(String),
}

impl BackendError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, BackendError::RateLimited(_))
    }
}

/// The backend answered, but the answer does not fit the requested schema.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("response does not match schema: {direct}")]
    Schema {
        direct: String,
        enveloped: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{operation}: backend returned no content")]
    NoContent { operation: String },
    #[error("{operation}: still rate limited after {retries} retries")]
    RateLimited {
        operation: String,
        retries: u32,
        #[source]
        source: BackendError,
    },
    #[error("{operation}: {source}")]
    Backend {
        operation: String,
        #[source]
        source: BackendError,
    },
    #[error("{operation}: no valid response after {attempts} attempts: {source}")]
    Validation {
        operation: String,
        attempts: u32,
        #[source]
        source: ValidationError,
    },
    #[error("failed to render response schema: {0}")]
    Schema(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search provider not configured: {0}")]
    NotConfigured(String),
    #[error("search request failed: {0}")]
    Request(String),
    #[error("search provider returned HTTP {status}")]
    Http { status: u16 },
    #[error("failed to decode search response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SearchError::Decode(err.to_string())
        } else {
            SearchError::Request(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("invalid research parameters: {0}")]
    InvalidParameters(String),
    #[error("query planning failed: {0}")]
    Planning(#[source] GenerationError),
    #[error("report synthesis failed: {0}")]
    Report(#[source] GenerationError),
    #[error("research run was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
