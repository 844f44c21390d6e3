//! Error types for the data fetcher.

use faro_traits::FaroError;
use thiserror::Error;

/// Errors that can occur while fetching from the data provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Missing API key.
    #[error("FMP_API_KEY environment variable not set")]
    MissingApiKey,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error.
    #[error("FMP API error: {0}")]
    Api(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl FetchError {
    /// Whether a later attempt may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Api(_) | Self::RateLimitExceeded)
    }
}

impl From<FetchError> for FaroError {
    fn from(e: FetchError) -> Self {
        Self::DataFetch(e.to_string())
    }
}
