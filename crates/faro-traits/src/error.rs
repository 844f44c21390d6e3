//! Error types for the Faro pipeline.
//!
//! This module defines the error type shared by every library crate in the
//! workspace. Recoverable data-quality conditions (duplicate timestamps,
//! missing join targets, stale prices, empty walk-forward windows) are not
//! errors: they are counted in the diagnostics of the stage that meets them.

use thiserror::Error;

/// The main error type for Faro operations.
#[derive(Debug, Error)]
pub enum FaroError {
    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a required column is missing from a table.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while serializing or deserializing an artifact.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error when data is insufficient for the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error when a date is out of range or cannot be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Error fetching data from external sources.
    #[error("Data fetch error: {0}")]
    DataFetch(String),

    /// A forward-looking column was requested where only point-in-time
    /// values are allowed.
    #[error("Look-ahead column used as feature: {0}")]
    LookAhead(String),

    /// Error raised by a classifier while fitting or predicting.
    #[error("Model error: {0}")]
    Model(String),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl From<String> for FaroError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for FaroError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for Faro operations.
pub type Result<T> = std::result::Result<T, FaroError>;
