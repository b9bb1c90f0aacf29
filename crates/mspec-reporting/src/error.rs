//! Error types for mspec-reporting

use thiserror::Error;

/// Errors raised while reporting to the CI build worker.
#[derive(Error, Debug)]
pub enum ReportingError {
    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The build worker answered with a non-success status
    #[error("build worker rejected {method} {url}: HTTP {status}")]
    Rejected {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// The dispatcher task is gone
    #[error("reporter dispatcher failed: {0}")]
    Dispatcher(String),

    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for reporting operations
pub type ReportingResult<T> = std::result::Result<T, ReportingError>;
