//! Query error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while querying the metrics backend
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend error ({error_type}): {message}")]
    Backend { error_type: String, message: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("expected {expected} result, got {actual}")]
    UnexpectedResultType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    /// Short label for logs and error counters
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::InvalidUrl(_) => "invalid_url",
            QueryError::Transport(_) => "transport",
            QueryError::Status { .. } => "http_status",
            QueryError::Backend { .. } => "backend",
            QueryError::Decode(_) => "decode",
            QueryError::UnexpectedResultType { .. } => "result_type",
            QueryError::Timeout(_) => "timeout",
        }
    }
}
