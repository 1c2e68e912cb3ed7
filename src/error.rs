//! Error types for mgsmeval

use thiserror::Error;

/// Main error type for mgsmeval
#[derive(Error, Debug)]
pub enum MgsmEvalError {
    #[error("Unrecognized eval type: {0}. Available evals: {1}")]
    UnknownEval(String, String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Dataset error: {0}")]
    DatasetError(String),

    #[error("Retries exhausted after {0} attempts: {1}")]
    RetriesExhausted(u32, String),
}

/// Result type alias for mgsmeval
pub type Result<T> = std::result::Result<T, MgsmEvalError>;
