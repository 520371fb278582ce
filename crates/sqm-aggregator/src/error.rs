//! Typed errors for the aggregator client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("request to aggregator failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("aggregator returned {status} for {path}: {body}")]
    Api {
        status: u16,
        path: String,
        body: String,
    },

    #[error("authentication with the aggregator failed after token refresh: {0}")]
    Unauthorized(String),

    #[error("failed to decode aggregator response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no credentials configured to obtain a token")]
    NoCredentials,
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
