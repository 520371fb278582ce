//! Typed errors for the universal data index.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UdiError {
    #[error("aggregator call failed: {0}")]
    Aggregator(#[from] sqm_aggregator::AggregatorError),

    #[error("io error persisting snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel {0} not found")]
    ChannelNotFound(i64),

    #[error("stream {0} not found")]
    StreamNotFound(i64),
}

pub type Result<T> = std::result::Result<T, UdiError>;
