//! Typed errors for the regex matcher.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MatcherError>;
