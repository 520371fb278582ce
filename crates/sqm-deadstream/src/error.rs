//! Typed errors for the dead-stream tracker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeadStreamError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeadStreamError>;
