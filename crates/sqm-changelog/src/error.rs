//! Typed errors for changelog/progress persistence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChangelogError>;
