//! Typed errors for the concurrency limiter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("universal data index error: {0}")]
    Udi(#[from] sqm_udi::UdiError),
}

pub type Result<T> = std::result::Result<T, LimiterError>;
