//! Typed errors for the stream prober.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProberError {
    #[error("invalid stream url: {0}")]
    InvalidUrl(String),

    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProberError>;
