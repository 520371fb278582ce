//! Shared types and helpers used across every stream-quality-manager crate.

pub mod atomic;
pub mod health;
pub mod ids;
pub mod logging;
pub mod model;

pub use ids::{ChannelId, GroupId, LogoId, ProfileId, ProviderId, StreamId};

use thiserror::Error;

/// Errors shared by helpers in this crate (atomic file I/O, mostly).
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CommonError>;
