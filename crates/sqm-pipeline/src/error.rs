//! Typed errors for the channel-check pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("universal data index error: {0}")]
    Udi(#[from] sqm_udi::UdiError),

    #[error("aggregator call failed: {0}")]
    Aggregator(#[from] sqm_aggregator::AggregatorError),

    #[error("concurrency limiter error: {0}")]
    Limiter(#[from] sqm_limiter::LimiterError),

    #[error("prober error: {0}")]
    Prober(#[from] sqm_prober::ProberError),

    #[error("dead-stream tracker error: {0}")]
    DeadStream(#[from] sqm_deadstream::DeadStreamError),

    #[error("changelog error: {0}")]
    Changelog(#[from] sqm_changelog::ChangelogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
