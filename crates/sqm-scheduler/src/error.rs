//! Typed errors for the automation scheduler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("universal data index error: {0}")]
    Udi(#[from] sqm_udi::UdiError),

    #[error("aggregator call failed: {0}")]
    Aggregator(#[from] sqm_aggregator::AggregatorError),

    #[error("regex matcher error: {0}")]
    Matcher(#[from] sqm_matcher::MatcherError),

    #[error("dead-stream tracker error: {0}")]
    DeadStream(#[from] sqm_deadstream::DeadStreamError),

    #[error("changelog error: {0}")]
    Changelog(#[from] sqm_changelog::ChangelogError),

    #[error("queue error: {0}")]
    Queue(#[from] sqm_queue::QueueError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] sqm_pipeline::PipelineError),

    #[error("invalid cron expression {0:?}: {1}")]
    InvalidCron(String, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
