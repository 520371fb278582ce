//! Typed errors for the check queue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is at capacity ({0})")]
    Full(usize),

    #[error("channel {0} is in the completed set; call remove_from_completed first")]
    StillCompleted(i64),
}

pub type Result<T> = std::result::Result<T, QueueError>;
