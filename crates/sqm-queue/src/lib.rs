//! Bounded priority queue and single-worker drain loop feeding channel
//! checks into the changelog.

pub mod checker;
pub mod error;
pub mod queue;
pub mod worker;

pub use checker::ChannelChecker;
pub use error::{QueueError, Result};
pub use queue::{
    ChannelQueue, QueueItem, DEFAULT_PRIORITY_GLOBAL, DEFAULT_PRIORITY_MANUAL, DEFAULT_PRIORITY_UPDATE_DRIVEN,
};
pub use worker::QueueWorker;
