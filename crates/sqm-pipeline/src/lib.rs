//! The channel-check pipeline: the per-channel unit of work run by the
//! worker queue and the scheduler alike.

pub mod account_limits;
pub mod diversify;
pub mod error;
pub mod failover;
pub mod pipeline;
pub mod tracker;

pub use error::{PipelineError, Result};
pub use failover::{check_stream_can_run, run_with_failover, FailoverOutcome};
pub use pipeline::{ChannelCheckOutcome, ChannelCheckPipeline};
pub use tracker::{ChannelCheckTracker, ChannelTrackerEntry};
