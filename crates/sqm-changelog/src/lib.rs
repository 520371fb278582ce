//! Append-only changelog (batch-consolidated channel-check history) plus a
//! short-lived per-channel progress snapshot for UI polling.

pub mod changelog;
pub mod entry;
pub mod error;
pub mod progress;
pub mod stats;

pub use changelog::Changelog;
pub use entry::{ChangelogAction, ChangelogEntry, ChannelCheckEntry, ChannelCheckStats, StreamDetail};
pub use error::{ChangelogError, Result};
pub use progress::{ChannelProgress, ProgressReporter};
pub use stats::compute_averages;
