//! Per-provider concurrency limiter enforcing
//! `active_viewers + checking_streams <= max_streams` while multiple
//! streams are probed in parallel.

pub mod backoff;
pub mod error;
pub mod limiter;

pub use backoff::BackoffPolicy;
pub use error::{LimiterError, Result};
pub use limiter::{AcquireOutcome, ConcurrencyLimiter, ReleaseHandle};
