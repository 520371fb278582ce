//! Tracks which stream URLs have been judged dead, persisted across
//! restarts, so the pipeline doesn't have to re-probe them every cycle.

pub mod error;
pub mod tracker;

pub use error::{DeadStreamError, Result};
pub use tracker::{DeadEntry, DeadStreamTracker};
