//! Pure stream-quality scoring: the dead predicate and the weighted score
//! formula used to rank a channel's candidate streams. Kept dependency-free
//! beyond `sqm-common` so these functions stay trivially unit-testable.

pub mod score;
pub mod types;

pub use score::{is_dead, score};
pub use types::{ChannelPreference, DeadThresholds, ScoringWeights};
