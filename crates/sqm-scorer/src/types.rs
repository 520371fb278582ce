//! Plain configuration inputs to the scoring functions; deliberately kept
//! decoupled from `sqm-config` so the scoring math stays pure and
//! independently testable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub bitrate: f64,
    pub resolution: f64,
    pub fps: f64,
    pub codec: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            bitrate: 0.40,
            resolution: 0.35,
            fps: 0.15,
            codec: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeadThresholds {
    pub enabled: bool,
    pub min_resolution_width: u32,
    pub min_resolution_height: u32,
    pub min_bitrate_kbps: f64,
    pub min_score: f64,
}

impl Default for DeadThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            min_resolution_width: 0,
            min_resolution_height: 0,
            min_bitrate_kbps: 0.0,
            min_score: 0.0,
        }
    }
}

/// Per-channel preference modifiers, read from channel settings or
/// inherited from the channel's group when the channel leaves them unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPreference {
    pub prefer_4k: bool,
    pub avoid_4k: bool,
    pub max_1080p: bool,
    pub max_720p: bool,
}
