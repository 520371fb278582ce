//! Changelog entry shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqm_common::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangelogAction {
    BatchStreamCheck,
    SingleChannelCheck,
    GlobalCheck,
}

/// Per-stream detail kept for the top-10 slice of a channel's check stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDetail {
    pub stream_id: i64,
    pub name: String,
    pub resolution: Option<String>,
    pub bitrate_kbps: Option<f64>,
    pub fps: Option<f64>,
    pub codec: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelCheckStats {
    pub total: u32,
    pub analyzed: u32,
    pub dead: u32,
    pub revived: u32,
    pub avg_resolution: String,
    pub avg_bitrate: String,
    pub avg_fps: String,
    pub top_streams: Vec<StreamDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCheckEntry {
    pub channel_id: ChannelId,
    pub name: String,
    pub logo_url: Option<String>,
    pub stats: ChannelCheckStats,
    pub skipped_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub action: ChangelogAction,
    pub success: bool,
    pub error: Option<String>,
    /// Per-channel entries for `batch_stream_check`/`single_channel_check`;
    /// a single-channel check always has exactly one.
    pub check: Vec<ChannelCheckEntry>,
    pub dead_streams_detected: u32,
    pub revived_streams: u32,
    /// Populated only for `global_check`: the batch entry it wraps.
    pub wrapped_batch: Option<Box<ChangelogEntry>>,
}

impl ChangelogEntry {
    pub fn aggregate_counts(&mut self) {
        self.dead_streams_detected = self.check.iter().map(|c| c.stats.dead).sum();
        self.revived_streams = self.check.iter().map(|c| c.stats.revived).sum();
    }
}
