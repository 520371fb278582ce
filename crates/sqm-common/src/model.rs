//! The aggregator's domain entities, as shared value types.
//!
//! UDI (`sqm-udi`) exclusively owns the canonical in-memory copy of these;
//! every other crate reads/writes through UDI rather than holding its own
//! copy, per the data-model ownership rule.

use crate::{ChannelId, GroupId, LogoId, ProfileId, ProviderId, StreamId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamPreference {
    pub prefer_4k: bool,
    pub avoid_4k: bool,
    pub max_1080p: bool,
    pub max_720p: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub number: Option<f64>,
    pub group_id: Option<GroupId>,
    pub tvg_id: Option<String>,
    pub epg_id: Option<String>,
    pub logo_id: Option<LogoId>,
    /// Play order; position 0 is "preferred".
    pub streams: Vec<StreamId>,
    pub uuid: Option<String>,
    /// Overrides the group's preference, if set.
    pub stream_preference: Option<StreamPreference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// "WxH", e.g. "1920x1080".
    pub resolution: Option<String>,
    pub source_fps: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub ffmpeg_output_bitrate_kbps: Option<f64>,
}

impl StreamStats {
    /// Parsed (width, height), or `None` if absent/unparseable.
    pub fn resolution_wh(&self) -> Option<(u32, u32)> {
        let res = self.resolution.as_ref()?;
        let (w, h) = res.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub name: String,
    /// Unique across live streams.
    pub url: String,
    pub provider_id: Option<ProviderId>,
    pub is_custom: bool,
    pub stream_stats: Option<StreamStats>,
    pub current_viewers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub id: GroupId,
    pub name: String,
    pub channel_count: u32,
    pub stream_preference: Option<StreamPreference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logo {
    pub id: LogoId,
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    Disabled,
    AllStreams,
    SameResolution,
}

impl Default for PriorityMode {
    fn default() -> Self {
        PriorityMode::Disabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub is_active: bool,
    /// 0 = unlimited.
    pub max_streams: i64,
    pub search_pattern: Option<String>,
    pub replace_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub is_active: bool,
    /// 0 = unlimited; the account-level fallback when `profiles` is empty.
    pub max_streams: i64,
    pub profiles: Vec<Profile>,
    pub priority: i64,
    pub priority_mode: PriorityMode,
}

impl Provider {
    /// Effective concurrent-stream capacity per the data-model invariant:
    /// sum of active-profile `max_streams` when profiles are present,
    /// otherwise the account-level `max_streams`.
    pub fn effective_capacity(&self) -> i64 {
        if self.profiles.is_empty() {
            return self.max_streams;
        }
        let profile_total: i64 = self
            .profiles
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.max_streams)
            .sum();
        if profile_total > 0 {
            profile_total
        } else {
            self.max_streams
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_capacity_sums_active_profiles_when_present() {
        let provider = Provider {
            id: ProviderId(1),
            name: "P".to_string(),
            is_active: true,
            max_streams: 99,
            profiles: vec![
                Profile {
                    id: ProfileId(1),
                    name: "a".to_string(),
                    is_active: true,
                    max_streams: 2,
                    search_pattern: None,
                    replace_pattern: None,
                },
                Profile {
                    id: ProfileId(2),
                    name: "b".to_string(),
                    is_active: false,
                    max_streams: 5,
                    search_pattern: None,
                    replace_pattern: None,
                },
            ],
            priority: 0,
            priority_mode: PriorityMode::Disabled,
        };
        assert_eq!(provider.effective_capacity(), 2);
    }

    #[test]
    fn effective_capacity_falls_back_to_account_level_without_profiles() {
        let provider = Provider {
            id: ProviderId(1),
            name: "P".to_string(),
            is_active: true,
            max_streams: 4,
            profiles: vec![],
            priority: 0,
            priority_mode: PriorityMode::Disabled,
        };
        assert_eq!(provider.effective_capacity(), 4);
    }

    #[test]
    fn resolution_wh_parses_valid_strings() {
        let stats = StreamStats {
            resolution: Some("1920x1080".to_string()),
            ..Default::default()
        };
        assert_eq!(stats.resolution_wh(), Some((1920, 1080)));
    }
}
