//! Persisted shape of the regex matcher's per-channel rule lists.

use serde::{Deserialize, Serialize};
use sqm_common::{ChannelId, ProviderId};

fn default_true() -> bool {
    true
}

/// A single pattern within a channel's rule list, with its own optional
/// provider scoping (spec §3 RegexRule: `patterns: sequence of {pattern,
/// provider_filter}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    /// Empty/absent means "all providers".
    #[serde(default)]
    pub provider_filter: Vec<ProviderId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRules {
    pub channel_id: ChannelId,
    pub channel_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub patterns: Vec<PatternRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub channels: Vec<ChannelRules>,
}
