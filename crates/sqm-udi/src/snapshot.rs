//! On-disk shape of the universal data index.
//!
//! One JSON document holding every entity plus a metadata block recording
//! per-entity last-refresh timestamps and a schema version, persisted with
//! the write-temp-then-rename helper shared with the dead-stream tracker
//! and changelog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqm_common::model::{Channel, ChannelGroup, Logo, Profile, Provider, Stream};
use std::collections::HashMap;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub streams: Vec<Stream>,
    #[serde(default)]
    pub groups: Vec<ChannelGroup>,
    #[serde(default)]
    pub logos: Vec<Logo>,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub extra_profiles: Vec<Profile>,
    #[serde(default)]
    pub last_refresh: HashMap<String, DateTime<Utc>>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            channels: Vec::new(),
            streams: Vec::new(),
            groups: Vec::new(),
            logos: Vec::new(),
            providers: Vec::new(),
            extra_profiles: Vec::new(),
            last_refresh: HashMap::new(),
        }
    }
}
