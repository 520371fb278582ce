//! Persistent URL → dead-entry map.
//!
//! The "dead?" verdict itself belongs to the scorer (C7); this crate only
//! remembers which URLs were judged dead so the pipeline doesn't have to
//! re-probe them on every cycle.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqm_common::{atomic, ChannelId, StreamId};
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadEntry {
    pub stream_id: StreamId,
    pub name: String,
    pub channel_id: ChannelId,
    pub marked_dead_at: DateTime<Utc>,
}

pub struct DeadStreamTracker {
    path: PathBuf,
    entries: RwLock<HashMap<String, DeadEntry>>,
}

impl DeadStreamTracker {
    pub async fn load(path: PathBuf) -> Self {
        let entries: HashMap<String, DeadEntry> = atomic::read_json_or_default(&path).await;
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.entries.read().clone();
        atomic::write_json_atomic(&self.path, &snapshot).await?;
        Ok(())
    }

    pub fn is_dead(&self, url: &str) -> bool {
        self.entries.read().contains_key(url)
    }

    pub async fn mark_dead(&self, url: &str, stream_id: StreamId, name: &str, channel_id: ChannelId) -> Result<()> {
        self.entries.write().insert(
            url.to_string(),
            DeadEntry {
                stream_id,
                name: name.to_string(),
                channel_id,
                marked_dead_at: Utc::now(),
            },
        );
        self.persist().await
    }

    pub async fn mark_alive(&self, url: &str) -> Result<()> {
        let removed = self.entries.write().remove(url).is_some();
        if removed {
            self.persist().await
        } else {
            Ok(())
        }
    }

    pub fn get_for_channel(&self, channel_id: ChannelId) -> Vec<(String, DeadEntry)> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.channel_id == channel_id)
            .map(|(url, entry)| (url.clone(), entry.clone()))
            .collect()
    }

    pub async fn remove_by_channel_id(&self, channel_id: ChannelId) -> Result<()> {
        let removed_any = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, entry| entry.channel_id != channel_id);
            entries.len() != before
        };
        if removed_any {
            self.persist().await
        } else {
            Ok(())
        }
    }

    /// Drop entries whose URL is no longer present in any playlist.
    pub async fn cleanup(&self, current_url_set: &HashSet<String>) -> Result<usize> {
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|url, _| current_url_set.contains(url));
            before - entries.len()
        };
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.entries.write().clear();
        self.persist().await
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
