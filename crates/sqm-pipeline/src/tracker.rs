//! Per-channel check-progress tracker: which stream ids were already probed
//! this immunity window, so the worker doesn't re-probe a channel whose
//! stream set hasn't changed since its last check.
//!
//! Distinct from `sqm-deadstream`'s URL-keyed dead-stream map — this tracks
//! check *recency*, not liveness, and is owned entirely by the pipeline.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqm_common::{atomic, ChannelId, StreamId};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelTrackerEntry {
    pub checked_stream_ids: Vec<StreamId>,
    pub stream_count: usize,
    pub needs_check: bool,
    pub last_check: Option<DateTime<Utc>>,
}

pub struct ChannelCheckTracker {
    path: PathBuf,
    entries: RwLock<HashMap<ChannelId, ChannelTrackerEntry>>,
}

impl ChannelCheckTracker {
    pub async fn load(path: PathBuf) -> Self {
        let entries: HashMap<ChannelId, ChannelTrackerEntry> = atomic::read_json_or_default(&path).await;
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

    pub fn checked_stream_ids(&self, channel_id: ChannelId) -> HashSet<StreamId> {
        self.entries
            .read()
            .get(&channel_id)
            .map(|e| e.checked_stream_ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn needs_check(&self, channel_id: ChannelId) -> bool {
        self.entries.read().get(&channel_id).is_some_and(|e| e.needs_check)
    }

    /// True if `current_ids` is exactly the set already checked and no
    /// force/needs-check flag is set — the step-4 skip-reorder optimization.
    pub fn unchanged(&self, channel_id: ChannelId, current_ids: &HashSet<StreamId>) -> bool {
        let entries = self.entries.read();
        let Some(entry) = entries.get(&channel_id) else { return false };
        if entry.needs_check {
            return false;
        }
        let checked: HashSet<StreamId> = entry.checked_stream_ids.iter().copied().collect();
        &checked == current_ids
    }

    pub async fn record_check(&self, channel_id: ChannelId, final_stream_ids: Vec<StreamId>) -> Result<()> {
        let entry = ChannelTrackerEntry {
            stream_count: final_stream_ids.len(),
            checked_stream_ids: final_stream_ids,
            needs_check: false,
            last_check: Some(Utc::now()),
        };
        self.entries.write().insert(channel_id, entry);
        self.persist().await
    }

    /// Marks a channel as needing a recheck regardless of its stream-set
    /// equality (used when the scheduler assigns it new matched streams).
    pub async fn mark_needs_check(&self, channel_id: ChannelId) -> Result<()> {
        self.entries.write().entry(channel_id).or_default().needs_check = true;
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unchanged_stream_set_skips_reorder() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ChannelCheckTracker::load(dir.path().join("tracker.json")).await;
        tracker
            .record_check(ChannelId(1), vec![StreamId(1), StreamId(2)])
            .await
            .unwrap();

        let current: HashSet<StreamId> = [StreamId(1), StreamId(2)].into_iter().collect();
        assert!(tracker.unchanged(ChannelId(1), &current));

        let different: HashSet<StreamId> = [StreamId(1)].into_iter().collect();
        assert!(!tracker.unchanged(ChannelId(1), &different));
    }

    #[tokio::test]
    async fn needs_check_flag_overrides_unchanged_set() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ChannelCheckTracker::load(dir.path().join("tracker.json")).await;
        tracker
            .record_check(ChannelId(1), vec![StreamId(1)])
            .await
            .unwrap();
        tracker.mark_needs_check(ChannelId(1)).await.unwrap();

        let current: HashSet<StreamId> = [StreamId(1)].into_iter().collect();
        assert!(!tracker.unchanged(ChannelId(1), &current));
    }

    #[tokio::test]
    async fn reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        {
            let tracker = ChannelCheckTracker::load(path.clone()).await;
            tracker.record_check(ChannelId(5), vec![StreamId(9)]).await.unwrap();
        }
        let reloaded = ChannelCheckTracker::load(path).await;
        assert_eq!(reloaded.checked_stream_ids(ChannelId(5)), [StreamId(9)].into_iter().collect());
    }
}
