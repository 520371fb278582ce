//! Append-only changelog with batch consolidation.
//!
//! The worker calls [`Changelog::start_batch`] on the first dequeue after
//! idle, [`Changelog::push_channel_result`] after each pipeline run, and
//! [`Changelog::finalize_batch`] once the queue drains — consolidating the
//! whole contiguous run into one `batch_stream_check` entry rather than one
//! entry per channel.

use crate::entry::{ChangelogAction, ChangelogEntry, ChannelCheckEntry};
use crate::error::Result;
use chrono::Utc;
use parking_lot::Mutex;
use sqm_common::atomic::{read_json_or_default, write_json_atomic};
use std::path::PathBuf;
use std::time::Instant;

struct OpenBatch {
    started_at: chrono::DateTime<Utc>,
    wall_clock_start: Instant,
    entries: Vec<ChannelCheckEntry>,
    wraps_global: bool,
}

pub struct Changelog {
    path: PathBuf,
    entries: Mutex<Vec<ChangelogEntry>>,
    open_batch: Mutex<Option<OpenBatch>>,
}

impl Changelog {
    pub async fn load(path: PathBuf) -> Self {
        let entries: Vec<ChangelogEntry> = read_json_or_default(&path).await;
        Self {
            path,
            entries: Mutex::new(entries),
            open_batch: Mutex::new(None),
        }
    }

    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.entries.lock().clone();
        write_json_atomic(&self.path, &snapshot).await?;
        Ok(())
    }

    pub fn entries(&self) -> Vec<ChangelogEntry> {
        self.entries.lock().clone()
    }

    /// Start a new batch, or a no-op if one is already open (the first
    /// dequeue after idle is the only one that should open a batch).
    pub fn start_batch(&self, wraps_global: bool) {
        let mut open = self.open_batch.lock();
        if open.is_none() {
            *open = Some(OpenBatch {
                started_at: Utc::now(),
                wall_clock_start: Instant::now(),
                entries: Vec::new(),
                wraps_global,
            });
        }
    }

    pub fn push_channel_result(&self, entry: ChannelCheckEntry) {
        let mut open = self.open_batch.lock();
        if let Some(batch) = open.as_mut() {
            batch.entries.push(entry);
        } else {
            drop(open);
            self.start_batch(false);
            self.push_channel_result(entry);
        }
    }

    /// Seal the open batch (if any) into one `batch_stream_check` entry,
    /// wrapping it in a `global_check` entry when the batch was started
    /// for a global action.
    pub async fn finalize_batch(&self) -> Result<()> {
        let batch = self.open_batch.lock().take();
        let Some(batch) = batch else { return Ok(()) };

        let mut entry = ChangelogEntry {
            timestamp: batch.started_at,
            duration_ms: batch.wall_clock_start.elapsed().as_millis() as u64,
            action: ChangelogAction::BatchStreamCheck,
            success: true,
            error: None,
            check: batch.entries,
            dead_streams_detected: 0,
            revived_streams: 0,
            wrapped_batch: None,
        };
        entry.aggregate_counts();

        let final_entry = if batch.wraps_global {
            ChangelogEntry {
                timestamp: entry.timestamp,
                duration_ms: entry.duration_ms,
                action: ChangelogAction::GlobalCheck,
                success: entry.success,
                error: None,
                check: Vec::new(),
                dead_streams_detected: entry.dead_streams_detected,
                revived_streams: entry.revived_streams,
                wrapped_batch: Some(Box::new(entry)),
            }
        } else {
            entry
        };

        self.append(final_entry).await
    }

    /// Record a single-channel manual check, bypassing batch consolidation.
    pub async fn record_single_channel_check(&self, entry: ChannelCheckEntry, duration_ms: u64) -> Result<()> {
        let mut changelog_entry = ChangelogEntry {
            timestamp: Utc::now(),
            duration_ms,
            action: ChangelogAction::SingleChannelCheck,
            success: true,
            error: None,
            check: vec![entry],
            dead_streams_detected: 0,
            revived_streams: 0,
            wrapped_batch: None,
        };
        changelog_entry.aggregate_counts();
        self.append(changelog_entry).await
    }

    async fn append(&self, entry: ChangelogEntry) -> Result<()> {
        self.entries.lock().push(entry);
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ChannelCheckStats;
    use sqm_common::ChannelId;

    fn channel_entry(id: i64, dead: u32, revived: u32) -> ChannelCheckEntry {
        ChannelCheckEntry {
            channel_id: ChannelId(id),
            name: format!("Channel {id}"),
            logo_url: None,
            stats: ChannelCheckStats {
                total: 3,
                analyzed: 3,
                dead,
                revived,
                avg_resolution: "1920x1080".to_string(),
                avg_bitrate: "5000 kbps".to_string(),
                avg_fps: "30 fps".to_string(),
                top_streams: Vec::new(),
            },
            skipped_reason: None,
        }
    }

    #[tokio::test]
    async fn batch_consolidates_multiple_channels_into_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let changelog = Changelog::load(dir.path().join("changelog.json")).await;

        changelog.start_batch(false);
        changelog.push_channel_result(channel_entry(1, 1, 0));
        changelog.push_channel_result(channel_entry(2, 0, 2));
        changelog.finalize_batch().await.unwrap();

        let entries = changelog.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ChangelogAction::BatchStreamCheck);
        assert_eq!(entries[0].check.len(), 2);
        assert_eq!(entries[0].dead_streams_detected, 1);
        assert_eq!(entries[0].revived_streams, 2);
    }

    #[tokio::test]
    async fn global_batch_is_wrapped_in_global_check_entry() {
        let dir = tempfile::tempdir().unwrap();
        let changelog = Changelog::load(dir.path().join("changelog.json")).await;

        changelog.start_batch(true);
        changelog.push_channel_result(channel_entry(1, 0, 0));
        changelog.finalize_batch().await.unwrap();

        let entries = changelog.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ChangelogAction::GlobalCheck);
        let wrapped = entries[0].wrapped_batch.as_ref().unwrap();
        assert_eq!(wrapped.action, ChangelogAction::BatchStreamCheck);
        assert_eq!(wrapped.check.len(), 1);
    }

    #[tokio::test]
    async fn single_channel_check_bypasses_batching() {
        let dir = tempfile::tempdir().unwrap();
        let changelog = Changelog::load(dir.path().join("changelog.json")).await;

        changelog
            .record_single_channel_check(channel_entry(9, 0, 0), 1200)
            .await
            .unwrap();

        let entries = changelog.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ChangelogAction::SingleChannelCheck);
    }

    #[tokio::test]
    async fn changelog_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changelog.json");
        {
            let changelog = Changelog::load(path.clone()).await;
            changelog
                .record_single_channel_check(channel_entry(1, 0, 0), 100)
                .await
                .unwrap();
        }
        let reloaded = Changelog::load(path).await;
        assert_eq!(reloaded.entries().len(), 1);
    }
}
