//! Per-channel progress snapshot, polled by a UI while a check is running.

use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqm_common::atomic::write_json_atomic;
use sqm_common::ChannelId;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProgress {
    pub channel_id: ChannelId,
    pub name: String,
    pub current: u32,
    pub total: u32,
    pub step: String,
    pub detail: String,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

pub struct ProgressReporter {
    path: PathBuf,
    entries: Mutex<HashMap<ChannelId, ChannelProgress>>,
}

impl ProgressReporter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn set(&self, channel_id: ChannelId, name: &str, current: u32, total: u32, step: &str, detail: &str) -> Result<()> {
        let percentage = if total == 0 { 0.0 } else { (current as f64 / total as f64) * 100.0 };
        let progress = ChannelProgress {
            channel_id,
            name: name.to_string(),
            current,
            total,
            step: step.to_string(),
            detail: detail.to_string(),
            percentage,
            timestamp: Utc::now(),
        };
        self.entries.lock().insert(channel_id, progress);
        self.persist().await
    }

    pub async fn clear(&self, channel_id: ChannelId) -> Result<()> {
        self.entries.lock().remove(&channel_id);
        self.persist().await
    }

    pub fn snapshot(&self) -> Vec<ChannelProgress> {
        self.entries.lock().values().cloned().collect()
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.snapshot();
        write_json_atomic(&self.path, &snapshot).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_clear_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = ProgressReporter::new(dir.path().join("progress.json"));

        reporter
            .set(ChannelId(1), "News", 2, 5, "probing", "stream 2 of 5")
            .await
            .unwrap();
        assert_eq!(reporter.snapshot().len(), 1);
        assert_eq!(reporter.snapshot()[0].percentage, 40.0);

        reporter.clear(ChannelId(1)).await.unwrap();
        assert!(reporter.snapshot().is_empty());
    }

    #[tokio::test]
    async fn zero_total_yields_zero_percentage_without_dividing_by_zero() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = ProgressReporter::new(dir.path().join("progress.json"));
        reporter
            .set(ChannelId(1), "News", 0, 0, "initializing", "")
            .await
            .unwrap();
        assert_eq!(reporter.snapshot()[0].percentage, 0.0);
    }
}
