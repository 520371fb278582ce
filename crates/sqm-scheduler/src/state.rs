//! Persisted timestamps the two automation loops use to decide whether
//! they're due: when the playlist cycle last ran, and when the global
//! action last fired. Survives restarts so a redeploy doesn't cause an
//! immediate re-run (or, worse, a missed one — see the cron cold-start
//! rule in [`crate::cron_gate`]).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqm_common::atomic;
use std::path::PathBuf;

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateSnapshot {
    last_playlist_update: Option<DateTime<Utc>>,
    last_global_check: Option<DateTime<Utc>>,
}

pub struct SchedulerState {
    path: PathBuf,
    snapshot: RwLock<StateSnapshot>,
}

impl SchedulerState {
    pub async fn load(path: PathBuf) -> Self {
        let snapshot: StateSnapshot = atomic::read_json_or_default(&path).await;
        Self { path, snapshot: RwLock::new(snapshot) }
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.snapshot.read().clone();
        atomic::write_json_atomic(&self.path, &snapshot).await?;
        Ok(())
    }

    pub fn last_playlist_update(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().last_playlist_update
    }

    pub fn last_global_check(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().last_global_check
    }

    pub async fn mark_playlist_update(&self) -> Result<()> {
        self.snapshot.write().last_playlist_update = Some(Utc::now());
        self.persist().await
    }

    pub async fn mark_global_check(&self) -> Result<()> {
        self.snapshot.write().last_global_check = Some(Utc::now());
        self.persist().await
    }
}
