//! The global action: a full refresh-match-check sweep across every
//! channel, bypassing the per-stream immunity window. Mutually exclusive
//! with the playlist cycle for the duration of its enqueue-and-drain phase.

use std::sync::Arc;

use sqm_aggregator::AggregatorClient;
use sqm_changelog::Changelog;
use sqm_config::StreamCheckerConfig;
use sqm_deadstream::DeadStreamTracker;
use sqm_matcher::RegexMatcher;
use sqm_pipeline::ChannelCheckTracker;
use sqm_queue::ChannelQueue;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::error::Result;
use crate::matching::{discover_and_assign_streams, remove_non_matching_streams};
use crate::playlist::refresh_enabled_provider_playlists;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct GlobalAction {
    client: Arc<AggregatorClient>,
    udi: Arc<sqm_udi::Udi>,
    matcher: Arc<RegexMatcher>,
    dead_tracker: Arc<DeadStreamTracker>,
    check_tracker: Arc<ChannelCheckTracker>,
    queue: Arc<ChannelQueue>,
    changelog: Arc<Changelog>,
    config: StreamCheckerConfig,
}

impl GlobalAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<AggregatorClient>,
        udi: Arc<sqm_udi::Udi>,
        matcher: Arc<RegexMatcher>,
        dead_tracker: Arc<DeadStreamTracker>,
        check_tracker: Arc<ChannelCheckTracker>,
        queue: Arc<ChannelQueue>,
        changelog: Arc<Changelog>,
        config: StreamCheckerConfig,
    ) -> Self {
        Self { client, udi, matcher, dead_tracker, check_tracker, queue, changelog, config }
    }

    /// Runs the six-step sweep and blocks until the worker has fully drained
    /// the channels it enqueued. Callers are responsible for setting the
    /// `global_action_in_progress` flag around this call.
    pub async fn run(&self) -> Result<()> {
        info!("starting global action");

        // Step 1: refresh UDI fully.
        self.udi.refresh_all().await?;

        // Step 2: give every dead stream a second chance.
        let dead_count = self.dead_tracker.len();
        self.dead_tracker.clear_all().await?;
        if dead_count > 0 {
            info!(dead_count, "cleared dead-stream tracker ahead of global action");
        }

        // Step 3: refresh every provider playlist.
        refresh_enabled_provider_playlists(&self.client, &self.udi).await?;
        self.udi.refresh_channels().await?;
        self.udi.refresh_streams().await?;

        // Step 4: drop streams that no longer match, same gate as the
        // playlist cycle.
        if self.config.automation_controls.remove_non_matching_streams {
            let removed = remove_non_matching_streams(&self.client, &self.udi, &self.matcher).await?;
            if removed > 0 {
                info!(removed, "global action dropped non-matching streams");
            }
        }

        // Step 5: match and assign, including streams that were dead a
        // moment ago.
        discover_and_assign_streams(&self.client, &self.udi, &self.matcher, &self.dead_tracker, self.config.dead_stream_handling.enabled)
            .await?;

        // Step 6: force-check every channel and drain the queue.
        let channel_ids: Vec<_> = self.udi.get_channels().into_iter().map(|c| c.id).collect();
        self.changelog.start_batch(true);
        let mut enqueued = 0usize;
        for channel_id in &channel_ids {
            self.check_tracker.mark_needs_check(*channel_id).await?;
            self.queue.remove_from_completed(*channel_id);
            self.queue.enqueue(*channel_id, self.config.queue.priorities.global, true, false)?;
            enqueued += 1;
        }
        info!(enqueued, "global action enqueued all channels, draining");

        while !self.queue.is_idle() {
            sleep(DRAIN_POLL_INTERVAL).await;
        }

        info!("global action complete");
        Ok(())
    }
}
