//! The playlist cycle: refresh provider playlists, drop streams that no
//! longer match their channel's rules, assign newly-matched streams, and
//! queue whatever channels changed for a quality check.

use std::sync::Arc;

use sqm_aggregator::AggregatorClient;
use sqm_config::StreamCheckerConfig;
use sqm_deadstream::DeadStreamTracker;
use sqm_matcher::RegexMatcher;
use sqm_pipeline::ChannelCheckTracker;
use sqm_queue::ChannelQueue;
use tracing::info;

use crate::error::Result;
use crate::matching::{discover_and_assign_streams, remove_non_matching_streams};

pub struct PlaylistCycle {
    client: Arc<AggregatorClient>,
    udi: Arc<sqm_udi::Udi>,
    matcher: Arc<RegexMatcher>,
    dead_tracker: Arc<DeadStreamTracker>,
    check_tracker: Arc<ChannelCheckTracker>,
    queue: Arc<ChannelQueue>,
    config: StreamCheckerConfig,
}

impl PlaylistCycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<AggregatorClient>,
        udi: Arc<sqm_udi::Udi>,
        matcher: Arc<RegexMatcher>,
        dead_tracker: Arc<DeadStreamTracker>,
        check_tracker: Arc<ChannelCheckTracker>,
        queue: Arc<ChannelQueue>,
        config: StreamCheckerConfig,
    ) -> Self {
        Self { client, udi, matcher, dead_tracker, check_tracker, queue, config }
    }

    pub async fn run(&self) -> Result<()> {
        let controls = &self.config.automation_controls;

        if controls.auto_m3u_updates {
            refresh_enabled_provider_playlists(&self.client, &self.udi).await?;
            self.udi.refresh_channels().await?;
            self.udi.refresh_streams().await?;
            self.udi.invalidate_live_status().await;
        }

        if controls.remove_non_matching_streams {
            let removed = remove_non_matching_streams(&self.client, &self.udi, &self.matcher).await?;
            if removed > 0 {
                info!(removed, "playlist cycle dropped non-matching streams");
            }
        }

        let mut touched = Vec::new();
        if controls.auto_stream_matching {
            touched = discover_and_assign_streams(
                &self.client,
                &self.udi,
                &self.matcher,
                &self.dead_tracker,
                self.config.dead_stream_handling.enabled,
            )
            .await?;
        }

        if controls.auto_quality_checking && !touched.is_empty() {
            for channel_id in &touched {
                self.check_tracker.mark_needs_check(*channel_id).await?;
                self.queue.remove_from_completed(*channel_id);
                self.queue.enqueue(*channel_id, self.config.queue.priorities.update_driven, false, false)?;
            }
            info!(channels = touched.len(), "queued channels touched by stream matching");
        }

        Ok(())
    }
}

/// Refreshes every active, non-custom provider's playlist at the aggregator.
pub async fn refresh_enabled_provider_playlists(client: &AggregatorClient, udi: &sqm_udi::Udi) -> Result<()> {
    let providers = udi.get_providers();
    for provider in providers.iter().filter(|p| p.is_active && p.name.to_lowercase() != "custom") {
        if let Err(err) = client.refresh_playlist(provider.id).await {
            tracing::warn!(provider_id = provider.id.0, error = %err, "failed to refresh provider playlist");
        }
    }
    Ok(())
}
