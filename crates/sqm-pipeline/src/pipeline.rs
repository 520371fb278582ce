//! The channel-check pipeline: fetch streams, decide which need a fresh
//! probe, probe with concurrency and profile failover, update stats, detect
//! dead/revived transitions, re-score, diversify, apply account limits, drop
//! dead streams, persist the new order, and log the result.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tracing::warn;

use sqm_aggregator::AggregatorClient;
use sqm_changelog::{compute_averages, Changelog, ChannelCheckEntry, ChannelCheckStats, ProgressReporter, StreamDetail};
use sqm_common::model::{Channel, PriorityMode, Stream, StreamStats};
use sqm_common::{ChannelId, ProviderId, StreamId};
use sqm_config::StreamCheckerConfig;
use sqm_deadstream::DeadStreamTracker;
use sqm_limiter::{AcquireOutcome, ConcurrencyLimiter};
use sqm_prober::{ProbeResult, StreamProber};
use sqm_scorer::{ChannelPreference, DeadThresholds, ScoringWeights};

use crate::account_limits::{apply_account_limits, AccountLimited};
use crate::diversify::{diversify, Ranked};
use crate::error::Result;
use crate::failover::{check_stream_can_run, run_with_failover};
use crate::tracker::ChannelCheckTracker;

#[derive(Debug, Clone)]
pub struct ChannelCheckOutcome {
    pub skipped: bool,
    pub skipped_reason: Option<String>,
    pub total: u32,
    pub analyzed: u32,
    pub dead: u32,
    pub revived: u32,
    /// Always populated, even when `skip_batch_entry` kept it out of the
    /// worker's batch — callers doing a manual single-channel check use
    /// this to feed `Changelog::record_single_channel_check` directly.
    pub entry: ChannelCheckEntry,
}

struct ProbedOutcome {
    stream: Stream,
    stats: StreamStats,
    /// Whether this stream was actually re-probed (and so needs a PATCH),
    /// as opposed to synthesized from a cached `active_viewers` skip.
    patch: bool,
    skipped_reason: Option<String>,
}

struct StreamResult {
    stream: Stream,
    stats: StreamStats,
    score: f64,
    dead: bool,
}

impl Ranked for StreamResult {
    fn score(&self) -> f64 {
        self.score
    }
    fn provider_id(&self) -> Option<ProviderId> {
        self.stream.provider_id
    }
}

impl AccountLimited for StreamResult {
    fn provider_id(&self) -> Option<ProviderId> {
        self.stream.provider_id
    }
}

pub struct ChannelCheckPipeline {
    client: Arc<AggregatorClient>,
    udi: Arc<sqm_udi::Udi>,
    limiter: Arc<ConcurrencyLimiter>,
    prober: Arc<StreamProber>,
    dead_tracker: Arc<DeadStreamTracker>,
    check_tracker: Arc<ChannelCheckTracker>,
    changelog: Arc<Changelog>,
    progress: Arc<ProgressReporter>,
    config: StreamCheckerConfig,
}

impl ChannelCheckPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<AggregatorClient>,
        udi: Arc<sqm_udi::Udi>,
        limiter: Arc<ConcurrencyLimiter>,
        prober: Arc<StreamProber>,
        dead_tracker: Arc<DeadStreamTracker>,
        check_tracker: Arc<ChannelCheckTracker>,
        changelog: Arc<Changelog>,
        progress: Arc<ProgressReporter>,
        config: StreamCheckerConfig,
    ) -> Self {
        Self {
            client,
            udi,
            limiter,
            prober,
            dead_tracker,
            check_tracker,
            changelog,
            progress,
            config,
        }
    }

    pub async fn check_channel(&self, channel_id: ChannelId, force_check: bool, skip_batch_entry: bool) -> Result<ChannelCheckOutcome> {
        self.progress.set(channel_id, "", 0, 5, "initializing", "").await.ok();

        if self.udi.get_channel_by_id(channel_id).is_none() {
            self.udi.refresh_channel_by_id(channel_id).await?;
        }
        let Some(channel) = self.udi.get_channel_by_id(channel_id) else {
            return self.finish_skip(channel_id, "", None, "channel_not_found", 0, skip_batch_entry).await;
        };
        let logo_url = self.logo_url_for(&channel);

        let streams = self.udi.get_channel_streams(channel_id)?;
        if streams.is_empty() {
            self.check_tracker.record_check(channel_id, Vec::new()).await?;
            return self.finish_skip(channel_id, &channel.name, logo_url, "no_streams", 0, skip_batch_entry).await;
        }

        // Step 3: limit check.
        if self.udi.is_channel_active(channel_id).await? {
            return self
                .finish_skip(channel_id, &channel.name, logo_url, "active_viewers", streams.len() as u32, skip_batch_entry)
                .await;
        }
        let mut any_runnable = false;
        for stream in &streams {
            if check_stream_can_run(&self.udi, stream).await? {
                any_runnable = true;
                break;
            }
        }
        if !any_runnable {
            return self
                .finish_skip(channel_id, &channel.name, logo_url, "max_streams_reached", streams.len() as u32, skip_batch_entry)
                .await;
        }

        // Step 4: immunity partition.
        self.progress.set(channel_id, &channel.name, 1, 5, "partitioning", "").await.ok();
        let current_ids: HashSet<StreamId> = streams.iter().map(|s| s.id).collect();
        let effective_force = force_check || self.check_tracker.needs_check(channel_id);
        let already_checked = self.check_tracker.checked_stream_ids(channel_id);

        let (to_probe, cached): (Vec<Stream>, Vec<Stream>) = if effective_force {
            (streams.clone(), Vec::new())
        } else {
            (
                streams.iter().filter(|s| !already_checked.contains(&s.id)).cloned().collect(),
                streams.iter().filter(|s| already_checked.contains(&s.id)).cloned().collect(),
            )
        };

        if !effective_force && to_probe.is_empty() && self.check_tracker.unchanged(channel_id, &current_ids) {
            return self
                .finish_skip(channel_id, &channel.name, logo_url, "unchanged", streams.len() as u32, skip_batch_entry)
                .await;
        }

        // Step 5: parallel probes.
        self.progress
            .set(channel_id, &channel.name, 2, 5, "probing", &format!("{} streams", to_probe.len()))
            .await
            .ok();
        let probed = self.probe_streams(&to_probe).await?;

        let mut results = Vec::with_capacity(streams.len());
        let mut analyzed = 0u32;
        let mut dead_count = 0u32;
        let mut revived_count = 0u32;

        // Step 6: PATCH + mirror + score + dead/revive transition for probed streams.
        for outcome in probed {
            if outcome.patch {
                let body = stats_patch_body(&outcome.stats);
                if let Err(err) = self.client.patch_stream_stats(outcome.stream.id.0, &body).await {
                    warn!(stream_id = outcome.stream.id.0, error = %err, "failed to PATCH stream stats");
                }
                let mut updated = outcome.stream.clone();
                updated.stream_stats = Some(outcome.stats.clone());
                if let Err(err) = self.udi.update_stream(updated).await {
                    warn!(stream_id = outcome.stream.id.0, error = %err, "failed to mirror stream stats into UDI");
                }
                analyzed += 1;
            }

            let result = self.score_stream(&channel, outcome.stream, outcome.stats).await?;
            self.track_dead_transition(&channel, &result, &mut dead_count, &mut revived_count).await?;
            results.push(result);
        }

        // Step 7: cached streams, rebuilt from UDI's stored stats.
        for stream in cached {
            let stats = stream.stream_stats.clone().unwrap_or_default();
            let result = self.score_stream(&channel, stream, stats).await?;
            self.track_dead_transition(&channel, &result, &mut dead_count, &mut revived_count).await?;
            results.push(result);
        }

        // Step 8: sort descending by score (stable, so ties keep probe order).
        self.progress.set(channel_id, &channel.name, 3, 5, "scoring", "").await.ok();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Step 9: provider diversification.
        let results = if self.config.stream_ordering.provider_diversification {
            diversify(results)
        } else {
            results
        };

        // Step 10: account limits after scoring.
        let results = apply_account_limits(results, &self.config.account_stream_limits);

        // Step 11: dead removal.
        let results: Vec<StreamResult> = if self.config.dead_stream_handling.enabled {
            results.into_iter().filter(|r| !r.dead).collect()
        } else {
            results
        };

        // Step 12: PATCH the channel's final stream order.
        self.progress.set(channel_id, &channel.name, 4, 5, "reordering", "").await.ok();
        let final_ids: Vec<StreamId> = results.iter().map(|r| r.stream.id).collect();
        let raw_ids: Vec<i64> = final_ids.iter().map(|id| id.0).collect();
        match self.client.patch_channel_streams(channel_id, &raw_ids).await {
            Ok(_) => {
                let mut updated_channel = channel.clone();
                updated_channel.streams = final_ids.clone();
                self.udi.update_channel(updated_channel).await?;
                if let Some(refreshed) = self.udi.get_channel_by_id(channel_id) {
                    if refreshed.streams != final_ids {
                        warn!(channel_id = channel_id.0, "channel stream order mismatch after PATCH, UDI not authoritative");
                    }
                }
            }
            Err(err) => warn!(channel_id = channel_id.0, error = %err, "failed to PATCH channel stream order"),
        }

        // Step 13: update the check tracker.
        self.check_tracker.record_check(channel_id, final_ids).await?;

        // Step 14: append a per-channel changelog entry.
        let stats_refs: Vec<&StreamStats> = results.iter().map(|r| &r.stats).collect();
        let (avg_resolution, avg_bitrate, avg_fps) = compute_averages(&stats_refs);
        let top_streams: Vec<StreamDetail> = results
            .iter()
            .take(10)
            .map(|r| StreamDetail {
                stream_id: r.stream.id.0,
                name: r.stream.name.clone(),
                resolution: r.stats.resolution.clone(),
                bitrate_kbps: r.stats.ffmpeg_output_bitrate_kbps,
                fps: r.stats.source_fps,
                codec: r.stats.video_codec.clone(),
                score: r.score,
            })
            .collect();

        let stats = ChannelCheckStats {
            total: streams.len() as u32,
            analyzed,
            dead: dead_count,
            revived: revived_count,
            avg_resolution,
            avg_bitrate,
            avg_fps,
            top_streams,
        };

        let entry = ChannelCheckEntry {
            channel_id,
            name: channel.name.clone(),
            logo_url,
            stats,
            skipped_reason: None,
        };
        if !skip_batch_entry {
            self.changelog.push_channel_result(entry.clone());
        }
        self.progress.clear(channel_id).await.ok();

        Ok(ChannelCheckOutcome {
            skipped: false,
            skipped_reason: None,
            total: streams.len() as u32,
            analyzed,
            dead: dead_count,
            revived: revived_count,
            entry,
        })
    }

    async fn probe_streams(&self, to_probe: &[Stream]) -> Result<Vec<ProbedOutcome>> {
        let concurrency = &self.config.concurrent_streams;
        let permits = if concurrency.enabled { concurrency.global_limit.max(1) } else { to_probe.len().max(1) };
        let semaphore = Semaphore::new(permits);
        let acquire_timeout = Duration::from_secs(self.config.stream_analysis.timeout);

        let tasks = to_probe.iter().map(|stream| async {
            let _permit = semaphore.acquire().await.expect("semaphore is never closed");
            if concurrency.stagger_delay_ms > 0 {
                let jittered_ms = rand::thread_rng().gen_range(0..=concurrency.stagger_delay_ms);
                tokio::time::sleep(Duration::from_millis(jittered_ms)).await;
            }

            let (outcome, handle) = self.limiter.acquire(stream.provider_id, Some(acquire_timeout)).await?;
            match outcome {
                AcquireOutcome::ActiveViewers => {
                    let stats = stream.stream_stats.clone().unwrap_or_default();
                    Ok(Some(ProbedOutcome {
                        stream: stream.clone(),
                        stats,
                        patch: false,
                        skipped_reason: Some("active_viewers".to_string()),
                    }))
                }
                AcquireOutcome::Timeout => {
                    warn!(stream_id = stream.id.0, "gave up acquiring a check slot, skipping stream entirely");
                    Ok(None)
                }
                AcquireOutcome::Acquired => {
                    let failover = run_with_failover(
                        &self.udi,
                        &self.prober,
                        &self.config.stream_analysis,
                        &self.config.profile_failover,
                        stream,
                    )
                    .await;
                    self.limiter.release(handle);
                    let failover = failover?;
                    let stats = probe_result_to_stats(&failover.probe);
                    Ok(Some(ProbedOutcome { stream: stream.clone(), stats, patch: true, skipped_reason: None }))
                }
            }
        });

        let results: Vec<Result<Option<ProbedOutcome>>> = futures::future::join_all(tasks).await;
        let mut out = Vec::with_capacity(results.len());
        for result in results {
            if let Some(outcome) = result? {
                out.push(outcome);
            }
        }
        Ok(out)
    }

    async fn score_stream(&self, channel: &Channel, stream: Stream, stats: StreamStats) -> Result<StreamResult> {
        let (priority, priority_mode) = self.provider_priority(&stream);
        let preference = self.resolve_preference(channel);
        let thresholds = self.dead_thresholds();
        let weights = self.scoring_weights();

        let score = sqm_scorer::score(&stats, &thresholds, &weights, self.config.scoring.prefer_h265, priority, priority_mode, &preference);
        let dead = sqm_scorer::is_dead(&stats, &thresholds, score);
        Ok(StreamResult { stream, stats, score, dead })
    }

    async fn track_dead_transition(&self, channel: &Channel, result: &StreamResult, dead_count: &mut u32, revived_count: &mut u32) -> Result<()> {
        let was_dead = self.dead_tracker.is_dead(&result.stream.url);
        match (was_dead, result.dead) {
            (false, true) => {
                self.dead_tracker
                    .mark_dead(&result.stream.url, result.stream.id, &result.stream.name, channel.id)
                    .await?;
                *dead_count += 1;
            }
            (true, false) => {
                self.dead_tracker.mark_alive(&result.stream.url).await?;
                *revived_count += 1;
            }
            (true, true) => *dead_count += 1,
            (false, false) => {}
        }
        Ok(())
    }

    fn provider_priority(&self, stream: &Stream) -> (i64, PriorityMode) {
        match stream.provider_id.and_then(|id| self.udi.get_provider_by_id(id)) {
            Some(provider) => (provider.priority, provider.priority_mode),
            None => (0, PriorityMode::Disabled),
        }
    }

    fn resolve_preference(&self, channel: &Channel) -> ChannelPreference {
        let preference = channel.stream_preference.or_else(|| {
            channel
                .group_id
                .and_then(|group_id| self.udi.get_groups().into_iter().find(|g| g.id == group_id))
                .and_then(|group| group.stream_preference)
        });
        let preference = preference.unwrap_or_default();
        ChannelPreference {
            prefer_4k: preference.prefer_4k,
            avoid_4k: preference.avoid_4k,
            max_1080p: preference.max_1080p,
            max_720p: preference.max_720p,
        }
    }

    fn dead_thresholds(&self) -> DeadThresholds {
        let cfg = &self.config.dead_stream_handling;
        DeadThresholds {
            enabled: cfg.enabled,
            min_resolution_width: cfg.min_resolution_width,
            min_resolution_height: cfg.min_resolution_height,
            min_bitrate_kbps: cfg.min_bitrate_kbps,
            min_score: cfg.min_score,
        }
    }

    fn scoring_weights(&self) -> ScoringWeights {
        let weights = &self.config.scoring.weights;
        ScoringWeights {
            bitrate: weights.bitrate,
            resolution: weights.resolution,
            fps: weights.fps,
            codec: weights.codec,
        }
    }

    fn logo_url_for(&self, channel: &Channel) -> Option<String> {
        let logo_id = channel.logo_id?;
        self.udi.get_logos().into_iter().find(|l| l.id == logo_id).and_then(|l| l.url)
    }

    async fn finish_skip(
        &self,
        channel_id: ChannelId,
        name: &str,
        logo_url: Option<String>,
        reason: &str,
        total: u32,
        skip_batch_entry: bool,
    ) -> Result<ChannelCheckOutcome> {
        let entry = ChannelCheckEntry {
            channel_id,
            name: name.to_string(),
            logo_url,
            stats: ChannelCheckStats { total, ..ChannelCheckStats::default() },
            skipped_reason: Some(reason.to_string()),
        };
        if !skip_batch_entry {
            self.changelog.push_channel_result(entry.clone());
        }
        self.progress.clear(channel_id).await.ok();
        Ok(ChannelCheckOutcome {
            skipped: true,
            skipped_reason: Some(reason.to_string()),
            total,
            analyzed: 0,
            dead: 0,
            revived: 0,
            entry,
        })
    }
}

/// Adapter so the queue worker (which only knows about `ChannelChecker`)
/// can drive the pipeline without depending on it directly. Queue-driven
/// checks never force a re-probe and always join the worker's open batch.
#[async_trait::async_trait]
impl sqm_queue::ChannelChecker for ChannelCheckPipeline {
    async fn check_channel(&self, channel_id: ChannelId) -> std::result::Result<(), String> {
        ChannelCheckPipeline::check_channel(self, channel_id, false, false)
            .await
            .map(|_| ())
            .map_err(|err| err.to_string())
    }
}

fn probe_result_to_stats(probe: &ProbeResult) -> StreamStats {
    StreamStats {
        resolution: probe.resolution.clone(),
        source_fps: probe.fps,
        video_codec: probe.video_codec.clone(),
        audio_codec: probe.audio_codec.clone(),
        ffmpeg_output_bitrate_kbps: probe.bitrate_kbps,
    }
}

/// Builds the PATCH body for `stream_stats`, omitting absent or `"N/A"`
/// fields so a partial probe never clobbers previously-good stats.
fn stats_patch_body(stats: &StreamStats) -> Value {
    let mut map = Map::new();
    if let Some(resolution) = stats.resolution.as_deref() {
        if resolution != "N/A" {
            map.insert("resolution".to_string(), json!(resolution));
        }
    }
    if let Some(fps) = stats.source_fps {
        map.insert("source_fps".to_string(), json!(fps));
    }
    if let Some(codec) = stats.video_codec.as_deref() {
        if codec != "N/A" {
            map.insert("video_codec".to_string(), json!(codec));
        }
    }
    if let Some(codec) = stats.audio_codec.as_deref() {
        if codec != "N/A" {
            map.insert("audio_codec".to_string(), json!(codec));
        }
    }
    if let Some(bitrate) = stats.ffmpeg_output_bitrate_kbps {
        map.insert("ffmpeg_output_bitrate".to_string(), json!(bitrate));
    }
    Value::Object(map)
}
