//! Wires the playlist cycle and the global action into two independent
//! polling loops, each a `tokio::spawn`ed task gated by a shared
//! `running`/`global_action_in_progress` flag pair, so the two schedules
//! advance side by side without blocking each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqm_aggregator::AggregatorClient;
use sqm_changelog::Changelog;
use sqm_common::ChannelId;
use sqm_config::StreamCheckerConfig;
use sqm_deadstream::DeadStreamTracker;
use sqm_matcher::RegexMatcher;
use sqm_pipeline::{ChannelCheckPipeline, ChannelCheckTracker};
use sqm_queue::ChannelQueue;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::cron_gate;
use crate::error::Result;
use crate::global_action::GlobalAction;
use crate::playlist::PlaylistCycle;
use crate::state::SchedulerState;

/// How often each loop wakes to re-check whether it's due. The global
/// action schedule is evaluated at this cadence too, so it fires within a
/// minute of its cron boundary rather than exactly on it.
const LOOP_TICK: Duration = Duration::from_secs(60);

pub struct AutomationScheduler {
    config: StreamCheckerConfig,
    state: Arc<SchedulerState>,
    playlist_cycle: Arc<PlaylistCycle>,
    global_action: Arc<GlobalAction>,
    pipeline: Arc<ChannelCheckPipeline>,
    changelog: Arc<Changelog>,
    dead_tracker: Arc<DeadStreamTracker>,
    client: Arc<AggregatorClient>,
    udi: Arc<sqm_udi::Udi>,
    running: Arc<RwLock<bool>>,
    global_action_in_progress: Arc<RwLock<bool>>,
}

impl AutomationScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: StreamCheckerConfig,
        state: Arc<SchedulerState>,
        client: Arc<AggregatorClient>,
        udi: Arc<sqm_udi::Udi>,
        matcher: Arc<RegexMatcher>,
        dead_tracker: Arc<DeadStreamTracker>,
        check_tracker: Arc<ChannelCheckTracker>,
        queue: Arc<ChannelQueue>,
        changelog: Arc<Changelog>,
        pipeline: Arc<ChannelCheckPipeline>,
    ) -> Self {
        let playlist_cycle = Arc::new(PlaylistCycle::new(
            client.clone(),
            udi.clone(),
            matcher.clone(),
            dead_tracker.clone(),
            check_tracker.clone(),
            queue.clone(),
            config.clone(),
        ));
        let global_action = Arc::new(GlobalAction::new(
            client.clone(),
            udi.clone(),
            matcher,
            dead_tracker.clone(),
            check_tracker,
            queue,
            changelog.clone(),
            config.clone(),
        ));

        Self {
            config,
            state,
            playlist_cycle,
            global_action,
            pipeline,
            changelog,
            dead_tracker,
            client,
            udi,
            running: Arc::new(RwLock::new(false)),
            global_action_in_progress: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            warn!("automation scheduler already running");
            return;
        }
        *running = true;
        drop(running);

        info!("starting automation scheduler");

        let playlist_cycle = self.playlist_cycle.clone();
        let state = self.state.clone();
        let running_clone = self.running.clone();
        let global_in_progress = self.global_action_in_progress.clone();
        let playlist_schedule = self.config.playlist_schedule.clone();
        let playlist_enabled = self.config.automation_controls.auto_m3u_updates
            || self.config.automation_controls.auto_stream_matching
            || self.config.automation_controls.auto_quality_checking;

        tokio::spawn(async move {
            let mut ticker = interval(LOOP_TICK);
            loop {
                ticker.tick().await;
                if !*running_clone.read().await {
                    break;
                }
                if *global_in_progress.read().await {
                    continue;
                }
                if !playlist_enabled {
                    continue;
                }
                if !playlist_due(&playlist_schedule, state.last_playlist_update()) {
                    continue;
                }
                if let Err(err) = playlist_cycle.run().await {
                    error!(error = %err, "error running playlist cycle");
                }
                if let Err(err) = state.mark_playlist_update().await {
                    error!(error = %err, "failed to persist playlist-cycle timestamp");
                }
            }
        });

        let global_action = self.global_action.clone();
        let state = self.state.clone();
        let running_clone = self.running.clone();
        let global_in_progress = self.global_action_in_progress.clone();
        let global_schedule = self.config.global_check_schedule.clone();
        let scheduled_global_action_enabled = self.config.automation_controls.scheduled_global_action;

        tokio::spawn(async move {
            let mut ticker = interval(LOOP_TICK);
            loop {
                ticker.tick().await;
                if !*running_clone.read().await {
                    break;
                }
                if !global_schedule.enabled || !scheduled_global_action_enabled {
                    continue;
                }
                if *global_in_progress.read().await {
                    continue;
                }
                let schedule = match cron_gate::parse(&global_schedule.cron_expression) {
                    Ok(schedule) => schedule,
                    Err(err) => {
                        error!(error = %err, "invalid global check cron expression");
                        continue;
                    }
                };
                if !cron_gate::is_due(&schedule, Utc::now(), state.last_global_check()) {
                    continue;
                }

                *global_in_progress.write().await = true;
                if let Err(err) = global_action.run().await {
                    error!(error = %err, "error running global action");
                }
                if let Err(err) = state.mark_global_check().await {
                    error!(error = %err, "failed to persist global-check timestamp");
                }
                *global_in_progress.write().await = false;
            }
        });
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        info!("automation scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn is_global_action_in_progress(&self) -> bool {
        *self.global_action_in_progress.read().await
    }

    /// Manual trigger: runs the playlist cycle immediately, regardless of
    /// whether its interval/cron has elapsed. Still skipped while a global
    /// action is in progress.
    pub async fn trigger_playlist_cycle(&self) -> Result<()> {
        if *self.global_action_in_progress.read().await {
            warn!("ignoring manual playlist-cycle trigger, global action in progress");
            return Ok(());
        }
        self.playlist_cycle.run().await?;
        self.state.mark_playlist_update().await
    }

    /// Manual trigger: runs the global action immediately. Rejects a second
    /// concurrent call rather than queueing behind the running one.
    pub async fn trigger_global_action(&self) -> Result<()> {
        {
            let mut in_progress = self.global_action_in_progress.write().await;
            if *in_progress {
                warn!("global action already in progress, ignoring manual trigger");
                return Ok(());
            }
            *in_progress = true;
        }
        let result = self.global_action.run().await;
        if result.is_ok() {
            self.state.mark_global_check().await?;
        }
        *self.global_action_in_progress.write().await = false;
        result
    }

    /// The single-channel fast path: refreshes just this channel's providers,
    /// clears its dead-stream entries, re-matches its candidate streams, and
    /// force-checks it — bypassing both batching and the shared queue.
    pub async fn force_check_channel(&self, channel_id: ChannelId) -> Result<()> {
        self.udi.refresh_channel_by_id(channel_id).await?;
        self.dead_tracker.remove_by_channel_id(channel_id).await?;

        let start = std::time::Instant::now();
        let outcome = self.pipeline.check_channel(channel_id, true, true).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.changelog.record_single_channel_check(outcome.entry, duration_ms).await?;
        Ok(())
    }

    /// Exposed for the health/status surface: whether the aggregator client
    /// itself is reachable, independent of automation state.
    pub fn client(&self) -> &AggregatorClient {
        &self.client
    }
}

fn playlist_due(schedule: &sqm_config::PlaylistScheduleConfig, last_update: Option<chrono::DateTime<Utc>>) -> bool {
    if let Some(cron_expr) = schedule.cron_expression.as_deref() {
        let Ok(parsed) = cron_gate::parse(cron_expr) else {
            warn!(cron = cron_expr, "invalid playlist-cycle cron expression, falling back to interval");
            return interval_elapsed(schedule.interval_secs, last_update);
        };
        let now = Utc::now();
        return match last_update {
            None => true,
            Some(last) => cron_gate::previous_at_or_before(&parsed, now).is_some_and(|prev| prev > last),
        };
    }
    interval_elapsed(schedule.interval_secs, last_update)
}

fn interval_elapsed(interval_secs: u64, last_update: Option<chrono::DateTime<Utc>>) -> bool {
    match last_update {
        None => true,
        Some(last) => (Utc::now() - last).num_seconds() >= interval_secs as i64,
    }
}
