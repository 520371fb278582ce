//! Process entry point: loads configuration, wires every component, starts
//! the automation scheduler and the channel-check queue worker, and serves
//! `/healthz`/`/readyz` for the deploying platform's liveness probes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use sqm_aggregator::{AggregatorClient, AggregatorClientConfig};
use sqm_changelog::{Changelog, ProgressReporter};
use sqm_common::health::{HealthReport, HealthStatus};
use sqm_config::AppConfig;
use sqm_deadstream::DeadStreamTracker;
use sqm_limiter::ConcurrencyLimiter;
use sqm_matcher::RegexMatcher;
use sqm_pipeline::{ChannelCheckPipeline, ChannelCheckTracker};
use sqm_prober::StreamProber;
use sqm_queue::{ChannelQueue, QueueWorker};
use sqm_scheduler::{AutomationScheduler, SchedulerState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqm_common::logging::init_logging("sqm-server");

    let config = AppConfig::load()?;
    info!(data_dir = %config.data_dir, "configuration loaded");

    let data_dir = PathBuf::from(&config.data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let client = AggregatorClient::new(AggregatorClientConfig {
        base_url: config.aggregator.base_url.clone(),
        username: config.aggregator.username.clone(),
        password: config.aggregator.password.clone(),
        initial_token: config.aggregator.token.clone(),
        request_timeout: std::time::Duration::from_secs(config.aggregator.request_timeout_secs),
    });
    let client = Arc::new(client);

    let udi = Arc::new(sqm_udi::Udi::new((*client).clone(), path(&data_dir, "udi.json")).await);
    let matcher = Arc::new(RegexMatcher::load(path(&data_dir, "channel_regex_config.json")).await?);
    let dead_tracker = Arc::new(DeadStreamTracker::load(path(&data_dir, "dead_streams.json")).await);
    let check_tracker = Arc::new(ChannelCheckTracker::load(path(&data_dir, "channel_updates.json")).await);
    let changelog = Arc::new(Changelog::load(path(&data_dir, "stream_checker_changelog.json")).await);
    let progress = Arc::new(ProgressReporter::new(path(&data_dir, "stream_checker_progress.json")));
    let scheduler_state = Arc::new(SchedulerState::load(path(&data_dir, "scheduler_state.json")).await);

    let limiter = Arc::new(ConcurrencyLimiter::new(udi.clone()));
    let prober = Arc::new(StreamProber::new());
    let queue = Arc::new(ChannelQueue::new(config.stream_checker.queue.max_size));

    let pipeline = Arc::new(ChannelCheckPipeline::new(
        client.clone(),
        udi.clone(),
        limiter,
        prober,
        dead_tracker.clone(),
        check_tracker.clone(),
        changelog.clone(),
        progress,
        config.stream_checker.clone(),
    ));

    let worker = Arc::new(QueueWorker::new(queue.clone(), changelog.clone(), pipeline.clone()));
    let worker_handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run().await })
    };

    let scheduler = Arc::new(AutomationScheduler::new(
        config.stream_checker.clone(),
        scheduler_state,
        client,
        udi,
        matcher,
        dead_tracker,
        check_tracker,
        queue,
        changelog,
        pipeline,
    ));
    if config.stream_checker.enabled {
        scheduler.start().await;
    } else {
        info!("stream_checker.enabled=false, automation scheduler not started");
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(scheduler.clone());

    let addr = SocketAddr::from((
        config.http.host.parse::<std::net::IpAddr>().unwrap_or([0, 0, 0, 0].into()),
        config.http.port,
    ));
    info!(?addr, "http server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await?;

    worker.stop();
    let _ = worker_handle.await;
    info!("sqm-server stopped");
    Ok(())
}

fn path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(name)
}

async fn healthz() -> Json<HealthReport> {
    Json(HealthReport::healthy())
}

async fn readyz(State(scheduler): State<Arc<AutomationScheduler>>) -> Json<HealthReport> {
    let scheduler_status = if scheduler.is_running().await {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };
    let global_action_status = if scheduler.is_global_action_in_progress().await {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    Json(
        HealthReport::healthy()
            .with_component("scheduler", scheduler_status)
            .with_component("global_action", global_action_status),
    )
}

async fn shutdown_signal(scheduler: Arc<AutomationScheduler>) {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    info!("shutdown signal received");
    scheduler.stop().await;
}
