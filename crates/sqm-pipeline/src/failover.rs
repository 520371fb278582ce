//! Profile failover (§4.5 Phase 1/Phase 2): probe a stream through whichever
//! of its provider's profiles has room, retrying across profiles before
//! giving up.

use std::time::{Duration, Instant};

use sqm_common::model::{Profile, Stream};
use sqm_config::{ProfileFailoverConfig, StreamAnalysisConfig};
use sqm_prober::{ProbeOptions, ProbeStatus, StreamProber};
use sqm_udi::Udi;
use tracing::{debug, warn};

use crate::error::Result;

pub struct FailoverOutcome {
    pub profile_id: Option<sqm_common::ProfileId>,
    pub phase: u8,
    pub probe: sqm_prober::ProbeResult,
}

fn probe_options(analysis: &StreamAnalysisConfig, proxy: Option<String>) -> ProbeOptions {
    ProbeOptions {
        duration_s: analysis.ffmpeg_duration as f64,
        timeout_s: analysis.timeout as f64,
        startup_buffer_s: analysis.stream_startup_buffer as f64,
        user_agent: analysis.user_agent.clone(),
        proxy,
    }
}

async fn probe_through_profile(
    udi: &Udi,
    prober: &StreamProber,
    analysis: &StreamAnalysisConfig,
    stream: &Stream,
    profile: Option<&Profile>,
) -> Result<sqm_prober::ProbeResult> {
    let url = udi.apply_profile_url_transformation(stream, profile);
    let opts = probe_options(analysis, None);
    Ok(prober
        .probe_with_retries(&url, &opts, analysis.retries, Duration::from_millis(analysis.retry_delay_ms))
        .await?)
}

fn profile_has_room(active: i64, profile: &Profile) -> bool {
    profile.max_streams == 0 || active < profile.max_streams
}

/// Runs Phase 1 (free profiles, in order) then, if configured and every
/// profile was full, Phase 2 (poll until one frees up or the max wait
/// elapses). A provider with no profiles (or a custom stream) probes
/// directly with no failover.
pub async fn run_with_failover(
    udi: &Udi,
    prober: &StreamProber,
    analysis: &StreamAnalysisConfig,
    failover: &ProfileFailoverConfig,
    stream: &Stream,
) -> Result<FailoverOutcome> {
    let provider = match stream.provider_id {
        Some(id) => udi.get_provider_by_id(id),
        None => None,
    };

    let profiles: Vec<Profile> = provider
        .as_ref()
        .map(|p| p.profiles.iter().filter(|pr| pr.is_active).cloned().collect())
        .unwrap_or_default();

    if profiles.is_empty() {
        let probe = probe_through_profile(udi, prober, analysis, stream, None).await?;
        return Ok(FailoverOutcome { profile_id: None, phase: 1, probe });
    }

    let provider_id = stream.provider_id.expect("profiles non-empty implies a provider");
    let mut last: Option<sqm_prober::ProbeResult> = None;

    // Phase 1: whichever profiles currently have room, in provider order.
    for profile in &profiles {
        let active = udi.get_active_streams_for_profile(provider_id, profile.id).await?;
        if !profile_has_room(active, profile) {
            continue;
        }
        let probe = probe_through_profile(udi, prober, analysis, stream, Some(profile)).await?;
        if probe.status == ProbeStatus::Ok {
            return Ok(FailoverOutcome { profile_id: Some(profile.id), phase: 1, probe });
        }
        debug!(profile_id = profile.id.0, ?probe.status, "phase 1 profile probe failed, trying next");
        last = Some(probe);
    }

    if !failover.enabled {
        return Ok(fallback_outcome(last, 1));
    }

    // Phase 2: poll until a previously-full profile frees up or time runs out.
    let deadline = Instant::now() + Duration::from_secs(failover.phase2_max_wait_secs);
    let poll_interval = Duration::from_secs(failover.phase2_poll_interval_secs);

    while Instant::now() < deadline {
        tokio::time::sleep(poll_interval).await;
        for profile in &profiles {
            let active = udi.get_active_streams_for_profile(provider_id, profile.id).await?;
            if !profile_has_room(active, profile) {
                continue;
            }
            let probe = probe_through_profile(udi, prober, analysis, stream, Some(profile)).await?;
            if probe.status == ProbeStatus::Ok {
                return Ok(FailoverOutcome { profile_id: Some(profile.id), phase: 2, probe });
            }
            last = Some(probe);
        }
    }

    warn!(stream_id = stream.id.0, "profile failover exhausted without an OK probe");
    Ok(fallback_outcome(last, 2))
}

fn fallback_outcome(last: Option<sqm_prober::ProbeResult>, phase: u8) -> FailoverOutcome {
    let probe = last.unwrap_or(sqm_prober::ProbeResult {
        status: ProbeStatus::Error,
        video_codec: None,
        audio_codec: None,
        resolution: None,
        fps: None,
        bitrate_kbps: None,
        elapsed_s: 0.0,
        error: Some("no profile had an available slot".to_string()),
    });
    FailoverOutcome { profile_id: None, phase, probe }
}

/// `check_stream_can_run`: thin wrapper over
/// [`Udi::find_available_profile_for_stream`]; custom streams (no provider)
/// always run, mirroring the limiter's treatment of them.
pub async fn check_stream_can_run(udi: &Udi, stream: &Stream) -> Result<bool> {
    if stream.provider_id.is_none() {
        return Ok(true);
    }
    Ok(udi.find_available_profile_for_stream(stream).await?.is_some())
}
