//! Top-level stream probing API: URL validation, ffmpeg invocation, and
//! status classification.

use crate::error::{ProberError, Result};
use crate::process::run_ffmpeg;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const ALLOWED_SCHEMES: [&str; 4] = ["http://", "https://", "rtmp://", "rtmps://"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok,
    Timeout,
    Error,
}

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub duration_s: f64,
    pub timeout_s: f64,
    pub startup_buffer_s: f64,
    pub user_agent: String,
    pub proxy: Option<String>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            duration_s: 10.0,
            timeout_s: 15.0,
            startup_buffer_s: 5.0,
            user_agent: "Mozilla/5.0".to_string(),
            proxy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<f64>,
    pub bitrate_kbps: Option<f64>,
    pub elapsed_s: f64,
    pub error: Option<String>,
}

impl ProbeResult {
    /// A resolution and fps were recovered even though no bitrate could be
    /// determined — the caller may still score this as a partial success.
    pub fn is_partial_success(&self) -> bool {
        self.status == ProbeStatus::Ok
            && self.bitrate_kbps.is_none()
            && self.resolution.is_some()
            && self.fps.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamProber;

impl StreamProber {
    pub fn new() -> Self {
        Self
    }

    /// Probe a single stream URL with a single ffmpeg invocation. Never
    /// writes stats on a timed-out or errored run — the caller decides
    /// what to keep from a non-OK [`ProbeResult`].
    pub async fn probe(&self, url: &str, opts: &ProbeOptions) -> Result<ProbeResult> {
        if !ALLOWED_SCHEMES.iter().any(|scheme| url.to_lowercase().starts_with(scheme)) {
            return Err(ProberError::InvalidUrl(url.to_string()));
        }

        let args = self.build_args(url, opts);
        let wall_timeout = Duration::from_secs_f64(opts.timeout_s + opts.duration_s + opts.startup_buffer_s);

        let started = Instant::now();
        let outcome = run_ffmpeg(&args, wall_timeout, opts.duration_s).await;
        let elapsed_s = started.elapsed().as_secs_f64();

        match outcome {
            Ok(outcome) if outcome.timed_out => {
                warn!(url, elapsed_s, "probe timed out");
                Ok(ProbeResult {
                    status: ProbeStatus::Timeout,
                    video_codec: None,
                    audio_codec: None,
                    resolution: None,
                    fps: None,
                    bitrate_kbps: None,
                    elapsed_s,
                    error: Some("timed out".to_string()),
                })
            }
            Ok(outcome) => {
                debug!(url, elapsed_s, "probe completed");
                Ok(ProbeResult {
                    status: ProbeStatus::Ok,
                    video_codec: outcome.stats.video_codec,
                    audio_codec: outcome.stats.audio_codec,
                    resolution: outcome.stats.resolution,
                    fps: outcome.stats.fps,
                    bitrate_kbps: outcome.stats.bitrate_kbps,
                    elapsed_s,
                    error: None,
                })
            }
            Err(err) => {
                warn!(url, error = %err, "probe failed to spawn");
                Ok(ProbeResult {
                    status: ProbeStatus::Error,
                    video_codec: None,
                    audio_codec: None,
                    resolution: None,
                    fps: None,
                    bitrate_kbps: None,
                    elapsed_s,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    /// Probe with up to `retries` additional attempts on a non-`Ok` result,
    /// each separated by `retry_delay`. Re-runs the whole probe each time.
    pub async fn probe_with_retries(
        &self,
        url: &str,
        opts: &ProbeOptions,
        retries: u32,
        retry_delay: Duration,
    ) -> Result<ProbeResult> {
        let mut last = self.probe(url, opts).await?;
        let mut attempt = 0;
        while last.status != ProbeStatus::Ok && attempt < retries {
            tokio::time::sleep(retry_delay).await;
            last = self.probe(url, opts).await?;
            attempt += 1;
        }
        Ok(last)
    }

    fn build_args(&self, url: &str, opts: &ProbeOptions) -> Vec<String> {
        let mut args = vec![
            "-re".to_string(),
            "-v".to_string(),
            "debug".to_string(),
            "-user_agent".to_string(),
            opts.user_agent.clone(),
        ];
        if let Some(proxy) = &opts.proxy {
            args.push("-http_proxy".to_string());
            args.push(proxy.clone());
        }
        args.push("-i".to_string());
        args.push(url.to_string());
        args.push("-t".to_string());
        args.push(format!("{}", opts.duration_s));
        args.push("-f".to_string());
        args.push("null".to_string());
        args.push("-".to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_scheme_before_spawning() {
        let prober = StreamProber::new();
        let opts = ProbeOptions::default();
        let result = tokio_test::block_on(prober.probe("ftp://example.com/stream", &opts));
        assert!(matches!(result, Err(ProberError::InvalidUrl(_))));
    }

    #[test]
    fn build_args_includes_proxy_when_set() {
        let prober = StreamProber::new();
        let opts = ProbeOptions {
            proxy: Some("http://proxy:8080".to_string()),
            ..ProbeOptions::default()
        };
        let args = prober.build_args("http://example.com/stream.ts", &opts);
        assert!(args.iter().any(|a| a == "-http_proxy"));
        assert!(args.iter().any(|a| a == "http://proxy:8080"));
    }

    #[test]
    fn partial_success_requires_resolution_and_fps_without_bitrate() {
        let result = ProbeResult {
            status: ProbeStatus::Ok,
            video_codec: Some("h264".to_string()),
            audio_codec: None,
            resolution: Some("1920x1080".to_string()),
            fps: Some(25.0),
            bitrate_kbps: None,
            elapsed_s: 10.0,
            error: None,
        };
        assert!(result.is_partial_success());
    }
}
