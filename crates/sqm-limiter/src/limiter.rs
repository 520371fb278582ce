//! Profile-aware (really: provider/account-aware) concurrency limiter.
//!
//! Enforces `active_viewers + checking_streams <= max_streams` per
//! provider, polling with exponential backoff under contention. Mirrors
//! `AccountStreamLimiter.acquire`/`release` from the original
//! implementation exactly, including the 100ms/×1.5/2s-cap backoff
//! constants; `ActiveViewers` vs `Timeout` cause-annotation on give-up is
//! an enhancement this crate adds over the original's plain `timeout`.

use parking_lot::Mutex;
use sqm_common::ProviderId;
use sqm_udi::Udi;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    /// Gave up after `timeout` with checking slots actually contended.
    Timeout,
    /// Gave up after `timeout`, but active viewers alone already filled
    /// the limit — no amount of waiting for checking slots would help.
    ActiveViewers,
}

/// Returned by a successful (or no-op) acquire; pass to
/// [`ConcurrencyLimiter::release`]. `None` means "nothing to release"
/// (custom stream, or an unlimited provider).
pub struct ReleaseHandle(Option<ProviderId>);

pub struct ConcurrencyLimiter {
    udi: Arc<Udi>,
    checking_counts: Mutex<HashMap<ProviderId, i64>>,
    backoff: BackoffPolicy,
}

impl ConcurrencyLimiter {
    pub fn new(udi: Arc<Udi>) -> Self {
        Self::with_backoff(udi, BackoffPolicy::default())
    }

    pub fn with_backoff(udi: Arc<Udi>, backoff: BackoffPolicy) -> Self {
        Self {
            udi,
            checking_counts: Mutex::new(HashMap::new()),
            backoff,
        }
    }

    /// Acquire permission to check a stream belonging to `provider_id`.
    /// `provider_id = None` (custom stream) and an unlimited provider
    /// (`max_streams = 0`) always succeed immediately.
    pub async fn acquire(&self, provider_id: Option<ProviderId>, timeout: Option<Duration>) -> Result<(AcquireOutcome, ReleaseHandle)> {
        let Some(provider_id) = provider_id else {
            return Ok((AcquireOutcome::Acquired, ReleaseHandle(None)));
        };

        let limit = self
            .udi
            .get_provider_by_id(provider_id)
            .map(|p| p.effective_capacity())
            .unwrap_or(0);
        if limit <= 0 {
            return Ok((AcquireOutcome::Acquired, ReleaseHandle(None)));
        }

        let start = Instant::now();
        let mut wait = self.backoff.base;

        loop {
            let active = self.udi.get_active_streams_for_provider(provider_id).await?;

            let acquired = {
                let mut counts = self.checking_counts.lock();
                let checking = *counts.get(&provider_id).unwrap_or(&0);
                if active + checking < limit {
                    counts.insert(provider_id, checking + 1);
                    debug!(
                        %provider_id,
                        active,
                        checking = checking + 1,
                        limit,
                        "acquired stream check slot"
                    );
                    true
                } else {
                    false
                }
            };

            if acquired {
                return Ok((AcquireOutcome::Acquired, ReleaseHandle(Some(provider_id))));
            }

            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    let outcome = if active >= limit {
                        AcquireOutcome::ActiveViewers
                    } else {
                        AcquireOutcome::Timeout
                    };
                    warn!(%provider_id, ?outcome, elapsed = ?start.elapsed(), "gave up acquiring stream check slot");
                    return Ok((outcome, ReleaseHandle(None)));
                }
            }

            tokio::time::sleep(wait).await;
            wait = self.backoff.next(wait);
        }
    }

    pub fn release(&self, handle: ReleaseHandle) {
        let Some(provider_id) = handle.0 else {
            return;
        };
        let mut counts = self.checking_counts.lock();
        match counts.get(&provider_id).copied() {
            Some(checking) if checking > 0 => {
                counts.insert(provider_id, checking - 1);
            }
            _ => {
                warn!(%provider_id, "released a stream check slot with a zero checking count");
            }
        }
    }

    pub fn checking_count(&self, provider_id: ProviderId) -> i64 {
        *self.checking_counts.lock().get(&provider_id).unwrap_or(&0)
    }

    pub fn clear(&self) {
        self.checking_counts.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqm_aggregator::{AggregatorClient, AggregatorClientConfig};
    use sqm_common::ProviderId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn udi_with_provider(max_streams: i64) -> Arc<Udi> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/m3u/accounts/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "id": 1,
                    "name": "P",
                    "is_active": true,
                    "max_streams": max_streams,
                    "profiles": [],
                    "priority": 0,
                    "priority_mode": "disabled"
                }],
                "next": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/proxy/ts/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = AggregatorClient::new(AggregatorClientConfig {
            base_url: server.uri(),
            username: None,
            password: None,
            initial_token: Some("t".to_string()),
            request_timeout: Duration::from_secs(5),
        });
        let udi = Udi::new(client, dir.path().join("udi.json")).await;
        udi.refresh_providers().await.unwrap();
        // Keep the mock server alive for the lifetime of the test by
        // leaking it; these are short-lived unit tests, not a long-running
        // process.
        std::mem::forget(server);
        Arc::new(udi)
    }

    #[tokio::test]
    async fn custom_stream_always_acquires() {
        let udi = udi_with_provider(1).await;
        let limiter = ConcurrencyLimiter::new(udi);
        let (outcome, handle) = limiter.acquire(None, None).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);
        limiter.release(handle);
    }

    #[tokio::test]
    async fn unlimited_provider_always_acquires() {
        let udi = udi_with_provider(0).await;
        let limiter = ConcurrencyLimiter::new(udi);
        let (outcome, _handle) = limiter.acquire(Some(ProviderId(1)), None).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);
    }

    #[tokio::test]
    async fn second_acquire_times_out_when_checking_counts_fill_the_limit() {
        let udi = udi_with_provider(1).await;
        let limiter = ConcurrencyLimiter::new(udi);

        let (first, _handle) = limiter.acquire(Some(ProviderId(1)), None).await.unwrap();
        assert_eq!(first, AcquireOutcome::Acquired);

        let (second, _handle2) = limiter
            .acquire(Some(ProviderId(1)), Some(Duration::from_millis(150)))
            .await
            .unwrap();
        assert_eq!(second, AcquireOutcome::Timeout);
    }

    #[tokio::test]
    async fn release_then_reacquire_succeeds() {
        let udi = udi_with_provider(1).await;
        let limiter = ConcurrencyLimiter::new(udi);

        let (first, handle) = limiter.acquire(Some(ProviderId(1)), None).await.unwrap();
        assert_eq!(first, AcquireOutcome::Acquired);
        limiter.release(handle);

        let (second, _handle2) = limiter
            .acquire(Some(ProviderId(1)), Some(Duration::from_millis(150)))
            .await
            .unwrap();
        assert_eq!(second, AcquireOutcome::Acquired);
    }

    #[tokio::test]
    async fn release_with_zero_checking_count_does_not_panic() {
        let udi = udi_with_provider(1).await;
        let limiter = ConcurrencyLimiter::new(udi);
        limiter.release(ReleaseHandle(Some(ProviderId(1))));
    }
}
