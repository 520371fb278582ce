//! Short-TTL cache of the aggregator's real-time proxy status map.

use sqm_aggregator::{AggregatorClient, ProxyStatusMap};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::Result;

const PROXY_STATUS_TTL: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Cached {
    fetched_at: Option<Instant>,
    map: ProxyStatusMap,
}

pub struct ProxyStatusCache {
    cached: RwLock<Cached>,
}

impl ProxyStatusCache {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(Cached::default()),
        }
    }

    /// Return the cached map, refreshing it first if the TTL has elapsed.
    pub async fn get(&self, client: &AggregatorClient) -> Result<ProxyStatusMap> {
        {
            let cached = self.cached.read().await;
            if let Some(fetched_at) = cached.fetched_at {
                if fetched_at.elapsed() < PROXY_STATUS_TTL {
                    return Ok(cached.map.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(fetched_at) = cached.fetched_at {
            if fetched_at.elapsed() < PROXY_STATUS_TTL {
                return Ok(cached.map.clone());
            }
        }

        let map = client.get_proxy_status().await?;
        cached.map = map.clone();
        cached.fetched_at = Some(Instant::now());
        Ok(map)
    }

    pub async fn invalidate(&self) {
        self.cached.write().await.fetched_at = None;
    }
}

impl Default for ProxyStatusCache {
    fn default() -> Self {
        Self::new()
    }
}
