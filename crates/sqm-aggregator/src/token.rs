//! Bearer token storage with a single-flight refresh guard.
//!
//! Concurrent callers that all observe a 401 at roughly the same time share
//! one login round-trip rather than hammering the aggregator with N
//! simultaneous re-logins.

use tokio::sync::{Mutex, RwLock};

pub struct TokenStore {
    token: RwLock<Option<String>>,
    refresh_guard: Mutex<()>,
}

impl TokenStore {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            token: RwLock::new(initial),
            refresh_guard: Mutex::new(()),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    /// Run `refresh` under a single-flight guard: if another caller is
    /// already refreshing, wait for it and reuse its result instead of
    /// issuing a second login request.
    pub async fn refresh_with<F, Fut, E>(&self, refresh: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<String, E>>,
    {
        let _guard = self.refresh_guard.lock().await;
        // Another caller may have refreshed while we waited for the guard.
        if let Some(token) = self.get().await {
            return Ok(token);
        }
        let token = refresh().await?;
        self.set(token.clone()).await;
        Ok(token)
    }
}
