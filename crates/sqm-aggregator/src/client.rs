//! Authenticated aggregator HTTP client.
//!
//! An explicit per-request timeout, a bounded connection pool, and typed
//! status-code classification. Tokens are simple bearer tokens refreshed
//! on a 401 and the failing request retried exactly once.

use crate::error::{AggregatorError, Result};
use crate::token::TokenStore;
use crate::types::{LoginResponse, PaginatedResponse, ProxyStatusMap};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use sqm_common::model::{Channel, ChannelGroup, Logo, Profile, Provider, Stream};
use sqm_common::{ChannelId, ProviderId};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AggregatorClientConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub initial_token: Option<String>,
    pub request_timeout: Duration,
}

pub struct AggregatorClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    token: TokenStore,
}

impl AggregatorClient {
    pub fn new(config: AggregatorClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .expect("aggregator http client configuration is valid");

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username,
            password: config.password,
            token: TokenStore::new(config.initial_token),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn login(&self) -> Result<String> {
        let username = self.username.as_ref().ok_or(AggregatorError::NoCredentials)?;
        let password = self.password.as_ref().ok_or(AggregatorError::NoCredentials)?;

        let resp = self
            .http
            .post(self.url("/api/accounts/token/"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AggregatorError::Unauthorized(format!(
                "login failed with status {}",
                resp.status()
            )));
        }

        let body: LoginResponse = resp.json().await?;
        body.into_token()
            .ok_or_else(|| AggregatorError::Unauthorized("login response had no token".to_string()))
    }

    async fn ensure_token(&self) -> Result<String> {
        if let Some(token) = self.token.get().await {
            return Ok(token);
        }
        self.token.refresh_with(|| self.login()).await
    }

    /// Issue one HTTP call, refreshing the token and retrying exactly once
    /// on a 401.
    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.ensure_token().await?;
        let resp = self.send(method.clone(), path, body, &token).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "aggregator returned 401, refreshing token and retrying once");
            let fresh = self.token.refresh_with(|| self.login()).await?;
            let retry = self.send(method, path, body, &fresh).await?;
            return Self::decode(path, retry).await;
        }

        Self::decode(path, resp).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response> {
        let mut req = self.http.request(method, self.url(path)).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    async fn decode(path: &str, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AggregatorError::Unauthorized(format!(
                "aggregator rejected refreshed token for {path}"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AggregatorError::Api {
                status: status.as_u16(),
                path: path.to_string(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let body = resp.text().await.unwrap_or_default();
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(AggregatorError::from)
    }

    /// `GET` a single page; callers that need pagination use
    /// [`Self::fetch_all_pages`].
    pub async fn fetch(&self, path: &str) -> Result<Value> {
        self.call(Method::GET, path, None).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.call(Method::PATCH, path, Some(body)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.call(Method::POST, path, Some(body)).await
    }

    /// Follow `next` links until `null`, decoding every page as `T`.
    pub async fn fetch_all_pages<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(path.to_string());

        while let Some(current) = next.take() {
            let raw = self.fetch(&current).await?;
            let page: PaginatedResponse<T> = serde_json::from_value(raw)?;
            next = page.next;
            items.extend(page.results);
        }

        Ok(items)
    }

    // --- typed convenience calls -------------------------------------------------

    pub async fn get_channels(&self) -> Result<Vec<Channel>> {
        self.fetch_all_pages("/api/channels/channels/?page_size=100").await
    }

    pub async fn get_channel(&self, id: ChannelId) -> Result<Channel> {
        let raw = self.fetch(&format!("/api/channels/channels/{id}/")).await?;
        serde_json::from_value(raw).map_err(AggregatorError::from)
    }

    pub async fn patch_channel_streams(&self, id: ChannelId, stream_ids: &[i64]) -> Result<Value> {
        self.patch(
            &format!("/api/channels/channels/{id}/"),
            &serde_json::json!({ "streams": stream_ids }),
        )
        .await
    }

    pub async fn get_streams(&self) -> Result<Vec<Stream>> {
        self.fetch_all_pages("/api/channels/streams/?page_size=100").await
    }

    pub async fn get_custom_streams_exist(&self) -> Result<bool> {
        let raw = self
            .fetch("/api/channels/streams/?is_custom=true&page_size=1")
            .await?;
        let page: PaginatedResponse<Value> = serde_json::from_value(raw)?;
        Ok(!page.results.is_empty())
    }

    pub async fn patch_stream_stats<T: Serialize>(&self, id: i64, stats: &T) -> Result<Value> {
        self.patch(
            &format!("/api/channels/streams/{id}/"),
            &serde_json::json!({ "stream_stats": stats }),
        )
        .await
    }

    pub async fn get_groups(&self) -> Result<Vec<ChannelGroup>> {
        self.fetch_all_pages("/api/channels/groups/").await
    }

    pub async fn get_logos(&self) -> Result<Vec<Logo>> {
        self.fetch_all_pages("/api/channels/logos/").await
    }

    pub async fn get_providers(&self) -> Result<Vec<Provider>> {
        self.fetch_all_pages("/api/m3u/accounts/").await
    }

    pub async fn get_channel_profiles(&self) -> Result<Vec<Profile>> {
        self.fetch_all_pages("/api/m3u/profiles/").await
    }

    pub async fn refresh_all_playlists(&self) -> Result<Value> {
        self.post("/api/m3u/refresh/", &Value::Null).await
    }

    pub async fn refresh_playlist(&self, provider_id: ProviderId) -> Result<Value> {
        self.post(&format!("/api/m3u/refresh/{provider_id}/"), &Value::Null)
            .await
    }

    pub async fn get_proxy_status(&self) -> Result<ProxyStatusMap> {
        let raw = self.fetch("/proxy/ts/status").await?;
        serde_json::from_value(raw).map_err(AggregatorError::from)
    }
}
