//! Wire types specific to the aggregator's HTTP contract (as opposed to the
//! shared domain model in `sqm_common::model`, which this crate deserializes
//! the "data" half of these responses into).

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access: Option<String>,
    pub token: Option<String>,
}

impl LoginResponse {
    pub fn into_token(self) -> Option<String> {
        self.access.or(self.token)
    }
}

#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub results: Vec<T>,
    pub next: Option<String>,
}

/// One entry of `GET /proxy/ts/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyStatusEntry {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub m3u_profile_id: Option<i64>,
    #[serde(default)]
    pub clients: Option<serde_json::Value>,
    #[serde(default)]
    pub current_stream: Option<serde_json::Value>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ProxyStatusEntry {
    /// Active iff state=="active" or current_stream set or active true or
    /// clients non-empty, per the aggregator's documented contract.
    pub fn is_active(&self) -> bool {
        if self.state.as_deref() == Some("active") {
            return true;
        }
        if self.active == Some(true) {
            return true;
        }
        if self
            .current_stream
            .as_ref()
            .is_some_and(|v| !v.is_null())
        {
            return true;
        }
        match &self.clients {
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0) > 0,
            _ => false,
        }
    }
}

pub type ProxyStatusMap = HashMap<String, ProxyStatusEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(state: Option<&str>, active: Option<bool>, clients: Option<serde_json::Value>) -> ProxyStatusEntry {
        ProxyStatusEntry {
            state: state.map(str::to_string),
            m3u_profile_id: None,
            clients,
            current_stream: None,
            active,
        }
    }

    #[test]
    fn active_state_string_counts_as_active() {
        assert!(entry(Some("active"), None, None).is_active());
    }

    #[test]
    fn explicit_active_flag_counts() {
        assert!(entry(None, Some(true), None).is_active());
    }

    #[test]
    fn non_empty_clients_counts_as_active() {
        let clients = serde_json::json!(["client-a"]);
        assert!(entry(Some("idle"), None, Some(clients)).is_active());
    }

    #[test]
    fn idle_with_no_clients_is_not_active() {
        assert!(!entry(Some("idle"), Some(false), Some(serde_json::json!([]))).is_active());
    }
}
