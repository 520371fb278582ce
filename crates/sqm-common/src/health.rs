//! Liveness/readiness reporting for the server's health endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: HashMap<String, HealthStatus>,
}

impl HealthReport {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            components: HashMap::new(),
        }
    }

    pub fn with_component(mut self, name: &str, status: HealthStatus) -> Self {
        self.components.insert(name.to_string(), status);
        if status != HealthStatus::Healthy && self.status == HealthStatus::Healthy {
            self.status = status;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_component_demotes_overall_status() {
        let report = HealthReport::healthy()
            .with_component("scheduler", HealthStatus::Healthy)
            .with_component("queue", HealthStatus::Unhealthy);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }
}
