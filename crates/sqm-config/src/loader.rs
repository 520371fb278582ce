//! Configuration loader with file and environment variable support.

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths, checked in order.
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "sqm.toml",
    "./config/config.toml",
    "/etc/sqm/config.toml",
];

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("SQM_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) {
        if let Ok(val) = env::var("SQM_DATA_DIR") {
            config.data_dir = val;
        }

        if let Ok(val) = env::var("SQM_AGGREGATOR_BASE_URL") {
            config.aggregator.base_url = val;
        }
        if let Ok(val) = env::var("SQM_AGGREGATOR_USERNAME") {
            config.aggregator.username = Some(val);
        }
        if let Ok(val) = env::var("SQM_AGGREGATOR_PASSWORD") {
            config.aggregator.password = Some(val);
        }
        if let Ok(val) = env::var("SQM_AGGREGATOR_TOKEN") {
            config.aggregator.token = Some(val);
        }
        if let Ok(val) = env::var("SQM_AGGREGATOR_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.aggregator.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = env::var("SQM_HTTP_HOST") {
            config.http.host = val;
        }
        if let Ok(val) = env::var("SQM_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }

        if let Ok(val) = env::var("LOG_FORMAT") {
            config.logging.format = val;
        }
        if let Ok(val) = env::var("RUST_LOG") {
            config.logging.level = val;
        }

        if let Ok(val) = env::var("SQM_STREAM_CHECKER_ENABLED") {
            config.stream_checker.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = env::var("SQM_GLOBAL_CRON") {
            config.stream_checker.global_check_schedule.cron_expression = val;
        }
        if let Ok(val) = env::var("SQM_CONCURRENT_GLOBAL_LIMIT") {
            if let Ok(limit) = val.parse() {
                config.stream_checker.concurrent_streams.global_limit = limit;
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_defaults_when_no_file_present() {
        let loader = ConfigLoader::with_path("/nonexistent/path/config.toml");
        let config = loader.load().unwrap();
        assert_eq!(config.data_dir, "./data");
    }

    #[test]
    fn loads_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "data_dir = \"/srv/sqm\"").unwrap();

        let loader = ConfigLoader::with_path(&path);
        let config = loader.load().unwrap();
        assert_eq!(config.data_dir, "/srv/sqm");
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_dir = \"/from/file\"\n").unwrap();

        // SAFETY-equivalent: tests in this module run single-threaded w.r.t.
        // this var because no other test in this file touches SQM_DATA_DIR.
        std::env::set_var("SQM_DATA_DIR", "/from/env");
        let loader = ConfigLoader::with_path(&path);
        let config = loader.load().unwrap();
        std::env::remove_var("SQM_DATA_DIR");

        assert_eq!(config.data_dir, "/from/env");
    }
}
