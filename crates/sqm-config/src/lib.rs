//! Process configuration: TOML file + environment overrides.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use loader::ConfigLoader;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9191".to_string(),
            username: None,
            password: None,
            token: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationControlsConfig {
    pub auto_m3u_updates: bool,
    pub auto_stream_matching: bool,
    pub auto_quality_checking: bool,
    pub scheduled_global_action: bool,
    pub remove_non_matching_streams: bool,
}

impl Default for AutomationControlsConfig {
    fn default() -> Self {
        Self {
            auto_m3u_updates: true,
            auto_stream_matching: true,
            auto_quality_checking: true,
            scheduled_global_action: true,
            remove_non_matching_streams: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalCheckScheduleConfig {
    pub enabled: bool,
    pub cron_expression: String,
}

impl Default for GlobalCheckScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: "0 3 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistScheduleConfig {
    pub interval_secs: u64,
    pub cron_expression: Option<String>,
}

impl Default for PlaylistScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            cron_expression: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamAnalysisConfig {
    pub ffmpeg_duration: u64,
    pub timeout: u64,
    pub stream_startup_buffer: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: String,
}

impl Default for StreamAnalysisConfig {
    fn default() -> Self {
        Self {
            ffmpeg_duration: 10,
            timeout: 15,
            stream_startup_buffer: 5,
            retries: 1,
            retry_delay_ms: 2000,
            user_agent: "Mozilla/5.0 (stream-quality-manager)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub bitrate: f64,
    pub resolution: f64,
    pub fps: f64,
    pub codec: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            bitrate: 0.40,
            resolution: 0.35,
            fps: 0.15,
            codec: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub min_score: f64,
    pub prefer_h265: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            min_score: 0.0,
            prefer_h265: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuePrioritiesConfig {
    pub update_driven: i32,
    pub global: i32,
    pub manual: i32,
}

impl Default for QueuePrioritiesConfig {
    fn default() -> Self {
        Self {
            update_driven: 10,
            global: 5,
            manual: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_size: usize,
    pub max_channels_per_run: usize,
    pub priorities: QueuePrioritiesConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            max_channels_per_run: 0,
            priorities: QueuePrioritiesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrentStreamsConfig {
    pub global_limit: usize,
    pub enabled: bool,
    pub stagger_delay_ms: u64,
}

impl Default for ConcurrentStreamsConfig {
    fn default() -> Self {
        Self {
            global_limit: 10,
            enabled: true,
            stagger_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadStreamConfig {
    pub enabled: bool,
    pub min_resolution_width: u32,
    pub min_resolution_height: u32,
    pub min_bitrate_kbps: f64,
    pub min_score: f64,
}

impl Default for DeadStreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_resolution_width: 0,
            min_resolution_height: 0,
            min_bitrate_kbps: 0.0,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountStreamLimitsConfig {
    pub enabled: bool,
    pub global_limit: i64,
    pub account_limits: HashMap<i64, i64>,
}

impl Default for AccountStreamLimitsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            global_limit: 0,
            account_limits: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversificationMode {
    RoundRobin,
    /// Named but not defined in the distillation; dispatches to the same
    /// code path as `RoundRobin` until a distinct behavior is specified.
    Weighted,
}

impl Default for DiversificationMode {
    fn default() -> Self {
        DiversificationMode::RoundRobin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOrderingConfig {
    pub provider_diversification: bool,
    pub diversification_mode: DiversificationMode,
}

impl Default for StreamOrderingConfig {
    fn default() -> Self {
        Self {
            provider_diversification: false,
            diversification_mode: DiversificationMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFailoverConfig {
    pub enabled: bool,
    pub try_full_profiles: bool,
    pub phase2_max_wait_secs: u64,
    pub phase2_poll_interval_secs: u64,
}

impl Default for ProfileFailoverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            try_full_profiles: true,
            phase2_max_wait_secs: 600,
            phase2_poll_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamCheckerConfig {
    pub enabled: bool,
    pub immunity_window_secs: u64,
    pub automation_controls: AutomationControlsConfig,
    pub global_check_schedule: GlobalCheckScheduleConfig,
    pub playlist_schedule: PlaylistScheduleConfig,
    pub stream_analysis: StreamAnalysisConfig,
    pub scoring: ScoringConfig,
    pub queue: QueueConfig,
    pub concurrent_streams: ConcurrentStreamsConfig,
    pub dead_stream_handling: DeadStreamConfig,
    pub account_stream_limits: AccountStreamLimitsConfig,
    pub stream_ordering: StreamOrderingConfig,
    pub profile_failover: ProfileFailoverConfig,
}

impl Default for StreamCheckerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            immunity_window_secs: 7200,
            automation_controls: AutomationControlsConfig::default(),
            global_check_schedule: GlobalCheckScheduleConfig::default(),
            playlist_schedule: PlaylistScheduleConfig::default(),
            stream_analysis: StreamAnalysisConfig::default(),
            scoring: ScoringConfig::default(),
            queue: QueueConfig::default(),
            concurrent_streams: ConcurrentStreamsConfig::default(),
            dead_stream_handling: DeadStreamConfig::default(),
            account_stream_limits: AccountStreamLimitsConfig::default(),
            stream_ordering: StreamOrderingConfig::default(),
            profile_failover: ProfileFailoverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: String,
    pub aggregator: AggregatorConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub stream_checker: StreamCheckerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            aggregator: AggregatorConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            stream_checker: StreamCheckerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents =
            std::fs::read_to_string(path_ref).map_err(|source| ConfigError::ReadError {
                path: path_ref.display().to_string(),
                source,
            })?;
        toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path_ref.display().to_string(),
            source,
        })
    }

    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// A fully annotated TOML document matching every recognized field,
    /// suitable for `sqm-server --print-config-example`.
    pub fn example_toml() -> String {
        r#"# Stream Quality Manager configuration

data_dir = "./data"

[aggregator]
base_url = "http://localhost:9191"
username = "admin"
password = "changeme"
request_timeout_secs = 30

[http]
host = "0.0.0.0"
port = 8787

[logging]
format = "text"   # or "json"
level = "info"

[stream_checker]
enabled = true
immunity_window_secs = 7200 # 2 hours

[stream_checker.automation_controls]
auto_m3u_updates = true
auto_stream_matching = true
auto_quality_checking = true
scheduled_global_action = true
remove_non_matching_streams = false

[stream_checker.global_check_schedule]
enabled = true
cron_expression = "0 3 * * *"

[stream_checker.playlist_schedule]
interval_secs = 300

[stream_checker.stream_analysis]
ffmpeg_duration = 10
timeout = 15
stream_startup_buffer = 5
retries = 1
retry_delay_ms = 2000
user_agent = "Mozilla/5.0 (stream-quality-manager)"

[stream_checker.scoring]
min_score = 0.0
prefer_h265 = true

[stream_checker.scoring.weights]
bitrate = 0.40
resolution = 0.35
fps = 0.15
codec = 0.10

[stream_checker.queue]
max_size = 10000
max_channels_per_run = 0

[stream_checker.queue.priorities]
update_driven = 10
global = 5
manual = 10

[stream_checker.concurrent_streams]
global_limit = 10
enabled = true
stagger_delay_ms = 0

[stream_checker.dead_stream_handling]
enabled = true
min_resolution_width = 0
min_resolution_height = 0
min_bitrate_kbps = 0.0
min_score = 0.0

[stream_checker.account_stream_limits]
enabled = false
global_limit = 0

[stream_checker.stream_ordering]
provider_diversification = false
diversification_mode = "round_robin"

[stream_checker.profile_failover]
enabled = false
try_full_profiles = true
phase2_max_wait_secs = 600
phase2_poll_interval_secs = 10
"#
        .to_string()
    }
}
