use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::intent::IntentLabel;

/// Main configuration structure for Turnwise
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Reactive exchange timing and completion policy
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Path scoring and fallback label
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Snapshot staleness horizon
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Judgment capability configuration
    #[serde(default)]
    pub judge: JudgeConfig,
}

/// Reactive exchange configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExchangeConfig {
    /// Idle period after the last composition activity before the
    /// counterpart is asked to respond
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,

    /// Pause after an explicit submit before idle arming resumes
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Delay between completion and the completion callback
    #[serde(default = "default_auto_advance_delay_ms")]
    pub auto_advance_delay_ms: u64,

    /// Participant messages allowed before the exchange closes
    #[serde(default = "default_max_sent")]
    pub max_sent: u32,

    /// Messages that must exist before idle arming is allowed
    #[serde(default = "default_initial_reveal_messages")]
    pub initial_reveal_messages: usize,

    /// Hard cap on judgment calls per exchange
    #[serde(default = "default_max_invocations")]
    pub max_invocations: u32,

    /// Score applied when the judgment fails or returns an unusable score
    #[serde(default = "default_fallback_score")]
    pub fallback_score: u8,
}

const fn default_idle_delay_ms() -> u64 {
    8_000
}

const fn default_settle_delay_ms() -> u64 {
    1_500
}

const fn default_auto_advance_delay_ms() -> u64 {
    4_000
}

const fn default_max_sent() -> u32 {
    3
}

const fn default_initial_reveal_messages() -> usize {
    1
}

const fn default_max_invocations() -> u32 {
    6
}

const fn default_fallback_score() -> u8 {
    5
}

impl ExchangeConfig {
    pub const fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub const fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_delay_ms)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            idle_delay_ms: default_idle_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            auto_advance_delay_ms: default_auto_advance_delay_ms(),
            max_sent: default_max_sent(),
            initial_reveal_messages: default_initial_reveal_messages(),
            max_invocations: default_max_invocations(),
            fallback_score: default_fallback_score(),
        }
    }
}

/// Path scoring configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    /// Number of labelled turns in a path game
    #[serde(default = "default_path_length")]
    pub path_length: usize,

    /// Inclusive upper bounds of every weight bucket except the open top one
    #[serde(default = "default_bucket_upper_bounds")]
    pub bucket_upper_bounds: Vec<u32>,

    /// Label committed when classification fails
    #[serde(default = "default_fallback_label")]
    pub fallback_label: IntentLabel,
}

const fn default_path_length() -> usize {
    3
}

fn default_bucket_upper_bounds() -> Vec<u32> {
    vec![4, 6, 8]
}

const fn default_fallback_label() -> IntentLabel {
    IntentLabel::Probe
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            path_length: default_path_length(),
            bucket_upper_bounds: default_bucket_upper_bounds(),
            fallback_label: default_fallback_label(),
        }
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SnapshotConfig {
    /// Snapshots older than this are treated as absent
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: u64,
}

const fn default_horizon_hours() -> u64 {
    24
}

/// Longest accepted staleness horizon, ten years
pub const MAX_HORIZON_HOURS: u64 = 24 * 365 * 10;

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            horizon_hours: default_horizon_hours(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".turnwise/turnwise.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file output: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Which judgment adapter to wire up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeProvider {
    /// Anthropic Messages API over HTTP
    Anthropic,
    /// Deterministic offline judge
    Scripted,
}

/// Judgment capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeConfig {
    #[serde(default = "default_provider")]
    pub provider: JudgeProvider,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; usually supplied as `TURNWISE_JUDGE__API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Hard ceiling on every judgment call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_provider() -> JudgeProvider {
    JudgeProvider::Scripted
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

const fn default_max_tokens() -> u32 {
    512
}

const fn default_timeout_ms() -> u64 {
    30_000
}

impl JudgeConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
        }
    }
}
