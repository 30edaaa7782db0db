use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, MAX_HORIZON_HOURS};
use crate::domain::models::{BucketTable, MAX_SCORE, MIN_SCORE};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {0}: must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Invalid settle_delay_ms: {settle} must be shorter than idle_delay_ms ({idle})")]
    SettleNotShorter { settle: u64, idle: u64 },

    #[error("Invalid max_sent: {0}. Must be at least 1")]
    InvalidMaxSent(u32),

    #[error("Invalid max_invocations: {0}. Must be at least 1")]
    InvalidMaxInvocations(u32),

    #[error("Invalid fallback_score: {0}. Must be between {MIN_SCORE} and {MAX_SCORE}")]
    InvalidFallbackScore(u8),

    #[error("Invalid bucket bounds: {0}")]
    InvalidBuckets(String),

    #[error("Invalid horizon_hours: {0}. Must be between 1 and {MAX_HORIZON_HOURS}")]
    InvalidHorizon(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid judge max_tokens: {0}. Must be at least 1")]
    InvalidMaxTokens(u32),
}

/// Project-level configuration file
pub const PROJECT_CONFIG: &str = ".turnwise/config.yaml";

/// Optional local overrides, not meant to be committed
pub const LOCAL_CONFIG: &str = ".turnwise/local.yaml";

/// Prefix for environment overrides; `__` separates nested keys
pub const ENV_PREFIX: &str = "TURNWISE_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .turnwise/config.yaml
    /// 3. .turnwise/local.yaml (optional)
    /// 4. Environment variables (TURNWISE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG))
            .merge(Yaml::file(LOCAL_CONFIG))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment overrides still apply
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let exchange = &config.exchange;
        for (name, value) in [
            ("idle_delay_ms", exchange.idle_delay_ms),
            ("settle_delay_ms", exchange.settle_delay_ms),
            ("auto_advance_delay_ms", exchange.auto_advance_delay_ms),
            ("judge.timeout_ms", config.judge.timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        if exchange.settle_delay_ms >= exchange.idle_delay_ms {
            return Err(ConfigError::SettleNotShorter {
                settle: exchange.settle_delay_ms,
                idle: exchange.idle_delay_ms,
            });
        }

        if exchange.max_sent == 0 {
            return Err(ConfigError::InvalidMaxSent(exchange.max_sent));
        }

        if exchange.max_invocations == 0 {
            return Err(ConfigError::InvalidMaxInvocations(exchange.max_invocations));
        }

        if !(MIN_SCORE..=MAX_SCORE).contains(&exchange.fallback_score) {
            return Err(ConfigError::InvalidFallbackScore(exchange.fallback_score));
        }

        BucketTable::from_upper_bounds(config.scoring.path_length, &config.scoring.bucket_upper_bounds)
            .map_err(|e| ConfigError::InvalidBuckets(e.to_string()))?;

        if !(1..=MAX_HORIZON_HOURS).contains(&config.snapshot.horizon_hours) {
            return Err(ConfigError::InvalidHorizon(config.snapshot.horizon_hours));
        }

        // Validate database config
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        // Validate logging config
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.judge.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(config.judge.max_tokens));
        }

        Ok(())
    }
}
