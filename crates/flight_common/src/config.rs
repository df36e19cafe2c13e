//! FlightOnTime configuration
//!
//! Configuration lives in /etc/flightontime/config.toml, or wherever
//! `FLIGHTONTIME_CONFIG` points. Every section and field is optional;
//! anything missing takes its default.

use crate::backoff::{BackoffStrategy, ExponentialBackoff};
use crate::codes::CodeTables;
use crate::error::ConfigError;
use crate::heuristic::HeuristicTables;
use crate::orchestrator::PredictionMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/flightontime";
const CONFIG_FILE: &str = "config.toml";
/// Overrides the config file location
pub const CONFIG_ENV: &str = "FLIGHTONTIME_CONFIG";

/// Prediction mode selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PredictionSettings {
    #[serde(default)]
    pub mode: PredictionMode,
}

/// Inference provider connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connect and read timeout per attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl ProviderConfig {
    /// Timeout clamped to at least 100ms
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(100))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Retry and backoff against the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first call (valid: 1-10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> u32 {
    2
}

impl RetryConfig {
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.clamp(1, 10)
    }

    pub fn max_attempts_was_clamped(&self) -> bool {
        self.max_attempts != self.effective_max_attempts()
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// HTTP daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Inbound request throttling, per client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_period")]
    pub requests_per_period: u32,

    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

fn default_requests_per_period() -> u32 {
    100
}

fn default_period_secs() -> u64 {
    60
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs.max(1))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_period: default_requests_per_period(),
            period_secs: default_period_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlightConfig {
    #[serde(default)]
    pub prediction: PredictionSettings,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub heuristic: HeuristicTables,

    #[serde(default)]
    pub codes: CodeTables,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl FlightConfig {
    /// Load from the default location, falling back to defaults.
    ///
    /// Loading runs before logging is set up, so a rejected file is handed
    /// back for the caller to report once it can.
    pub fn load() -> (Self, Option<ConfigError>) {
        Self::load_or_default(&config_path())
    }

    /// A missing file means defaults; a broken one means defaults plus the error
    pub fn load_or_default(path: &Path) -> (Self, Option<ConfigError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Longest one prediction can take in remote mode: every attempt running
    /// into the provider timeout, plus the backoff sleeps between them
    pub fn worst_case_prediction_time(&self) -> Duration {
        if self.prediction.mode == PredictionMode::Local {
            return Duration::ZERO;
        }

        let attempts = self.retry.effective_max_attempts();
        let calls = self.provider.effective_timeout().saturating_mul(attempts);
        let backoff = ExponentialBackoff::new(self.retry.initial_delay(), self.retry.multiplier);
        (1..attempts)
            .map(|retry| backoff.delay(retry))
            .fold(calls, Duration::saturating_add)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Config file path, honouring `FLIGHTONTIME_CONFIG`
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from(SYSTEM_CONFIG_DIR).join(CONFIG_FILE),
    }
}
