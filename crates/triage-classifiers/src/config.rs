//! Configuration for the triage engine
//!
//! Loaded from an optional YAML file and then overridden by environment
//! variables, e.g. `TRIAGE_CACHE__TTL_MS=60000` or
//! `TRIAGE_SERVICE__API_KEY=...`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use triage_core::Result;

use crate::retry::RetryPolicy;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TRIAGE";

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Result cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Circuit breaker settings
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Retry/backoff settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// External classification service
    #[serde(default)]
    pub service: ServiceConfig,

    /// Extra rule keywords
    #[serde(default)]
    pub rules: RulesConfig,

    /// Deadline for the whole external step in milliseconds (0 disables it)
    #[serde(default = "default_call_deadline_ms")]
    pub call_deadline_ms: u64,

    /// Coalesce concurrent requests for the same normalized text
    #[serde(default = "default_true")]
    pub single_flight: bool,
}

impl TriageConfig {
    /// Per-call deadline, if enabled
    pub fn call_deadline(&self) -> Option<Duration> {
        (self.call_deadline_ms > 0).then(|| Duration::from_millis(self.call_deadline_ms))
    }

    /// Semantic checks that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_ms == 0 {
            return Err(triage_core::Error::config("cache.ttl_ms must be positive"));
        }
        if self.cache.max_entries == 0 {
            return Err(triage_core::Error::config("cache.max_entries must be positive"));
        }
        if self.breaker.cooldown_ms == 0 {
            return Err(triage_core::Error::config("breaker.cooldown_ms must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(triage_core::Error::config("retry.max_attempts must be at least 1"));
        }
        let endpoint = self.service.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(triage_core::Error::config(format!(
                "service.endpoint must be an http(s) URL, got {:?}",
                self.service.endpoint
            )));
        }
        Ok(())
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            service: ServiceConfig::default(),
            rules: RulesConfig::default(),
            call_deadline_ms: default_call_deadline_ms(),
            single_flight: true,
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live in milliseconds
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,

    /// Maximum number of stored entries
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Background sweep interval in milliseconds (0 disables the sweeper)
    #[serde(default)]
    pub sweep_interval_ms: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_cache_ttl_ms(),
            max_entries: default_cache_max_entries(),
            sweep_interval_ms: 0,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Cooldown after a throttled retry sequence in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum random jitter in milliseconds
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,

    /// Cap on the exponential delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Convert into a retry policy
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// External service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; when absent the engine classifies with rules only
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for a single HTTP request in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServiceConfig {
    /// API key, ignoring blank values
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Additional keywords appended to the built-in rule lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub extra_high: Vec<String>,

    #[serde(default)]
    pub extra_medium: Vec<String>,
}

/// Load configuration from an optional file plus `TRIAGE_*` environment variables
pub fn load_config(path: Option<&Path>) -> Result<TriageConfig> {
    load_config_with_prefix(path, ENV_PREFIX)
}

/// Load configuration using a custom environment prefix
///
/// Extra keyword lists accept comma-separated values from the environment,
/// e.g. `TRIAGE_RULES__EXTRA_HIGH=recall notice,burnt smell`.
pub fn load_config_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<TriageConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("rules.extra_high")
            .with_list_parse_key("rules.extra_medium"),
    );

    let config: TriageConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| triage_core::Error::config(format!("Failed to load configuration: {}", e)))?;

    config.validate()?;
    Ok(config)
}

fn default_cache_ttl_ms() -> u64 {
    900_000
}

fn default_cache_max_entries() -> usize {
    10_000
}

fn default_cooldown_ms() -> u64 {
    600_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    400
}

fn default_max_jitter_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_call_deadline_ms() -> u64 {
    8_000
}

fn default_true() -> bool {
    true
}
