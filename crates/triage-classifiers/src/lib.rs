//! Triage Classifiers
//!
//! Support-ticket priority classification that stays available when the
//! external classification service is slow, throttled or missing.
//!
//! Components, leaf-first:
//! - Rule classifier: deterministic keyword fallback, no network
//! - Result cache: TTL memo keyed by normalized issue text
//! - Circuit breaker: fixed cooldown after throttled retry sequences
//! - Retrying classifier: exponential backoff with jitter around the service
//! - Engine: composes the above into a total `classify_priority`

pub mod breaker;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod http;
pub mod retry;
pub mod rules;

pub use breaker::CircuitBreaker;
pub use cache::{CacheEntry, ResultCache};
pub use classifier::{looks_rate_limited, ExternalClassifier, ServiceError, ServiceVerdict};
pub use config::{
    load_config, load_config_with_prefix, BreakerConfig, CacheConfig, RetryConfig, RulesConfig,
    ServiceConfig, TriageConfig,
};
pub use engine::{EngineBuilder, TriageEngine};
pub use http::HttpClassifier;
pub use retry::{retry_with_backoff, RetryError, RetryPolicy, RetryingClassifier};
pub use rules::{classify_by_rules, RuleClassifier, RuleVerdict};
