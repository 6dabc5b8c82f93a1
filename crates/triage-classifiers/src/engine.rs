//! Classification orchestrator
//!
//! # Decision order
//! ```text
//! classify_priority(text)
//!     → blank text?          Low, source=rules (not cached)
//!     → breaker open?        rules, source=cooldown (no cache access)
//!     → cache hit?           stored result
//!     → no credential?       rules, source=rules, cached
//!     → retrying service call
//!         ok                 source=ai, cached
//!         rate limited       trip breaker, rules, source=cooldown, cached
//!         other failure      rules, source=rules, cached
//! ```
//!
//! Every failure is absorbed here; callers always get a result.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use triage_core::{
    normalize, ClassificationRequest, ClassificationResult, Clock, CustomerSnapshot, Priority,
    ResultSource, Result, SystemClock,
};
use triage_telemetry::TriageMetrics;

use crate::breaker::CircuitBreaker;
use crate::cache::ResultCache;
use crate::classifier::{ExternalClassifier, ServiceError, ServiceVerdict};
use crate::config::TriageConfig;
use crate::http::HttpClassifier;
use crate::retry::RetryingClassifier;
use crate::rules::RuleClassifier;

pub const BREAKER_OPEN_REASON: &str = "breaker open";
const EMPTY_ISSUE_REASON: &str = "empty issue text";

type InflightMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Ticket priority classification engine
pub struct TriageEngine {
    rules: RuleClassifier,
    cache: ResultCache,
    breaker: CircuitBreaker,
    service: Option<RetryingClassifier>,
    call_deadline: Option<Duration>,
    single_flight: bool,
    inflight: InflightMap,
    metrics: TriageMetrics,
}

impl TriageEngine {
    /// Start building an engine from configuration
    pub fn builder(config: TriageConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Build an engine around any external classifier
    pub fn new(config: TriageConfig, service: Arc<dyn ExternalClassifier>) -> Result<Self> {
        Self::builder(config).service(service).build()
    }

    /// Build an engine, wiring the HTTP classifier when an API key is configured
    pub fn from_config(config: TriageConfig) -> Result<Self> {
        let service: Option<Arc<dyn ExternalClassifier>> = match config.service.credential() {
            Some(key) => Some(Arc::new(HttpClassifier::new(&config.service, key)?)),
            None => None,
        };

        let mut builder = Self::builder(config);
        if let Some(service) = service {
            builder = builder.service(service);
        }
        builder.build()
    }

    /// Classify issue text with optional customer details. Never fails.
    pub async fn classify_priority(
        &self,
        issue_text: &str,
        customer: Option<&CustomerSnapshot>,
    ) -> ClassificationResult {
        let request = ClassificationRequest {
            issue_text: issue_text.to_string(),
            customer: customer.cloned(),
        };
        self.classify(&request).await
    }

    /// Classify a prepared request. Never fails.
    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let start = Instant::now();
        let result = self.decide(request).await;
        self.metrics
            .record_result(result.source, start.elapsed().as_micros() as u64);
        result
    }

    async fn decide(&self, request: &ClassificationRequest) -> ClassificationResult {
        let text = request.issue_text.as_str();

        if text.trim().is_empty() {
            return ClassificationResult::new(
                Priority::Low,
                EMPTY_ISSUE_REASON,
                ResultSource::Rules,
            );
        }

        if self.breaker.is_open() {
            debug!("Breaker open, classifying with rules");
            return self.breaker_open_result(text);
        }

        let key = normalize(text);
        if let Some(hit) = self.cached(&key) {
            return hit;
        }

        let Some(service) = &self.service else {
            let result = self.rules_result(text, ResultSource::Rules, None);
            self.cache.put(key, result.clone());
            return result;
        };

        if !self.single_flight {
            return self.call_and_store(service, request, key).await;
        }

        // Released on drop, including when the caller cancels this future
        let slot = self.inflight_slot(&key);
        let _leader = slot.slot.lock().await;

        // A previous holder may have filled the cache or tripped the breaker
        if self.breaker.is_open() {
            self.breaker_open_result(text)
        } else if let Some(hit) = self.cache.get(&key) {
            debug!(source = %hit.source, "Coalesced request served from cache");
            self.metrics.record_cache_hit();
            hit
        } else {
            self.call_and_store(service, request, key).await
        }
    }

    async fn call_and_store(
        &self,
        service: &RetryingClassifier,
        request: &ClassificationRequest,
        key: String,
    ) -> ClassificationResult {
        let text = request.issue_text.as_str();

        let result = match self.call_service(service, request).await {
            Ok(ServiceVerdict { priority, reason }) => {
                ClassificationResult::new(priority, reason, ResultSource::Ai)
            }
            Err(error @ ServiceError::RateLimited { .. }) => {
                warn!(
                    cooldown_ms = self.breaker.default_cooldown().as_millis() as u64,
                    "Classification service throttled, opening breaker: {}",
                    error
                );
                self.metrics.record_upstream_failure(error.kind());
                self.breaker.trip_default();
                self.metrics.record_breaker_trip();
                self.rules_result(text, ResultSource::Cooldown, None)
            }
            Err(error) => {
                warn!("Classification service failed, using rules: {}", error);
                self.metrics.record_upstream_failure(error.kind());
                self.rules_result(text, ResultSource::Rules, error.partial_reason())
            }
        };

        self.cache.put(key, result.clone());
        result
    }

    async fn call_service(
        &self,
        service: &RetryingClassifier,
        request: &ClassificationRequest,
    ) -> std::result::Result<ServiceVerdict, ServiceError> {
        let call = service.classify_via_service(request);
        match self.call_deadline {
            Some(deadline) => tokio::time::timeout(deadline, call).await.unwrap_or_else(|_| {
                Err(ServiceError::other(format!(
                    "deadline of {}ms exceeded",
                    deadline.as_millis()
                )))
            }),
            None => call.await,
        }
    }

    fn cached(&self, key: &str) -> Option<ClassificationResult> {
        match self.cache.get(key) {
            Some(hit) => {
                debug!(source = %hit.source, "Cache hit");
                self.metrics.record_cache_hit();
                Some(hit)
            }
            None => {
                self.metrics.record_cache_miss();
                None
            }
        }
    }

    fn breaker_open_result(&self, text: &str) -> ClassificationResult {
        ClassificationResult::new(
            self.rules.classify(text),
            BREAKER_OPEN_REASON,
            ResultSource::Cooldown,
        )
    }

    fn rules_result(
        &self,
        text: &str,
        source: ResultSource,
        service_reason: Option<&str>,
    ) -> ClassificationResult {
        let verdict = self.rules.evaluate(text);
        let reason = match service_reason {
            Some(reason) => reason.to_string(),
            None => verdict.reason(),
        };
        ClassificationResult::new(verdict.priority, reason, source)
    }

    fn inflight_slot(&self, key: &str) -> InflightSlot<'_> {
        let slot = self
            .inflight
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        InflightSlot {
            inflight: &self.inflight,
            key: key.to_string(),
            slot,
        }
    }

    /// Periodically purge expired cache entries until the engine is dropped
    pub fn spawn_cache_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let engine: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                let purged = engine.cache.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = engine.cache.len(), "Purged expired cache entries");
                }
            }
        })
    }

    /// Result cache
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Circuit breaker
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Metrics collector
    pub fn metrics(&self) -> &TriageMetrics {
        &self.metrics
    }

    /// Whether an external service is configured
    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }
}

/// Claim on a single-flight slot; drops the map entry with the last claim
struct InflightSlot<'a> {
    inflight: &'a InflightMap,
    key: String,
    slot: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        // One reference in the map plus ours: nobody else is waiting
        if Arc::strong_count(&self.slot) <= 2 {
            if let Some(entry) = inflight.get(&self.key) {
                if Arc::ptr_eq(entry, &self.slot) {
                    inflight.remove(&self.key);
                }
            }
        }
    }
}

/// Builder for [`TriageEngine`]
pub struct EngineBuilder {
    config: TriageConfig,
    clock: Arc<dyn Clock>,
    service: Option<Arc<dyn ExternalClassifier>>,
    metrics: TriageMetrics,
}

impl EngineBuilder {
    /// Create a builder with the system clock and no service
    pub fn new(config: TriageConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            service: None,
            metrics: TriageMetrics::new(),
        }
    }

    /// Use a custom clock for TTL and cooldown decisions
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use an external classification service
    pub fn service(mut self, service: Arc<dyn ExternalClassifier>) -> Self {
        self.service = Some(service);
        self
    }

    /// Share a metrics collector
    pub fn metrics(mut self, metrics: TriageMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Validate configuration and build the engine
    pub fn build(self) -> Result<TriageEngine> {
        let config = self.config;
        config.validate()?;

        let rules = RuleClassifier::with_extra_keywords(
            &config.rules.extra_high,
            &config.rules.extra_medium,
        )?;

        let service = self.service.map(|inner| {
            RetryingClassifier::new(inner, config.retry.policy())
                .with_metrics(self.metrics.clone())
        });

        match &service {
            Some(service) => {
                info!(service = service.name(), "Triage engine using external classifier")
            }
            None => info!("No classification service credential, triage engine using rules only"),
        }

        Ok(TriageEngine {
            rules,
            cache: ResultCache::new(
                config.cache.ttl(),
                config.cache.max_entries,
                self.clock.clone(),
            ),
            breaker: CircuitBreaker::new(config.breaker.cooldown(), self.clock),
            service,
            call_deadline: config.call_deadline(),
            single_flight: config.single_flight,
            inflight: Mutex::new(HashMap::new()),
            metrics: self.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use triage_core::ManualClock;

    /// Service that answers after a fixed delay
    struct SlowService {
        delay: Duration,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ExternalClassifier for SlowService {
        async fn classify(
            &self,
            _request: &ClassificationRequest,
        ) -> std::result::Result<ServiceVerdict, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(ServiceVerdict::new(Priority::Low, "slow answer"))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn slow_engine(delay: Duration) -> (TriageEngine, Arc<SlowService>) {
        let service = Arc::new(SlowService {
            delay,
            calls: AtomicU32::new(0),
        });
        let engine = TriageEngine::new(TriageConfig::default(), service.clone()).unwrap();
        (engine, service)
    }

    fn rules_only_engine() -> (TriageEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let engine = TriageEngine::builder(TriageConfig::default())
            .clock(clock.clone())
            .build()
            .unwrap();
        (engine, clock)
    }

    #[tokio::test]
    async fn test_no_credential_uses_rules() {
        let (engine, _clock) = rules_only_engine();
        assert!(!engine.has_service());

        let result = engine
            .classify_priority("My payment failed and I was charged twice", None)
            .await;
        assert_eq!(result.priority, Priority::High);
        assert_eq!(result.source, ResultSource::Rules);
        assert_eq!(engine.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_text() {
        let (engine, _clock) = rules_only_engine();
        let result = engine.classify_priority("   ", None).await;
        assert_eq!(result.priority, Priority::Low);
        assert_eq!(result.reason, EMPTY_ISSUE_REASON);
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_breaker_open_skips_cache() {
        let (engine, clock) = rules_only_engine();
        engine.breaker().trip(Duration::from_secs(60));

        let result = engine.classify_priority("delayed delivery", None).await;
        assert_eq!(result.priority, Priority::Medium);
        assert_eq!(result.reason, BREAKER_OPEN_REASON);
        assert_eq!(result.source, ResultSource::Cooldown);
        assert!(engine.cache().is_empty());

        clock.advance(Duration::from_secs(60));
        let result = engine.classify_priority("delayed delivery", None).await;
        assert_eq!(result.source, ResultSource::Rules);
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let (engine, _clock) = rules_only_engine();
        engine.classify_priority("invoice copy please", None).await;
        engine.classify_priority("Invoice  copy please", None).await;

        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.rules_results, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_extra_rule_keywords_from_config() {
        let mut config = TriageConfig::default();
        config.rules.extra_high = vec!["recall notice".to_string()];
        let engine = TriageEngine::builder(config).build().unwrap();

        let result = engine.classify_priority("Received a recall notice", None).await;
        assert_eq!(result.priority, Priority::High);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TriageConfig::default();
        config.breaker.cooldown_ms = 0;
        assert!(TriageEngine::builder(config).build().is_err());
    }

    #[test]
    fn test_from_config_with_key_wires_service() {
        let mut config = TriageConfig::default();
        config.service.api_key = Some("sk-test".to_string());
        let engine = TriageEngine::from_config(config).unwrap();
        assert!(engine.has_service());

        let engine = TriageEngine::from_config(TriageConfig::default()).unwrap();
        assert!(!engine.has_service());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_sweeper_purges() {
        let clock = Arc::new(ManualClock::new());
        let mut config = TriageConfig::default();
        config.cache.ttl_ms = 1_000;
        let engine = Arc::new(
            TriageEngine::builder(config)
                .clock(clock.clone())
                .build()
                .unwrap(),
        );

        engine.classify_priority("where is my order", None).await;
        assert_eq!(engine.cache().len(), 1);

        let handle = engine.spawn_cache_sweeper(Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(engine.cache().is_empty());

        drop(engine);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_callers_release_inflight_slots() {
        let (engine, service) = slow_engine(Duration::from_secs(5));

        for i in 0..50 {
            let text = format!("question number {}", i);
            let outcome = tokio::time::timeout(
                Duration::from_millis(10),
                engine.classify_priority(&text, None),
            )
            .await;
            assert!(outcome.is_err());
        }
        assert_eq!(service.calls.load(Ordering::SeqCst), 50);
        assert!(engine.inflight.lock().is_empty());

        // Leader and waiter cancelled together
        let both = futures::future::join(
            engine.classify_priority("shared question", None),
            engine.classify_priority("Shared  question", None),
        );
        assert!(tokio::time::timeout(Duration::from_millis(10), both)
            .await
            .is_err());
        assert!(engine.inflight.lock().is_empty());
        assert!(engine.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_calls_release_inflight_slots() {
        let (engine, service) = slow_engine(Duration::from_millis(50));

        let results = futures::future::join_all(
            (0..4).map(|_| engine.classify_priority("where can I find my receipt", None)),
        )
        .await;

        assert!(results.iter().all(|r| r.source == ResultSource::Ai));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(engine.inflight.lock().is_empty());

        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.cache_misses, 4);
        assert_eq!(snapshot.cache_hits, 3);
    }
}
