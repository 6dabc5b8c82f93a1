//! Metrics collection and reporting
//!
//! Counters are kept locally as atomics for cheap snapshots and are also
//! emitted through the `metrics` facade for whichever recorder is installed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use triage_core::ResultSource;

pub const CLASSIFICATIONS_TOTAL: &str = "triage_classifications_total";
pub const CACHE_LOOKUPS_TOTAL: &str = "triage_cache_lookups_total";
pub const BREAKER_TRIPS_TOTAL: &str = "triage_breaker_trips_total";
pub const RETRIES_TOTAL: &str = "triage_retries_total";
pub const UPSTREAM_FAILURES_TOTAL: &str = "triage_upstream_failures_total";
pub const CLASSIFICATION_LATENCY_US: &str = "triage_classification_latency_us";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    ::metrics::describe_counter!(
        CLASSIFICATIONS_TOTAL,
        "Total number of classification results by source"
    );
    ::metrics::describe_counter!(
        CACHE_LOOKUPS_TOTAL,
        "Result cache lookups by outcome (hit, miss)"
    );
    ::metrics::describe_counter!(
        BREAKER_TRIPS_TOTAL,
        "Number of times the circuit breaker was opened"
    );
    ::metrics::describe_counter!(
        RETRIES_TOTAL,
        "Backoff retries issued against the classification service"
    );
    ::metrics::describe_counter!(
        UPSTREAM_FAILURES_TOTAL,
        "Classification service failures by kind"
    );
    ::metrics::describe_histogram!(
        CLASSIFICATION_LATENCY_US,
        ::metrics::Unit::Microseconds,
        "End-to-end classify_priority latency in microseconds"
    );
}

/// Metrics collector for triage monitoring
#[derive(Clone)]
pub struct TriageMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: AtomicU64,
    ai_results: AtomicU64,
    rules_results: AtomicU64,
    cooldown_results: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    breaker_trips: AtomicU64,
    retries: AtomicU64,
    upstream_failures: AtomicU64,
    total_latency_us: AtomicU64,
}

impl TriageMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record a finished classification
    pub fn record_result(&self, source: ResultSource, latency_us: u64) {
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match source {
            ResultSource::Ai => &self.inner.ai_results,
            ResultSource::Rules => &self.inner.rules_results,
            ResultSource::Cooldown => &self.inner.cooldown_results,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);

        ::metrics::counter!(CLASSIFICATIONS_TOTAL, "source" => source.as_str()).increment(1);
        ::metrics::histogram!(CLASSIFICATION_LATENCY_US).record(latency_us as f64);
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(CACHE_LOOKUPS_TOTAL, "outcome" => "hit").increment(1);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(CACHE_LOOKUPS_TOTAL, "outcome" => "miss").increment(1);
    }

    /// Record a breaker trip
    pub fn record_breaker_trip(&self) {
        self.inner.breaker_trips.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(BREAKER_TRIPS_TOTAL).increment(1);
    }

    /// Record a backoff retry
    pub fn record_retry(&self) {
        self.inner.retries.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(RETRIES_TOTAL).increment(1);
    }

    /// Record a failed service call sequence
    pub fn record_upstream_failure(&self, kind: &'static str) {
        self.inner.upstream_failures.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(UPSTREAM_FAILURES_TOTAL, "kind" => kind).increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            ai_results: self.inner.ai_results.load(Ordering::Relaxed),
            rules_results: self.inner.rules_results.load(Ordering::Relaxed),
            cooldown_results: self.inner.cooldown_results.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.inner.cache_misses.load(Ordering::Relaxed),
            breaker_trips: self.inner.breaker_trips.load(Ordering::Relaxed),
            retries: self.inner.retries.load(Ordering::Relaxed),
            upstream_failures: self.inner.upstream_failures.load(Ordering::Relaxed),
            total_latency_us: self.inner.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for TriageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub ai_results: u64,
    pub rules_results: u64,
    pub cooldown_results: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub breaker_trips: u64,
    pub retries: u64,
    pub upstream_failures: u64,
    pub total_latency_us: u64,
}

impl MetricsSnapshot {
    /// Calculate average latency per request
    pub fn avg_latency_us(&self) -> u64 {
        if self.total_requests == 0 {
            0
        } else {
            self.total_latency_us / self.total_requests
        }
    }

    /// Fraction of cache lookups that hit
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    /// Fraction of results not produced by the external service
    pub fn fallback_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.rules_results + self.cooldown_results) as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let metrics = TriageMetrics::new();

        metrics.record_cache_miss();
        metrics.record_result(ResultSource::Ai, 4000);
        metrics.record_cache_hit();
        metrics.record_result(ResultSource::Ai, 0);
        metrics.record_result(ResultSource::Rules, 2000);
        metrics.record_result(ResultSource::Cooldown, 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.ai_results, 2);
        assert_eq!(snapshot.rules_results, 1);
        assert_eq!(snapshot.cooldown_results, 1);
        assert_eq!(snapshot.avg_latency_us(), 1500);
        assert_eq!(snapshot.cache_hit_rate(), 0.5);
        assert_eq!(snapshot.fallback_rate(), 0.5);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = TriageMetrics::new();
        let clone = metrics.clone();

        clone.record_breaker_trip();
        clone.record_retry();
        clone.record_retry();
        clone.record_upstream_failure("rate_limited");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.breaker_trips, 1);
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.upstream_failures, 1);
    }

    #[test]
    fn test_empty_snapshot_rates() {
        let snapshot = MetricsSnapshot::default();
        assert_eq!(snapshot.avg_latency_us(), 0);
        assert_eq!(snapshot.cache_hit_rate(), 0.0);
        assert_eq!(snapshot.fallback_rate(), 0.0);
    }
}
