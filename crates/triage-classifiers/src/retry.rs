//! Retry with exponential backoff and jitter.
//!
//! # Responsibilities
//! - Run an async operation up to `max_attempts` times
//! - Retry only errors accepted by the caller's `is_retryable` predicate
//! - Sleep `base * 2^(attempt-1) + jitter` between attempts
//!
//! [`RetryingClassifier`] applies this loop to an [`ExternalClassifier`],
//! retrying throttling failures only and surfacing an exhausted sequence as
//! [`ServiceError::RateLimited`].

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use triage_core::ClassificationRequest;
use triage_telemetry::TriageMetrics;

use crate::classifier::{ExternalClassifier, ServiceError, ServiceVerdict};

/// Backoff schedule for retried calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound of the uniform random jitter added to each delay
    pub max_jitter: Duration,
    /// Cap on the exponential part of the delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(400),
            max_jitter: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay after the given failed attempt (1-based), without jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay after the given failed attempt, with random jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        self.base_delay_for(attempt) + Duration::from_millis(jitter)
    }
}

/// Why a retried operation gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error stopped the sequence
    Aborted { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    /// The error that ended the sequence
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted { error, .. } => error,
        }
    }

    /// Attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }
}

/// Run `op` with backoff until it succeeds, fails fatally or runs out of attempts.
///
/// `op` receives the 1-based attempt number. `on_retry` is called with the
/// failed attempt, its error and the upcoming delay before each sleep.
pub async fn retry_with_backoff<T, E, Op, Fut, P, H>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut on_retry: H,
    mut op: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    H: FnMut(u32, &E, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !is_retryable(&error) => {
                return Err(RetryError::Aborted { attempt, error });
            }
            Err(last) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                on_retry(attempt, &error, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// External classifier wrapped in the retry policy
pub struct RetryingClassifier {
    inner: Arc<dyn ExternalClassifier>,
    policy: RetryPolicy,
    is_retryable: fn(&ServiceError) -> bool,
    metrics: Option<TriageMetrics>,
}

impl RetryingClassifier {
    /// Wrap a classifier, retrying rate-limit failures
    pub fn new(inner: Arc<dyn ExternalClassifier>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            is_retryable: ServiceError::is_rate_limited,
            metrics: None,
        }
    }

    /// Replace the retryable-error predicate
    pub fn with_predicate(mut self, is_retryable: fn(&ServiceError) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    /// Count retries in the given collector
    pub fn with_metrics(mut self, metrics: TriageMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Name of the wrapped classifier
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Classify through the service.
    ///
    /// Fails with `RateLimited` when every attempt was throttled, or with the
    /// first non-retryable error unchanged.
    pub async fn classify_via_service(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ServiceVerdict, ServiceError> {
        let name = self.inner.name();
        let outcome = retry_with_backoff(
            &self.policy,
            self.is_retryable,
            |attempt, error: &ServiceError, delay| {
                warn!(
                    service = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Classification service throttled, retrying: {}",
                    error
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_retry();
                }
            },
            |_| self.inner.classify(request),
        )
        .await;

        match outcome {
            Ok(verdict) => Ok(verdict),
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(service = name, attempts, "Retries exhausted: {}", last);
                Err(last.into_rate_limited())
            }
            Err(RetryError::Aborted { error, .. }) => Err(error),
        }
    }
}
