//! Circuit breaker for the classification service.
//!
//! # States
//! - Closed: calls pass through
//! - Open: every external call is skipped until the cooldown ends
//!
//! # Design Decisions
//! - One breaker for the whole service, not per issue
//! - No half-open trial call: the breaker stays open for the full cooldown and
//!   then closes unconditionally
//! - Re-tripping an open breaker extends the cooldown from the new trip time

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use triage_core::Clock;

/// Fixed-cooldown circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    cooldown_until: Mutex<Option<Instant>>,
    default_cooldown: Duration,
    trips: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(default_cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cooldown_until: Mutex::new(None),
            default_cooldown,
            trips: AtomicU64::new(0),
            clock,
        }
    }

    /// True while the cooldown window is active
    pub fn is_open(&self) -> bool {
        let now = self.clock.now();
        matches!(*self.cooldown_until.lock(), Some(until) if now < until)
    }

    /// Open the breaker for `duration`
    pub fn trip(&self, duration: Duration) {
        let until = self.clock.now() + duration;
        *self.cooldown_until.lock() = Some(until);
        self.trips.fetch_add(1, Ordering::Relaxed);
        info!(cooldown_ms = duration.as_millis() as u64, "Circuit breaker opened");
    }

    /// Open the breaker for the configured cooldown
    pub fn trip_default(&self) {
        self.trip(self.default_cooldown);
    }

    /// Time left until the breaker closes, if open
    pub fn remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        let cooldown_until = *self.cooldown_until.lock();
        cooldown_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Configured cooldown
    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    /// Number of trips since creation
    pub fn trip_count(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }
}
