//! Triage Telemetry
//!
//! Metrics for the ticket triage engine.
//!
//! Provides:
//! - Per-source classification counters
//! - Cache, breaker and retry counters
//! - Emission through the `metrics` facade for Prometheus export

pub mod metrics;

pub use crate::metrics::{describe_metrics, MetricsSnapshot, TriageMetrics};
