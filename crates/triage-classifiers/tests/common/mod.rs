//! Mock classification services for testing
//!
//! Provides a configurable implementation of the ExternalClassifier trait
//! for exercising the engine's success, throttling and failure paths.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use triage_classifiers::{
    ExternalClassifier, ServiceError, ServiceVerdict, TriageConfig, TriageEngine,
};
use triage_core::{ClassificationRequest, ManualClock, Priority};

type Response = Result<ServiceVerdict, ServiceError>;

/// A configurable mock service
pub struct MockService {
    name: String,
    default: Response,
    script: Mutex<VecDeque<Response>>,
    simulated_latency: Option<Duration>,
    call_count: AtomicU32,
    last_request: Mutex<Option<ClassificationRequest>>,
}

impl MockService {
    /// Create a mock that answers Low for every request
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: Ok(ServiceVerdict::new(Priority::Low, "mock default")),
            script: Mutex::new(VecDeque::new()),
            simulated_latency: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answer every unscripted call with this verdict
    pub fn with_verdict(mut self, priority: Priority, reason: &str) -> Self {
        self.default = Ok(ServiceVerdict::new(priority, reason));
        self
    }

    /// Fail every unscripted call with this error
    pub fn failing_with(mut self, error: ServiceError) -> Self {
        self.default = Err(error);
        self
    }

    /// Answer every unscripted call with a raw decision document
    pub fn with_raw_decision(mut self, raw: &str) -> Self {
        self.default = ServiceVerdict::from_json(raw);
        self
    }

    /// Queue a one-off response ahead of the default
    pub fn then(self, response: Response) -> Self {
        self.script.lock().push_back(response);
        self
    }

    /// Set simulated latency for every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = Some(latency);
        self
    }

    /// Get the number of times classify was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The most recent request seen
    pub fn last_request(&self) -> Option<ClassificationRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl ExternalClassifier for MockService {
    async fn classify(&self, request: &ClassificationRequest) -> Response {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());

        if let Some(latency) = self.simulated_latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.default.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Engine wired to a mock service and a manual clock
pub fn engine_with(
    config: TriageConfig,
    service: Arc<MockService>,
) -> (TriageEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let engine = TriageEngine::builder(config)
        .clock(clock.clone())
        .service(service)
        .build()
        .expect("valid test configuration");
    (engine, clock)
}

/// Engine with no service configured
pub fn rules_only_engine() -> (TriageEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let engine = TriageEngine::builder(TriageConfig::default())
        .clock(clock.clone())
        .build()
        .expect("valid test configuration");
    (engine, clock)
}
