//! Mock engine for testing.
//!
//! `MockEngine` replays a script of responses, one per `scan_stream` call,
//! and records when each call happened so tests can check retry spacing.

use crate::core::{EngineHealth, ScanEngineClient, ScanError, ScanVerdict};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Return these verdicts.
    Verdicts(Vec<ScanVerdict>),
    /// Fail with a transport error carrying this message.
    TransportFailure(String),
}

impl MockStep {
    /// A single clean verdict.
    pub fn clean() -> Self {
        Self::Verdicts(vec![ScanVerdict::clean()])
    }

    /// A single infected verdict.
    pub fn infected(signature: impl Into<String>) -> Self {
        Self::Verdicts(vec![ScanVerdict::infected(signature)])
    }

    /// A transport failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::TransportFailure(message.into())
    }
}

/// A scripted engine for tests.
///
/// # Examples
///
/// ```rust
/// use clamgate::backends::{MockEngine, MockStep};
///
/// // Fails twice, then reports clean.
/// let engine = MockEngine::new()
///     .then(MockStep::failure("connection reset"))
///     .then(MockStep::failure("connection reset"))
///     .then(MockStep::clean());
/// ```
#[derive(Debug)]
pub struct MockEngine {
    name: String,
    script: Mutex<VecDeque<MockStep>>,
    fallback: MockStep,
    latency: Option<Duration>,
    health: Result<EngineHealth, String>,
    scan_count: AtomicU64,
    calls: Mutex<Vec<Instant>>,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl MockEngine {
    /// Creates a mock engine that reports clean once the script runs out.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: MockStep::clean(),
            latency: None,
            health: Ok(EngineHealth {
                threads_idle: 4,
                threads_live: 0,
                threads_max: 4,
                ..Default::default()
            }),
            scan_count: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
            bodies: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock engine that always reports clean.
    pub fn new_clean() -> Self {
        Self::new()
    }

    /// Creates a mock engine that always reports the given signature.
    pub fn new_infected(signature: impl Into<String>) -> Self {
        Self::new().with_fallback(MockStep::infected(signature))
    }

    /// Creates a mock engine whose every call fails at the transport level.
    pub fn new_unreachable() -> Self {
        Self::new().with_fallback(MockStep::failure("connection refused"))
    }

    /// Appends a step to the script.
    pub fn then(self, step: MockStep) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    /// Sets the response used once the script is exhausted.
    pub fn with_fallback(mut self, step: MockStep) -> Self {
        self.fallback = step;
        self
    }

    /// Sets the name of this engine.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Delays every scan call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sets the statistics returned by `probe`.
    pub fn with_health(mut self, health: EngineHealth) -> Self {
        self.health = Ok(health);
        self
    }

    /// Makes `probe` fail.
    pub fn with_failing_probe(mut self, reason: impl Into<String>) -> Self {
        self.health = Err(reason.into());
        self
    }

    /// Returns the number of scan calls made.
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::SeqCst)
    }

    /// Returns the instants at which scan calls started.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the bodies received, in call order.
    pub fn received_bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanEngineClient for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<EngineHealth, ScanError> {
        self.health
            .clone()
            .map_err(|reason| ScanError::engine_unreachable(&self.name, reason))
    }

    async fn scan_stream(&self, data: &[u8]) -> Result<Vec<ScanVerdict>, ScanError> {
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Instant::now());
        self.bodies.lock().unwrap().push(data.to_vec());

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match step {
            MockStep::Verdicts(verdicts) => Ok(verdicts),
            MockStep::TransportFailure(message) => Err(ScanError::transport(&self.name, message)),
        }
    }
}
