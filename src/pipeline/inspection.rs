//! The inspection pipeline.

use crate::core::{
    ArcEngine, BodyHasher, DigestAlgorithm, EngineHealth, FailureKind, InspectionOutcome,
    ScanEngineClient, ScanError, ScanVerdict,
};
use crate::pipeline::health::check_engine;
use crate::pipeline::retry::RetryConfig;

use std::sync::Arc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Configuration for the inspection pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Attempt budget, backoff and overall deadline.
    pub retry: RetryConfig,

    /// Digest attached to every outcome.
    pub digest: DigestAlgorithm,
}

impl PipelineConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the digest algorithm.
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }
}

/// Scans request bodies against an engine with a bounded retry budget.
///
/// The pipeline holds no per-request state; one instance is shared by every
/// in-flight request. Each call to [`inspect`](Self::inspect) owns its own
/// attempt counter and deadline.
///
/// # Example
///
/// ```rust
/// use clamgate::backends::MockEngine;
/// use clamgate::pipeline::{InspectionPipeline, PipelineConfig};
///
/// # async fn run() -> Result<(), clamgate::ScanError> {
/// let pipeline = InspectionPipeline::connect(MockEngine::new_clean(), PipelineConfig::new()).await?;
/// let outcome = pipeline.inspect(b"uploaded bytes").await;
/// assert!(outcome.is_clean());
/// # Ok(())
/// # }
/// ```
pub struct InspectionPipeline {
    engine: ArcEngine,
    retry: RetryConfig,
    hasher: BodyHasher,
    health: Option<EngineHealth>,
}

impl InspectionPipeline {
    /// Probes the engine and builds the pipeline.
    ///
    /// Fails with [`ScanError::EngineStartup`] if the engine is unreachable
    /// or reports zero scanning threads.
    pub async fn connect<E>(engine: E, config: PipelineConfig) -> Result<Self, ScanError>
    where
        E: ScanEngineClient + 'static,
    {
        let engine: ArcEngine = Arc::new(engine);
        let health = check_engine(engine.as_ref()).await?;

        let mut pipeline = Self::new_unchecked(engine, config);
        pipeline.health = Some(health);
        Ok(pipeline)
    }

    /// Builds the pipeline without probing the engine.
    pub fn new_unchecked(engine: ArcEngine, config: PipelineConfig) -> Self {
        Self {
            engine,
            retry: config.retry,
            hasher: BodyHasher::new(config.digest),
            health: None,
        }
    }

    /// Returns the engine statistics read at construction, if probed.
    pub fn health(&self) -> Option<&EngineHealth> {
        self.health.as_ref()
    }

    /// Returns the retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Returns the engine name.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Returns the hex digest of `body` with the configured algorithm.
    pub fn digest(&self, body: &[u8]) -> String {
        self.hasher.digest(body)
    }

    /// Inspects a body.
    ///
    /// Never fails: transport problems become an outcome with
    /// [`FailureKind`] set, which is never clean.
    pub async fn inspect(&self, body: &[u8]) -> InspectionOutcome {
        self.inspect_with_cancel(body, CancellationToken::new()).await
    }

    /// Inspects a body, stopping early if `cancel` fires.
    pub async fn inspect_with_cancel(
        &self,
        body: &[u8],
        cancel: CancellationToken,
    ) -> InspectionOutcome {
        let started = Instant::now();
        let deadline = started + self.retry.budget;
        let digest = self.hasher.digest(body);
        let engine = self.engine.name();

        let mut attempt = 0;
        let outcome = loop {
            if Instant::now() >= deadline {
                tracing::warn!(
                    engine,
                    attempt = attempt + 1,
                    "Inspection deadline elapsed before attempt"
                );
                break InspectionOutcome::failed(
                    FailureKind::Timeout,
                    digest,
                    started.elapsed(),
                    attempt,
                );
            }
            attempt += 1;

            let call = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FailureKind::Cancelled),
                _ = sleep_until(deadline) => Err(FailureKind::Timeout),
                result = self.engine.scan_stream(body) => Ok(result),
            };

            let error = match call {
                Err(kind) => {
                    tracing::error!(engine, attempt, reason = %kind, "Scan attempt interrupted");
                    break InspectionOutcome::failed(kind, digest, started.elapsed(), attempt);
                }
                Ok(Ok(verdicts)) => {
                    tracing::debug!(
                        engine,
                        attempt,
                        verdict_count = verdicts.len(),
                        "Scan attempt completed"
                    );
                    break classify(&verdicts, digest, started.elapsed(), attempt);
                }
                Ok(Err(e)) => e,
            };

            tracing::error!(
                engine,
                attempt,
                max_attempts = self.retry.max_attempts,
                error = %error,
                "Scan attempt failed"
            );

            if !error.is_recoverable() || !self.retry.should_retry(attempt) {
                break InspectionOutcome::failed(
                    FailureKind::ScanUnavailable,
                    digest,
                    started.elapsed(),
                    attempt,
                );
            }

            let wait = self.retry.backoff_after(attempt);
            let interrupted = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(FailureKind::Cancelled),
                _ = sleep_until(deadline) => Some(FailureKind::Timeout),
                _ = sleep(wait) => None,
            };
            if let Some(kind) = interrupted {
                tracing::error!(engine, attempt, reason = %kind, "Backoff interrupted");
                break InspectionOutcome::failed(kind, digest, started.elapsed(), attempt);
            }
        };

        tracing::info!(
            engine,
            verdict = outcome.verdict().as_str(),
            signature = outcome.signature(),
            elapsed_ms = outcome.elapsed().as_millis() as u64,
            "Scan finished"
        );
        crate::audit::emit_inspection_completed(engine, &outcome);

        outcome
    }
}

impl std::fmt::Debug for InspectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionPipeline")
            .field("engine", &self.engine.name())
            .field("retry", &self.retry)
            .field("digest", &self.hasher.algorithm())
            .finish()
    }
}

/// First non-clean verdict wins; no verdicts at all counts as clean.
fn classify(
    verdicts: &[ScanVerdict],
    digest: String,
    elapsed: std::time::Duration,
    attempt: u32,
) -> InspectionOutcome {
    match verdicts.iter().find(|v| !v.is_clean()) {
        Some(hit) => InspectionOutcome::detected(hit.signature.clone(), digest, elapsed, attempt),
        None => InspectionOutcome::clean(digest, elapsed, attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockEngine, MockStep};
    use crate::core::Verdict;
    use std::time::Duration;

    fn pipeline(engine: &Arc<MockEngine>, retry: RetryConfig) -> InspectionPipeline {
        InspectionPipeline::new_unchecked(
            Arc::clone(engine) as ArcEngine,
            PipelineConfig::new().with_retry(retry),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_on_first_attempt() {
        let engine = Arc::new(MockEngine::new_clean());
        let outcome = pipeline(&engine, RetryConfig::default()).inspect(b"hello").await;

        assert_eq!(outcome.verdict(), Verdict::Clean);
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(engine.scan_count(), 1);
        assert_eq!(outcome.elapsed(), Duration::ZERO);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_summary_and_one_audit_entry_per_inspection() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let engine = Arc::new(MockEngine::new_clean());
        pipeline(&engine, RetryConfig::default()).inspect(b"hello").await;

        let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        let summaries = output.lines().filter(|l| l.contains("Scan finished")).count();
        let audits = output
            .lines()
            .filter(|l| l.contains("clamgate::audit") && l.contains("Inspection completed"))
            .count();
        assert_eq!(summaries, 1);
        assert_eq!(audits, 1);
        assert_eq!(output.matches("Inspection completed").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_is_not_retried() {
        let engine = Arc::new(MockEngine::new_infected("Eicar-Test-Signature"));
        let outcome = pipeline(&engine, RetryConfig::default()).inspect(b"X5O!P%@AP").await;

        assert!(outcome.is_detected());
        assert_eq!(outcome.failure(), None);
        assert_eq!(outcome.signature(), Some("Eicar-Test-Signature"));
        assert_eq!(engine.scan_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_two_transient_failures() {
        let engine = Arc::new(
            MockEngine::new()
                .then(MockStep::failure("connection reset"))
                .then(MockStep::failure("connection reset"))
                .then(MockStep::clean()),
        );
        let outcome = pipeline(&engine, RetryConfig::default()).inspect(b"body").await;

        assert!(outcome.is_clean());
        assert_eq!(outcome.attempts(), 3);

        let calls = engine.call_times();
        assert_eq!(calls.len(), 3);
        let first_wait = calls[1] - calls[0];
        let second_wait = calls[2] - calls[1];
        assert!(first_wait >= Duration::from_millis(100) && first_wait < Duration::from_millis(150));
        assert!(second_wait >= Duration::from_millis(200) && second_wait < Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_are_unavailable() {
        let engine = Arc::new(MockEngine::new_unreachable());
        let outcome = pipeline(&engine, RetryConfig::default()).inspect(b"body").await;

        assert!(!outcome.is_clean());
        assert_eq!(outcome.failure(), Some(FailureKind::ScanUnavailable));
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(engine.scan_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_backoff_short() {
        let engine = Arc::new(MockEngine::new_unreachable());
        let retry = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_budget(Duration::from_millis(150));
        let outcome = pipeline(&engine, retry).inspect(b"body").await;

        // attempt 1 at 0ms, attempt 2 at 100ms, second backoff (200ms) cut at 150ms
        assert_eq!(outcome.failure(), Some(FailureKind::Timeout));
        assert_eq!(engine.scan_count(), 2);
        assert!(outcome.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_slow_engine() {
        let engine = Arc::new(MockEngine::new_clean().with_latency(Duration::from_secs(60)));
        let retry = RetryConfig::new().with_budget(Duration::from_secs(1));
        let outcome = pipeline(&engine, retry).inspect(b"body").await;

        assert_eq!(outcome.failure(), Some(FailureKind::Timeout));
        assert!(!outcome.is_clean());
        assert_eq!(outcome.attempts(), 1);
        assert!(outcome.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_scan() {
        let engine = Arc::new(MockEngine::new_clean().with_latency(Duration::from_secs(10)));
        let pipeline = pipeline(&engine, RetryConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = pipeline.inspect_with_cancel(b"body", cancel).await;
        assert_eq!(outcome.failure(), Some(FailureKind::Cancelled));
        assert!(!outcome.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_non_clean_signature_wins() {
        let engine = Arc::new(MockEngine::new().then(MockStep::Verdicts(vec![
            ScanVerdict::clean(),
            ScanVerdict::infected("Sig.First"),
            ScanVerdict::infected("Sig.Second"),
        ])));
        let outcome = pipeline(&engine, RetryConfig::default()).inspect(b"body").await;

        assert_eq!(outcome.signature(), Some("Sig.First"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_is_not_clean() {
        let engine = Arc::new(
            MockEngine::new().then(MockStep::Verdicts(vec![ScanVerdict::unknown("Heuristics.Limits")])),
        );
        let outcome = pipeline(&engine, RetryConfig::default()).inspect(b"body").await;

        assert!(outcome.is_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_body_and_empty_verdicts() {
        let engine = Arc::new(MockEngine::new().then(MockStep::Verdicts(Vec::new())));
        let outcome = pipeline(&engine, RetryConfig::default()).inspect(b"").await;

        assert!(outcome.is_clean());
        assert_eq!(engine.received_bodies(), vec![Vec::<u8>::new()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_digest_attached_on_failure() {
        let engine = Arc::new(MockEngine::new_unreachable());
        let outcome = pipeline(&engine, RetryConfig::no_retry()).inspect(b"hello world").await;

        assert_eq!(
            outcome.digest(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_inspections_have_independent_budgets() {
        let engine = Arc::new(MockEngine::new_unreachable());
        let pipeline = Arc::new(pipeline(&engine, RetryConfig::default()));

        let a = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.inspect(b"first").await }
        });
        let b = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.inspect(b"second").await }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.attempts(), 3);
        assert_eq!(b.attempts(), 3);
        assert_eq!(engine.scan_count(), 6);
    }

    #[tokio::test]
    async fn test_connect_rejects_dead_engine() {
        let err = InspectionPipeline::connect(
            MockEngine::new().with_failing_probe("connection refused"),
            PipelineConfig::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScanError::EngineStartup { .. }));
    }

    #[tokio::test]
    async fn test_connect_records_health() {
        let pipeline = InspectionPipeline::connect(MockEngine::new(), PipelineConfig::new())
            .await
            .unwrap();
        assert_eq!(pipeline.health().map(|h| h.threads_max), Some(4));
        assert_eq!(pipeline.engine_name(), "mock");
    }
}
