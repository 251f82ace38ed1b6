//! Per-request capture, inspection and policy.

use crate::audit::emit_request_decision;
use crate::core::ScanError;
use crate::interceptor::body::{self, BoxError, ResponseBody};
use crate::pipeline::InspectionPipeline;
use crate::policy::{Disposition, PolicyMode};

use bytes::Bytes;
use http::header::HOST;
use http::{Request, Response, StatusCode};
use http_body::Body;
use http_body_util::Full;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Header carrying a client-declared body digest.
const DECLARED_SHA256: &str = "x-amz-content-sha256";

/// Default cap on captured body size (100 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Configuration for a [`RequestInterceptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorConfig {
    /// Instance name, recorded on every log line.
    pub name: String,

    /// How detections are handled.
    pub mode: PolicyMode,

    /// Largest body that will be captured. `None` disables the cap.
    pub max_body_bytes: Option<usize>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            name: "clamgate".to_string(),
            mode: PolicyMode::Enforce,
            max_body_bytes: Some(DEFAULT_MAX_BODY_BYTES),
        }
    }
}

impl InterceptorConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the policy mode.
    pub fn with_mode(mut self, mode: PolicyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the body size cap.
    pub fn with_max_body_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

/// Captures a request body, inspects it and decides whether the request
/// reaches the downstream handler.
///
/// Cloning is cheap; clones share the pipeline.
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    pipeline: Arc<InspectionPipeline>,
    config: Arc<InterceptorConfig>,
}

impl RequestInterceptor {
    /// Creates an interceptor around a shared pipeline.
    pub fn new(pipeline: Arc<InspectionPipeline>, config: InterceptorConfig) -> Self {
        Self {
            pipeline,
            config: Arc::new(config),
        }
    }

    /// Returns the interceptor configuration.
    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Returns the shared pipeline.
    pub fn pipeline(&self) -> &Arc<InspectionPipeline> {
        &self.pipeline
    }

    /// Handles one request.
    ///
    /// The body is read in full, scanned, and then replayed to `forward`
    /// byte-for-byte with a corrected `Content-Length`. `forward` is called
    /// at most once and never for a rejected request. Errors returned by
    /// `forward` are passed through untouched.
    pub async fn handle<B, F, Fut, ResBody, E>(
        &self,
        request: Request<B>,
        forward: F,
    ) -> Result<Response<ResponseBody>, E>
    where
        B: Body,
        B::Error: Into<BoxError>,
        F: FnOnce(Request<Full<Bytes>>) -> Fut,
        Fut: Future<Output = Result<Response<ResBody>, E>>,
        ResBody: Body<Data = Bytes> + Send + 'static,
        ResBody::Error: Into<BoxError>,
    {
        let span = tracing::info_span!(
            "inspect_request",
            middleware = %self.config.name,
            method = %request.method(),
            url = %full_url(&request),
        );

        self.handle_inner(request, forward).instrument(span).await
    }

    async fn handle_inner<B, F, Fut, ResBody, E>(
        &self,
        request: Request<B>,
        forward: F,
    ) -> Result<Response<ResponseBody>, E>
    where
        B: Body,
        B::Error: Into<BoxError>,
        F: FnOnce(Request<Full<Bytes>>) -> Fut,
        Fut: Future<Output = Result<Response<ResBody>, E>>,
        ResBody: Body<Data = Bytes> + Send + 'static,
        ResBody::Error: Into<BoxError>,
    {
        let (parts, incoming) = request.into_parts();
        let declared_sha256 = parts
            .headers
            .get(DECLARED_SHA256)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let buffer = match body::capture(incoming, self.config.max_body_bytes).await {
            Ok(buffer) => buffer,
            Err(e @ ScanError::BodyTooLarge { .. }) => {
                tracing::error!(error = %e, "Pre-scan failed, body exceeds the capture limit");
                return Ok(body::reject(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large",
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, "Pre-scan failed, could not read body");
                return Ok(body::reject(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Pre-scan failed",
                ));
            }
        };

        let replayed = body::replay(parts, buffer.clone());

        let started = Instant::now();
        let outcome = self.pipeline.inspect(&buffer).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let disposition = self.config.mode.decide(&outcome);

        if let Some(failure) = outcome.failure() {
            tracing::error!(
                failure = %failure,
                digest = outcome.digest(),
                attempts = outcome.attempts(),
                duration_ms,
                "Body could not be scanned, rejecting request"
            );
        } else if outcome.is_detected() {
            tracing::warn!(
                signature = outcome.signature().unwrap_or("unknown"),
                digest = outcome.digest(),
                declared_sha256 = declared_sha256.as_deref(),
                mode = %self.config.mode,
                action = disposition.action(),
                duration_ms,
                "Malware found in request body"
            );
        } else {
            tracing::info!(
                digest = outcome.digest(),
                declared_sha256 = declared_sha256.as_deref(),
                bytes = buffer.len(),
                duration_ms,
                "Clean body, sending downstream"
            );
        }

        emit_request_decision(&self.config.name, self.config.mode, &outcome, &disposition);

        match disposition {
            Disposition::Reject { status, reason } => Ok(body::reject(status, reason)),
            Disposition::Forward | Disposition::ForwardWithWarning { .. } => {
                let response = forward(replayed).await?;
                Ok(body::boxed(response))
            }
        }
    }
}

fn full_url<B>(request: &Request<B>) -> String {
    let host = request
        .uri()
        .authority()
        .map(|a| a.as_str())
        .or_else(|| request.headers().get(HOST).and_then(|h| h.to_str().ok()))
        .unwrap_or_default();
    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    format!("https://{host}{path}")
}
