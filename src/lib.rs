//! # Clamgate
//!
//! Inline malware inspection of HTTP request bodies, backed by clamd.
//!
//! ## Overview
//!
//! Clamgate sits in front of a request handler and makes sure no body reaches
//! it unscanned:
//!
//! - The whole body is captured and replayed downstream byte-for-byte
//! - Each body is streamed to the engine with a bounded retry budget
//! - Detections are rejected (enforce) or forwarded with a warning (observe)
//! - An engine that cannot be reached always fails closed
//! - Every decision is recorded as a structured audit event
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clamgate::{ClamGateConfig, ScanLayer};
//!
//! # async fn run() -> Result<(), clamgate::ScanError> {
//! let config = ClamGateConfig::new().with_address("localhost:3310");
//!
//! // Fails if clamd is unreachable or reports no scanning threads.
//! let pipeline = Arc::new(config.connect().await?);
//!
//! // Wrap any `Service<Request<Full<Bytes>>>` with `tower::Layer::layer`.
//! let _layer = ScanLayer::new(pipeline, config.interceptor_config());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `clamav` (default) - clamd client over TCP or a Unix socket
//!
//! ## Architecture
//!
//! - **Core**: Verdicts, outcomes, the engine trait and error handling
//! - **Backends**: The clamd client and a scripted mock
//! - **Pipeline**: Bounded retries, deadlines and the startup health check
//! - **Policy**: Enforce/observe decisions
//! - **Interceptor**: Body capture, replay and the tower layer
//! - **Audit**: Structured events under the `clamgate::audit` target
//! - **Config**: Host-facing configuration with defaults

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod config;
pub mod core;
pub mod interceptor;
pub mod pipeline;
pub mod policy;

// Re-export commonly used types at the crate root
pub use crate::config::ClamGateConfig;
pub use crate::core::{
    DigestAlgorithm, EngineHealth, FailureKind, InspectionOutcome, ScanEngineClient, ScanError,
    ScanVerdict, Verdict, VerdictStatus,
};
pub use crate::interceptor::{InterceptorConfig, RequestInterceptor, ScanLayer, ScanService};
pub use crate::pipeline::{InspectionPipeline, PipelineConfig, RetryConfig};
pub use crate::policy::{Disposition, PolicyMode};

/// Prelude module for convenient imports.
///
/// ```rust
/// use clamgate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ClamGateConfig;
    pub use crate::core::{
        DigestAlgorithm, EngineHealth, FailureKind, InspectionOutcome, ScanEngineClient,
        ScanError, ScanVerdict, Verdict, VerdictStatus,
    };
    pub use crate::interceptor::{InterceptorConfig, RequestInterceptor, ScanLayer};
    pub use crate::pipeline::{InspectionPipeline, PipelineConfig, RetryConfig};
    pub use crate::policy::{Disposition, PolicyMode};
}
