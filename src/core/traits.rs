//! The engine client trait.
//!
//! Every antivirus backend used by the inspection pipeline implements
//! [`ScanEngineClient`]. The production implementation speaks the clamd
//! protocol; tests use the scripted [`MockEngine`](crate::backends::MockEngine).

use crate::core::error::ScanError;
use crate::core::types::{EngineHealth, ScanVerdict};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A network client for an antivirus engine.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; one client is shared by every
///   in-flight request.
/// - Per-call state (connections, buffers) must not leak between calls.
///   Retry and backoff state belongs to the caller.
/// - Transport problems are reported as recoverable [`ScanError`]s. A
///   detection is a successful return, not an error.
///
/// # Example Implementation
///
/// ```rust
/// use async_trait::async_trait;
/// use clamgate::core::{EngineHealth, ScanEngineClient, ScanError, ScanVerdict};
///
/// #[derive(Debug)]
/// struct AlwaysClean;
///
/// #[async_trait]
/// impl ScanEngineClient for AlwaysClean {
///     fn name(&self) -> &str {
///         "always-clean"
///     }
///
///     async fn probe(&self) -> Result<EngineHealth, ScanError> {
///         Ok(EngineHealth { threads_max: 1, ..Default::default() })
///     }
///
///     async fn scan_stream(&self, _data: &[u8]) -> Result<Vec<ScanVerdict>, ScanError> {
///         Ok(vec![ScanVerdict::clean()])
///     }
/// }
/// ```
#[async_trait]
pub trait ScanEngineClient: Send + Sync + Debug {
    /// Returns a stable, human-readable engine identifier such as "clamd".
    fn name(&self) -> &str;

    /// Reads the engine's liveness and capacity statistics.
    async fn probe(&self) -> Result<EngineHealth, ScanError>;

    /// Submits `data` as a single stream and returns the engine's verdicts.
    ///
    /// Zero or more verdicts may be returned; a body can match several
    /// signatures.
    async fn scan_stream(&self, data: &[u8]) -> Result<Vec<ScanVerdict>, ScanError>;
}

/// An arc-wrapped engine client for shared ownership.
pub type ArcEngine = Arc<dyn ScanEngineClient>;

#[async_trait]
impl<T: ScanEngineClient + ?Sized> ScanEngineClient for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn probe(&self) -> Result<EngineHealth, ScanError> {
        (**self).probe().await
    }

    async fn scan_stream(&self, data: &[u8]) -> Result<Vec<ScanVerdict>, ScanError> {
        (**self).scan_stream(data).await
    }
}
