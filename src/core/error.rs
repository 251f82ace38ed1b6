//! Error types for the clamgate library.
//!
//! Transport-level failures are retried inside the inspection pipeline and
//! never escape it; callers of `inspect` only ever see an
//! [`InspectionOutcome`](crate::core::InspectionOutcome). The remaining
//! variants surface at construction time or in the request interceptor.

use std::time::Duration;
use thiserror::Error;

/// The main error type for engine and interception operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The engine could not be reached (connect refused or timed out).
    #[error("engine '{engine}' is unreachable: {reason}")]
    EngineUnreachable {
        /// Name of the engine.
        engine: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The connection failed while a command was in flight.
    #[error("transport error talking to engine '{engine}': {message}")]
    Transport {
        /// Name of the engine.
        engine: String,
        /// Error message describing the failure.
        message: String,
    },

    /// The engine did not answer within the read timeout.
    #[error("engine '{engine}' did not answer within {elapsed:?}")]
    ReadTimeout {
        /// Name of the engine.
        engine: String,
        /// The configured read timeout.
        elapsed: Duration,
    },

    /// The engine answered with something that could not be parsed.
    #[error("malformed response from engine '{engine}': {details}")]
    MalformedResponse {
        /// Name of the engine.
        engine: String,
        /// What was wrong with the response.
        details: String,
    },

    /// The engine answered with an explicit error line.
    #[error("engine '{engine}' reported an error: {message}")]
    EngineError {
        /// Name of the engine.
        engine: String,
        /// The error text returned by the engine.
        message: String,
    },

    /// The engine failed its startup probe.
    #[error("engine '{engine}' failed startup check: {reason}")]
    EngineStartup {
        /// Name of the engine.
        engine: String,
        /// Why the engine was rejected.
        reason: String,
    },

    /// The request body could not be read in full.
    #[error("failed to read request body: {message}")]
    BodyRead {
        /// Error message from the body stream.
        message: String,
    },

    /// The request body exceeds the configured capture limit.
    #[error("request body exceeds the {limit} byte capture limit")]
    BodyTooLarge {
        /// Maximum allowed size in bytes.
        limit: usize,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if this error is a per-attempt transport failure that
    /// the pipeline may retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EngineUnreachable { .. }
                | Self::Transport { .. }
                | Self::ReadTimeout { .. }
                | Self::MalformedResponse { .. }
                | Self::EngineError { .. }
        )
    }

    /// Returns the engine name if this error is associated with one.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::EngineUnreachable { engine, .. }
            | Self::Transport { engine, .. }
            | Self::ReadTimeout { engine, .. }
            | Self::MalformedResponse { engine, .. }
            | Self::EngineError { engine, .. }
            | Self::EngineStartup { engine, .. } => Some(engine),
            _ => None,
        }
    }

    /// Creates an `EngineUnreachable` error.
    pub fn engine_unreachable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnreachable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Transport` error.
    pub fn transport(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates a `ReadTimeout` error.
    pub fn read_timeout(engine: impl Into<String>, elapsed: Duration) -> Self {
        Self::ReadTimeout {
            engine: engine.into(),
            elapsed,
        }
    }

    /// Creates a `MalformedResponse` error.
    pub fn malformed(engine: impl Into<String>, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            engine: engine.into(),
            details: details.into(),
        }
    }

    /// Creates an `EngineError` error.
    pub fn engine_error(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EngineError {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates an `EngineStartup` error.
    pub fn engine_startup(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineStartup {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `BodyRead` error.
    pub fn body_read(message: impl Into<String>) -> Self {
        Self::BodyRead {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_recoverable() {
        assert!(ScanError::engine_unreachable("clamd", "refused").is_recoverable());
        assert!(ScanError::transport("clamd", "reset by peer").is_recoverable());
        assert!(ScanError::read_timeout("clamd", Duration::from_secs(1)).is_recoverable());
        assert!(ScanError::malformed("clamd", "garbage").is_recoverable());
        assert!(ScanError::engine_error("clamd", "size limit exceeded").is_recoverable());
    }

    #[test]
    fn test_terminal_errors_are_not_recoverable() {
        assert!(!ScanError::engine_startup("clamd", "no threads").is_recoverable());
        assert!(!ScanError::body_read("client went away").is_recoverable());
        assert!(!ScanError::BodyTooLarge { limit: 10 }.is_recoverable());
        assert!(!ScanError::configuration("bad address").is_recoverable());
    }

    #[test]
    fn test_scan_error_engine() {
        let err = ScanError::engine_unreachable("clamd", "connection refused");
        assert_eq!(err.engine(), Some("clamd"));
        assert_eq!(ScanError::body_read("eof").engine(), None);
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::BodyTooLarge { limit: 1024 };
        assert!(err.to_string().contains("1024"));

        let err = ScanError::engine_error("clamd", "INSTREAM size limit exceeded");
        assert!(err.to_string().contains("INSTREAM size limit exceeded"));
    }
}
