//! Inspection outcome.
//!
//! `InspectionOutcome` is the only thing the pipeline hands back to its
//! caller. It is always exactly one of clean, detected or failed; a failed
//! outcome is never clean.

use crate::core::types::FailureKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The three-way classification of an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The engine scanned the body and found nothing.
    Clean,
    /// The engine scanned the body and reported a detection.
    Detected,
    /// The body could not be scanned.
    Unavailable,
}

impl Verdict {
    /// Returns the verdict as a static string for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Detected => "detected",
            Self::Unavailable => "unavailable",
        }
    }
}

/// The result of inspecting one request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionOutcome {
    id: String,
    clean: bool,
    signature: String,
    digest: String,
    #[serde(with = "duration_serde")]
    elapsed: Duration,
    failure: Option<FailureKind>,
    attempts: u32,
}

impl InspectionOutcome {
    /// Creates a clean outcome.
    pub fn clean(digest: impl Into<String>, elapsed: Duration, attempts: u32) -> Self {
        Self::build(true, String::new(), digest.into(), elapsed, None, attempts)
    }

    /// Creates a confirmed-detection outcome.
    pub fn detected(
        signature: impl Into<String>,
        digest: impl Into<String>,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self::build(false, signature.into(), digest.into(), elapsed, None, attempts)
    }

    /// Creates an outcome for a scan that could not complete.
    pub fn failed(
        kind: FailureKind,
        digest: impl Into<String>,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self::build(false, String::new(), digest.into(), elapsed, Some(kind), attempts)
    }

    fn build(
        clean: bool,
        signature: String,
        digest: String,
        elapsed: Duration,
        failure: Option<FailureKind>,
        attempts: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            clean,
            signature,
            digest,
            elapsed,
            failure,
            attempts,
        }
    }

    /// Unique identifier for log correlation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` only when the engine scanned the body and found nothing.
    pub fn is_clean(&self) -> bool {
        self.clean
    }

    /// Returns `true` for a confirmed detection.
    pub fn is_detected(&self) -> bool {
        !self.clean && self.failure.is_none()
    }

    /// Returns the failure kind if the scan could not complete.
    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Returns the signature name of a detection.
    pub fn signature(&self) -> Option<&str> {
        if self.signature.is_empty() {
            None
        } else {
            Some(&self.signature)
        }
    }

    /// Returns the hex digest of the inspected body.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Returns the total time spent inspecting.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns how many engine calls were made.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the three-way classification.
    pub fn verdict(&self) -> Verdict {
        match (self.clean, self.failure) {
            (_, Some(_)) => Verdict::Unavailable,
            (true, None) => Verdict::Clean,
            (false, None) => Verdict::Detected,
        }
    }
}

/// Serde helper for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_outcome() {
        let outcome = InspectionOutcome::clean("abc", Duration::from_millis(5), 1);
        assert!(outcome.is_clean());
        assert!(!outcome.is_detected());
        assert_eq!(outcome.failure(), None);
        assert_eq!(outcome.signature(), None);
        assert_eq!(outcome.verdict(), Verdict::Clean);
    }

    #[test]
    fn test_detected_outcome() {
        let outcome = InspectionOutcome::detected(
            "Eicar-Test-Signature",
            "abc",
            Duration::from_millis(5),
            1,
        );
        assert!(!outcome.is_clean());
        assert!(outcome.is_detected());
        assert_eq!(outcome.signature(), Some("Eicar-Test-Signature"));
        assert_eq!(outcome.verdict(), Verdict::Detected);
    }

    #[test]
    fn test_failed_outcome_is_never_clean() {
        for kind in [
            FailureKind::Timeout,
            FailureKind::ScanUnavailable,
            FailureKind::Cancelled,
        ] {
            let outcome = InspectionOutcome::failed(kind, "abc", Duration::from_secs(1), 3);
            assert!(!outcome.is_clean());
            assert!(!outcome.is_detected());
            assert_eq!(outcome.failure(), Some(kind));
            assert_eq!(outcome.verdict(), Verdict::Unavailable);
        }
    }

    #[test]
    fn test_outcome_ids_are_unique() {
        let a = InspectionOutcome::clean("d", Duration::ZERO, 1);
        let b = InspectionOutcome::clean("d", Duration::ZERO, 1);
        assert_ne!(a.id(), b.id());
    }
}
