use crate::core::{FailureKind, InspectionOutcome};
use crate::policy::Disposition;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether detections block traffic or are only logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Detections are rejected with 403.
    #[default]
    Enforce,
    /// Detections are logged and the request is still forwarded.
    Observe,
}

impl PolicyMode {
    /// Maps the `alert_mode` configuration flag.
    pub fn from_alert_mode(alert_mode: bool) -> Self {
        if alert_mode {
            Self::Observe
        } else {
            Self::Enforce
        }
    }

    /// Decides what happens to a request given its inspection outcome.
    pub fn decide(&self, outcome: &InspectionOutcome) -> Disposition {
        if let Some(failure) = outcome.failure() {
            return match failure {
                FailureKind::Timeout => {
                    Disposition::reject(StatusCode::GATEWAY_TIMEOUT, "Could not process body in time")
                }
                FailureKind::ScanUnavailable | FailureKind::Cancelled => {
                    Disposition::reject(StatusCode::BAD_GATEWAY, "Could not scan body")
                }
            };
        }

        if outcome.is_clean() {
            return Disposition::forward();
        }

        match self {
            Self::Enforce => Disposition::reject(StatusCode::FORBIDDEN, "Forbidden"),
            Self::Observe => {
                Disposition::forward_with_warning(outcome.signature().unwrap_or_default())
            }
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enforce => write!(f, "enforce"),
            Self::Observe => write!(f, "observe"),
        }
    }
}
