//! What to do with a request once it has been inspected.

use http::StatusCode;

/// The interceptor's decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Pass the request downstream.
    Forward,

    /// Pass the request downstream despite a detection (alert mode).
    ForwardWithWarning {
        /// Signature that matched.
        signature: String,
    },

    /// Terminate the request.
    Reject {
        /// Status to respond with.
        status: StatusCode,
        /// Short response body.
        reason: &'static str,
    },
}

impl Disposition {
    /// Creates a Forward disposition.
    pub fn forward() -> Self {
        Self::Forward
    }

    /// Creates a ForwardWithWarning disposition.
    pub fn forward_with_warning(signature: impl Into<String>) -> Self {
        Self::ForwardWithWarning {
            signature: signature.into(),
        }
    }

    /// Creates a Reject disposition.
    pub fn reject(status: StatusCode, reason: &'static str) -> Self {
        Self::Reject { status, reason }
    }

    /// Returns true if the request goes downstream.
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forward | Self::ForwardWithWarning { .. })
    }

    /// Returns the rejection status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Reject { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `forward` or `reject`.
    pub fn action(&self) -> &'static str {
        if self.is_forwarded() {
            "forward"
        } else {
            "reject"
        }
    }
}
