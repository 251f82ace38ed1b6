//! Core types used throughout the clamgate library.
//!
//! This module defines the engine-facing data structures: per-stream
//! verdicts, engine health statistics and the failure kinds an inspection
//! can end in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single verdict returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "raw", rename_all = "snake_case")]
pub enum VerdictStatus {
    /// The engine's clean marker.
    Clean,
    /// A signature matched.
    Infected,
    /// Any other status token. Treated as not clean.
    Unknown(String),
}

impl VerdictStatus {
    /// Returns `true` only for the engine's clean marker.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Infected => write!(f, "infected"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// One verdict produced by the engine for a submitted stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    /// Verdict status.
    pub status: VerdictStatus,

    /// Signature name; empty when clean.
    pub signature: String,
}

impl ScanVerdict {
    /// Creates a clean verdict.
    pub fn clean() -> Self {
        Self {
            status: VerdictStatus::Clean,
            signature: String::new(),
        }
    }

    /// Creates an infected verdict for the given signature.
    pub fn infected(signature: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Infected,
            signature: signature.into(),
        }
    }

    /// Creates a verdict with an unrecognised status token.
    pub fn unknown(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            signature: raw.clone(),
            status: VerdictStatus::Unknown(raw),
        }
    }

    /// Returns `true` if this verdict carries the clean marker.
    pub fn is_clean(&self) -> bool {
        self.status.is_clean()
    }
}

/// Engine capacity statistics, read once at pipeline construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineHealth {
    /// Idle scanning threads.
    pub threads_idle: u32,

    /// Live (busy) scanning threads.
    pub threads_live: u32,

    /// Maximum scanning threads. Zero means the engine cannot scan.
    pub threads_max: u32,

    /// Queued scan requests.
    pub queue_items: u32,

    /// Free memory in megabytes, when the engine reports it.
    pub mem_free_mb: Option<f64>,

    /// Used memory in megabytes, when the engine reports it.
    pub mem_used_mb: Option<f64>,
}

impl EngineHealth {
    /// Returns `true` if the engine reports any scanning capacity.
    pub fn has_capacity(&self) -> bool {
        self.threads_max > 0
    }
}

/// Why an inspection could not produce a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The overall inspection deadline expired.
    Timeout,
    /// Every attempt failed at the transport level.
    ScanUnavailable,
    /// The caller cancelled the inspection.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ScanUnavailable => write!(f, "scan_unavailable"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
